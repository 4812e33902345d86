//! Function and filter registries.
//!
//! Callables are plain closures over value slices. Functions and filters
//! live in separate tables but share the call syntax; the evaluator
//! tries functions first. A registry is an explicit collaborator handed
//! to the engine, not process-global state, so independent engines can
//! carry different tables.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::value::Value;
use crate::RenderError;

pub type Callable = Arc<dyn Fn(&[Value]) -> Result<Value, RenderError> + Send + Sync>;

/// Registration failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid callable name \"{name}\"")]
    BadName { name: String },
}

pub struct Registry {
    functions: HashMap<String, Callable>,
    filters: HashMap<String, Callable>,
}

impl Registry {
    /// An empty registry with no callables at all.
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
            filters: HashMap::new(),
        }
    }

    /// A registry carrying the built-in callables.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.install_builtins();
        registry
    }

    pub fn register_fn<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: Fn(&[Value]) -> Result<Value, RenderError> + Send + Sync + 'static,
    {
        check_callable_name(name)?;
        self.functions.insert(name.into(), Arc::new(f));
        Ok(())
    }

    pub fn register_filter<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: Fn(&[Value]) -> Result<Value, RenderError> + Send + Sync + 'static,
    {
        check_callable_name(name)?;
        self.filters.insert(name.into(), Arc::new(f));
        Ok(())
    }

    /// Look up a callable by name, functions before filters.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, RenderError> {
        let callable = self
            .functions
            .get(name)
            .or_else(|| self.filters.get(name))
            .ok_or_else(|| RenderError::UnknownFunction { name: name.into() })?;
        callable(args)
    }

    fn install_builtins(&mut self) {
        // Registration of the built-in names cannot fail the name check.
        let _ = self.register_filter("length", builtin_length);
        let _ = self.register_fn("param", builtin_param);
        let _ = self.register_fn("merge", builtin_merge);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Element or character count of a sized value.
fn builtin_length(args: &[Value]) -> Result<Value, RenderError> {
    match args {
        [Value::Str(s)] => Ok(Value::Int(s.chars().count() as i64)),
        [Value::Seq(items)] => Ok(Value::Int(items.len() as i64)),
        [Value::Map(map)] => Ok(Value::Int(map.len() as i64)),
        [other] => Err(RenderError::BadArgument {
            func: "length".into(),
            reason: format!("{} has no length", other.type_name()),
        }),
        _ => Err(RenderError::BadArgument {
            func: "length".into(),
            reason: "expected one argument".into(),
        }),
    }
}

/// `param(key, value)` builds a one-entry map, the unit of an include's
/// `with` clause.
fn builtin_param(args: &[Value]) -> Result<Value, RenderError> {
    match args {
        [Value::Str(key), value] => {
            let mut map = BTreeMap::new();
            map.insert(key.clone(), value.clone());
            Ok(Value::Map(map))
        }
        [other, _] => Err(RenderError::BadArgument {
            func: "param".into(),
            reason: format!("key must be a string, got {}", other.type_name()),
        }),
        _ => Err(RenderError::BadArgument {
            func: "param".into(),
            reason: "expected a key and a value".into(),
        }),
    }
}

/// `merge(maps...)` joins maps left to right, later keys winning.
fn builtin_merge(args: &[Value]) -> Result<Value, RenderError> {
    let mut merged = BTreeMap::new();
    for arg in args {
        match arg {
            Value::Map(map) => merged.extend(map.clone()),
            other => {
                return Err(RenderError::BadArgument {
                    func: "merge".into(),
                    reason: format!("expected maps, got {}", other.type_name()),
                })
            }
        }
    }
    Ok(Value::Map(merged))
}

fn check_callable_name(name: &str) -> Result<(), RegistryError> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(RegistryError::BadName { name: name.into() })
    }
}
