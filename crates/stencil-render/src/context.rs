//! Render-time name bindings.

use std::collections::HashMap;

use crate::value::Value;

/// The name→value mapping a render runs against.
///
/// Cloning produces the scope copy used by loop bodies, block overrides
/// and isolated includes; bindings made in the copy never reach the
/// original.
#[derive(Debug, Clone, Default)]
pub struct Context {
    vars: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Build a context from a JSON object; any other JSON shape gives an
    /// empty context.
    pub fn from_json(json: serde_json::Value) -> Self {
        let mut ctx = Self::new();
        if let serde_json::Value::Object(map) = json {
            for (name, value) in map {
                ctx.set(name, Value::from(value));
            }
        }
        ctx
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut ctx = Self::new();
        for (name, value) in iter {
            ctx.set(name, value);
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_get() {
        let mut ctx = Context::new();
        ctx.set("name", "ada");
        assert_eq!(ctx.get("name"), Some(&Value::Str("ada".into())));
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn test_clone_isolates_bindings() {
        let mut ctx = Context::new();
        ctx.set("a", 1i64);
        let mut scoped = ctx.clone();
        scoped.set("a", 2i64);
        scoped.set("b", 3i64);
        assert_eq!(ctx.get("a"), Some(&Value::Int(1)));
        assert_eq!(ctx.get("b"), None);
    }

    #[test]
    fn test_from_json_object() {
        let ctx = Context::from_json(serde_json::json!({"n": 7, "ok": true}));
        assert_eq!(ctx.get("n"), Some(&Value::Int(7)));
        assert_eq!(ctx.get("ok"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_from_json_non_object_is_empty() {
        assert!(Context::from_json(serde_json::json!([1, 2])).is_empty());
    }
}
