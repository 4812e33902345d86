//! Tree-walking evaluator.
//!
//! Executes a validated [`Document`] against a [`Context`], producing
//! output text. Inheritance state (the child's block table and a block's
//! rendered body) travels in an explicit [`Frame`] argument rather than
//! hiding inside the context, so user bindings can never collide with
//! the machinery.

use std::collections::HashMap;

use stencil_parser::{AccessOp, BinOp, BlockNode, Document, Expr, LitKind, Stmt, UnOp};

use crate::context::Context;
use crate::registry::Registry;
use crate::value::Value;
use crate::RenderError;

/// Name under which a block's own rendered body is visible inside an
/// overriding block.
const REMAINS: &str = "remains";

/// Per-call inheritance state threaded through statement execution.
#[derive(Clone, Copy, Default)]
struct Frame<'a> {
    /// Block table of the extending child, if the document being walked
    /// is a parent body.
    overrides: Option<&'a HashMap<String, BlockNode>>,
    /// Rendered body of the block being overridden.
    remains: Option<&'a str>,
}

pub struct Evaluator<'a> {
    registry: &'a Registry,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Render a document against a context.
    pub fn render(&self, doc: &Document, ctx: &mut Context) -> Result<String, RenderError> {
        self.exec_document(doc, ctx, Frame::default())
    }

    /// An extending document registers its own blocks as overrides and
    /// runs the parent's body in its place.
    fn exec_document(
        &self,
        doc: &Document,
        ctx: &mut Context,
        frame: Frame<'_>,
    ) -> Result<String, RenderError> {
        match &doc.extend {
            Some((_, parent)) => {
                let inherited = Frame {
                    overrides: Some(&doc.blocks),
                    remains: frame.remains,
                };
                self.exec_stmts(&parent.body, ctx, inherited)
            }
            None => self.exec_stmts(&doc.body, ctx, frame),
        }
    }

    fn exec_stmts(
        &self,
        stmts: &[Stmt],
        ctx: &mut Context,
        frame: Frame<'_>,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        for stmt in stmts {
            out.push_str(&self.exec_stmt(stmt, ctx, frame)?);
        }
        Ok(out)
    }

    fn exec_stmt(
        &self,
        stmt: &Stmt,
        ctx: &mut Context,
        frame: Frame<'_>,
    ) -> Result<String, RenderError> {
        match stmt {
            Stmt::Text(text) => Ok(text.clone()),
            Stmt::Value(expr) => self.eval_expr(expr, ctx, frame)?.to_output(),
            Stmt::Assign { name, value } => {
                let value = self.eval_expr(value, ctx, frame)?;
                ctx.set(name.clone(), value);
                Ok(String::new())
            }
            Stmt::If {
                cond,
                body,
                else_branch,
            } => {
                if self.eval_expr(cond, ctx, frame)?.truthy() {
                    self.exec_stmts(body, ctx, frame)
                } else if let Some(else_body) = else_branch {
                    self.exec_stmts(else_body, ctx, frame)
                } else {
                    Ok(String::new())
                }
            }
            Stmt::For {
                key,
                value,
                iterable,
                body,
            } => self.exec_for(key.as_deref(), value, iterable, body, ctx, frame),
            Stmt::Block(node) => self.exec_block(node, ctx, frame),
            Stmt::Include {
                params, only, doc, ..
            } => self.exec_include(params.as_ref(), *only, doc, ctx, frame),
        }
    }

    fn exec_for(
        &self,
        key: Option<&str>,
        value: &str,
        iterable: &Expr,
        body: &[Stmt],
        ctx: &mut Context,
        frame: Frame<'_>,
    ) -> Result<String, RenderError> {
        let source = self.eval_expr(iterable, ctx, frame)?;
        let entries: Vec<(Value, Value)> = match source {
            Value::Seq(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Value::Int(i as i64), v))
                .collect(),
            Value::Map(map) => map
                .into_iter()
                .map(|(k, v)| (Value::Str(k), v))
                .collect(),
            Value::Str(s) => s
                .chars()
                .enumerate()
                .map(|(i, c)| (Value::Int(i as i64), Value::Str(c.into())))
                .collect(),
            other => {
                return Err(RenderError::NotIterable {
                    kind: other.type_name(),
                })
            }
        };
        let mut out = String::new();
        for (entry_key, entry_value) in entries {
            // Loop bindings live in a scope copy and never leak out.
            let mut scoped = ctx.clone();
            if let Some(key) = key {
                scoped.set(key, entry_key);
            }
            scoped.set(value, entry_value);
            out.push_str(&self.exec_stmts(body, &mut scoped, frame)?);
        }
        Ok(out)
    }

    /// A block renders its own body first; if the frame carries an
    /// override under this name that is not the block itself, the
    /// override wins and sees the rendered body as `remains`.
    fn exec_block(
        &self,
        node: &BlockNode,
        ctx: &mut Context,
        frame: Frame<'_>,
    ) -> Result<String, RenderError> {
        let own = self.exec_stmts(&node.body, ctx, frame)?;
        if let Some(overrides) = frame.overrides {
            if let Some(replacement) = overrides.get(&node.name) {
                if !std::sync::Arc::ptr_eq(&replacement.body, &node.body) {
                    let mut scoped = ctx.clone();
                    let inner = Frame {
                        overrides: frame.overrides,
                        remains: Some(&own),
                    };
                    return self.exec_stmts(&replacement.body, &mut scoped, inner);
                }
            }
        }
        Ok(own)
    }

    fn exec_include(
        &self,
        params: Option<&Expr>,
        only: bool,
        doc: &Document,
        ctx: &mut Context,
        frame: Frame<'_>,
    ) -> Result<String, RenderError> {
        match params {
            Some(expr) => {
                let value = self.eval_expr(expr, ctx, frame)?;
                let Value::Map(map) = value else {
                    return Err(RenderError::BadParams {
                        kind: value.type_name(),
                    });
                };
                let mut inner = if only { Context::new() } else { ctx.clone() };
                for (name, value) in map {
                    inner.set(name, value);
                }
                self.exec_document(doc, &mut inner, Frame::default())
            }
            None if only => self.exec_document(doc, &mut Context::new(), Frame::default()),
            None => self.exec_document(doc, ctx, Frame::default()),
        }
    }

    fn eval_expr(
        &self,
        expr: &Expr,
        ctx: &mut Context,
        frame: Frame<'_>,
    ) -> Result<Value, RenderError> {
        match expr {
            Expr::Ident(name) => {
                if name == REMAINS {
                    if let Some(remains) = frame.remains {
                        return Ok(Value::Str(remains.into()));
                    }
                }
                ctx.get(name)
                    .cloned()
                    .ok_or_else(|| RenderError::UnknownName { name: name.clone() })
            }
            Expr::Literal { kind, raw } => eval_literal(*kind, raw),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, ctx, frame)?);
                }
                Ok(Value::Seq(values))
            }
            Expr::Index { base, op, key } => {
                let base_value = self.eval_expr(base, ctx, frame)?;
                match op {
                    AccessOp::Dot => self.eval_member(base_value, key, ctx, frame),
                    AccessOp::Bracket => {
                        let key_value = self.eval_expr(key, ctx, frame)?;
                        index_value(base_value, key_value)
                    }
                }
            }
            Expr::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg, ctx, frame)?);
                }
                self.registry.call(callee, &values)
            }
            Expr::Binary { left, op, right } => {
                let left = self.eval_expr(left, ctx, frame)?;
                let right = self.eval_expr(right, ctx, frame)?;
                binary(*op, left, right)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand, ctx, frame)?;
                match op {
                    UnOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnOp::Neg => match value {
                        Value::Int(n) => n
                            .checked_neg()
                            .map(Value::Int)
                            .ok_or(RenderError::Overflow { op: "-" }),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        other => Err(RenderError::BadNegation {
                            kind: other.type_name(),
                        }),
                    },
                }
            }
        }
    }

    /// Dot access: a name resolves through map entry, object field, then
    /// the zero-argument method probes; a call invokes the named method.
    fn eval_member(
        &self,
        base: Value,
        key: &Expr,
        ctx: &mut Context,
        frame: Frame<'_>,
    ) -> Result<Value, RenderError> {
        match key {
            Expr::Ident(name) => get_member(&base, name),
            Expr::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg, ctx, frame)?);
                }
                match base {
                    Value::Object(obj) => obj.invoke(callee, &values).unwrap_or_else(|| {
                        Err(RenderError::UnknownKey {
                            key: callee.clone(),
                            kind: "object",
                        })
                    }),
                    other => Err(RenderError::UnknownKey {
                        key: callee.clone(),
                        kind: other.type_name(),
                    }),
                }
            }
            other => Err(RenderError::UnknownKey {
                key: other.literal(),
                kind: base.type_name(),
            }),
        }
    }
}

fn eval_literal(kind: LitKind, raw: &str) -> Result<Value, RenderError> {
    match kind {
        LitKind::Str => Ok(Value::Str(raw.into())),
        LitKind::Bool => Ok(Value::Bool(raw == "true")),
        LitKind::Number => {
            if raw.contains(['.', 'e', 'E']) {
                raw.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| RenderError::BadNumber { raw: raw.into() })
            } else {
                raw.parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| RenderError::BadNumber { raw: raw.into() })
            }
        }
    }
}

/// Named lookup on a value: map entry, object field, method probes.
fn get_member(base: &Value, key: &str) -> Result<Value, RenderError> {
    match base {
        Value::Map(map) => map.get(key).cloned().ok_or_else(|| RenderError::UnknownKey {
            key: key.into(),
            kind: "map",
        }),
        Value::Object(obj) => {
            if let Some(value) = obj.field(key) {
                return Ok(value);
            }
            let probes = [
                key.to_string(),
                format!("get_{key}"),
                format!("has_{key}"),
                format!("is_{key}"),
            ];
            for probe in &probes {
                if let Some(result) = obj.invoke(probe, &[]) {
                    return result;
                }
            }
            Err(RenderError::UnknownKey {
                key: key.into(),
                kind: "object",
            })
        }
        other => Err(RenderError::UnknownKey {
            key: key.into(),
            kind: other.type_name(),
        }),
    }
}

/// Subscript lookup with bounds checking.
fn index_value(base: Value, key: Value) -> Result<Value, RenderError> {
    match (base, key) {
        (Value::Seq(items), Value::Int(index)) => {
            let len = items.len();
            usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .ok_or(RenderError::IndexOutOfBounds { index, len })
        }
        (Value::Str(s), Value::Int(index)) => {
            let len = s.chars().count();
            usize::try_from(index)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(c.into()))
                .ok_or(RenderError::IndexOutOfBounds { index, len })
        }
        (Value::Map(map), Value::Str(key)) => {
            map.get(&key).cloned().ok_or(RenderError::UnknownKey {
                key,
                kind: "map",
            })
        }
        (base @ Value::Object(_), Value::Str(key)) => get_member(&base, &key),
        (base, key) => Err(RenderError::BadIndex {
            kind: base.type_name(),
            key_kind: key.type_name(),
        }),
    }
}

/// Apply one binary operator; both operands are already evaluated.
fn binary(op: BinOp, left: Value, right: Value) -> Result<Value, RenderError> {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => arithmetic(op, left, right),
        BinOp::Eq => Ok(Value::Bool(loose_eq(&left, &right))),
        BinOp::Ne => Ok(Value::Bool(!loose_eq(&left, &right))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, left, right),
        BinOp::And => Ok(Value::Bool(left.truthy() && right.truthy())),
        BinOp::Or => Ok(Value::Bool(left.truthy() || right.truthy())),
    }
}

fn arithmetic(op: BinOp, left: Value, right: Value) -> Result<Value, RenderError> {
    if let (Value::Str(a), Value::Str(b)) = (&left, &right) {
        if op == BinOp::Add {
            return Ok(Value::Str(format!("{a}{b}")));
        }
    }
    match (&left, &right) {
        // Integer arithmetic stays integer, checked; division always
        // promotes so quotients are never silently truncated.
        (Value::Int(a), Value::Int(b))
            if matches!(op, BinOp::Add | BinOp::Sub | BinOp::Mul) =>
        {
            let result = match op {
                BinOp::Add => a.checked_add(*b),
                BinOp::Sub => a.checked_sub(*b),
                _ => a.checked_mul(*b),
            };
            result
                .map(Value::Int)
                .ok_or(RenderError::Overflow { op: op.as_str() })
        }
        _ => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(RenderError::BadOperands {
                    op: op.as_str(),
                    left: left.type_name(),
                    right: right.type_name(),
                });
            };
            match op {
                BinOp::Div if b == 0.0 => Err(RenderError::DivisionByZero),
                BinOp::Div => Ok(Value::Float(a / b)),
                BinOp::Add => Ok(Value::Float(a + b)),
                BinOp::Sub => Ok(Value::Float(a - b)),
                _ => Ok(Value::Float(a * b)),
            }
        }
    }
}

/// Equality with cross-kind numeric coercion.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn compare(op: BinOp, left: Value, right: Value) -> Result<Value, RenderError> {
    let bad = || RenderError::BadOperands {
        op: op.as_str(),
        left: left.type_name(),
        right: right.type_name(),
    };
    let ordering = match (&left, &right) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(bad());
            };
            a.partial_cmp(&b).ok_or_else(bad)?
        }
    };
    let result = match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    };
    Ok(Value::Bool(result))
}
