//! Static validation pass.
//!
//! Runs once over a freshly parsed [`Document`], before it is cached or
//! evaluated. Rejects shapes the grammar admits but the evaluator cannot
//! give meaning to, so render-time code only ever sees well-formed trees.

use crate::ast::{AccessOp, Document, Expr, Stmt};
use crate::ValidateError;

/// Check a document's structural and expression-shape rules.
pub fn validate(doc: &Document) -> Result<(), ValidateError> {
    validate_stmts(&doc.body, true)
}

fn validate_stmts(stmts: &[Stmt], top_level: bool) -> Result<(), ValidateError> {
    for stmt in stmts {
        validate_stmt(stmt, top_level)?;
    }
    Ok(())
}

fn validate_stmt(stmt: &Stmt, top_level: bool) -> Result<(), ValidateError> {
    match stmt {
        Stmt::Text(_) => Ok(()),
        Stmt::Value(expr) => validate_expr(expr),
        Stmt::Assign { name, value } => {
            check_name(name)?;
            validate_expr(value)
        }
        Stmt::If {
            cond,
            body,
            else_branch,
        } => {
            check_condition(cond)?;
            validate_expr(cond)?;
            validate_stmts(body, false)?;
            match else_branch {
                Some(else_body) => validate_stmts(else_body, false),
                None => Ok(()),
            }
        }
        Stmt::For {
            key,
            value,
            iterable,
            body,
        } => {
            if let Some(key) = key {
                check_name(key)?;
            }
            check_name(value)?;
            check_iterable(iterable)?;
            validate_expr(iterable)?;
            validate_stmts(body, false)
        }
        Stmt::Block(node) => {
            // Inheritance points must be resolvable by name at the top
            // of the document; a block under if/for has no stable
            // identity for overriding.
            if !top_level {
                return Err(ValidateError::NestedBlock {
                    name: node.name.clone(),
                });
            }
            check_name(&node.name)?;
            validate_stmts(&node.body, false)
        }
        Stmt::Include {
            path, params, doc, ..
        } => {
            if let Some(params) = params {
                validate_expr(params)?;
            }
            if doc.extend.is_some() {
                return Err(ValidateError::IncludeExtends { path: path.clone() });
            }
            Ok(())
        }
    }
}

fn validate_expr(expr: &Expr) -> Result<(), ValidateError> {
    match expr {
        Expr::Ident(name) => check_name(name),
        Expr::Literal { .. } => Ok(()),
        Expr::List(items) => {
            for item in items {
                validate_expr(item)?;
            }
            Ok(())
        }
        Expr::Index { base, op, key } => {
            validate_expr(base)?;
            let key_ok = match op {
                AccessOp::Dot => matches!(**key, Expr::Ident(_) | Expr::Call { .. }),
                AccessOp::Bracket => !matches!(**key, Expr::List(_)),
            };
            if !key_ok {
                return Err(ValidateError::BadKey {
                    expr: expr.literal(),
                });
            }
            validate_expr(key)
        }
        Expr::Call { callee, args } => {
            check_name(callee)?;
            for arg in args {
                validate_expr(arg)?;
            }
            Ok(())
        }
        Expr::Binary { left, right, .. } => {
            if matches!(**left, Expr::List(_)) || matches!(**right, Expr::List(_)) {
                return Err(ValidateError::ListOperand {
                    expr: expr.literal(),
                });
            }
            validate_expr(left)?;
            validate_expr(right)
        }
        Expr::Unary { operand, .. } => {
            if matches!(**operand, Expr::List(_)) {
                return Err(ValidateError::ListOperand {
                    expr: expr.literal(),
                });
            }
            validate_expr(operand)
        }
    }
}

/// Conditions must be resolvable against a context; bare literals and
/// lists are rejected.
fn check_condition(cond: &Expr) -> Result<(), ValidateError> {
    let ok = match cond {
        Expr::Ident(_) | Expr::Index { .. } | Expr::Call { .. } | Expr::Binary { .. } => true,
        Expr::Unary { operand, .. } => matches!(
            **operand,
            Expr::Ident(_) | Expr::Index { .. } | Expr::Call { .. } | Expr::Binary { .. }
        ),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ValidateError::BadCondition {
            expr: cond.literal(),
        })
    }
}

fn check_iterable(iterable: &Expr) -> Result<(), ValidateError> {
    match iterable {
        Expr::Ident(_) | Expr::Index { .. } | Expr::Call { .. } | Expr::Binary { .. } => Ok(()),
        _ => Err(ValidateError::BadIterable {
            expr: iterable.literal(),
        }),
    }
}

fn check_name(name: &str) -> Result<(), ValidateError> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ValidateError::BadName { name: name.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, LitKind};
    use crate::parser::{parse_source, DocumentResolver, NoResolver};
    use crate::ParseError;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MapResolver(HashMap<String, String>);

    impl DocumentResolver for MapResolver {
        fn resolve(&self, path: &str) -> Result<Arc<Document>, ParseError> {
            let source = self.0.get(path).ok_or_else(|| ParseError::Resolve {
                path: path.into(),
                reason: "not found".into(),
            })?;
            Ok(Arc::new(parse_source(source, self)?))
        }
    }

    fn check(source: &str) -> Result<(), ValidateError> {
        validate(&parse_source(source, &NoResolver).unwrap())
    }

    #[test]
    fn test_plain_document_passes() {
        check("hello {{ user.name }} {% if ok %}x{% endif %}").unwrap();
    }

    #[test]
    fn test_top_level_block_passes() {
        check("{% block x %}b{% endblock %}").unwrap();
    }

    #[test]
    fn test_nested_block_rejected() {
        assert_eq!(
            check("{% if ok %}{% block x %}b{% endblock %}{% endif %}").unwrap_err(),
            ValidateError::NestedBlock { name: "x".into() }
        );
    }

    #[test]
    fn test_block_in_for_rejected() {
        assert!(matches!(
            check("{% for v in xs %}{% block x %}b{% endblock %}{% endfor %}").unwrap_err(),
            ValidateError::NestedBlock { .. }
        ));
    }

    #[test]
    fn test_literal_condition_rejected() {
        assert_eq!(
            check("{% if 1 %}x{% endif %}").unwrap_err(),
            ValidateError::BadCondition { expr: "1".into() }
        );
    }

    #[test]
    fn test_comparison_condition_passes() {
        check("{% if count > 3 %}x{% endif %}").unwrap();
    }

    #[test]
    fn test_negated_condition_passes() {
        check("{% if not user.hidden %}x{% endif %}").unwrap();
    }

    #[test]
    fn test_negated_literal_condition_rejected() {
        assert!(matches!(
            check("{% if not true %}x{% endif %}").unwrap_err(),
            ValidateError::BadCondition { .. }
        ));
    }

    #[test]
    fn test_literal_iterable_rejected() {
        assert_eq!(
            check("{% for v in 3 %}x{% endfor %}").unwrap_err(),
            ValidateError::BadIterable { expr: "3".into() }
        );
    }

    #[test]
    fn test_call_iterable_passes() {
        check("{% for v in keys(m) %}x{% endfor %}").unwrap();
    }

    #[test]
    fn test_included_document_must_not_extend() {
        let mut sources = HashMap::new();
        sources.insert("base".to_string(), "B".to_string());
        sources.insert(
            "part".to_string(),
            "{% extend \"base\" %}".to_string(),
        );
        let resolver = MapResolver(sources);
        let doc = parse_source("{% include \"part\" %}", &resolver).unwrap();
        assert_eq!(
            validate(&doc).unwrap_err(),
            ValidateError::IncludeExtends {
                path: "part".into()
            }
        );
    }

    #[test]
    fn test_include_without_extend_passes() {
        let mut sources = HashMap::new();
        sources.insert("part".to_string(), "P".to_string());
        let resolver = MapResolver(sources);
        let doc = parse_source("{% include \"part\" %}", &resolver).unwrap();
        validate(&doc).unwrap();
    }

    // Shapes the grammar cannot produce are still rejected if built
    // directly.

    #[test]
    fn test_empty_ident_rejected() {
        let doc = Document {
            body: vec![Stmt::Value(Expr::Ident(String::new()))],
            ..Default::default()
        };
        assert_eq!(
            validate(&doc).unwrap_err(),
            ValidateError::BadName { name: "".into() }
        );
    }

    #[test]
    fn test_list_operand_rejected() {
        let list = Expr::List(vec![Expr::Literal {
            kind: LitKind::Number,
            raw: "1".into(),
        }]);
        let doc = Document {
            body: vec![Stmt::Value(Expr::Binary {
                left: Box::new(list),
                op: BinOp::Add,
                right: Box::new(Expr::Ident("x".into())),
            })],
            ..Default::default()
        };
        assert!(matches!(
            validate(&doc).unwrap_err(),
            ValidateError::ListOperand { .. }
        ));
    }
}
