use std::collections::HashMap;
use std::sync::Arc;

/// Literal classification. The raw source text is kept as-is and only
/// converted to a value at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Number,
    Str,
    Bool,
}

/// How an index expression accesses its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOp {
    /// `base.key`
    Dot,
    /// `base[key]`
    Bracket,
}

/// Binary operators, ordered here roughly by binding strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Mul,
    Div,
    Add,
    Sub,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn from_text(text: &str) -> Option<Self> {
        Some(match text {
            "*" => Self::Mul,
            "/" => Self::Div,
            "+" => Self::Add,
            "-" => Self::Sub,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "and" => Self::And,
            "or" => Self::Or,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mul => "*",
            Self::Div => "/",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

impl UnOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Neg => "-",
        }
    }
}

/// Expression tree produced by the shunting-yard parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Bare name, resolved against the context at evaluation time.
    Ident(String),
    /// Literal with its raw source text.
    Literal { kind: LitKind, raw: String },
    /// Comma-joined expression list, only valid as call arguments.
    List(Vec<Expr>),
    /// Member or subscript access.
    Index {
        base: Box<Expr>,
        op: AccessOp,
        key: Box<Expr>,
    },
    /// Function, filter or method call.
    Call { callee: String, args: Vec<Expr> },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Unary { op: UnOp, operand: Box<Expr> },
}

impl Expr {
    /// Source-like rendering used in diagnostics. Binary expressions are
    /// parenthesized so the output reparses to the same tree.
    pub fn literal(&self) -> String {
        match self {
            Self::Ident(name) => name.clone(),
            Self::Literal { kind, raw } => match kind {
                LitKind::Str => format!("\"{raw}\""),
                _ => raw.clone(),
            },
            Self::List(items) => items
                .iter()
                .map(Expr::literal)
                .collect::<Vec<_>>()
                .join(", "),
            Self::Index { base, op, key } => match op {
                AccessOp::Dot => format!("{}.{}", base.literal(), key.literal()),
                AccessOp::Bracket => format!("{}[{}]", base.literal(), key.literal()),
            },
            Self::Call { callee, args } => {
                let args = args
                    .iter()
                    .map(Expr::literal)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{callee}({args})")
            }
            Self::Binary { left, op, right } => {
                format!("({} {} {})", left.literal(), op.as_str(), right.literal())
            }
            Self::Unary { op, operand } => match op {
                UnOp::Not => format!("not {}", operand.literal()),
                UnOp::Neg => format!("-{}", operand.literal()),
            },
        }
    }
}

/// Named block with a shared body. The body is `Arc`-shared because the
/// same node is reachable both from the statement list and from the
/// document's block table, and override detection compares body identity.
#[derive(Debug, Clone)]
pub struct BlockNode {
    pub name: String,
    pub body: Arc<Vec<Stmt>>,
}

/// Statement tree.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Verbatim text run.
    Text(String),
    /// `{{ EXPR }}`
    Value(Expr),
    /// `{% set name = EXPR %}`
    Assign { name: String, value: Expr },
    /// `{% if %}` chain. An `elseif` folds into a nested `If` inside
    /// `else_branch`, so evaluation only ever sees two-way branches.
    If {
        cond: Expr,
        body: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    /// `{% for [key,] value in EXPR %}`. A `_` key binds nothing.
    For {
        key: Option<String>,
        value: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    /// `{% block name %}` region, overridable by an extending document.
    Block(BlockNode),
    /// `{% include "path" [with EXPR] [only] %}`, resolved at parse time.
    Include {
        path: String,
        params: Option<Expr>,
        only: bool,
        doc: Arc<Document>,
    },
}

/// A parsed template document.
///
/// `blocks` indexes every top-level block by name; an extending child
/// uses its own table as the override set when executing the parent.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Parent path and resolved document when `{% extend %}` is present.
    pub extend: Option<(String, Arc<Document>)>,
    pub body: Vec<Stmt>,
    pub blocks: HashMap<String, BlockNode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Expr {
        Expr::Ident(name.into())
    }

    fn num(raw: &str) -> Expr {
        Expr::Literal {
            kind: LitKind::Number,
            raw: raw.into(),
        }
    }

    #[test]
    fn test_literal_ident() {
        assert_eq!(ident("user").literal(), "user");
    }

    #[test]
    fn test_literal_string_requotes() {
        let expr = Expr::Literal {
            kind: LitKind::Str,
            raw: "hi".into(),
        };
        assert_eq!(expr.literal(), "\"hi\"");
    }

    #[test]
    fn test_literal_binary_parenthesized() {
        let expr = Expr::Binary {
            left: Box::new(num("1")),
            op: BinOp::Add,
            right: Box::new(Expr::Binary {
                left: Box::new(num("2")),
                op: BinOp::Mul,
                right: Box::new(num("3")),
            }),
        };
        assert_eq!(expr.literal(), "(1 + (2 * 3))");
    }

    #[test]
    fn test_literal_index_forms() {
        let dot = Expr::Index {
            base: Box::new(ident("a")),
            op: AccessOp::Dot,
            key: Box::new(ident("b")),
        };
        assert_eq!(dot.literal(), "a.b");
        let bracket = Expr::Index {
            base: Box::new(ident("a")),
            op: AccessOp::Bracket,
            key: Box::new(num("0")),
        };
        assert_eq!(bracket.literal(), "a[0]");
    }

    #[test]
    fn test_literal_call() {
        let expr = Expr::Call {
            callee: "length".into(),
            args: vec![ident("items")],
        };
        assert_eq!(expr.literal(), "length(items)");
    }

    #[test]
    fn test_binop_round_trip() {
        for op in [
            BinOp::Mul,
            BinOp::Div,
            BinOp::Add,
            BinOp::Sub,
            BinOp::Eq,
            BinOp::Ne,
            BinOp::Lt,
            BinOp::Le,
            BinOp::Gt,
            BinOp::Ge,
            BinOp::And,
            BinOp::Or,
        ] {
            assert_eq!(BinOp::from_text(op.as_str()), Some(op));
        }
    }
}
