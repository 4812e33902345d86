//! stencil parser
//!
//! Turns a token stream into an Abstract Syntax Tree. Includes the
//! expression parser (shunting-yard over the token sub-streams inside
//! tags), the statement parser (directive structure, inheritance and
//! include resolution), and the static validator that rejects documents
//! whose shape cannot evaluate.

pub mod ast;
pub mod expr;
pub mod parser;
pub mod validate;

pub use ast::{AccessOp, BinOp, BlockNode, Document, Expr, LitKind, Stmt, UnOp};
pub use expr::parse_expr;
pub use parser::{parse_document, parse_source, DocumentResolver, NoResolver, Parser};
pub use validate::validate;

use stencil_lexer::LexError;

/// Parser error with position information.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected token \"{token}\" at line {line}")]
    UnexpectedToken { token: String, line: usize },

    #[error("unexpected end of expression at line {line}")]
    UnexpectedEnd { line: usize },

    #[error("reserved word \"{word}\" used as a name at line {line}")]
    ReservedWord { word: String, line: usize },

    #[error("duplicate block \"{name}\" at line {line}")]
    DuplicateBlock { name: String, line: usize },

    #[error("multiple extend directives at line {line}")]
    MultipleExtends { line: usize },

    #[error("unclosed \"{directive}\" directive opened at line {line}")]
    UnclosedDirective { directive: String, line: usize },

    #[error("\"{directive}\" without a matching opener at line {line}")]
    StrayDirective { directive: String, line: usize },

    #[error("cannot load \"{path}\": {reason}")]
    Resolve { path: String, reason: String },

    #[error(transparent)]
    Lex(#[from] LexError),
}

/// Validation error carrying the offending node's source-like form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidateError {
    #[error("invalid name \"{name}\"")]
    BadName { name: String },

    #[error("invalid key in \"{expr}\"")]
    BadKey { expr: String },

    #[error("list used as an operand in \"{expr}\"")]
    ListOperand { expr: String },

    #[error("expression \"{expr}\" cannot be used as a condition")]
    BadCondition { expr: String },

    #[error("expression \"{expr}\" cannot be iterated")]
    BadIterable { expr: String },

    #[error("block \"{name}\" nested inside another statement")]
    NestedBlock { name: String },

    #[error("included document \"{path}\" must not extend another")]
    IncludeExtends { path: String },
}
