//! stencil render
//!
//! Tree-walking evaluator and the engine facade that ties compilation,
//! caching and rendering together. Values are dynamically typed; host
//! objects plug in through the [`Object`] capability trait instead of
//! runtime introspection.

pub mod context;
pub mod engine;
pub mod eval;
pub mod registry;
pub mod store;
pub mod value;

pub use context::Context;
pub use engine::Engine;
pub use eval::Evaluator;
pub use registry::{Registry, RegistryError};
pub use store::{DocumentStore, FileLoader, MapLoader, SourceLoader};
pub use value::{Object, Value};

use stencil_lexer::LexError;
use stencil_parser::{ParseError, ValidateError};

/// Evaluation failure; recoverable, aborts only the current render.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in \"{op}\"")]
    Overflow { op: &'static str },

    #[error("cannot apply \"{op}\" to {left} and {right}")]
    BadOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("cannot negate {kind}")]
    BadNegation { kind: &'static str },

    #[error("unknown name \"{name}\"")]
    UnknownName { name: String },

    #[error("no entry \"{key}\" in {kind}")]
    UnknownKey { key: String, kind: &'static str },

    #[error("cannot index {kind} with {key_kind}")]
    BadIndex {
        kind: &'static str,
        key_kind: &'static str,
    },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("{kind} is not iterable")]
    NotIterable { kind: &'static str },

    #[error("{kind} value cannot be written as text")]
    NotPrintable { kind: &'static str },

    #[error("unknown function or filter \"{name}\"")]
    UnknownFunction { name: String },

    #[error("invalid argument to \"{func}\": {reason}")]
    BadArgument { func: String, reason: String },

    #[error("invalid number literal \"{raw}\"")]
    BadNumber { raw: String },

    #[error("include parameters must be a map, got {kind}")]
    BadParams { kind: &'static str },
}

/// Any failure an engine call can surface, from lexing through rendering.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("cannot read template: {0}")]
    Io(#[from] std::io::Error),
}
