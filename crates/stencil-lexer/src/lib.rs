//! stencil lexer
//!
//! Tokenizes template source into a flat token stream. Handles the three
//! tag families (`{# #}` comments, `{% %}` commands, `{{ }}` values), the
//! `@`-escaped forms that degrade to literal text, and the expression
//! sub-language inside command and value tags.
//!
//! # Example
//!
//! ```
//! use stencil_lexer::Scanner;
//!
//! let stream = Scanner::tokenize("hello").unwrap();
//! assert_eq!(stream.len(), 2); // one text token plus EOF
//! ```

pub mod scanner;
pub mod stream;
pub mod token;

pub use scanner::Scanner;
pub use stream::TokenStream;
pub use token::{Token, TokenKind};

/// Lexer error with position information.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("unclosed tag \"{delim}\" at line {line}")]
    UnclosedTag { delim: String, line: usize },

    #[error("unexpected character \"{text}\" at line {line}")]
    UnexpectedChar { text: String, line: usize },

    #[error("unbalanced bracket \"{bracket}\" at line {line}")]
    UnbalancedBracket { bracket: String, line: usize },

    #[error("unexpected end of file")]
    UnexpectedEof,

    #[error("empty directive argument at line {line}")]
    EmptyDirective { line: usize },
}
