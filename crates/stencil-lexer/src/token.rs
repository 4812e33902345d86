/// Token classification for stencil source.
///
/// The scanner emits `Text` for everything between tags, the four tag
/// delimiter kinds, and the expression-level kinds for everything inside
/// a command or value tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Synthetic end-of-stream marker, always the last token.
    Eof,
    /// A verbatim run of literal text between tags.
    Text,
    /// `{%`
    CommandStart,
    /// `%}`
    CommandEnd,
    /// `{{`
    ValueStart,
    /// `}}`
    ValueEnd,
    /// Identifier or directive keyword.
    Name,
    /// Numeric literal, integer or decimal with optional exponent.
    Number,
    /// Quoted string literal, stored without the surrounding quotes.
    Str,
    /// `true` or `false`.
    Bool,
    /// Operator, including brackets and the word operators.
    Operator,
    /// `,`
    Punct,
}

/// A token produced by the stencil scanner.
///
/// Immutable once produced; `line` is the 1-based line of the token's
/// first character in the newline-normalized source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }

    pub fn eof(line: usize) -> Self {
        Self::new(TokenKind::Eof, "", line)
    }

    /// Source-like rendering, used in diagnostics.
    pub fn literal(&self) -> String {
        if self.kind == TokenKind::Str {
            format!("\"{}\"", self.text)
        } else {
            self.text.clone()
        }
    }
}

/// Words that are lexed as names and reclassified as operators.
pub const WORD_OPERATORS: &[&str] = &["and", "or", "in", "not"];

/// Check whether a word is one of the reserved word operators.
pub fn is_word_operator(word: &str) -> bool {
    WORD_OPERATORS.contains(&word)
}
