use crate::token::{Token, TokenKind};
use crate::LexError;

/// A cursor over a scanned token sequence.
///
/// The stream always ends with an `Eof` token. Navigation past the end
/// reports `LexError::UnexpectedEof` rather than panicking, so parsers
/// can surface truncated input as a regular error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    /// Wrap a scanned token sequence. The scanner guarantees a trailing
    /// `Eof` token.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Build a stream from loose tokens, appending the `Eof` marker.
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        let line = tokens.last().map_or(1, |t| t.line);
        tokens.push(Token::eof(line));
        Self::new(tokens)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// All tokens, including the trailing `Eof`.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    /// The token under the cursor.
    pub fn current(&self) -> Result<&Token, LexError> {
        self.tokens.get(self.pos).ok_or(LexError::UnexpectedEof)
    }

    /// The token `offset` positions ahead of the cursor.
    pub fn peek(&self, offset: usize) -> Result<&Token, LexError> {
        self.tokens
            .get(self.pos + offset)
            .ok_or(LexError::UnexpectedEof)
    }

    /// The token under the cursor, advancing past it.
    pub fn next(&mut self) -> Result<&Token, LexError> {
        let token = self.tokens.get(self.pos).ok_or(LexError::UnexpectedEof)?;
        self.pos += 1;
        Ok(token)
    }

    /// Advance the cursor by `n` positions.
    pub fn skip(&mut self, n: usize) -> Result<(), LexError> {
        if self.pos + n > self.tokens.len() {
            return Err(LexError::UnexpectedEof);
        }
        self.pos += n;
        Ok(())
    }

    /// Whether the cursor still points at a real token.
    pub fn has_next(&self) -> bool {
        self.pos < self.tokens.len() && self.tokens[self.pos].kind != TokenKind::Eof
    }

    pub fn is_at_end(&self) -> bool {
        !self.has_next()
    }

    /// Collect tokens from the cursor up to the first token matching
    /// `stop`, consuming the terminator. The collected tokens become an
    /// independent stream with its own `Eof` marker.
    ///
    /// Errors with `EmptyDirective` when the terminator is the very next
    /// token, which is how callers reject forms like `{% if %}`.
    pub fn take_until<F>(&mut self, stop: F) -> Result<TokenStream, LexError>
    where
        F: Fn(&Token) -> bool,
    {
        let mut collected = Vec::new();
        loop {
            let token = self.next()?.clone();
            if token.kind == TokenKind::Eof {
                return Err(LexError::UnexpectedEof);
            }
            if stop(&token) {
                if collected.is_empty() {
                    return Err(LexError::EmptyDirective { line: token.line });
                }
                return Ok(TokenStream::from_tokens(collected));
            }
            collected.push(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scanner;
    use pretty_assertions::assert_eq;

    fn stream(source: &str) -> TokenStream {
        Scanner::tokenize(source).unwrap()
    }

    #[test]
    fn test_current_does_not_advance() {
        let stream = stream("abc");
        assert_eq!(stream.current().unwrap().text, "abc");
        assert_eq!(stream.current().unwrap().text, "abc");
    }

    #[test]
    fn test_next_advances() {
        let mut stream = stream("{{ a }}");
        assert_eq!(stream.next().unwrap().kind, TokenKind::ValueStart);
        assert_eq!(stream.next().unwrap().text, "a");
        assert_eq!(stream.next().unwrap().kind, TokenKind::ValueEnd);
        assert_eq!(stream.next().unwrap().kind, TokenKind::Eof);
        assert_eq!(stream.next().unwrap_err(), LexError::UnexpectedEof);
    }

    #[test]
    fn test_peek_ahead() {
        let stream = stream("{{ a }}");
        assert_eq!(stream.peek(1).unwrap().text, "a");
        assert_eq!(stream.peek(0).unwrap().kind, TokenKind::ValueStart);
    }

    #[test]
    fn test_peek_past_end() {
        let stream = stream("");
        assert_eq!(stream.peek(5).unwrap_err(), LexError::UnexpectedEof);
    }

    #[test]
    fn test_skip() {
        let mut stream = stream("{{ a }}");
        stream.skip(2).unwrap();
        assert_eq!(stream.current().unwrap().kind, TokenKind::ValueEnd);
    }

    #[test]
    fn test_skip_past_end_errors() {
        let mut stream = stream("");
        assert_eq!(stream.skip(10).unwrap_err(), LexError::UnexpectedEof);
    }

    #[test]
    fn test_has_next_stops_at_eof() {
        let mut stream = stream("x");
        assert!(stream.has_next());
        stream.next().unwrap();
        assert!(!stream.has_next());
        assert!(stream.is_at_end());
    }

    #[test]
    fn test_take_until_consumes_terminator() {
        let mut stream = stream("{% if a %}b");
        stream.skip(1).unwrap(); // `{%`
        stream.skip(1).unwrap(); // `if`
        let sub = stream
            .take_until(|t| t.kind == TokenKind::CommandEnd)
            .unwrap();
        let texts: Vec<_> = sub.tokens().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", ""]);
        assert_eq!(stream.current().unwrap().text, "b");
    }

    #[test]
    fn test_take_until_empty_is_error() {
        let mut stream = stream("{% if %}");
        stream.skip(2).unwrap();
        assert_eq!(
            stream
                .take_until(|t| t.kind == TokenKind::CommandEnd)
                .unwrap_err(),
            LexError::EmptyDirective { line: 1 }
        );
    }

    #[test]
    fn test_take_until_missing_terminator() {
        let mut stream = TokenStream::from_tokens(vec![Token::new(
            TokenKind::Name,
            "a",
            1,
        )]);
        assert_eq!(
            stream
                .take_until(|t| t.kind == TokenKind::CommandEnd)
                .unwrap_err(),
            LexError::UnexpectedEof
        );
    }

    #[test]
    fn test_from_tokens_appends_eof() {
        let stream = TokenStream::from_tokens(vec![Token::new(TokenKind::Name, "a", 3)]);
        assert_eq!(stream.len(), 2);
        let eof = stream.tokens().last().unwrap();
        assert_eq!(eof.kind, TokenKind::Eof);
        assert_eq!(eof.line, 3);
    }
}
