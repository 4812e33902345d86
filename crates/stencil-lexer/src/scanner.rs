use crate::token::{is_word_operator, Token, TokenKind};
use crate::{LexError, TokenStream};

const TAG_COMMENT: (&str, &str) = ("{#", "#}");
const TAG_COMMAND: (&str, &str) = ("{%", "%}");
const TAG_VALUE: (&str, &str) = ("{{", "}}");

/// stencil source scanner.
///
/// Walks the newline-normalized source once, switching between text mode
/// (everything outside tags becomes verbatim `Text` tokens) and tag mode
/// (the expression sub-language inside `{% %}` and `{{ }}`).
///
/// - `Vec<char>` source for index-based navigation
/// - Per-tag bracket matching with a stack
/// - Line tracking on every advance
pub struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
}

impl Scanner {
    fn new(source: &str) -> Self {
        // Normalize line endings before scanning so line counting and
        // literal text agree across platforms.
        let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
        Self {
            chars: normalized.chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the entire source into a token stream.
    pub fn tokenize(source: &str) -> Result<TokenStream, LexError> {
        let mut scanner = Scanner::new(source);
        scanner.scan()?;
        Ok(TokenStream::new(scanner.tokens))
    }

    fn scan(&mut self) -> Result<(), LexError> {
        let mut text_start = self.pos;
        let mut text_line = self.line;

        while !self.is_at_end() {
            if self.matches("@") && (self.matches_at(1, TAG_COMMENT.0)
                || self.matches_at(1, TAG_COMMAND.0)
                || self.matches_at(1, TAG_VALUE.0))
            {
                self.flush_text(text_start, self.pos, text_line);
                self.scan_escaped_tag()?;
                text_start = self.pos;
                text_line = self.line;
            } else if self.matches(TAG_COMMENT.0) {
                self.flush_text(text_start, self.pos, text_line);
                self.scan_comment()?;
                text_start = self.pos;
                text_line = self.line;
            } else if self.matches(TAG_COMMAND.0) {
                self.flush_text(text_start, self.pos, text_line);
                self.scan_tag(TAG_COMMAND, TokenKind::CommandStart, TokenKind::CommandEnd)?;
                text_start = self.pos;
                text_line = self.line;
            } else if self.matches(TAG_VALUE.0) {
                self.flush_text(text_start, self.pos, text_line);
                self.scan_tag(TAG_VALUE, TokenKind::ValueStart, TokenKind::ValueEnd)?;
                text_start = self.pos;
                text_line = self.line;
            } else {
                self.advance();
            }
        }

        self.flush_text(text_start, self.pos, text_line);
        self.tokens.push(Token::eof(self.line));
        Ok(())
    }

    /// Emit the pending text run, if non-empty.
    fn flush_text(&mut self, start: usize, end: usize, line: usize) {
        if end > start {
            let text: String = self.chars[start..end].iter().collect();
            self.tokens.push(Token::new(TokenKind::Text, text, line));
        }
    }

    /// `@{{ ... }}` and friends degrade to literal text of the tag itself,
    /// without the `@` prefix.
    fn scan_escaped_tag(&mut self) -> Result<(), LexError> {
        let open_line = self.line;
        self.advance(); // `@`
        let (open, close) = if self.matches(TAG_COMMENT.0) {
            TAG_COMMENT
        } else if self.matches(TAG_COMMAND.0) {
            TAG_COMMAND
        } else {
            TAG_VALUE
        };
        let start = self.pos;
        while !self.is_at_end() && !self.matches(close) {
            self.advance();
        }
        if self.is_at_end() {
            return Err(LexError::UnclosedTag {
                delim: format!("@{open}"),
                line: open_line,
            });
        }
        self.advance_n(close.len());
        let text: String = self.chars[start..self.pos].iter().collect();
        self.tokens.push(Token::new(TokenKind::Text, text, open_line));
        Ok(())
    }

    /// `{# ... #}` produces no tokens at all.
    fn scan_comment(&mut self) -> Result<(), LexError> {
        let open_line = self.line;
        self.advance_n(TAG_COMMENT.0.len());
        while !self.is_at_end() && !self.matches(TAG_COMMENT.1) {
            self.advance();
        }
        if self.is_at_end() {
            return Err(LexError::UnclosedTag {
                delim: TAG_COMMENT.0.into(),
                line: open_line,
            });
        }
        self.advance_n(TAG_COMMENT.1.len());
        Ok(())
    }

    /// Scan one `{% ... %}` or `{{ ... }}` tag, sub-lexing its interior.
    fn scan_tag(
        &mut self,
        tag: (&str, &str),
        start_kind: TokenKind,
        end_kind: TokenKind,
    ) -> Result<(), LexError> {
        let open_line = self.line;
        self.tokens.push(Token::new(start_kind, tag.0, open_line));
        self.advance_n(tag.0.len());

        // Open brackets inside this tag; each must close before the tag does.
        let mut brackets: Vec<(char, usize)> = Vec::new();

        loop {
            if self.is_at_end() {
                return Err(LexError::UnclosedTag {
                    delim: tag.0.into(),
                    line: open_line,
                });
            }
            if self.matches(tag.1) {
                if let Some(&(bracket, line)) = brackets.first() {
                    return Err(LexError::UnbalancedBracket {
                        bracket: bracket.to_string(),
                        line,
                    });
                }
                self.tokens.push(Token::new(end_kind, tag.1, self.line));
                self.advance_n(tag.1.len());
                return Ok(());
            }

            let ch = self.peek();
            match ch {
                c if c.is_whitespace() => {
                    self.advance();
                }
                '=' | '!' | '>' | '<' if self.peek_at(1) == Some('=') => {
                    let op: String = self.chars[self.pos..self.pos + 2].iter().collect();
                    self.tokens.push(Token::new(TokenKind::Operator, op, self.line));
                    self.advance_n(2);
                }
                '.' | '+' | '-' | '*' | '/' | '>' | '<' | '=' => {
                    self.tokens
                        .push(Token::new(TokenKind::Operator, ch, self.line));
                    self.advance();
                }
                'a'..='z' | 'A'..='Z' | '_' => self.scan_word(),
                '0'..='9' => self.scan_number(),
                '"' | '\'' => self.scan_string(open_line)?,
                ',' => {
                    self.tokens.push(Token::new(TokenKind::Punct, ',', self.line));
                    self.advance();
                }
                '(' | '[' => {
                    brackets.push((ch, self.line));
                    self.tokens
                        .push(Token::new(TokenKind::Operator, ch, self.line));
                    self.advance();
                }
                ')' | ']' => {
                    let expected = if ch == ')' { '(' } else { '[' };
                    match brackets.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => {
                            return Err(LexError::UnexpectedChar {
                                text: ch.to_string(),
                                line: self.line,
                            })
                        }
                    }
                    self.tokens
                        .push(Token::new(TokenKind::Operator, ch, self.line));
                    self.advance();
                }
                _ => {
                    return Err(LexError::UnexpectedChar {
                        text: ch.to_string(),
                        line: self.line,
                    })
                }
            }
        }
    }

    /// Identifier, boolean literal, or word operator.
    fn scan_word(&mut self) {
        let start = self.pos;
        while !self.is_at_end()
            && (self.peek().is_ascii_alphanumeric() || self.peek() == '_')
        {
            self.advance();
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let kind = match word.as_str() {
            "true" | "false" => TokenKind::Bool,
            w if is_word_operator(w) => TokenKind::Operator,
            _ => TokenKind::Name,
        };
        self.tokens.push(Token::new(kind, word, self.line));
    }

    /// Integer or decimal literal with optional exponent.
    fn scan_number(&mut self) {
        let start = self.pos;
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek_is('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while !self.is_at_end() && self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        if (self.peek_is('e') || self.peek_is('E'))
            && self
                .peek_at(1)
                .is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '-')
        {
            // Only consume a sign when digits follow it.
            let after_sign = match self.peek_at(1) {
                Some('+') | Some('-') => self.peek_at(2),
                other => other,
            };
            if after_sign.is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
                if self.peek_is('+') || self.peek_is('-') {
                    self.advance();
                }
                while !self.is_at_end() && self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.tokens
            .push(Token::new(TokenKind::Number, text, self.line));
    }

    /// Single- or double-quoted string, stored without the quotes.
    fn scan_string(&mut self, open_line: usize) -> Result<(), LexError> {
        let quote = self.peek();
        let line = self.line;
        self.advance();
        let mut value = String::new();
        loop {
            if self.is_at_end() {
                return Err(LexError::UnclosedTag {
                    delim: quote.to_string(),
                    line: open_line,
                });
            }
            let ch = self.peek();
            if ch == quote {
                self.advance();
                break;
            }
            if ch == '\\' {
                self.advance();
                if self.is_at_end() {
                    return Err(LexError::UnclosedTag {
                        delim: quote.to_string(),
                        line: open_line,
                    });
                }
                match self.peek() {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    '\\' => value.push('\\'),
                    c => value.push(c),
                }
            } else {
                value.push(ch);
            }
            self.advance();
        }
        self.tokens.push(Token::new(TokenKind::Str, value, line));
        Ok(())
    }

    // --- Cursor helpers ---

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn peek_is(&self, ch: char) -> bool {
        !self.is_at_end() && self.peek() == ch
    }

    fn matches(&self, pattern: &str) -> bool {
        self.matches_at(0, pattern)
    }

    fn matches_at(&self, offset: usize, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.pos + offset + i) == Some(&c))
    }

    fn advance(&mut self) {
        if self.peek() == '\n' {
            self.line += 1;
        }
        self.pos += 1;
    }

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            if !self.is_at_end() {
                self.advance();
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(source: &str) -> Vec<Token> {
        Scanner::tokenize(source).unwrap().into_tokens()
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokens(source).into_iter().map(|t| t.kind).collect()
    }

    fn texts(source: &str) -> Vec<String> {
        tokens(source).into_iter().map(|t| t.text).collect()
    }

    // --- Text mode ---

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_plain_text() {
        let tokens = tokens("hello world");
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert_eq!(tokens[0].text, "hello world");
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn test_text_keeps_newlines() {
        let tokens = tokens("a\r\nb");
        assert_eq!(tokens[0].text, "a\nb");
    }

    #[test]
    fn test_comment_dropped() {
        assert_eq!(texts("a{# gone #}b"), vec!["a", "b", ""]);
    }

    #[test]
    fn test_unclosed_comment() {
        assert_eq!(
            Scanner::tokenize("{# oops").unwrap_err(),
            LexError::UnclosedTag {
                delim: "{#".into(),
                line: 1
            }
        );
    }

    // --- Escaped tags ---

    #[test]
    fn test_escaped_value_tag() {
        assert_eq!(texts("@{{ name }}"), vec!["{{ name }}", ""]);
    }

    #[test]
    fn test_escaped_command_tag() {
        assert_eq!(texts("@{% if x %}"), vec!["{% if x %}", ""]);
    }

    #[test]
    fn test_escaped_tag_kind_is_text() {
        assert_eq!(kinds("@{{ x }}"), vec![TokenKind::Text, TokenKind::Eof]);
    }

    // --- Value tags ---

    #[test]
    fn test_value_tag() {
        assert_eq!(
            kinds("{{ name }}"),
            vec![
                TokenKind::ValueStart,
                TokenKind::Name,
                TokenKind::ValueEnd,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_value_tag_between_text() {
        assert_eq!(
            kinds("a {{ x }} b"),
            vec![
                TokenKind::Text,
                TokenKind::ValueStart,
                TokenKind::Name,
                TokenKind::ValueEnd,
                TokenKind::Text,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unclosed_value_tag() {
        assert_eq!(
            Scanner::tokenize("{{ name").unwrap_err(),
            LexError::UnclosedTag {
                delim: "{{".into(),
                line: 1
            }
        );
    }

    // --- Expression sub-language ---

    #[test]
    fn test_operators() {
        assert_eq!(
            texts("{{ a == b >= c <= d != e > f < g }}"),
            vec!["{{", "a", "==", "b", ">=", "c", "<=", "d", "!=", "e", ">", "f", "<", "g", "}}", ""]
        );
    }

    #[test]
    fn test_arithmetic_operators() {
        assert_eq!(
            texts("{{ a + b - c * d / e }}"),
            vec!["{{", "a", "+", "b", "-", "c", "*", "d", "/", "e", "}}", ""]
        );
    }

    #[test]
    fn test_word_operators_reclassified() {
        let tokens = tokens("{{ a and b or not c }}");
        let ops: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(ops, vec!["and", "or", "not"]);
    }

    #[test]
    fn test_booleans() {
        let tokens = tokens("{{ true }}");
        assert_eq!(tokens[1].kind, TokenKind::Bool);
        assert_eq!(tokens[1].text, "true");
    }

    #[test]
    fn test_numbers() {
        let tokens = tokens("{% set x = 3.14 %}");
        let num = tokens.iter().find(|t| t.kind == TokenKind::Number).unwrap();
        assert_eq!(num.text, "3.14");
    }

    #[test]
    fn test_number_with_exponent() {
        let tokens = tokens("{{ 1e-9 }}");
        assert_eq!(tokens[1].kind, TokenKind::Number);
        assert_eq!(tokens[1].text, "1e-9");
    }

    #[test]
    fn test_string_double_quoted() {
        let tokens = tokens("{{ \"hi\" }}");
        assert_eq!(tokens[1].kind, TokenKind::Str);
        assert_eq!(tokens[1].text, "hi");
    }

    #[test]
    fn test_string_single_quoted() {
        let tokens = tokens("{{ 'hi' }}");
        assert_eq!(tokens[1].text, "hi");
    }

    #[test]
    fn test_string_may_contain_tag_close() {
        let tokens = tokens("{{ \"}}\" }}");
        assert_eq!(tokens[1].kind, TokenKind::Str);
        assert_eq!(tokens[1].text, "}}");
    }

    #[test]
    fn test_string_escaped_quote() {
        let tokens = tokens(r#"{{ "a\"b" }}"#);
        assert_eq!(tokens[1].text, "a\"b");
    }

    #[test]
    fn test_brackets_match() {
        assert_eq!(
            texts("{{ a[0] }}"),
            vec!["{{", "a", "[", "0", "]", "}}", ""]
        );
    }

    #[test]
    fn test_mismatched_bracket() {
        assert_eq!(
            Scanner::tokenize("{{ a(0] }}").unwrap_err(),
            LexError::UnexpectedChar {
                text: "]".into(),
                line: 1
            }
        );
    }

    #[test]
    fn test_unclosed_bracket() {
        assert_eq!(
            Scanner::tokenize("{{ f(a }}").unwrap_err(),
            LexError::UnbalancedBracket {
                bracket: "(".into(),
                line: 1
            }
        );
    }

    #[test]
    fn test_stray_close_bracket() {
        assert!(Scanner::tokenize("{{ a) }}").is_err());
    }

    #[test]
    fn test_unexpected_character() {
        assert_eq!(
            Scanner::tokenize("{{ a ? b }}").unwrap_err(),
            LexError::UnexpectedChar {
                text: "?".into(),
                line: 1
            }
        );
    }

    // --- Line tracking ---

    #[test]
    fn test_line_numbers() {
        let tokens = tokens("a\nb\n{{ x }}");
        let name = tokens.iter().find(|t| t.kind == TokenKind::Name).unwrap();
        assert_eq!(name.line, 3);
    }

    #[test]
    fn test_error_line() {
        assert_eq!(
            Scanner::tokenize("line one\n{{ ?").unwrap_err(),
            LexError::UnexpectedChar {
                text: "?".into(),
                line: 2
            }
        );
    }

    #[test]
    fn test_always_ends_with_eof() {
        let tokens = tokens("{% if x %}y{% endif %}");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }
}
