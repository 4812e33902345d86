//! Statement parser.
//!
//! Drives the token stream into a [`Document`], delegating bounded
//! sub-streams to the expression parser. Nesting is tracked with an
//! explicit frame stack instead of recursion; every closing directive
//! checks the frame type before popping, so malformed input fails with
//! a line-tagged error instead of corrupting the tree.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use stencil_lexer::{Scanner, Token, TokenKind, TokenStream};

use crate::ast::{BlockNode, Document, Expr, Stmt};
use crate::expr::parse_expr;
use crate::ParseError;

/// Words reserved by the directive grammar; none may be used as a name.
pub const KEYWORDS: &[&str] = &[
    "block", "endblock", "set", "if", "elseif", "else", "endif", "for", "endfor", "extend",
    "include", "in", "and", "or", "not", "with",
];

/// Resolves `extend` and `include` paths to compiled documents.
///
/// Resolution happens eagerly at parse time, so a document's composition
/// targets are fixed once it is built.
pub trait DocumentResolver {
    fn resolve(&self, path: &str) -> Result<Arc<Document>, ParseError>;
}

/// Resolver for self-contained templates; refuses every path.
pub struct NoResolver;

impl DocumentResolver for NoResolver {
    fn resolve(&self, path: &str) -> Result<Arc<Document>, ParseError> {
        Err(ParseError::Resolve {
            path: path.into(),
            reason: "no document resolver configured".into(),
        })
    }
}

/// One open directive awaiting its closing counterpart.
enum Frame {
    If {
        line: usize,
        /// Completed `(condition, body)` arms of the chain.
        arms: Vec<(Expr, Vec<Stmt>)>,
        /// Condition of the arm currently being filled; `None` once the
        /// chain has entered its `else` branch.
        cond: Option<Expr>,
        body: Vec<Stmt>,
    },
    For {
        line: usize,
        key: Option<String>,
        value: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Block {
        line: usize,
        name: String,
        body: Vec<Stmt>,
    },
}

impl Frame {
    fn directive(&self) -> &'static str {
        match self {
            Frame::If { .. } => "if",
            Frame::For { .. } => "for",
            Frame::Block { .. } => "block",
        }
    }

    fn line(&self) -> usize {
        match self {
            Frame::If { line, .. } | Frame::For { line, .. } | Frame::Block { line, .. } => *line,
        }
    }

    fn body_mut(&mut self) -> &mut Vec<Stmt> {
        match self {
            Frame::If { body, .. } | Frame::For { body, .. } | Frame::Block { body, .. } => body,
        }
    }
}

/// Statement parser over one token stream.
pub struct Parser<'a> {
    stream: TokenStream,
    resolver: &'a dyn DocumentResolver,
    frames: Vec<Frame>,
    body: Vec<Stmt>,
    extend: Option<(String, Arc<Document>)>,
    blocks: HashMap<String, BlockNode>,
}

/// Tokenize and parse a complete template source.
pub fn parse_source(source: &str, resolver: &dyn DocumentResolver) -> Result<Document, ParseError> {
    parse_document(Scanner::tokenize(source)?, resolver)
}

/// Parse a complete document from an already-scanned stream.
pub fn parse_document(
    stream: TokenStream,
    resolver: &dyn DocumentResolver,
) -> Result<Document, ParseError> {
    Parser {
        stream,
        resolver,
        frames: Vec::new(),
        body: Vec::new(),
        extend: None,
        blocks: HashMap::new(),
    }
    .parse()
}

impl Parser<'_> {
    fn parse(mut self) -> Result<Document, ParseError> {
        while self.stream.has_next() {
            let token = self.stream.next()?.clone();
            match token.kind {
                TokenKind::Text => self.append(Stmt::Text(token.text)),
                TokenKind::ValueStart => {
                    let mut sub = self
                        .stream
                        .take_until(|t| t.kind == TokenKind::ValueEnd)?;
                    let expr = parse_expr(&mut sub)?;
                    self.append(Stmt::Value(expr));
                }
                TokenKind::CommandStart => self.parse_directive()?,
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        token: token.literal(),
                        line: token.line,
                    })
                }
            }
        }
        if let Some(frame) = self.frames.last() {
            return Err(ParseError::UnclosedDirective {
                directive: frame.directive().into(),
                line: frame.line(),
            });
        }
        Ok(Document {
            extend: self.extend,
            body: self.body,
            blocks: self.blocks,
        })
    }

    fn parse_directive(&mut self) -> Result<(), ParseError> {
        let keyword = self.stream.next()?.clone();
        if keyword.kind != TokenKind::Name {
            return Err(ParseError::UnexpectedToken {
                token: keyword.literal(),
                line: keyword.line,
            });
        }
        let line = keyword.line;
        match keyword.text.as_str() {
            "set" => self.parse_set(),
            "if" => {
                let cond = self.parse_argument_expr()?;
                self.frames.push(Frame::If {
                    line,
                    arms: Vec::new(),
                    cond: Some(cond),
                    body: Vec::new(),
                });
                Ok(())
            }
            "elseif" => {
                let next_cond = self.parse_argument_expr()?;
                match self.frames.last_mut() {
                    Some(Frame::If { arms, cond, body, .. }) if cond.is_some() => {
                        if let Some(prev) = cond.take() {
                            arms.push((prev, mem::take(body)));
                        }
                        *cond = Some(next_cond);
                        Ok(())
                    }
                    _ => Err(ParseError::StrayDirective {
                        directive: "elseif".into(),
                        line,
                    }),
                }
            }
            "else" => {
                self.expect_command_end()?;
                match self.frames.last_mut() {
                    Some(Frame::If { arms, cond, body, .. }) if cond.is_some() => {
                        if let Some(prev) = cond.take() {
                            arms.push((prev, mem::take(body)));
                        }
                        Ok(())
                    }
                    _ => Err(ParseError::StrayDirective {
                        directive: "else".into(),
                        line,
                    }),
                }
            }
            "endif" => {
                self.expect_command_end()?;
                match self.frames.pop() {
                    Some(Frame::If {
                        mut arms,
                        cond,
                        body,
                        ..
                    }) => {
                        let mut else_branch = match cond {
                            Some(cond) => {
                                arms.push((cond, body));
                                None
                            }
                            None => Some(body),
                        };
                        while arms.len() > 1 {
                            if let Some((cond, arm_body)) = arms.pop() {
                                else_branch = Some(vec![Stmt::If {
                                    cond,
                                    body: arm_body,
                                    else_branch,
                                }]);
                            }
                        }
                        if let Some((cond, arm_body)) = arms.pop() {
                            self.append(Stmt::If {
                                cond,
                                body: arm_body,
                                else_branch,
                            });
                        }
                        Ok(())
                    }
                    frame => self.stray("endif", line, frame),
                }
            }
            "for" => self.parse_for(line),
            "endfor" => {
                self.expect_command_end()?;
                match self.frames.pop() {
                    Some(Frame::For {
                        key,
                        value,
                        iterable,
                        body,
                        ..
                    }) => {
                        self.append(Stmt::For {
                            key,
                            value,
                            iterable,
                            body,
                        });
                        Ok(())
                    }
                    frame => self.stray("endfor", line, frame),
                }
            }
            "block" => {
                let name = self.expect_name()?;
                self.expect_command_end()?;
                if self.blocks.contains_key(&name) {
                    return Err(ParseError::DuplicateBlock { name, line });
                }
                self.frames.push(Frame::Block {
                    line,
                    name,
                    body: Vec::new(),
                });
                Ok(())
            }
            "endblock" => {
                self.expect_command_end()?;
                match self.frames.pop() {
                    Some(Frame::Block { name, body, line }) => {
                        let node = BlockNode {
                            name: name.clone(),
                            body: Arc::new(body),
                        };
                        if self.blocks.insert(name.clone(), node.clone()).is_some() {
                            return Err(ParseError::DuplicateBlock { name, line });
                        }
                        self.append(Stmt::Block(node));
                        Ok(())
                    }
                    frame => self.stray("endblock", line, frame),
                }
            }
            "extend" => {
                let path = self.expect_string()?;
                self.expect_command_end()?;
                if self.extend.is_some() {
                    return Err(ParseError::MultipleExtends { line });
                }
                let doc = self.resolver.resolve(&path)?;
                self.extend = Some((path, doc));
                Ok(())
            }
            "include" => self.parse_include(line),
            _ => Err(ParseError::UnexpectedToken {
                token: keyword.text,
                line,
            }),
        }
    }

    /// `{% set name = EXPR %}`
    fn parse_set(&mut self) -> Result<(), ParseError> {
        let name = self.expect_name()?;
        let eq = self.stream.next()?;
        if eq.kind != TokenKind::Operator || eq.text != "=" {
            return Err(ParseError::UnexpectedToken {
                token: eq.literal(),
                line: eq.line,
            });
        }
        let value = self.parse_argument_expr()?;
        self.append(Stmt::Assign { name, value });
        Ok(())
    }

    /// `{% for [key,] value in EXPR %}`; the key name `_` discards.
    fn parse_for(&mut self, line: usize) -> Result<(), ParseError> {
        let mut sub = self
            .stream
            .take_until(|t| t.kind == TokenKind::CommandEnd)?;
        let first = name_token(sub.next()?)?;
        let (key, value) = if sub.current()?.kind == TokenKind::Punct {
            sub.skip(1)?;
            let second = name_token(sub.next()?)?;
            let key = if first == "_" { None } else { Some(first) };
            (key, second)
        } else {
            (None, first)
        };
        let in_tok = sub.next()?;
        if in_tok.kind != TokenKind::Operator || in_tok.text != "in" {
            return Err(ParseError::UnexpectedToken {
                token: in_tok.literal(),
                line: in_tok.line,
            });
        }
        let iterable = parse_expr(&mut sub)?;
        self.frames.push(Frame::For {
            line,
            key,
            value,
            iterable,
            body: Vec::new(),
        });
        Ok(())
    }

    /// `{% include "path" [with EXPR] [only] %}`
    fn parse_include(&mut self, line: usize) -> Result<(), ParseError> {
        let path = self.expect_string()?;
        let mut params = None;
        let mut only = false;
        let next = self.stream.next()?.clone();
        match (next.kind, next.text.as_str()) {
            (TokenKind::CommandEnd, _) => {}
            (TokenKind::Name, "only") => {
                only = true;
                self.expect_command_end()?;
            }
            (TokenKind::Name, "with") => {
                let sub = self
                    .stream
                    .take_until(|t| t.kind == TokenKind::CommandEnd)?;
                // A trailing `only` belongs to the directive, not the
                // parameter expression.
                let mut tokens = sub.into_tokens();
                tokens.pop(); // synthetic end marker
                if tokens
                    .last()
                    .is_some_and(|t| t.kind == TokenKind::Name && t.text == "only")
                {
                    tokens.pop();
                    only = true;
                }
                let mut sub = TokenStream::from_tokens(tokens);
                params = Some(parse_expr(&mut sub)?);
            }
            _ => {
                return Err(ParseError::UnexpectedToken {
                    token: next.literal(),
                    line: next.line,
                })
            }
        }
        let doc = self.resolver.resolve(&path)?;
        self.append(Stmt::Include {
            path,
            params,
            only,
            doc,
        });
        Ok(())
    }

    /// Take tokens up to `%}` and parse them as one expression.
    fn parse_argument_expr(&mut self) -> Result<Expr, ParseError> {
        let mut sub = self
            .stream
            .take_until(|t| t.kind == TokenKind::CommandEnd)?;
        parse_expr(&mut sub)
    }

    fn expect_name(&mut self) -> Result<String, ParseError> {
        let token = self.stream.next()?;
        name_token(token)
    }

    fn expect_string(&mut self) -> Result<String, ParseError> {
        let token = self.stream.next()?;
        if token.kind != TokenKind::Str {
            return Err(ParseError::UnexpectedToken {
                token: token.literal(),
                line: token.line,
            });
        }
        Ok(token.text.clone())
    }

    fn expect_command_end(&mut self) -> Result<(), ParseError> {
        let token = self.stream.next()?;
        if token.kind != TokenKind::CommandEnd {
            return Err(ParseError::UnexpectedToken {
                token: token.literal(),
                line: token.line,
            });
        }
        Ok(())
    }

    fn append(&mut self, stmt: Stmt) {
        match self.frames.last_mut() {
            Some(frame) => frame.body_mut().push(stmt),
            None => self.body.push(stmt),
        }
    }

    fn stray(&mut self, directive: &str, line: usize, frame: Option<Frame>) -> Result<(), ParseError> {
        // The popped frame was the wrong kind; put it back so the error
        // reflects the close directive, not a cascade.
        if let Some(frame) = frame {
            self.frames.push(frame);
        }
        Err(ParseError::StrayDirective {
            directive: directive.into(),
            line,
        })
    }
}

fn name_token(token: &Token) -> Result<String, ParseError> {
    if token.kind != TokenKind::Name {
        return Err(ParseError::UnexpectedToken {
            token: token.literal(),
            line: token.line,
        });
    }
    if KEYWORDS.contains(&token.text.as_str()) {
        return Err(ParseError::ReservedWord {
            word: token.text.clone(),
            line: token.line,
        });
    }
    Ok(token.text.clone())
}
