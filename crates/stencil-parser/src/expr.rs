//! Shunting-yard expression parser.
//!
//! Consumes a bounded token sub-stream (the interior of one tag or one
//! directive argument) and produces an [`Expr`]. Two stacks drive the
//! algorithm: operands hold finished sub-expressions plus pending call
//! targets, operators hold tokens waiting for their operands.

use stencil_lexer::{TokenKind, TokenStream};

use crate::ast::{AccessOp, BinOp, Expr, LitKind, UnOp};
use crate::parser::KEYWORDS;
use crate::ParseError;

/// Precedence, higher binds looser. Openers never take part in the
/// pop comparison; `<=` popping makes equal-precedence operators
/// left-associative.
fn precedence(op: &StackOp) -> u8 {
    if op.unary {
        return match op.text.as_str() {
            "-" => 2,
            _ => 11, // not
        };
    }
    match op.text.as_str() {
        "." | "[" => 1,
        "*" | "/" => 3,
        "+" | "-" => 4,
        ">" | "<" | ">=" | "<=" | "==" | "!=" => 10,
        "and" | "or" => 12,
        _ => 13,
    }
}

#[derive(Debug)]
enum Operand {
    Expr(Expr),
    /// A name followed by `(`, waiting for its argument list.
    Pending { callee: String, line: usize },
}

#[derive(Debug)]
struct StackOp {
    text: String,
    line: usize,
    unary: bool,
    /// Marks a `(` that opens a call argument list rather than a group.
    call: bool,
}

/// Parse the remaining tokens of `stream` as one expression.
pub fn parse_expr(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let mut operands: Vec<Operand> = Vec::new();
    let mut ops: Vec<StackOp> = Vec::new();
    // Whether the previous token completed an operand; decides between
    // binary and prefix readings of `-`.
    let mut after_operand = false;
    let mut line = 1;

    while stream.has_next() {
        let token = stream.next()?.clone();
        line = token.line;
        match token.kind {
            TokenKind::Name => {
                if KEYWORDS.contains(&token.text.as_str()) {
                    return Err(ParseError::ReservedWord {
                        word: token.text,
                        line,
                    });
                }
                let next = stream.current()?;
                if next.kind == TokenKind::Operator && next.text == "(" {
                    stream.skip(1)?;
                    operands.push(Operand::Pending {
                        callee: token.text,
                        line,
                    });
                    ops.push(StackOp {
                        text: "(".into(),
                        line,
                        unary: false,
                        call: true,
                    });
                    after_operand = false;
                } else {
                    operands.push(Operand::Expr(Expr::Ident(token.text)));
                    after_operand = true;
                }
            }
            TokenKind::Number | TokenKind::Str | TokenKind::Bool => {
                let kind = match token.kind {
                    TokenKind::Number => LitKind::Number,
                    TokenKind::Str => LitKind::Str,
                    _ => LitKind::Bool,
                };
                operands.push(Operand::Expr(Expr::Literal {
                    kind,
                    raw: token.text,
                }));
                after_operand = true;
            }
            TokenKind::Operator => match token.text.as_str() {
                "(" | "[" => {
                    let opener = StackOp {
                        text: token.text,
                        line,
                        unary: false,
                        call: false,
                    };
                    // `[` is a postfix operator on the expression built
                    // so far; member access to its left reduces first.
                    if opener.text == "[" {
                        pop_looser(&mut operands, &mut ops, &opener)?;
                    }
                    ops.push(opener);
                    after_operand = false;
                }
                ")" => {
                    close_paren(&mut operands, &mut ops, line)?;
                    after_operand = true;
                }
                "]" => {
                    close_bracket(&mut operands, &mut ops, line)?;
                    after_operand = true;
                }
                "not" => {
                    ops.push(StackOp {
                        text: token.text,
                        line,
                        unary: true,
                        call: false,
                    });
                    after_operand = false;
                }
                "-" if !after_operand => {
                    ops.push(StackOp {
                        text: token.text,
                        line,
                        unary: true,
                        call: false,
                    });
                }
                text => {
                    if BinOp::from_text(text).is_none() && text != "." {
                        return Err(ParseError::UnexpectedToken {
                            token: token.text,
                            line,
                        });
                    }
                    let incoming = StackOp {
                        text: token.text,
                        line,
                        unary: false,
                        call: false,
                    };
                    pop_looser(&mut operands, &mut ops, &incoming)?;
                    ops.push(incoming);
                    after_operand = false;
                }
            },
            TokenKind::Punct => {
                // `,` extends or starts the argument list.
                while let Some(top) = ops.last() {
                    if top.text == "(" || top.text == "[" {
                        break;
                    }
                    let op = ops.pop().ok_or(ParseError::UnexpectedEnd { line })?;
                    reduce(&mut operands, &op)?;
                }
                merge_list(&mut operands, line)?;
                after_operand = false;
            }
            _ => {
                return Err(ParseError::UnexpectedToken {
                    token: token.literal(),
                    line,
                })
            }
        }
    }

    while let Some(op) = ops.pop() {
        if op.text == "(" || op.text == "[" {
            return Err(ParseError::UnexpectedToken {
                token: op.text,
                line: op.line,
            });
        }
        reduce(&mut operands, &op)?;
    }

    match (operands.pop(), operands.pop()) {
        (Some(Operand::Expr(expr)), None) => Ok(expr),
        (Some(Operand::Expr(expr)), Some(_)) => Err(ParseError::UnexpectedToken {
            token: expr.literal(),
            line,
        }),
        (Some(Operand::Pending { callee, line }), _) => {
            Err(ParseError::UnexpectedToken { token: callee, line })
        }
        (None, _) => Err(ParseError::UnexpectedEnd { line }),
    }
}

/// Pop-and-reduce every operator that binds at least as tight as
/// `incoming`, stopping at openers.
fn pop_looser(
    operands: &mut Vec<Operand>,
    ops: &mut Vec<StackOp>,
    incoming: &StackOp,
) -> Result<(), ParseError> {
    while let Some(top) = ops.last() {
        if top.text == "(" || top.text == "[" {
            break;
        }
        if precedence(top) <= precedence(incoming) {
            let op = ops.pop().ok_or(ParseError::UnexpectedEnd {
                line: incoming.line,
            })?;
            reduce(operands, &op)?;
        } else {
            break;
        }
    }
    Ok(())
}

/// Apply one operator to the operand stack.
fn reduce(operands: &mut Vec<Operand>, op: &StackOp) -> Result<(), ParseError> {
    if op.unary {
        let operand = pop_expr(operands, op.line)?;
        let un_op = if op.text == "-" { UnOp::Neg } else { UnOp::Not };
        operands.push(Operand::Expr(Expr::Unary {
            op: un_op,
            operand: Box::new(operand),
        }));
        return Ok(());
    }
    if op.text == "." {
        let key = pop_expr(operands, op.line)?;
        if !matches!(key, Expr::Ident(_) | Expr::Call { .. }) {
            return Err(ParseError::UnexpectedToken {
                token: key.literal(),
                line: op.line,
            });
        }
        let base = pop_expr(operands, op.line)?;
        operands.push(Operand::Expr(Expr::Index {
            base: Box::new(base),
            op: AccessOp::Dot,
            key: Box::new(key),
        }));
        return Ok(());
    }
    let bin_op = BinOp::from_text(&op.text).ok_or_else(|| ParseError::UnexpectedToken {
        token: op.text.clone(),
        line: op.line,
    })?;
    let right = pop_expr(operands, op.line)?;
    let left = pop_expr(operands, op.line)?;
    operands.push(Operand::Expr(Expr::Binary {
        left: Box::new(left),
        op: bin_op,
        right: Box::new(right),
    }));
    Ok(())
}

fn pop_expr(operands: &mut Vec<Operand>, line: usize) -> Result<Expr, ParseError> {
    match operands.pop() {
        Some(Operand::Expr(expr)) => Ok(expr),
        Some(Operand::Pending { callee, line }) => {
            Err(ParseError::UnexpectedToken { token: callee, line })
        }
        None => Err(ParseError::UnexpectedEnd { line }),
    }
}

/// Reduce down to the matching `(`; a call paren additionally folds the
/// pending callee and its arguments into a `Call`.
fn close_paren(
    operands: &mut Vec<Operand>,
    ops: &mut Vec<StackOp>,
    line: usize,
) -> Result<(), ParseError> {
    loop {
        let op = ops.pop().ok_or(ParseError::UnexpectedToken {
            token: ")".into(),
            line,
        })?;
        match op.text.as_str() {
            "(" => {
                if op.call {
                    finish_call(operands, line)?;
                }
                return Ok(());
            }
            "[" => {
                return Err(ParseError::UnexpectedToken {
                    token: ")".into(),
                    line,
                })
            }
            _ => reduce(operands, &op)?,
        }
    }
}

fn finish_call(operands: &mut Vec<Operand>, line: usize) -> Result<(), ParseError> {
    let top = operands.pop().ok_or(ParseError::UnexpectedEnd { line })?;
    let (callee, args) = match top {
        Operand::Pending { callee, .. } => (callee, Vec::new()),
        Operand::Expr(expr) => {
            // A comma-built list may sit directly beneath the last
            // argument, or the popped operand is itself the full list.
            let args = match operands.last() {
                Some(Operand::Expr(Expr::List(_))) => {
                    let Some(Operand::Expr(Expr::List(mut items))) = operands.pop() else {
                        return Err(ParseError::UnexpectedEnd { line });
                    };
                    items.push(expr);
                    items
                }
                _ => match expr {
                    Expr::List(items) => items,
                    other => vec![other],
                },
            };
            match operands.pop() {
                Some(Operand::Pending { callee, .. }) => (callee, args),
                _ => return Err(ParseError::UnexpectedEnd { line }),
            }
        }
    };
    operands.push(Operand::Expr(Expr::Call { callee, args }));
    Ok(())
}

/// Reduce down to the matching `[` and fold base/key into an index.
fn close_bracket(
    operands: &mut Vec<Operand>,
    ops: &mut Vec<StackOp>,
    line: usize,
) -> Result<(), ParseError> {
    loop {
        let op = ops.pop().ok_or(ParseError::UnexpectedToken {
            token: "]".into(),
            line,
        })?;
        match op.text.as_str() {
            "[" => break,
            "(" => {
                return Err(ParseError::UnexpectedToken {
                    token: "]".into(),
                    line,
                })
            }
            _ => reduce(operands, &op)?,
        }
    }
    let key = pop_expr(operands, line)?;
    let base = pop_expr(operands, line)?;
    operands.push(Operand::Expr(Expr::Index {
        base: Box::new(base),
        op: AccessOp::Bracket,
        key: Box::new(key),
    }));
    Ok(())
}

/// Fold the operand(s) before a comma into a growing argument list.
fn merge_list(operands: &mut Vec<Operand>, line: usize) -> Result<(), ParseError> {
    let newest = pop_expr(operands, line)?;
    match operands.last() {
        Some(Operand::Expr(Expr::List(_))) => {
            let Some(Operand::Expr(Expr::List(mut items))) = operands.pop() else {
                return Err(ParseError::UnexpectedEnd { line });
            };
            items.push(newest);
            operands.push(Operand::Expr(Expr::List(items)));
        }
        Some(Operand::Pending { .. }) => {
            operands.push(Operand::Expr(Expr::List(vec![newest])));
        }
        Some(Operand::Expr(_)) => {
            let previous = pop_expr(operands, line)?;
            operands.push(Operand::Expr(Expr::List(vec![previous, newest])));
        }
        None => {
            return Err(ParseError::UnexpectedToken {
                token: ",".into(),
                line,
            })
        }
    }
    Ok(())
}
