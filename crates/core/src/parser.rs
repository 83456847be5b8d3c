//! Multi-level parser. The lexer hands back bracketed constructs as single
//! tokens; the parser re-lexes their interiors one level deeper, so the
//! final result carries a flat instruction stream plus the token table of
//! every nesting level (the caret mapper walks level 0).
//!
//! Emission is stack order: operands first, then the operator that consumes
//! them. Names and commands are never resolved here, only at run time.

use crate::error::ParseError;
use crate::instruction::{Instruction, Op};
use crate::lexer::{tokenize, LexOptions};
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// Gives the parser a way to canonicalize definition-level command aliases
/// (`ws` and `websocket` compiling to the same LoadGlobal name). Existence
/// of the command is still checked by the VM, not here.
pub trait CommandCatalog {
    fn canonical_name(&self, name: &str) -> Option<String>;
}

#[derive(Default, Clone, Copy)]
pub struct ParseOptions<'a> {
    pub catalog: Option<&'a dyn CommandCatalog>,
    /// Suppress result printing for every top-level call.
    pub silent: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParseResult {
    pub instructions: Vec<Instruction>,
    /// Token table per nesting level; `Instruction::token_index` points
    /// into the table of the instruction's own level.
    pub tokens: Vec<Vec<Token>>,
    pub source: String,
    pub max_level: usize,
}

pub fn parse(text: &str, opts: &ParseOptions) -> Result<ParseResult, ParseError> {
    let mut parser = Parser {
        catalog: opts.catalog,
        result: ParseResult {
            source: text.to_string(),
            ..ParseResult::default()
        },
    };
    parser.parse_block(text, 0, 0, opts.silent)?;
    Ok(parser.result)
}

/// Token run the parser is currently walking, referencing the shared
/// per-level table through `base`.
struct Cursor {
    tokens: Vec<Token>,
    base: usize,
    pos: usize,
    end: usize,
    level: usize,
}

impl Cursor {
    fn peek(&self) -> Option<&Token> {
        if self.pos < self.end {
            self.tokens.get(self.pos)
        } else {
            None
        }
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        if self.pos + ahead < self.end {
            self.tokens.get(self.pos + ahead)
        } else {
            None
        }
    }

    /// Table index of the current token.
    fn index(&self) -> usize {
        self.base + self.pos
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos];
        self.pos += 1;
        tok
    }
}

struct Parser<'a> {
    catalog: Option<&'a dyn CommandCatalog>,
    result: ParseResult,
}

impl<'a> Parser<'a> {
    fn emit(&mut self, op: Op, level: usize, token_index: Option<usize>) {
        self.result
            .instructions
            .push(Instruction::new(op, level, token_index));
    }

    /// Lex `text` at `level`, record the tokens in the per-level table and
    /// hand back a cursor over them.
    fn lex_into(
        &mut self,
        text: &str,
        level: usize,
        offset: usize,
        data_mode: bool,
    ) -> Result<Cursor, ParseError> {
        let mut tokens = tokenize(text, &LexOptions { offset, data_mode })?;
        for tok in tokens.iter_mut() {
            tok.level = level;
        }
        if level > self.result.max_level {
            self.result.max_level = level;
        }
        while self.result.tokens.len() <= level {
            self.result.tokens.push(Vec::new());
        }
        let table = &mut self.result.tokens[level];
        let base = table.len();
        table.extend(tokens.iter().cloned());
        let end = tokens.len();
        Ok(Cursor {
            tokens,
            base,
            pos: 0,
            end,
            level,
        })
    }

    /// Parse a statement block (the whole input, or a `(...)` interior).
    fn parse_block(
        &mut self,
        text: &str,
        level: usize,
        offset: usize,
        silent: bool,
    ) -> Result<(), ParseError> {
        let mut cur = self.lex_into(text, level, offset, false)?;
        while cur.pos < cur.end {
            if cur.peek().map(|t| t.kind) == Some(TokenKind::Delimiter) {
                cur.advance();
                continue;
            }
            self.parse_statement(&mut cur, silent)?;
            if level == 0 {
                self.emit(Op::ReturnValue, level, None);
            }
        }
        Ok(())
    }

    fn parse_statement(&mut self, cur: &mut Cursor, silent: bool) -> Result<(), ParseError> {
        let first = match cur.peek() {
            Some(t) => t.clone(),
            None => return Ok(()),
        };
        match first.kind {
            TokenKind::Variable if self.is_assignment(cur) => self.parse_assignment(cur),
            TokenKind::Word => self.parse_command(cur, silent),
            TokenKind::ArgShort | TokenKind::ArgLong => Err(ParseError::syntax(
                format!("argument '{}' before a command", first.raw),
                first.start,
                first.end,
            )),
            _ => {
                self.parse_expression(cur, 0)?;
                self.expect_statement_end(cur)?;
                Ok(())
            }
        }
    }

    /// `$x = ...`, `$x[k] = ...` or `$x.attr = ...` with exactly one
    /// trailing accessor. Deeper targets are rejected.
    fn is_assignment(&self, cur: &Cursor) -> bool {
        let mut ahead = 1;
        while matches!(
            cur.peek_at(ahead).map(|t| t.kind),
            Some(TokenKind::Subscript | TokenKind::Attribute)
        ) {
            ahead += 1;
        }
        cur.peek_at(ahead).map(|t| t.kind) == Some(TokenKind::Assign)
    }

    fn parse_assignment(&mut self, cur: &mut Cursor) -> Result<(), ParseError> {
        let level = cur.level;
        let target_index = cur.index();
        let target = cur.advance().clone();

        let mut accessor: Option<(usize, Token)> = None;
        while matches!(
            cur.peek().map(|t| t.kind),
            Some(TokenKind::Subscript | TokenKind::Attribute)
        ) {
            let idx = cur.index();
            let tok = cur.advance().clone();
            if accessor.is_some() {
                return Err(ParseError::syntax(
                    "assignment target nests more than one accessor",
                    tok.start,
                    tok.end,
                ));
            }
            accessor = Some((idx, tok));
        }

        let assign = cur.advance().clone();
        if cur.peek().map_or(true, |t| t.kind == TokenKind::Delimiter) {
            return Err(ParseError::syntax(
                "assignment without a value",
                assign.start,
                assign.end,
            ));
        }

        // Key first, then value; the VM pops them back in that order.
        if let Some((idx, tok)) = &accessor {
            match tok.kind {
                TokenKind::Attribute => {
                    self.emit(
                        Op::LoadConst {
                            value: Value::Str(tok.value.clone()),
                        },
                        level,
                        Some(*idx),
                    );
                }
                _ => self.parse_interior_expression(tok, level)?,
            }
        }
        self.parse_expression(cur, 0)?;
        self.expect_statement_end(cur)?;

        let op = match accessor {
            Some(_) => Op::StoreSubscr {
                name: target.value.clone(),
            },
            None => Op::StoreName {
                name: target.value.clone(),
            },
        };
        self.emit(op, level, Some(target_index));
        Ok(())
    }

    fn parse_command(&mut self, cur: &mut Cursor, silent: bool) -> Result<(), ParseError> {
        let level = cur.level;
        let cmd_index = cur.index();
        let cmd = cur.advance().clone();
        let name = self
            .catalog
            .and_then(|c| c.canonical_name(&cmd.value))
            .unwrap_or_else(|| cmd.value.clone());
        self.emit(Op::LoadGlobal { name }, level, Some(cmd_index));

        while let Some(tok) = cur.peek() {
            match tok.kind {
                TokenKind::Delimiter => break,
                TokenKind::Assign => {
                    let tok = tok.clone();
                    return Err(ParseError::syntax(
                        "unexpected '=' in command arguments",
                        tok.start,
                        tok.end,
                    ));
                }
                TokenKind::ArgShort | TokenKind::ArgLong => {
                    let arg_index = cur.index();
                    let arg = cur.advance().clone();
                    let explicit = cur
                        .peek()
                        .map(|next| next.kind.starts_value())
                        .unwrap_or(false);
                    if explicit {
                        self.parse_expression(cur, 0)?;
                    } else {
                        // Bare flag binds to true.
                        self.emit(
                            Op::LoadConst {
                                value: Value::Bool(true),
                            },
                            level,
                            Some(arg_index),
                        );
                    }
                    self.emit(
                        Op::LoadArg {
                            name: arg.value.clone(),
                        },
                        level,
                        Some(arg_index),
                    );
                }
                _ => {
                    // Positional value.
                    self.parse_expression(cur, 0)?;
                }
            }
        }
        self.emit(Op::CallFunction { silent }, level, Some(cmd_index));
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────
    // Expressions
    // ────────────────────────────────────────────────────────────────

    fn binding_power(kind: TokenKind) -> Option<(Op, u8)> {
        match kind {
            TokenKind::Plus => Some((Op::Concat, 10)),
            TokenKind::Minus => Some((Op::Subtract, 10)),
            TokenKind::Star => Some((Op::Multiply, 20)),
            TokenKind::Slash => Some((Op::Divide, 20)),
            TokenKind::Percent => Some((Op::Modulo, 20)),
            TokenKind::Caret => Some((Op::Pow, 30)),
            _ => None,
        }
    }

    /// Precedence-climbing loop; every operator is left associative.
    fn parse_expression(&mut self, cur: &mut Cursor, min_bp: u8) -> Result<(), ParseError> {
        let level = cur.level;
        self.parse_unary(cur)?;
        while let Some(tok) = cur.peek() {
            let Some((op, bp)) = Self::binding_power(tok.kind) else {
                break;
            };
            if bp < min_bp {
                break;
            }
            let idx = cur.index();
            cur.advance();
            self.parse_expression(cur, bp + 1)?;
            self.emit(op, level, Some(idx));
        }
        Ok(())
    }

    fn parse_unary(&mut self, cur: &mut Cursor) -> Result<(), ParseError> {
        let level = cur.level;
        if cur.peek().map(|t| t.kind) == Some(TokenKind::Minus) {
            let idx = cur.index();
            cur.advance();
            self.parse_unary(cur)?;
            self.emit(Op::Negate, level, Some(idx));
            return Ok(());
        }
        self.parse_primary(cur)?;
        self.parse_postfix(cur)
    }

    fn parse_primary(&mut self, cur: &mut Cursor) -> Result<(), ParseError> {
        let level = cur.level;
        let Some(tok) = cur.peek() else {
            return Err(ParseError::syntax(
                "expected a value",
                self.result.source.chars().count(),
                self.result.source.chars().count(),
            ));
        };
        let idx = cur.index();
        let tok = tok.clone();
        match tok.kind {
            TokenKind::Number => {
                cur.advance();
                let n: f64 = tok.raw.parse().map_err(|_| {
                    ParseError::syntax(
                        format!("invalid number '{}'", tok.raw),
                        tok.start,
                        tok.end,
                    )
                })?;
                self.emit(Op::LoadConst { value: Value::Number(n) }, level, Some(idx));
            }
            TokenKind::Str | TokenKind::Word => {
                cur.advance();
                self.emit(
                    Op::LoadConst {
                        value: Value::Str(tok.value.clone()),
                    },
                    level,
                    Some(idx),
                );
            }
            TokenKind::Bool => {
                cur.advance();
                self.emit(
                    Op::LoadConst {
                        value: Value::Bool(tok.value == "true"),
                    },
                    level,
                    Some(idx),
                );
            }
            TokenKind::Null => {
                cur.advance();
                self.emit(Op::LoadConst { value: Value::Null }, level, Some(idx));
            }
            TokenKind::Variable => {
                cur.advance();
                self.emit(
                    Op::LoadName {
                        name: tok.value.clone(),
                    },
                    level,
                    Some(idx),
                );
            }
            TokenKind::Array => {
                cur.advance();
                self.parse_array(&tok, level, idx)?;
            }
            TokenKind::Dict => {
                cur.advance();
                self.parse_dict(&tok, level, idx)?;
            }
            TokenKind::Paren => {
                cur.advance();
                self.parse_paren(&tok, level, idx)?;
            }
            _ => {
                return Err(ParseError::syntax(
                    format!("unexpected '{}'", tok.raw),
                    tok.start,
                    tok.end,
                ));
            }
        }
        Ok(())
    }

    /// Trailing `[...]` / `.name` accessors.
    fn parse_postfix(&mut self, cur: &mut Cursor) -> Result<(), ParseError> {
        let level = cur.level;
        loop {
            match cur.peek().map(|t| t.kind) {
                Some(TokenKind::Subscript) => {
                    let idx = cur.index();
                    let tok = cur.advance().clone();
                    self.parse_interior_expression(&tok, level)?;
                    self.emit(Op::LoadDataAttr, level, Some(idx));
                }
                Some(TokenKind::Attribute) => {
                    let idx = cur.index();
                    let tok = cur.advance().clone();
                    self.emit(
                        Op::LoadConst {
                            value: Value::Str(tok.value.clone()),
                        },
                        level,
                        Some(idx),
                    );
                    self.emit(Op::LoadDataAttr, level, Some(idx));
                }
                _ => return Ok(()),
            }
        }
    }

    /// Parse a subscript interior (`$x[...]`) as a single expression one
    /// level deeper.
    fn parse_interior_expression(&mut self, tok: &Token, level: usize) -> Result<(), ParseError> {
        let mut inner = self.lex_into(&tok.value, level + 1, tok.start + 1, false)?;
        if inner.pos == inner.end {
            return Err(ParseError::syntax("empty subscript", tok.start, tok.end));
        }
        self.parse_expression(&mut inner, 0)?;
        if let Some(extra) = inner.peek() {
            return Err(ParseError::syntax(
                format!("unexpected '{}' in subscript", extra.raw),
                extra.start,
                extra.end,
            ));
        }
        Ok(())
    }

    fn parse_array(&mut self, tok: &Token, level: usize, idx: usize) -> Result<(), ParseError> {
        let mut inner = self.lex_into(&tok.value, level + 1, tok.start + 1, true)?;
        let mut count = 0usize;
        while inner.pos < inner.end {
            if inner.peek().map(|t| t.kind) == Some(TokenKind::Delimiter) {
                inner.advance();
                continue;
            }
            self.parse_data_item(&mut inner)?;
            count += 1;
        }
        self.emit(Op::BuildList { count }, level, Some(idx));
        Ok(())
    }

    fn parse_dict(&mut self, tok: &Token, level: usize, idx: usize) -> Result<(), ParseError> {
        let mut inner = self.lex_into(&tok.value, level + 1, tok.start + 1, true)?;
        let mut count = 0usize;
        while inner.pos < inner.end {
            if inner.peek().map(|t| t.kind) == Some(TokenKind::Delimiter) {
                inner.advance();
                continue;
            }
            let key_index = inner.index();
            let key = inner.advance().clone();
            if !matches!(
                key.kind,
                TokenKind::Word | TokenKind::Str | TokenKind::Number
            ) {
                return Err(ParseError::syntax(
                    format!("invalid dictionary key '{}'", key.raw),
                    key.start,
                    key.end,
                ));
            }
            // Key and value are separated by a `:` delimiter.
            match inner.peek() {
                Some(t) if t.kind == TokenKind::Delimiter => {
                    inner.advance();
                }
                _ => {
                    return Err(ParseError::syntax(
                        format!("dictionary key '{}' without a value", key.raw),
                        key.start,
                        key.end,
                    ));
                }
            }
            if inner
                .peek()
                .map_or(true, |t| t.kind == TokenKind::Delimiter)
            {
                return Err(ParseError::syntax(
                    format!("dictionary key '{}' without a value", key.raw),
                    key.start,
                    key.end,
                ));
            }
            self.emit(
                Op::LoadConst {
                    value: Value::Str(key.value.clone()),
                },
                level + 1,
                Some(key_index),
            );
            self.parse_data_item(&mut inner)?;
            count += 1;
        }
        self.emit(Op::BuildMap { count }, level, Some(idx));
        Ok(())
    }

    /// One array element / dictionary value: an expression running until
    /// the next delimiter.
    fn parse_data_item(&mut self, cur: &mut Cursor) -> Result<(), ParseError> {
        self.parse_expression(cur, 0)?;
        match cur.peek() {
            None => Ok(()),
            Some(t) if t.kind == TokenKind::Delimiter => Ok(()),
            Some(t) => Err(ParseError::syntax(
                format!("unexpected '{}'", t.raw),
                t.start,
                t.end,
            )),
        }
    }

    /// A `(...)` group: a nested silent command call when the interior
    /// starts with a word, otherwise a framed sub-expression.
    fn parse_paren(&mut self, tok: &Token, level: usize, idx: usize) -> Result<(), ParseError> {
        let interior = tok.value.trim_start();
        let is_call = interior
            .chars()
            .next()
            .map(|c| c.is_alphabetic() || c == '_')
            .unwrap_or(false);
        if is_call {
            self.parse_block(&tok.value, level + 1, tok.start + 1, true)?;
        } else {
            self.emit(Op::PushFrame, level, Some(idx));
            self.parse_block(&tok.value, level + 1, tok.start + 1, true)?;
            self.emit(Op::PopFrame, level, Some(idx));
        }
        Ok(())
    }

    fn expect_statement_end(&mut self, cur: &mut Cursor) -> Result<(), ParseError> {
        match cur.peek() {
            None => Ok(()),
            Some(t) if t.kind == TokenKind::Delimiter => Ok(()),
            Some(t) => Err(ParseError::syntax(
                format!("unexpected '{}'", t.raw),
                t.start,
                t.end,
            )),
        }
    }
}
