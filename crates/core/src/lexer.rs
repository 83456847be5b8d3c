//! Surface tokenizer. Bracketed constructs (`[...]`, `{...}`, `(...)`)
//! become single tokens carrying their interior text; the parser re-lexes
//! those interiors one nesting level deeper.

use crate::error::LexError;
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct LexOptions {
    /// Character offset of `src` within the original input, so tokens from
    /// re-lexed bracket interiors keep absolute spans.
    pub offset: usize,
    /// Set when lexing a `[...]`/`{...}` interior: `,` and `:` become
    /// delimiters and `-word` is not a flag.
    pub data_mode: bool,
}

pub fn tokenize(src: &str, opts: &LexOptions) -> Result<Vec<Token>, LexError> {
    Lexer::new(src, opts).run()
}

struct Lexer<'a> {
    chars: Vec<char>,
    opts: &'a LexOptions,
    pos: usize,
    tokens: Vec<Token>,
    /// Kind of the last emitted token, and whether whitespace has been
    /// consumed since it — flags and attribute access depend on both.
    last_kind: Option<TokenKind>,
    gap: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &str, opts: &'a LexOptions) -> Self {
        Lexer {
            chars: src.chars().collect(),
            opts,
            pos: 0,
            tokens: Vec::new(),
            last_kind: None,
            gap: true,
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn abs(&self, pos: usize) -> usize {
        self.opts.offset + pos
    }

    fn raw(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    fn push(&mut self, kind: TokenKind, value: String, start: usize, end: usize) {
        let raw = self.raw(start, end);
        self.tokens.push(Token {
            kind,
            value,
            raw,
            start: self.abs(start),
            end: self.abs(end),
            level: 0,
        });
        self.last_kind = Some(kind);
        self.gap = false;
    }

    fn push_char(&mut self, kind: TokenKind, start: usize) {
        let text = self.raw(start, start + 1);
        self.push(kind, text, start, start + 1);
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            let start = self.pos;

            // Whitespace (newline is a statement delimiter, not whitespace)
            if c == ' ' || c == '\t' || c == '\r' {
                self.pos += 1;
                self.gap = true;
                continue;
            }

            // Line comment
            if c == '/' && self.peek(1) == Some('/') {
                while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
                    self.pos += 1;
                }
                continue;
            }

            if c == '\n' || c == ';' {
                self.pos += 1;
                self.push_char(TokenKind::Delimiter, start);
                self.gap = true;
                continue;
            }

            if self.opts.data_mode && (c == ',' || c == ':') {
                self.pos += 1;
                self.push_char(TokenKind::Delimiter, start);
                self.gap = true;
                continue;
            }

            if c == '"' || c == '\'' {
                self.lex_string(c)?;
                continue;
            }

            if c == '[' || c == '{' || c == '(' {
                self.lex_bracket(c)?;
                continue;
            }

            if c == '$' {
                self.lex_variable()?;
                continue;
            }

            if c == '-' {
                self.lex_minus()?;
                continue;
            }

            if c.is_ascii_digit() {
                self.lex_number(start);
                continue;
            }

            if c == '.' {
                let value_before = self
                    .last_kind
                    .map(|k| k.is_value_like())
                    .unwrap_or(false);
                if !self.gap && value_before && matches!(self.peek(1), Some(n) if n.is_alphabetic() || n == '_') {
                    self.pos += 1;
                    let name = self.scan_ident();
                    self.push(TokenKind::Attribute, name, start, self.pos);
                    continue;
                }
                if matches!(self.peek(1), Some(n) if n.is_ascii_digit()) {
                    self.lex_number(start);
                    continue;
                }
                return Err(LexError::new("unexpected character '.'", self.abs(start)));
            }

            match c {
                '+' => {
                    self.pos += 1;
                    self.push_char(TokenKind::Plus, start);
                }
                '*' => {
                    self.pos += 1;
                    self.push_char(TokenKind::Star, start);
                }
                '/' => {
                    self.pos += 1;
                    self.push_char(TokenKind::Slash, start);
                }
                '%' => {
                    self.pos += 1;
                    self.push_char(TokenKind::Percent, start);
                }
                '^' => {
                    self.pos += 1;
                    self.push_char(TokenKind::Caret, start);
                }
                '=' => {
                    self.pos += 1;
                    self.push_char(TokenKind::Assign, start);
                }
                c if c.is_alphabetic() || c == '_' => {
                    let word = self.scan_word();
                    let kind = match word.as_str() {
                        "true" | "false" => TokenKind::Bool,
                        "null" => TokenKind::Null,
                        _ => TokenKind::Word,
                    };
                    self.push(kind, word, start, self.pos);
                }
                other => {
                    return Err(LexError::new(
                        format!("unexpected character '{}'", other),
                        self.abs(start),
                    ));
                }
            }
        }
        Ok(self.tokens)
    }

    fn scan_ident(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if c.is_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.raw(start, self.pos)
    }

    fn scan_word(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.raw(start, self.pos)
    }

    fn lex_string(&mut self, quote: char) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                return Err(LexError::new("unterminated string literal", self.abs(start)));
            };
            if c == quote {
                self.pos += 1;
                break;
            }
            if c == '\\' {
                self.pos += 1;
                let Some(esc) = self.peek(0) else {
                    return Err(LexError::new(
                        "unterminated escape in string",
                        self.abs(start),
                    ));
                };
                match esc {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    '\\' | '\'' | '"' => value.push(esc),
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
                self.pos += 1;
                continue;
            }
            value.push(c);
            self.pos += 1;
        }
        self.push(TokenKind::Str, value, start, self.pos);
        Ok(())
    }

    /// Scan a balanced bracket group of any flavor, honoring quotes. The
    /// emitted token carries the interior text as its value.
    fn lex_bracket(&mut self, open: char) -> Result<(), LexError> {
        let start = self.pos;
        let mut stack: Vec<char> = Vec::new();
        let mut in_string: Option<char> = None;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if let Some(q) = in_string {
                if c == '\\' {
                    self.pos += 1;
                } else if c == q {
                    in_string = None;
                }
                self.pos += 1;
                continue;
            }
            match c {
                '"' | '\'' => in_string = Some(c),
                '[' | '{' | '(' => stack.push(c),
                ']' | '}' | ')' => {
                    let expected = match stack.pop() {
                        Some('[') => ']',
                        Some('{') => '}',
                        Some('(') => ')',
                        _ => {
                            return Err(LexError::new(
                                format!("unbalanced '{}'", c),
                                self.abs(self.pos),
                            ))
                        }
                    };
                    if c != expected {
                        return Err(LexError::new(
                            format!("expected '{}', found '{}'", expected, c),
                            self.abs(self.pos),
                        ));
                    }
                    if stack.is_empty() {
                        self.pos += 1;
                        let inner = self.raw(start + 1, self.pos - 1);
                        let kind = self.bracket_kind(open);
                        self.push(kind, inner, start, self.pos);
                        return Ok(());
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(LexError::new(
            format!("unbalanced '{}'", open),
            self.abs(start),
        ))
    }

    fn bracket_kind(&self, open: char) -> TokenKind {
        match open {
            '[' => {
                // `$x[0]` is attribute access; `[0]` after a gap is a literal.
                let subscript_base = matches!(
                    self.last_kind,
                    Some(
                        TokenKind::Variable
                            | TokenKind::Subscript
                            | TokenKind::Attribute
                            | TokenKind::Paren
                            | TokenKind::Array
                            | TokenKind::Dict
                            | TokenKind::Str
                    )
                );
                if subscript_base && !self.gap {
                    TokenKind::Subscript
                } else {
                    TokenKind::Array
                }
            }
            '{' => TokenKind::Dict,
            _ => TokenKind::Paren,
        }
    }

    fn lex_variable(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        let name = self.scan_ident();
        if name.is_empty() {
            return Err(LexError::new("expected name after '$'", self.abs(start)));
        }
        self.push(TokenKind::Variable, name, start, self.pos);
        Ok(())
    }

    fn lex_minus(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let flaggable = !self.opts.data_mode && (self.gap || self.last_kind.is_none());
        if flaggable && self.peek(1) == Some('-') {
            if matches!(self.peek(2), Some(c) if c.is_alphabetic()) {
                self.pos += 2;
                let name = self.scan_word();
                self.push(TokenKind::ArgLong, name, start, self.pos);
                return Ok(());
            }
        }
        if flaggable && matches!(self.peek(1), Some(c) if c.is_alphabetic()) {
            self.pos += 1;
            let name = self.scan_word();
            self.push(TokenKind::ArgShort, name, start, self.pos);
            return Ok(());
        }
        let digit_after = matches!(self.peek(1), Some(c) if c.is_ascii_digit());
        let value_before = !self.gap
            && self
                .last_kind
                .map(|k| k.is_value_like())
                .unwrap_or(false);
        if digit_after && !value_before {
            self.pos += 1;
            self.lex_number(start);
            return Ok(());
        }
        self.pos += 1;
        self.push_char(TokenKind::Minus, start);
        Ok(())
    }

    /// `start` may point at a leading `-` already consumed by the caller.
    fn lex_number(&mut self, start: usize) {
        while matches!(self.peek(0), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek(0) == Some('.') && matches!(self.peek(1), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
            while matches!(self.peek(0), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = self.raw(start, self.pos);
        self.push(TokenKind::Number, text, start, self.pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        tokenize(src, &LexOptions::default()).unwrap()
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn command_with_flags() {
        let toks = lex("search -m res.partner --limit 10");
        assert_eq!(
            toks.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Word,
                TokenKind::ArgShort,
                TokenKind::Word,
                TokenKind::ArgLong,
                TokenKind::Number,
            ]
        );
        assert_eq!(toks[1].value, "m");
        assert_eq!(toks[2].value, "res.partner");
        assert_eq!(toks[3].value, "limit");
    }

    #[test]
    fn spans_are_absolute_with_offset() {
        let toks = tokenize("a b", &LexOptions { offset: 10, data_mode: false }).unwrap();
        assert_eq!((toks[0].start, toks[0].end), (10, 11));
        assert_eq!((toks[1].start, toks[1].end), (12, 13));
    }

    #[test]
    fn quoted_strings_resolve_escapes() {
        let toks = lex(r#"'it\'s' "a\"b""#);
        assert_eq!(toks[0].value, "it's");
        assert_eq!(toks[1].value, "a\"b");
    }

    #[test]
    fn unterminated_string_fails_with_offset() {
        let err = tokenize("echo 'oops", &LexOptions::default()).unwrap_err();
        assert_eq!(err.offset, 5);
    }

    #[test]
    fn unbalanced_bracket_fails() {
        assert!(tokenize("[1, [2]", &LexOptions::default()).is_err());
        assert!(tokenize("{a: 1", &LexOptions::default()).is_err());
    }

    #[test]
    fn subscript_vs_array() {
        assert_eq!(
            kinds("$x[0]"),
            vec![TokenKind::Variable, TokenKind::Subscript]
        );
        assert_eq!(kinds("cmd [0]"), vec![TokenKind::Word, TokenKind::Array]);
    }

    #[test]
    fn negative_numbers_and_subtraction() {
        // `5-3` is subtraction, `-3` after a gap is a literal
        assert_eq!(
            kinds("5-3"),
            vec![TokenKind::Number, TokenKind::Minus, TokenKind::Number]
        );
        let toks = lex("cmd -3");
        assert_eq!(toks[1].kind, TokenKind::Number);
        assert_eq!(toks[1].raw, "-3");
        // `5 - 3` keeps the operator
        assert_eq!(
            kinds("5 - 3"),
            vec![TokenKind::Number, TokenKind::Minus, TokenKind::Number]
        );
    }

    #[test]
    fn data_mode_delimiters() {
        let toks = tokenize(
            "keyA: 1, keyB: 'x'",
            &LexOptions { offset: 0, data_mode: true },
        )
        .unwrap();
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Word,
                TokenKind::Delimiter,
                TokenKind::Number,
                TokenKind::Delimiter,
                TokenKind::Word,
                TokenKind::Delimiter,
                TokenKind::Str,
            ]
        );
    }

    #[test]
    fn nested_brackets_are_one_token() {
        let toks = lex("[[1,2],{a: [3]}]");
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, TokenKind::Array);
        assert_eq!(toks[0].value, "[1,2],{a: [3]}");
    }

    #[test]
    fn attribute_access_after_variable() {
        let toks = lex("$rec.name");
        assert_eq!(toks[1].kind, TokenKind::Attribute);
        assert_eq!(toks[1].value, "name");
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(kinds("1 // trailing\n2").len(), 3);
    }

    #[test]
    fn keywords() {
        assert_eq!(
            kinds("true false null"),
            vec![TokenKind::Bool, TokenKind::Bool, TokenKind::Null]
        );
    }
}
