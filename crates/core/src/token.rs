#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word — a command name in command position, a plain string
    /// elsewhere. May contain `.` and `-` (`res.partner`).
    Word,
    /// Quoted string; `value` holds the content with escapes resolved.
    Str,
    /// Numeric literal, kept as text until the parser interns it.
    Number,
    Bool,
    Null,
    /// `$name`; `value` holds the name without the sigil.
    Variable,
    /// `-x`; `value` holds the flag name.
    ArgShort,
    /// `--long-name`.
    ArgLong,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    /// `[...]` literal; `value` holds the interior text.
    Array,
    /// `{...}` literal.
    Dict,
    /// `(...)` group or nested sub-command runner.
    Paren,
    /// `[...]` index/attribute access following a value token.
    Subscript,
    /// `.name` attribute access following a value token.
    Attribute,
    /// `;`, newline, or `,`/`:` in data mode.
    Delimiter,
}

impl TokenKind {
    /// Kinds a subscript, attribute, or binary operator may follow.
    pub fn is_value_like(self) -> bool {
        matches!(
            self,
            TokenKind::Word
                | TokenKind::Str
                | TokenKind::Number
                | TokenKind::Bool
                | TokenKind::Null
                | TokenKind::Variable
                | TokenKind::Array
                | TokenKind::Dict
                | TokenKind::Paren
                | TokenKind::Subscript
                | TokenKind::Attribute
        )
    }

    /// Kinds that can begin a value expression (used to decide whether a
    /// flag token has an explicit value following it).
    pub fn starts_value(self) -> bool {
        matches!(
            self,
            TokenKind::Word
                | TokenKind::Str
                | TokenKind::Number
                | TokenKind::Bool
                | TokenKind::Null
                | TokenKind::Variable
                | TokenKind::Array
                | TokenKind::Dict
                | TokenKind::Paren
                | TokenKind::Minus
        )
    }
}

/// One lexed token. `start`/`end` are character offsets into the original
/// input (sub-lexed bracket interiors keep absolute offsets). `level` is
/// the parenthesis/bracket nesting depth, assigned by the parser.
///
/// Invariant: tokens within one level are ordered and non-overlapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub raw: String,
    pub start: usize,
    pub end: usize,
    pub level: usize,
}
