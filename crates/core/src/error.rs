/// Errors raised before any instruction executes. Both carry character
/// offsets into the original input so a console can underline the
/// offending region.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("lex error at offset {offset}: {message}")]
pub struct LexError {
    pub message: String,
    pub offset: usize,
}

impl LexError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        LexError {
            message: message.into(),
            offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    /// Structural problem in the token stream: a flag in command position,
    /// an assignment without a storable target, a dangling operator.
    #[error("syntax error at {start}..{end}: {message}")]
    Syntax {
        message: String,
        start: usize,
        end: usize,
    },
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, start: usize, end: usize) -> Self {
        ParseError::Syntax {
            message: message.into(),
            start,
            end,
        }
    }
}
