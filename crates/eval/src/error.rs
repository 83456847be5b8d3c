use thiserror::Error;
use trash_core::ParseError;

/// Evaluation failures. Variants carrying `start`/`end` reference character
/// offsets into the evaluated source.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unknown command '{name}' ({start}..{end})")]
    UnknownCommand {
        name: String,
        start: usize,
        end: usize,
    },

    #[error("unknown name '{name}' ({start}..{end})")]
    UnknownName {
        name: String,
        start: usize,
        end: usize,
    },

    #[error("invalid name '{name}': {message}")]
    InvalidName { name: String, message: String },

    #[error("argument '{name}' used outside of a command call")]
    NotExpectedCommandArgument { name: String },

    #[error("invalid arguments for '{command}': {message}")]
    InvalidCommandArguments { command: String, message: String },

    #[error("invalid value for '--{argument}' of '{command}': {message}")]
    InvalidCommandArgumentValue {
        command: String,
        argument: String,
        message: String,
    },

    #[error("'--{argument}' of '{command}' expects {expected}, got {actual}")]
    InvalidCommandArgumentFormat {
        command: String,
        argument: String,
        expected: String,
        actual: String,
    },

    #[error("command '{command}' failed: {message}")]
    CallFunction { command: String, message: String },

    #[error("invalid token: {message}")]
    InvalidToken { message: String },

    #[error("undefined value: {message}")]
    UndefinedValue { message: String },

    /// Internal stack or frame inconsistency. Aborts the current statement.
    #[error("invalid instruction: {message}")]
    InvalidInstruction { message: String },
}
