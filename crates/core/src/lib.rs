//! TraSH language core: lexing, parsing, and the instruction stream the
//! virtual machine executes, plus the caret mapper used for interactive
//! assistance.
//!
//! The pipeline is deliberately small: [`lexer::tokenize`] produces a flat
//! token run where bracketed constructs are single tokens, [`parser::parse`]
//! re-lexes bracket interiors level by level and emits stack-ordered
//! [`instruction::Op`]s, and the evaluator crate runs them.

pub mod assist;
pub mod error;
pub mod instruction;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod value;

pub use assist::{selected_token_indices, CaretMapping};
pub use error::{LexError, ParseError};
pub use instruction::{Instruction, Op};
pub use lexer::{tokenize, LexOptions};
pub use parser::{parse, CommandCatalog, ParseOptions, ParseResult};
pub use token::{Token, TokenKind};
pub use value::{format_number, Value};
