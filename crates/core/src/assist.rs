//! Caret-to-token mapping for interactive assistance: given a parse of the
//! current input line and a caret offset, report which command the caret
//! belongs to and whether it sits on an argument name or a value.

use crate::instruction::Op;
use crate::parser::ParseResult;
use crate::token::TokenKind;

/// Indices into the level-0 token table of `ParseResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaretMapping {
    /// The command word governing the caret position.
    pub command: Option<usize>,
    /// The argument name the caret is on, or that the caret's value binds to.
    pub argument: Option<usize>,
    /// The value token under the caret, when it sits on one.
    pub value: Option<usize>,
}

/// Map a caret offset to the surrounding command call. Only level-0 tokens
/// participate; a caret inside a bracket interior maps to the bracket token.
pub fn selected_token_indices(parsed: &ParseResult, caret: usize) -> CaretMapping {
    let Some(level0) = parsed.tokens.first() else {
        return CaretMapping::default();
    };

    // Token under the caret, or the nearest one before it when the caret
    // sits in trailing whitespace.
    let mut tok_index = level0
        .iter()
        .position(|t| t.start <= caret && caret <= t.end);
    let mut on_token = tok_index.is_some();
    if tok_index.is_none() {
        tok_index = level0
            .iter()
            .rposition(|t| t.end < caret && t.kind != TokenKind::Delimiter);
        on_token = false;
    }
    let Some(tok_index) = tok_index else {
        return CaretMapping::default();
    };

    // First level-0 instruction produced from that token.
    let instr_pos = parsed
        .instructions
        .iter()
        .position(|i| i.level == 0 && i.token_index == Some(tok_index));
    let Some(instr_pos) = instr_pos else {
        return CaretMapping::default();
    };

    // Several instructions may share the token (LoadGlobal + CallFunction,
    // implicit-true LoadConst + LoadArg). Classify by the strongest.
    let mut is_command = false;
    let mut is_argument = false;
    for instr in parsed
        .instructions
        .iter()
        .filter(|i| i.level == 0 && i.token_index == Some(tok_index))
    {
        match instr.op {
            Op::LoadGlobal { .. } => is_command = true,
            Op::LoadArg { .. } => is_argument = true,
            _ => {}
        }
    }

    if is_command {
        return CaretMapping {
            command: Some(tok_index),
            argument: None,
            value: None,
        };
    }
    if is_argument {
        return CaretMapping {
            command: enclosing_command(parsed, instr_pos),
            argument: Some(tok_index),
            value: None,
        };
    }
    CaretMapping {
        command: enclosing_command(parsed, instr_pos),
        argument: binding_argument(parsed, instr_pos),
        value: on_token.then_some(tok_index),
    }
}

/// Walk backward to the LoadGlobal that opened the call the instruction at
/// `pos` executes in, skipping over completed nested calls.
fn enclosing_command(parsed: &ParseResult, pos: usize) -> Option<usize> {
    let mut depth = 0usize;
    for instr in parsed.instructions[..=pos].iter().rev() {
        if instr.level != 0 {
            continue;
        }
        match instr.op {
            Op::CallFunction { .. } => depth += 1,
            Op::LoadGlobal { .. } => {
                if depth == 0 {
                    return instr.token_index;
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

/// Walk forward from a value instruction to the LoadArg that will consume
/// it, if any; hitting the call boundary first means the value binds
/// positionally.
fn binding_argument(parsed: &ParseResult, pos: usize) -> Option<usize> {
    let mut depth = 0usize;
    for instr in parsed.instructions[pos + 1..].iter() {
        if instr.level != 0 {
            continue;
        }
        match instr.op {
            Op::LoadGlobal { .. } => depth += 1,
            Op::CallFunction { .. } => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
            }
            Op::LoadArg { .. } if depth == 0 => return instr.token_index,
            Op::ReturnValue => return None,
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, ParseOptions};

    fn map(src: &str, caret: usize) -> CaretMapping {
        let parsed = parse(src, &ParseOptions::default()).unwrap();
        selected_token_indices(&parsed, caret)
    }

    #[test]
    fn caret_on_argument_value() {
        //        0123456789012345678
        let m = map("search -m res.pa", 16);
        assert_eq!(m.command, Some(0));
        assert_eq!(m.argument, Some(1));
        assert_eq!(m.value, Some(2));
    }

    #[test]
    fn caret_on_argument_name() {
        let m = map("search -m res.pa", 8);
        assert_eq!(m.command, Some(0));
        assert_eq!(m.argument, Some(1));
        assert_eq!(m.value, None);
    }

    #[test]
    fn caret_on_command_word() {
        let m = map("search -m res.pa", 3);
        assert_eq!(m.command, Some(0));
        assert_eq!(m.argument, None);
        assert_eq!(m.value, None);
    }

    #[test]
    fn caret_on_positional_value() {
        let m = map("print hello", 9);
        assert_eq!(m.command, Some(0));
        assert_eq!(m.argument, None);
        assert_eq!(m.value, Some(1));
    }

    #[test]
    fn caret_after_bare_flag() {
        // Caret in the whitespace after `-m`: completing the value of -m.
        let m = map("search -m ", 10);
        assert_eq!(m.command, Some(0));
        assert_eq!(m.argument, Some(1));
        assert_eq!(m.value, None);
    }

    #[test]
    fn caret_in_second_statement() {
        let src = "read -i 1; search -m res";
        let m = map(src, 22);
        assert_eq!(m.command, Some(4));
        assert_eq!(m.argument, Some(5));
    }

    #[test]
    fn empty_input() {
        let parsed = parse("", &ParseOptions::default()).unwrap();
        assert_eq!(
            selected_token_indices(&parsed, 0),
            CaretMapping::default()
        );
    }
}
