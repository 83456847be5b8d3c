//! Whole-pipeline parsing checks over realistic input lines.

use trash_core::{parse, selected_token_indices, Op, ParseOptions, TokenKind, Value};

fn ops(src: &str) -> Vec<Op> {
    parse(src, &ParseOptions::default())
        .unwrap()
        .instructions
        .into_iter()
        .map(|i| i.op)
        .collect()
}

#[test]
fn multi_statement_script() {
    let src = "$ids = [1, 2]; search -m res.partner -f 'id,name' --limit $ids[0]";
    let parsed = parse(src, &ParseOptions::default()).unwrap();
    assert_eq!(
        parsed
            .instructions
            .iter()
            .filter(|i| i.op == Op::ReturnValue)
            .count(),
        2
    );
    assert!(parsed
        .instructions
        .iter()
        .any(|i| i.op == Op::LoadGlobal { name: "search".into() }));
    assert!(parsed
        .instructions
        .iter()
        .any(|i| i.op == Op::LoadArg { name: "limit".into() }));
}

#[test]
fn deeply_nested_data_levels() {
    let parsed = parse("print {outer: [1, {inner: [2]}]}", &ParseOptions::default()).unwrap();
    assert_eq!(parsed.max_level, 4);
    assert!(parsed
        .instructions
        .iter()
        .any(|i| i.op == Op::BuildMap { count: 1 } && i.level == 2));
}

#[test]
fn nested_runner_inside_arguments() {
    let parsed = parse(
        "write -m res.partner -i (search -m res.partner).id -v {name: 'x'}",
        &ParseOptions::default(),
    )
    .unwrap();
    let silents: Vec<bool> = parsed
        .instructions
        .iter()
        .filter_map(|i| match i.op {
            Op::CallFunction { silent } => Some(silent),
            _ => None,
        })
        .collect();
    assert_eq!(silents, vec![true, false]);
}

#[test]
fn operator_chain_matches_expected_value_order() {
    // 10 % 3 then unary minus over the result of a paren group.
    assert_eq!(
        ops("10 % 3 + -(1+1)"),
        vec![
            Op::LoadConst { value: Value::Number(10.0) },
            Op::LoadConst { value: Value::Number(3.0) },
            Op::Modulo,
            Op::PushFrame,
            Op::LoadConst { value: Value::Number(1.0) },
            Op::LoadConst { value: Value::Number(1.0) },
            Op::Concat,
            Op::PopFrame,
            Op::Negate,
            Op::Concat,
            Op::ReturnValue,
        ]
    );
}

#[test]
fn caret_mapping_against_a_real_line() {
    let src = "write -m res.partner -v {name: 'x'}";
    let parsed = parse(src, &ParseOptions::default()).unwrap();
    // Caret inside the dictionary literal maps to the bracket token.
    let mapping = selected_token_indices(&parsed, 28);
    assert_eq!(mapping.command, Some(0));
    assert_eq!(mapping.argument, Some(3));
    assert_eq!(
        parsed.tokens[0][mapping.value.unwrap()].kind,
        TokenKind::Dict
    );
}

#[test]
fn lex_errors_carry_positions_through_parse() {
    let err = parse("print 'unterminated", &ParseOptions::default()).unwrap_err();
    assert!(err.to_string().contains("unterminated"));
}
