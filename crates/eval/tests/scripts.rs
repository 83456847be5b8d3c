//! End-to-end scripts running the whole pipeline: lexer, parser, VM,
//! registry, argument validation, and alias expansion together.

use std::sync::Arc;

use trash_core::Value;
use trash_eval::{
    ArgType, ArgumentSpec, CallbackExecutor, CommandDefinition, CommandRegistry, EvalError,
    EvalOptions, Machine, MemoryAliases, Session,
};

fn build_machine(aliases: MemoryAliases) -> Machine {
    let mut registry = CommandRegistry::new();
    registry.register(
        CommandDefinition::new("print")
            .definition("Echo a value")
            .aliases(&["p"])
            .arg(ArgumentSpec::new(ArgType::ANY, "v", "value").required())
            .callback(|job| {
                Box::pin(async move { Ok(job.kwarg("value").cloned().unwrap_or(Value::Null)) })
            }),
    );
    registry.register(
        CommandDefinition::new("search")
            .definition("Collect fake records for a model")
            .arg(ArgumentSpec::new(ArgType::STRING, "m", "model").required())
            .arg(
                ArgumentSpec::new(ArgType::STRING | ArgType::LIST, "f", "fields")
                    .default_value(Value::List(vec![Value::Str("id".into())])),
            )
            .arg(ArgumentSpec::new(ArgType::NUMBER, "l", "limit").default_value(Value::Number(2.0)))
            .callback(|job| {
                Box::pin(async move {
                    let limit = job
                        .kwarg("limit")
                        .map(|v| v.as_number() as usize)
                        .unwrap_or(0);
                    let records = (1..=limit)
                        .map(|id| {
                            let mut dict = std::collections::BTreeMap::new();
                            dict.insert("id".to_string(), Value::Number(id as f64));
                            Value::Dict(dict)
                        })
                        .collect();
                    Ok(Value::List(records))
                })
            }),
    );
    registry.register(
        CommandDefinition::new("gen")
            .definition("Deterministic stand-in for a random generator")
            .generates_randoms()
            .arg(ArgumentSpec::new(ArgType::NUMBER, "mi", "min").default_value(Value::Number(1.0)))
            .arg(ArgumentSpec::new(ArgType::NUMBER, "ma", "max").required())
            .arg(
                ArgumentSpec::new(ArgType::STRING, "t", "type")
                    .default_value(Value::Str("int".into()))
                    .strict(vec![Value::Str("int".into()), Value::Str("str".into())]),
            )
            .callback(|job| {
                Box::pin(async move {
                    let mi = job.kwarg("min").map(|v| v.as_number()).unwrap_or(0.0);
                    let ma = job.kwarg("max").map(|v| v.as_number()).unwrap_or(0.0);
                    Ok(Value::Number((mi + ma) / 2.0))
                })
            }),
    );
    Machine::new(registry, Arc::new(CallbackExecutor), Arc::new(aliases))
}

async fn eval_all(machine: &Machine, session: &Session, src: &str) -> Vec<Value> {
    machine
        .eval(src, session, &EvalOptions::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn assignment_concat_script() {
    let machine = build_machine(MemoryAliases::new());
    let session = Session::new();
    let results = eval_all(&machine, &session, "$a='blabla';$b=1234;$a+'---'+$b").await;
    assert_eq!(results.last(), Some(&Value::Str("blabla---1234".into())));
}

#[tokio::test]
async fn records_flow_between_statements() {
    let machine = build_machine(MemoryAliases::new());
    let session = Session::new();
    let results = eval_all(
        &machine,
        &session,
        "$recs = (search -m res.partner -l 3); $recs[2].id",
    )
    .await;
    assert_eq!(results.last(), Some(&Value::Number(3.0)));
}

#[tokio::test]
async fn pluck_ids_from_result() {
    let machine = build_machine(MemoryAliases::new());
    let session = Session::new();
    let results = eval_all(
        &machine,
        &session,
        "(search -m res.partner).id",
    )
    .await;
    assert_eq!(results.last(), Some(&Value::Str("1,2".into())));
}

#[tokio::test]
async fn nested_generation_feeds_limit() {
    let machine = build_machine(MemoryAliases::new());
    let session = Session::new();
    // gen averages min and max: (2+4)/2 = 3 records.
    let results = eval_all(
        &machine,
        &session,
        "search -m res.partner -l (gen -mi 2 -ma 4)",
    )
    .await;
    let Some(Value::List(records)) = results.last() else {
        panic!("expected a record list");
    };
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn strict_value_violation_surfaces() {
    let machine = build_machine(MemoryAliases::new());
    let session = Session::new();
    let err = machine
        .eval("gen -ma 9 -t float", &session, &EvalOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EvalError::InvalidCommandArgumentValue { .. }
    ));
}

#[tokio::test]
async fn missing_required_argument_surfaces() {
    let machine = build_machine(MemoryAliases::new());
    let session = Session::new();
    let err = machine
        .eval("gen -mi 2", &session, &EvalOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::InvalidCommandArguments { .. }));
}

#[tokio::test]
async fn definition_alias_and_user_alias_chain() {
    let aliases = MemoryAliases::new();
    aliases.set("hello", "p -v 'hi $1[there]'");
    let machine = build_machine(aliases);
    let session = Session::new();
    // `p` is a definition alias of `print`; `hello` is a user alias.
    assert_eq!(
        eval_all(&machine, &session, "p -v 1").await,
        vec![Value::Number(1.0)]
    );
    assert_eq!(
        eval_all(&machine, &session, "hello sam").await,
        vec![Value::Str("hi sam".into())]
    );
    assert_eq!(
        eval_all(&machine, &session, "hello").await,
        vec![Value::Str("hi there".into())]
    );
}

#[tokio::test]
async fn alias_depending_on_alias() {
    let aliases = MemoryAliases::new();
    aliases.set("two", "p -v 2");
    aliases.set("double-two", "two");
    let machine = build_machine(aliases);
    let session = Session::new();
    assert_eq!(
        eval_all(&machine, &session, "double-two").await,
        vec![Value::Number(2.0)]
    );
}

#[tokio::test]
async fn comments_and_blank_statements_are_ignored() {
    let machine = build_machine(MemoryAliases::new());
    let session = Session::new();
    let results = eval_all(
        &machine,
        &session,
        "// setup\n$x = 2;;\n$x ^ 3 // cube",
    )
    .await;
    assert_eq!(results.last(), Some(&Value::Number(8.0)));
}

#[tokio::test]
async fn session_reset_drops_variables() {
    let machine = build_machine(MemoryAliases::new());
    let session = Session::new();
    eval_all(&machine, &session, "$keep = 1").await;
    session.reset();
    let err = machine
        .eval("$keep", &session, &EvalOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::UnknownName { .. }));
}
