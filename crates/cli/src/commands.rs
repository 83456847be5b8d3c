//! Built-in command set for the CLI: printing, aliases, replay helpers,
//! and a random generator. These exercise every registry feature the
//! embedding API offers.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use rand::Rng;
use trash_core::Value;
use trash_eval::{
    ArgType, ArgumentSpec, CommandDefinition, CommandJob, CommandRegistry, EvalOptions, Machine,
    MemoryAliases,
};

/// Commands that re-enter evaluation (`repeat`, `chrono`) get the machine
/// through this handle, filled in after the registry is built.
pub type MachineHandle = Arc<OnceLock<Machine>>;

fn kwarg_str(job: &CommandJob, key: &str) -> Result<String, String> {
    match job.kwarg(key) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(format!("'--{}' expects a string, got {}", key, other.type_name())),
        None => Err(format!("'--{}' is missing", key)),
    }
}

fn kwarg_number(job: &CommandJob, key: &str) -> Result<f64, String> {
    match job.kwarg(key) {
        Some(v) if v.is_number() => Ok(v.as_number()),
        Some(other) => Err(format!("'--{}' expects a number, got {}", key, other.type_name())),
        None => Err(format!("'--{}' is missing", key)),
    }
}

pub fn build_registry(handle: MachineHandle, aliases: MemoryAliases) -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    registry.register(
        CommandDefinition::new("print")
            .definition("Print a value")
            .example("print -v 'hello'")
            .aliases(&["p", "echo"])
            .arg(
                ArgumentSpec::new(ArgType::ANY, "v", "value")
                    .describe("Value to print")
                    .required(),
            )
            .callback(|job| {
                Box::pin(async move {
                    let value = job.kwarg("value").cloned().unwrap_or(Value::Null);
                    if !job.silent {
                        println!("{}", value);
                    }
                    Ok(value)
                })
            }),
    );

    let store = aliases.clone();
    let known = aliases.clone();
    registry.register(
        CommandDefinition::new("alias")
            .definition("Define, remove, or list aliases")
            .detail("Templates may reference call values as $1..$N, with $N[default] fallbacks.")
            .example("alias -n sp -c 'search -m $1[res.partner]'")
            .options_provider(move |argument| match argument {
                "n" | "name" => known.names().into_iter().map(Value::Str).collect(),
                _ => Vec::new(),
            })
            .arg(ArgumentSpec::new(ArgType::STRING, "n", "name").describe("Alias name"))
            .arg(ArgumentSpec::new(ArgType::STRING, "c", "cmd").describe("Command template"))
            .arg(ArgumentSpec::new(ArgType::FLAG, "r", "remove").describe("Remove the alias"))
            .callback(move |job| {
                let store = store.clone();
                Box::pin(async move {
                    let name = job.kwarg("name").cloned();
                    let remove = matches!(job.kwarg("remove"), Some(Value::Bool(true)));
                    match name {
                        Some(Value::Str(name)) if remove => {
                            if !store.remove(&name) {
                                return Err(format!("alias '{}' is not defined", name));
                            }
                            Ok(Value::Str(name))
                        }
                        Some(Value::Str(name)) => {
                            let template = kwarg_str(&job, "cmd")?;
                            store.set(&name, &template);
                            Ok(Value::Str(name))
                        }
                        Some(other) => {
                            Err(format!("'--name' expects a string, got {}", other.type_name()))
                        }
                        None => Ok(Value::List(
                            store.names().into_iter().map(Value::Str).collect(),
                        )),
                    }
                })
            }),
    );

    let repeat_handle = handle.clone();
    registry.register(
        CommandDefinition::new("repeat")
            .definition("Evaluate a command a number of times")
            .example("repeat -t 5 -c 'gen -ma 9'")
            .arg(
                ArgumentSpec::new(ArgType::NUMBER, "t", "times")
                    .describe("Evaluation count")
                    .required(),
            )
            .arg(
                ArgumentSpec::new(ArgType::STRING, "c", "cmd")
                    .describe("Command to evaluate")
                    .required(),
            )
            .callback(move |job| {
                let handle = repeat_handle.clone();
                Box::pin(async move {
                    let machine = handle.get().ok_or_else(|| "runtime is not ready".to_string())?;
                    let times = kwarg_number(&job, "times")?;
                    if times < 0.0 || times.fract() != 0.0 {
                        return Err("'--times' expects a non-negative integer".to_string());
                    }
                    let command = kwarg_str(&job, "cmd")?;
                    let opts = EvalOptions { silent: true };
                    let mut collected = Vec::with_capacity(times as usize);
                    for _ in 0..times as usize {
                        let results = machine
                            .eval(&command, &job.session, &opts)
                            .await
                            .map_err(|err| err.to_string())?;
                        collected.push(results.into_iter().last().unwrap_or(Value::Null));
                    }
                    Ok(Value::List(collected))
                })
            }),
    );

    let chrono_handle = handle.clone();
    registry.register(
        CommandDefinition::new("chrono")
            .definition("Time the evaluation of a command, in milliseconds")
            .example("chrono -c 'search -m res.partner'")
            .arg(
                ArgumentSpec::new(ArgType::STRING, "c", "cmd")
                    .describe("Command to evaluate")
                    .required(),
            )
            .callback(move |job| {
                let handle = chrono_handle.clone();
                Box::pin(async move {
                    let machine = handle.get().ok_or_else(|| "runtime is not ready".to_string())?;
                    let command = kwarg_str(&job, "cmd")?;
                    let started = Instant::now();
                    machine
                        .eval(&command, &job.session, &EvalOptions { silent: true })
                        .await
                        .map_err(|err| err.to_string())?;
                    Ok(Value::Number(started.elapsed().as_secs_f64() * 1000.0))
                })
            }),
    );

    registry.register(
        CommandDefinition::new("gen")
            .definition("Generate a random value")
            .example("gen -mi 1 -ma 100 -t int")
            .generates_randoms()
            .arg(
                ArgumentSpec::new(ArgType::NUMBER, "mi", "min")
                    .describe("Lower bound (inclusive)")
                    .default_value(Value::Number(1.0)),
            )
            .arg(
                ArgumentSpec::new(ArgType::NUMBER, "ma", "max")
                    .describe("Upper bound (inclusive)")
                    .required(),
            )
            .arg(
                ArgumentSpec::new(ArgType::STRING, "t", "type")
                    .describe("Kind of value to generate")
                    .default_value(Value::Str("int".into()))
                    .strict(vec![
                        Value::Str("int".into()),
                        Value::Str("float".into()),
                        Value::Str("str".into()),
                    ]),
            )
            .callback(|job| {
                Box::pin(async move {
                    let min = kwarg_number(&job, "min")?;
                    let max = kwarg_number(&job, "max")?;
                    if max < min {
                        return Err("'--max' must not be below '--min'".to_string());
                    }
                    let kind = kwarg_str(&job, "type")?;
                    let mut rng = rand::thread_rng();
                    let value = match kind.as_str() {
                        "int" => Value::Number(rng.gen_range(min as i64..=max as i64) as f64),
                        "float" => Value::Number(rng.gen_range(min..=max)),
                        _ => {
                            let len = rng.gen_range(min.max(0.0) as usize..=max.max(0.0) as usize);
                            let text: String = (0..len)
                                .map(|_| rng.gen_range(b'a'..=b'z') as char)
                                .collect();
                            Value::Str(text)
                        }
                    };
                    Ok(value)
                })
            }),
    );

    registry
}
