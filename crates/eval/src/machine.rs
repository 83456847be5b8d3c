//! The virtual machine: executes the parser's stack-ordered instruction
//! stream against a session store, dispatching command calls through the
//! configured executor and expanding user aliases for unknown names.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};
use trash_core::{parse, Op, ParseOptions, ParseResult, Value};

use crate::alias::{expand_alias, AliasStore};
use crate::argument::{self, encode_value};
use crate::error::EvalError;
use crate::executor::{CommandExecutor, CommandJob};
use crate::frame::Frame;
use crate::registry::CommandRegistry;
use crate::session::Session;

#[derive(Debug, Clone, Copy, Default)]
pub struct EvalOptions {
    /// Suppress result printing for every top-level call.
    pub silent: bool,
}

pub struct Machine {
    registry: CommandRegistry,
    executor: Arc<dyn CommandExecutor>,
    aliases: Arc<dyn AliasStore>,
}

#[derive(Default)]
struct VmState {
    /// Root value stack; frames carry their own.
    root: Vec<Value>,
    frames: Vec<Frame>,
    /// Most recently popped non-call frame.
    last_frame: Option<Frame>,
    results: Vec<Value>,
}

impl VmState {
    fn stack(&mut self) -> &mut Vec<Value> {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.values,
            None => &mut self.root,
        }
    }

    fn pop(&mut self, op: &str) -> Result<Value, EvalError> {
        self.stack().pop().ok_or_else(|| EvalError::InvalidInstruction {
            message: format!("{} on an empty stack", op),
        })
    }
}

impl Machine {
    pub fn new(
        registry: CommandRegistry,
        executor: Arc<dyn CommandExecutor>,
        aliases: Arc<dyn AliasStore>,
    ) -> Self {
        Machine {
            registry,
            executor,
            aliases,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Parse and run `text`, returning one value per statement in order.
    /// The first failing statement aborts the rest; an internal stream
    /// inconsistency only voids its own statement.
    ///
    /// Returns a boxed future so alias expansion can re-enter evaluation.
    pub fn eval<'a>(
        &'a self,
        text: &'a str,
        session: &'a Session,
        opts: &'a EvalOptions,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Value>, EvalError>> + Send + 'a>> {
        Box::pin(async move {
            let parsed = parse(
                text,
                &ParseOptions {
                    catalog: Some(&self.registry),
                    silent: opts.silent,
                },
            )?;
            self.run(&parsed, session).await
        })
    }

    /// Instruction loop. `InvalidInstruction` alone voids its statement
    /// and resumes at the next boundary; every other error aborts.
    async fn run(
        &self,
        parsed: &ParseResult,
        session: &Session,
    ) -> Result<Vec<Value>, EvalError> {
        let mut state = VmState::default();
        let mut i = 0;
        while i < parsed.instructions.len() {
            match self.exec_one(parsed, i, &mut state, session).await {
                Ok(()) => i += 1,
                Err(EvalError::InvalidInstruction { message }) => {
                    warn!(%message, "inconsistent instruction stream, voiding statement");
                    state.frames.clear();
                    state.root.clear();
                    state.results.push(Value::Null);
                    while i < parsed.instructions.len()
                        && parsed.instructions[i].op != Op::ReturnValue
                    {
                        i += 1;
                    }
                    i += 1;
                }
                Err(other) => return Err(other),
            }
        }
        Ok(state.results)
    }

    /// Span of the token behind an instruction, for error reporting.
    fn span(parsed: &ParseResult, idx: usize) -> (usize, usize) {
        let instr = &parsed.instructions[idx];
        instr
            .token_index
            .and_then(|t| parsed.tokens.get(instr.level)?.get(t))
            .map(|tok| (tok.start, tok.end))
            .unwrap_or((0, 0))
    }

    async fn exec_one(
        &self,
        parsed: &ParseResult,
        idx: usize,
        state: &mut VmState,
        session: &Session,
    ) -> Result<(), EvalError> {
        let op = parsed.instructions[idx].op.clone();
        match op {
            Op::LoadConst { value } => state.stack().push(value),

            Op::LoadName { name } => {
                let value = state
                    .frames
                    .last()
                    .and_then(|f| f.store.get(&name).cloned())
                    .or_else(|| session.get(&name));
                match value {
                    Some(v) => state.stack().push(v),
                    None => {
                        let (start, end) = Self::span(parsed, idx);
                        return Err(EvalError::UnknownName { name, start, end });
                    }
                }
            }

            Op::LoadGlobal { name } => {
                if !self.registry.contains(&name) && self.aliases.lookup(&name).is_none() {
                    let (start, end) = Self::span(parsed, idx);
                    return Err(EvalError::UnknownCommand { name, start, end });
                }
                let store = self.scope_snapshot(state, session);
                state.frames.push(Frame::for_call(&name, store));
            }

            Op::LoadArg { name } => match state.frames.last_mut() {
                Some(frame) if frame.command.is_some() => frame.args.push_back(name),
                _ => return Err(EvalError::NotExpectedCommandArgument { name }),
            },

            Op::Concat => {
                let b = state.pop("concat")?;
                let a = state.pop("concat")?;
                let value = if a.is_number() && b.is_number() {
                    Value::Number(a.as_number() + b.as_number())
                } else {
                    Value::Str(format!("{}{}", a, b))
                };
                state.stack().push(value);
            }

            Op::Subtract => self.binary(state, "subtract", |a, b| a - b)?,
            Op::Multiply => self.binary(state, "multiply", |a, b| a * b)?,
            Op::Divide => self.binary(state, "divide", |a, b| a / b)?,
            Op::Modulo => self.binary(state, "modulo", |a, b| a % b)?,
            Op::Pow => self.binary(state, "pow", |a, b| a.powf(b))?,

            Op::Negate => {
                let a = state.pop("negate")?;
                state.stack().push(Value::Number(-a.as_number()));
            }

            Op::CallFunction { silent } => {
                let frame = match state.frames.pop() {
                    Some(frame) if frame.command.is_some() => frame,
                    Some(frame) => {
                        state.frames.push(frame);
                        return Err(EvalError::InvalidInstruction {
                            message: "call closing a non-call frame".to_string(),
                        });
                    }
                    None => {
                        return Err(EvalError::InvalidInstruction {
                            message: "call without an open frame".to_string(),
                        })
                    }
                };
                let result = self.call(parsed, frame, silent, session).await?;
                state.stack().push(result);
            }

            Op::ReturnValue => {
                let value = state.stack().pop().unwrap_or(Value::Null);
                state.results.push(value);
            }

            Op::StoreName { name } => {
                let value = state.stack().pop().ok_or_else(|| EvalError::InvalidToken {
                    message: format!("assignment to '{}' without a value", name),
                })?;
                match state.frames.last_mut() {
                    Some(frame) => {
                        frame.store.insert(name, value);
                    }
                    None => session.set(&name, value),
                }
            }

            Op::StoreSubscr { name } => {
                let value = state.stack().pop().ok_or_else(|| EvalError::InvalidToken {
                    message: format!("assignment to '{}' without a value", name),
                })?;
                let key = state.stack().pop().ok_or_else(|| EvalError::InvalidToken {
                    message: format!("assignment to '{}' without a key", name),
                })?;
                let container = state
                    .frames
                    .last()
                    .and_then(|f| f.store.get(&name).cloned())
                    .or_else(|| session.get(&name))
                    .ok_or_else(|| EvalError::UndefinedValue {
                        message: format!("'{}' is not defined", name),
                    })?;
                let container = store_into(&name, container, &key, value)?;
                match state.frames.last_mut() {
                    Some(frame) => {
                        frame.store.insert(name, container);
                    }
                    None => session.set(&name, container),
                }
            }

            Op::LoadDataAttr => {
                let key = state.pop("attribute access")?;
                let base = state.pop("attribute access")?;
                let value = load_data_attr(base, &key)?;
                state.stack().push(value);
            }

            Op::BuildList { count } => {
                let stack = state.stack();
                if stack.len() < count {
                    return Err(EvalError::InvalidInstruction {
                        message: format!("list of {} with a short stack", count),
                    });
                }
                let items = stack.split_off(stack.len() - count);
                stack.push(Value::List(items));
            }

            Op::BuildMap { count } => {
                let stack = state.stack();
                if stack.len() < count * 2 {
                    return Err(EvalError::InvalidInstruction {
                        message: format!("map of {} with a short stack", count),
                    });
                }
                let flat = stack.split_off(stack.len() - count * 2);
                let mut dict = BTreeMap::new();
                for pair in flat.chunks(2) {
                    dict.insert(pair[0].to_string(), pair[1].clone());
                }
                stack.push(Value::Dict(dict));
            }

            Op::PushFrame => {
                let store = self.scope_snapshot(state, session);
                state.frames.push(Frame::new(store));
            }

            Op::PopFrame => {
                let mut frame = match state.frames.pop() {
                    Some(frame) if frame.command.is_none() => frame,
                    _ => {
                        return Err(EvalError::InvalidInstruction {
                            message: "frame pop without an open frame".to_string(),
                        })
                    }
                };
                let value = frame.values.pop().unwrap_or(Value::Null);
                state.stack().push(value);
                state.last_frame = Some(frame);
            }
        }
        Ok(())
    }

    /// Snapshot of the innermost visible scope for a new frame.
    fn scope_snapshot(
        &self,
        state: &VmState,
        session: &Session,
    ) -> BTreeMap<String, Value> {
        match state.frames.last() {
            Some(frame) => frame.store.clone(),
            None => session.snapshot(),
        }
    }

    fn binary(
        &self,
        state: &mut VmState,
        op: &str,
        apply: impl Fn(f64, f64) -> f64,
    ) -> Result<(), EvalError> {
        let b = state.pop(op)?;
        let a = state.pop(op)?;
        state
            .stack()
            .push(Value::Number(apply(a.as_number(), b.as_number())));
        Ok(())
    }

    /// Close a call frame: pair queued argument names with values right to
    /// left, bind leftovers positionally in declared order, validate, and
    /// dispatch. Unregistered names fall back to alias expansion.
    async fn call(
        &self,
        parsed: &ParseResult,
        frame: Frame,
        silent: bool,
        session: &Session,
    ) -> Result<Value, EvalError> {
        let name = frame.command.clone().unwrap_or_default();
        let mut kwargs: BTreeMap<String, Value> = BTreeMap::new();
        let mut positionals = Vec::new();
        let mut values = frame.values;
        let mut argnames = frame.args;
        while let Some(value) = values.pop() {
            match argnames.pop_back() {
                Some(arg) => {
                    kwargs.insert(arg, value);
                }
                None => positionals.push(value),
            }
        }
        positionals.reverse();

        let Some(def) = self.registry.get(&name) else {
            // Definition aliases resolve at parse time, so this is a user
            // alias template.
            let template =
                self.aliases
                    .lookup(&name)
                    .ok_or_else(|| EvalError::UnknownCommand {
                        name: name.clone(),
                        start: 0,
                        end: 0,
                    })?;
            let values: Vec<String> = positionals.iter().map(encode_value).collect();
            let expanded = expand_alias(&template, &values)?;
            debug!(alias = %name, expanded = %expanded, "expanding alias");
            let silent_opts = EvalOptions { silent: true };
            let results = self.eval(&expanded, session, &silent_opts).await?;
            return Ok(results.into_iter().last().unwrap_or(Value::Null));
        };

        let mut spec_iter = def.args.iter();
        for value in positionals {
            let spec = loop {
                match spec_iter.next() {
                    Some(s)
                        if kwargs.contains_key(&s.short) || kwargs.contains_key(&s.long) =>
                    {
                        continue
                    }
                    Some(s) => break s,
                    None => {
                        return Err(EvalError::InvalidCommandArguments {
                            command: def.name.clone(),
                            message: "too many positional values".to_string(),
                        })
                    }
                }
            };
            kwargs.insert(spec.long.clone(), value);
        }

        let kwargs = argument::validate_and_format(&def.name, &def.args, kwargs)?;
        debug!(command = %def.name, silent, "dispatching");
        let job = CommandJob {
            raw: parsed.source.clone(),
            name: def.name.clone(),
            def: def.clone(),
            kwargs,
            silent: silent || def.silent,
            session: session.clone(),
        };
        self.executor
            .execute(job)
            .await
            .map_err(|message| EvalError::CallFunction {
                command: def.name.clone(),
                message,
            })
    }
}

/// A numeric key is a usable index only when it is a non-negative
/// integer; a bare `as usize` cast would clamp `-1` and NaN to 0.
fn index_of(key: &Value) -> Option<usize> {
    let n = key.as_number();
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 {
        Some(n as usize)
    } else {
        None
    }
}

fn store_into(
    name: &str,
    container: Value,
    key: &Value,
    value: Value,
) -> Result<Value, EvalError> {
    match container {
        Value::List(mut items) => {
            if !key.is_number() {
                return Err(EvalError::UndefinedValue {
                    message: format!("'{}' is a list, index '{}' is not a number", name, key),
                });
            }
            let idx = index_of(key).ok_or_else(|| EvalError::UndefinedValue {
                message: format!("index {} is out of range for '{}'", key, name),
            })?;
            if idx < items.len() {
                items[idx] = value;
            } else if idx == items.len() {
                items.push(value);
            } else {
                return Err(EvalError::UndefinedValue {
                    message: format!("index {} is out of range for '{}'", idx, name),
                });
            }
            Ok(Value::List(items))
        }
        Value::Dict(mut dict) => {
            dict.insert(key.to_string(), value);
            Ok(Value::Dict(dict))
        }
        other => Err(EvalError::UndefinedValue {
            message: format!("cannot assign into a {}", other.type_name()),
        }),
    }
}

fn load_data_attr(base: Value, key: &Value) -> Result<Value, EvalError> {
    match base {
        Value::Dict(dict) => Ok(dict.get(&key.to_string()).cloned().unwrap_or(Value::Null)),
        Value::List(items) => {
            if key.is_number() {
                let item = index_of(key).and_then(|idx| items.get(idx).cloned());
                return Ok(item.unwrap_or(Value::Null));
            }
            // Plucking a field across the elements.
            let field = key.to_string();
            let plucked: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::Dict(dict) => dict
                        .get(&field)
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                    other => other.to_string(),
                })
                .collect();
            Ok(Value::Str(plucked.join(",")))
        }
        Value::Str(s) => {
            if key.is_number() {
                let ch = index_of(key).and_then(|idx| s.chars().nth(idx));
                return Ok(ch.map(|c| Value::Str(c.to_string())).unwrap_or(Value::Null));
            }
            Ok(Value::Null)
        }
        other => Err(EvalError::UndefinedValue {
            message: format!("cannot read attributes of a {}", other.type_name()),
        }),
    }
}
