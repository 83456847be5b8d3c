//! Typed command arguments: the `ArgType` bitmask, per-command argument
//! specs, kwargs validation, and the raw parameter reader/writer used when
//! command text is stored and replayed.

use std::collections::BTreeMap;
use std::ops::BitOr;

use trash_core::{format_number, Value};

use crate::error::EvalError;

/// Bitmask of the value shapes an argument accepts. Composable with `|`,
/// e.g. `ArgType::NUMBER | ArgType::LIST` for a list of numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgType(u8);

impl ArgType {
    pub const STRING: ArgType = ArgType(1);
    pub const NUMBER: ArgType = ArgType(1 << 1);
    pub const DICTIONARY: ArgType = ArgType(1 << 2);
    pub const FLAG: ArgType = ArgType(1 << 3);
    pub const ANY: ArgType = ArgType(1 << 4);
    pub const LIST: ArgType = ArgType(1 << 5);

    pub fn contains(self, other: ArgType) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_list(self) -> bool {
        self.contains(ArgType::LIST)
    }

    /// Whether a scalar value satisfies the non-list part of the mask.
    pub fn accepts_scalar(self, value: &Value) -> bool {
        if self.contains(ArgType::ANY) {
            return true;
        }
        match value {
            Value::Str(_) => self.contains(ArgType::STRING),
            Value::Number(_) => self.contains(ArgType::NUMBER),
            Value::Bool(_) => self.contains(ArgType::FLAG),
            Value::Dict(_) => self.contains(ArgType::DICTIONARY),
            Value::List(_) | Value::Null => false,
        }
    }

    /// Human-readable description for error messages.
    pub fn human(self) -> String {
        let mut names = Vec::new();
        if self.contains(ArgType::ANY) {
            names.push("Any");
        } else {
            if self.contains(ArgType::STRING) {
                names.push("String");
            }
            if self.contains(ArgType::NUMBER) {
                names.push("Number");
            }
            if self.contains(ArgType::DICTIONARY) {
                names.push("Dictionary");
            }
            if self.contains(ArgType::FLAG) {
                names.push("Flag");
            }
        }
        let scalar = names.join(" or ");
        if self.is_list() {
            if scalar.is_empty() {
                "List".to_string()
            } else {
                format!("List of {}", scalar)
            }
        } else {
            scalar
        }
    }
}

impl BitOr for ArgType {
    type Output = ArgType;
    fn bitor(self, rhs: ArgType) -> ArgType {
        ArgType(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    pub arg_type: ArgType,
    pub short: String,
    pub long: String,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
    /// When set, the formatted value must be one of these.
    pub strict_values: Option<Vec<Value>>,
    /// Trailing spec that slurps every remaining raw token as a string.
    pub variadic: bool,
}

impl ArgumentSpec {
    pub fn new(arg_type: ArgType, short: &str, long: &str) -> Self {
        ArgumentSpec {
            arg_type,
            short: short.to_string(),
            long: long.to_string(),
            description: String::new(),
            required: false,
            default: None,
            strict_values: None,
            variadic: false,
        }
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = text.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn strict(mut self, values: Vec<Value>) -> Self {
        self.strict_values = Some(values);
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Key the formatted kwargs use: the long name with `-` mapped to `_`.
    pub fn result_key(&self) -> String {
        self.long.replace('-', "_")
    }
}

// ────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────

/// Normalize raw kwargs against the command's specs: short names become
/// long, defaults are applied, required and typed checks run, list values
/// are sanitized. Keys of the result are `result_key` form.
pub fn validate_and_format(
    command: &str,
    specs: &[ArgumentSpec],
    kwargs: BTreeMap<String, Value>,
) -> Result<BTreeMap<String, Value>, EvalError> {
    let mut out = BTreeMap::new();
    for (key, value) in kwargs {
        let spec = specs
            .iter()
            .find(|s| s.short == key || s.long == key || s.result_key() == key)
            .ok_or_else(|| EvalError::InvalidCommandArguments {
                command: command.to_string(),
                message: format!("unknown argument '{}'", key),
            })?;
        let value = format_value(command, spec, value)?;
        if let Some(allowed) = &spec.strict_values {
            let ok = match &value {
                Value::List(items) => items.iter().all(|v| allowed.contains(v)),
                other => allowed.contains(other),
            };
            if !ok {
                return Err(EvalError::InvalidCommandArgumentValue {
                    command: command.to_string(),
                    argument: spec.long.clone(),
                    message: format!(
                        "must be one of {}",
                        allowed
                            .iter()
                            .map(|v| v.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                });
            }
        }
        out.insert(spec.result_key(), value);
    }
    for spec in specs {
        let key = spec.result_key();
        if out.contains_key(&key) {
            continue;
        }
        if let Some(default) = &spec.default {
            out.insert(key, default.clone());
        } else if spec.required {
            return Err(EvalError::InvalidCommandArguments {
                command: command.to_string(),
                message: format!("missing required argument '--{}'", spec.long),
            });
        }
    }
    Ok(out)
}

fn format_value(
    command: &str,
    spec: &ArgumentSpec,
    value: Value,
) -> Result<Value, EvalError> {
    let mismatch = |actual: &Value| EvalError::InvalidCommandArgumentFormat {
        command: command.to_string(),
        argument: spec.long.clone(),
        expected: spec.arg_type.human(),
        actual: actual.type_name().to_string(),
    };

    if spec.arg_type.is_list() {
        let items = match value {
            // Comma-separated shorthand for a list.
            Value::Str(s) if !spec.arg_type.contains(ArgType::ANY) => s
                .split(',')
                .map(|part| coerce_scalar(spec.arg_type, Value::Str(part.trim().to_string())))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| mismatch(&Value::Str(s.clone())))?,
            Value::List(items) => items
                .into_iter()
                .map(|v| {
                    coerce_scalar(spec.arg_type, v.clone()).ok_or_else(|| mismatch(&v))
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                let coerced = coerce_scalar(spec.arg_type, other.clone())
                    .ok_or_else(|| mismatch(&other))?;
                vec![coerced]
            }
        };
        return Ok(Value::List(items));
    }

    coerce_scalar(spec.arg_type, value.clone()).ok_or_else(|| mismatch(&value))
}

/// Scalar type check with the two tolerated casts: a numeric string for a
/// Number-only argument, and a number for a String-only argument.
fn coerce_scalar(arg_type: ArgType, value: Value) -> Option<Value> {
    if arg_type.accepts_scalar(&value) {
        return Some(value);
    }
    match value {
        Value::Str(s)
            if arg_type.contains(ArgType::NUMBER)
                && !arg_type.contains(ArgType::STRING) =>
        {
            s.trim().parse::<f64>().ok().map(Value::Number)
        }
        Value::Number(n)
            if arg_type.contains(ArgType::STRING)
                && !arg_type.contains(ArgType::NUMBER) =>
        {
            Some(Value::Str(format_number(n)))
        }
        _ => None,
    }
}

// ────────────────────────────────────────────────────────────────
// Raw parameter reader/writer
// ────────────────────────────────────────────────────────────────

/// Quote-aware whitespace split. Quoted segments may appear mid-token and
/// keep their inner whitespace; `\"` escapes inside double quotes.
pub fn split_parameters(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\n' => {
                if started {
                    tokens.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            '"' | '\'' => {
                started = true;
                while let Some(&inner) = chars.peek() {
                    chars.next();
                    if inner == '\\' {
                        if let Some(&esc) = chars.peek() {
                            if esc == c || esc == '\\' {
                                chars.next();
                                current.push(esc);
                                continue;
                            }
                        }
                        current.push('\\');
                        continue;
                    }
                    if inner == c {
                        break;
                    }
                    current.push(inner);
                }
            }
            _ => {
                started = true;
                current.push(c);
            }
        }
    }
    if started {
        tokens.push(current);
    }
    tokens
}

/// Whether a raw token parses as a number with an exact base-10 round-trip
/// (so `007` stays a string and `7` is a number).
fn is_numeric_token(token: &str) -> bool {
    token
        .parse::<f64>()
        .map(|n| format_number(n) == token)
        .unwrap_or(false)
}

/// Used to decide whether an optional positional spec may skip a token.
fn token_matches(arg_type: ArgType, token: &str) -> bool {
    if arg_type.contains(ArgType::ANY) {
        return true;
    }
    if arg_type.contains(ArgType::NUMBER) && is_numeric_token(token) {
        return true;
    }
    if arg_type.contains(ArgType::DICTIONARY) && token.trim_start().starts_with('{') {
        return true;
    }
    if arg_type.contains(ArgType::STRING) {
        return !is_numeric_token(token);
    }
    false
}

fn cast_token(
    command: &str,
    spec: &ArgumentSpec,
    token: &str,
) -> Result<Value, EvalError> {
    let scalar = |token: &str| -> Result<Value, EvalError> {
        if spec.arg_type.contains(ArgType::NUMBER) && is_numeric_token(token) {
            return Ok(Value::Number(token.parse::<f64>().unwrap_or(f64::NAN)));
        }
        if spec.arg_type.contains(ArgType::DICTIONARY) {
            let json: serde_json::Value = serde_json::from_str(token).map_err(|err| {
                EvalError::InvalidCommandArgumentFormat {
                    command: command.to_string(),
                    argument: spec.long.clone(),
                    expected: spec.arg_type.human(),
                    actual: format!("unparseable dictionary ({})", err),
                }
            })?;
            return Ok(Value::from_json(&json));
        }
        if spec.arg_type.contains(ArgType::STRING) || spec.arg_type.contains(ArgType::ANY) {
            return Ok(Value::Str(token.to_string()));
        }
        Err(EvalError::InvalidCommandArgumentFormat {
            command: command.to_string(),
            argument: spec.long.clone(),
            expected: spec.arg_type.human(),
            actual: format!("'{}'", token),
        })
    };

    if spec.arg_type.is_list() {
        let items = token
            .split(',')
            .map(|part| scalar(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::List(items));
    }
    scalar(token)
}

/// Bind a raw parameter string against specs: `--flag value` pairs first,
/// leftovers positionally in declared order. Optional specs skip tokens
/// that do not match their type; a trailing variadic spec slurps the rest.
pub fn read_parameters(
    command: &str,
    specs: &[ArgumentSpec],
    raw: &str,
) -> Result<BTreeMap<String, Value>, EvalError> {
    let tokens = split_parameters(raw);
    let mut out = BTreeMap::new();
    let mut positional_cursor = 0usize;
    let mut i = 0usize;
    while i < tokens.len() {
        let token = &tokens[i];
        let flag_name = token
            .strip_prefix("--")
            .or_else(|| token.strip_prefix('-').filter(|rest| !is_numeric_token(token) && rest.chars().next().map_or(false, |c| c.is_alphabetic())));
        let named_spec = flag_name
            .and_then(|name| specs.iter().find(|s| s.short == name || s.long == name));
        if flag_name.is_some() && named_spec.is_none() {
            // An unmatched flag token still feeds a trailing variadic spec.
            let variadic_pending = specs
                .iter()
                .any(|s| s.variadic && !out.contains_key(&s.result_key()));
            if !variadic_pending {
                return Err(EvalError::InvalidCommandArguments {
                    command: command.to_string(),
                    message: format!("unknown argument '{}'", token),
                });
            }
        }
        if let Some(spec) = named_spec {
            if spec.arg_type == ArgType::FLAG {
                out.insert(spec.result_key(), Value::Bool(true));
                i += 1;
                continue;
            }
            let value = tokens.get(i + 1).ok_or_else(|| {
                EvalError::InvalidCommandArguments {
                    command: command.to_string(),
                    message: format!("argument '{}' expects a value", token),
                }
            })?;
            out.insert(spec.result_key(), cast_token(command, spec, value)?);
            i += 2;
            continue;
        }

        // Positional: next unbound spec in declared order.
        let mut bound = false;
        while positional_cursor < specs.len() {
            let spec = &specs[positional_cursor];
            if out.contains_key(&spec.result_key()) {
                positional_cursor += 1;
                continue;
            }
            if spec.variadic {
                let rest: Vec<Value> = tokens[i..]
                    .iter()
                    .map(|t| Value::Str(t.clone()))
                    .collect();
                out.insert(spec.result_key(), Value::List(rest));
                return finish_defaults(command, specs, out);
            }
            if !spec.required && !token_matches(spec.arg_type, token) {
                positional_cursor += 1;
                continue;
            }
            out.insert(spec.result_key(), cast_token(command, spec, token)?);
            positional_cursor += 1;
            bound = true;
            break;
        }
        if !bound {
            return Err(EvalError::InvalidCommandArguments {
                command: command.to_string(),
                message: format!("too many arguments near '{}'", token),
            });
        }
        i += 1;
    }
    finish_defaults(command, specs, out)
}

fn finish_defaults(
    command: &str,
    specs: &[ArgumentSpec],
    mut out: BTreeMap<String, Value>,
) -> Result<BTreeMap<String, Value>, EvalError> {
    for spec in specs {
        let key = spec.result_key();
        if out.contains_key(&key) {
            continue;
        }
        if let Some(default) = &spec.default {
            out.insert(key, default.clone());
        } else if spec.required {
            return Err(EvalError::InvalidCommandArguments {
                command: command.to_string(),
                message: format!("missing required argument '--{}'", spec.long),
            });
        }
    }
    Ok(out)
}

/// Render a value back into a single raw token, quoting when needed so
/// `split_parameters` reads it back verbatim.
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::Str(s) => quote_token(s),
        Value::Number(n) => format_number(*n),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::List(items) => {
            let joined = items
                .iter()
                .map(|v| match v {
                    Value::Str(s) => s.clone(),
                    other => encode_value(other),
                })
                .collect::<Vec<_>>()
                .join(",");
            quote_token(&joined)
        }
        Value::Dict(_) => quote_token(&value.to_json().to_string()),
    }
}

fn quote_token(token: &str) -> String {
    let needs_quotes = token.is_empty()
        || token.starts_with('-')
        || token
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\'');
    if !needs_quotes {
        return token.to_string();
    }
    let mut quoted = String::with_capacity(token.len() + 2);
    quoted.push('"');
    for c in token.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Reconstruct a raw parameter string from formatted kwargs such that
/// `read_parameters(specs, stringify(x)) == x`.
pub fn stringify(kwargs: &BTreeMap<String, Value>, specs: &[ArgumentSpec]) -> String {
    let mut parts = Vec::new();
    for spec in specs {
        let Some(value) = kwargs.get(&spec.result_key()) else {
            continue;
        };
        if spec.arg_type == ArgType::FLAG {
            if matches!(value, Value::Bool(true)) {
                parts.push(format!("--{}", spec.long));
            }
            continue;
        }
        parts.push(format!("--{}", spec.long));
        parts.push(encode_value(value));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn specs() -> Vec<ArgumentSpec> {
        vec![
            ArgumentSpec::new(ArgType::STRING, "m", "model").required(),
            ArgumentSpec::new(ArgType::NUMBER, "l", "limit").default_value(Value::Number(80.0)),
            ArgumentSpec::new(ArgType::STRING | ArgType::LIST, "f", "fields"),
            ArgumentSpec::new(ArgType::FLAG, "a", "all"),
        ]
    }

    #[test]
    fn short_names_become_long_with_underscores() {
        let specs = vec![ArgumentSpec::new(ArgType::NUMBER, "i", "record-id").required()];
        let kwargs = BTreeMap::from([("i".to_string(), Value::Number(3.0))]);
        let out = validate_and_format("read", &specs, kwargs).unwrap();
        assert_eq!(out.get("record_id"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn defaults_and_required() {
        let kwargs = BTreeMap::from([("m".to_string(), Value::Str("res.partner".into()))]);
        let out = validate_and_format("search", &specs(), kwargs).unwrap();
        assert_eq!(out.get("limit"), Some(&Value::Number(80.0)));
        assert!(!out.contains_key("all"));

        let err = validate_and_format("search", &specs(), BTreeMap::new()).unwrap_err();
        assert!(matches!(err, EvalError::InvalidCommandArguments { .. }));
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let kwargs = BTreeMap::from([("nope".to_string(), Value::Number(1.0))]);
        assert!(matches!(
            validate_and_format("search", &specs(), kwargs),
            Err(EvalError::InvalidCommandArguments { .. })
        ));
    }

    #[test]
    fn list_accepts_comma_separated_string() {
        let kwargs = BTreeMap::from([
            ("m".to_string(), Value::Str("res.partner".into())),
            ("f".to_string(), Value::Str("id, name".into())),
        ]);
        let out = validate_and_format("search", &specs(), kwargs).unwrap();
        assert_eq!(
            out.get("fields"),
            Some(&Value::List(vec![
                Value::Str("id".into()),
                Value::Str("name".into())
            ]))
        );
    }

    #[test]
    fn scalar_list_value_is_wrapped() {
        let specs = vec![ArgumentSpec::new(ArgType::NUMBER | ArgType::LIST, "i", "ids")];
        let kwargs = BTreeMap::from([("ids".to_string(), Value::Number(4.0))]);
        let out = validate_and_format("unlink", &specs, kwargs).unwrap();
        assert_eq!(out.get("ids"), Some(&Value::List(vec![Value::Number(4.0)])));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let kwargs = BTreeMap::from([
            ("m".to_string(), Value::Str("res.partner".into())),
            ("l".to_string(), Value::Dict(BTreeMap::new())),
        ]);
        let err = validate_and_format("search", &specs(), kwargs).unwrap_err();
        assert!(matches!(
            err,
            EvalError::InvalidCommandArgumentFormat { .. }
        ));
    }

    #[test]
    fn strict_values_are_enforced() {
        let specs = vec![ArgumentSpec::new(ArgType::STRING, "t", "type")
            .strict(vec![Value::Str("int".into()), Value::Str("str".into())])];
        let ok = BTreeMap::from([("t".to_string(), Value::Str("int".into()))]);
        assert!(validate_and_format("gen", &specs, ok).is_ok());
        let bad = BTreeMap::from([("t".to_string(), Value::Str("float64".into()))]);
        assert!(matches!(
            validate_and_format("gen", &specs, bad),
            Err(EvalError::InvalidCommandArgumentValue { .. })
        ));
    }

    #[test]
    fn split_honors_quotes() {
        assert_eq!(
            split_parameters(r#"write -m res.partner -v "Mr. Sam" 'x y'"#),
            vec!["write", "-m", "res.partner", "-v", "Mr. Sam", "x y"]
        );
    }

    #[test]
    fn split_handles_escaped_quotes() {
        assert_eq!(split_parameters(r#""say \"hi\"""#), vec![r#"say "hi""#]);
    }

    #[test]
    fn reader_binds_flags_and_positionals() {
        let out = read_parameters("search", &specs(), "res.partner --limit 5 -a").unwrap();
        assert_eq!(out.get("model"), Some(&Value::Str("res.partner".into())));
        assert_eq!(out.get("limit"), Some(&Value::Number(5.0)));
        assert_eq!(out.get("all"), Some(&Value::Bool(true)));
    }

    #[test]
    fn optional_spec_skips_on_type_mismatch() {
        let specs = vec![
            ArgumentSpec::new(ArgType::NUMBER, "n", "count"),
            ArgumentSpec::new(ArgType::STRING, "t", "text").required(),
        ];
        // "hello" is not a number, so it falls through to --text.
        let out = read_parameters("repeat", &specs, "hello").unwrap();
        assert_eq!(out.get("text"), Some(&Value::Str("hello".into())));
        assert!(!out.contains_key("count"));
    }

    #[test]
    fn variadic_slurps_the_rest() {
        let specs = vec![
            ArgumentSpec::new(ArgType::STRING, "c", "command").required(),
            ArgumentSpec::new(ArgType::STRING | ArgType::LIST, "x", "extra").variadic(),
        ];
        let out = read_parameters("chrono", &specs, "gen -mi 1 -ma 9").unwrap();
        assert_eq!(out.get("command"), Some(&Value::Str("gen".into())));
        assert_eq!(
            out.get("extra"),
            Some(&Value::List(vec![
                Value::Str("-mi".into()),
                Value::Str("1".into()),
                Value::Str("-ma".into()),
                Value::Str("9".into()),
            ]))
        );
    }

    #[test]
    fn dictionary_token_parses_json() {
        let specs = vec![ArgumentSpec::new(ArgType::DICTIONARY, "v", "values").required()];
        let out = read_parameters("write", &specs, r#"'{"name": "Sam", "age": 3}'"#).unwrap();
        let Some(Value::Dict(dict)) = out.get("values") else {
            panic!("expected a dictionary");
        };
        assert_eq!(dict.get("name"), Some(&Value::Str("Sam".into())));
        assert_eq!(dict.get("age"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn stringify_round_trips() {
        let specs = specs();
        let kwargs = BTreeMap::from([
            ("model".to_string(), Value::Str("res.partner".into())),
            ("limit".to_string(), Value::Number(5.0)),
            (
                "fields".to_string(),
                Value::List(vec![Value::Str("id".into()), Value::Str("name".into())]),
            ),
            ("all".to_string(), Value::Bool(true)),
        ]);
        let raw = stringify(&kwargs, &specs);
        let back = read_parameters("search", &specs, &raw).unwrap();
        assert_eq!(back, kwargs);
    }

    #[test]
    fn stringify_quotes_whitespace() {
        let specs = vec![ArgumentSpec::new(ArgType::STRING, "v", "value").required()];
        let kwargs = BTreeMap::from([("value".to_string(), Value::Str("Mr. Sam".into()))]);
        let raw = stringify(&kwargs, &specs);
        assert_eq!(raw, r#"--value "Mr. Sam""#);
        assert_eq!(read_parameters("write", &specs, &raw).unwrap(), kwargs);
    }

    #[test]
    fn numeric_round_trip_rule() {
        assert!(is_numeric_token("42"));
        assert!(is_numeric_token("-1.5"));
        assert!(!is_numeric_token("007"));
        assert!(!is_numeric_token("1e3"));
    }
}
