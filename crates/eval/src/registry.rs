//! Command registry: insertion-ordered definitions with alias lookup. A
//! definition starts from a default whose callback always fails, so a
//! half-built registration surfaces as a run-time error instead of a panic.

use std::collections::BTreeMap;
use std::sync::Arc;

use trash_core::{CommandCatalog, Value};

use crate::argument::ArgumentSpec;
use crate::executor::{CommandCallback, CommandJob};

/// Completion candidates for one argument of a command, consumed by
/// interactive frontends rather than the VM.
pub type OptionsProvider = Arc<dyn Fn(&str) -> Vec<Value> + Send + Sync>;

#[derive(Clone)]
pub struct CommandDefinition {
    pub name: String,
    /// One-line summary shown in listings.
    pub definition: String,
    pub detail: String,
    pub example: String,
    pub args: Vec<ArgumentSpec>,
    pub callback: CommandCallback,
    /// Candidates for an argument name, for completion UIs.
    pub options: Option<OptionsProvider>,
    pub aliases: Vec<String>,
    /// Result is never auto-printed.
    pub silent: bool,
    /// Output is safe to echo verbatim.
    pub sanitized: bool,
    /// Re-running the command produces different results.
    pub generates_randoms: bool,
}

impl std::fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("definition", &self.definition)
            .field("aliases", &self.aliases)
            .field("args", &self.args.len())
            .finish()
    }
}

fn unimplemented_callback(job: CommandJob) -> crate::executor::CommandFuture {
    Box::pin(async move { Err(format!("command '{}' is not implemented", job.name)) })
}

impl CommandDefinition {
    pub fn new(name: &str) -> Self {
        CommandDefinition {
            name: name.to_string(),
            definition: String::new(),
            detail: String::new(),
            example: String::new(),
            args: Vec::new(),
            callback: Arc::new(unimplemented_callback),
            options: None,
            aliases: Vec::new(),
            silent: false,
            sanitized: true,
            generates_randoms: false,
        }
    }

    pub fn definition(mut self, text: &str) -> Self {
        self.definition = text.to_string();
        self
    }

    pub fn detail(mut self, text: &str) -> Self {
        self.detail = text.to_string();
        self
    }

    pub fn example(mut self, text: &str) -> Self {
        self.example = text.to_string();
        self
    }

    pub fn arg(mut self, spec: ArgumentSpec) -> Self {
        self.args.push(spec);
        self
    }

    pub fn aliases(mut self, names: &[&str]) -> Self {
        self.aliases = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn unsanitized(mut self) -> Self {
        self.sanitized = false;
        self
    }

    pub fn generates_randoms(mut self) -> Self {
        self.generates_randoms = true;
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(CommandJob) -> crate::executor::CommandFuture + Send + Sync + 'static,
    {
        self.callback = Arc::new(callback);
        self
    }

    pub fn options_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&str) -> Vec<Value> + Send + Sync + 'static,
    {
        self.options = Some(Arc::new(provider));
        self
    }

    /// Completion candidates for `--argument`: the options provider first,
    /// otherwise the spec's strict value set.
    pub fn argument_options(&self, argument: &str) -> Vec<Value> {
        if let Some(provider) = &self.options {
            return provider(argument);
        }
        self.args
            .iter()
            .find(|s| s.short == argument || s.long == argument)
            .and_then(|s| s.strict_values.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct CommandRegistry {
    defs: Vec<Arc<CommandDefinition>>,
    /// Name and alias lookup into `defs`.
    index: BTreeMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        CommandRegistry::default()
    }

    /// Register a definition under its name and aliases. Re-registering a
    /// name replaces the earlier definition at its original position.
    pub fn register(&mut self, def: CommandDefinition) {
        let def = Arc::new(def);
        let pos = match self.index.get(&def.name) {
            Some(&existing) => {
                self.defs[existing] = def.clone();
                existing
            }
            None => {
                self.defs.push(def.clone());
                self.defs.len() - 1
            }
        };
        self.index.insert(def.name.clone(), pos);
        for alias in &def.aliases {
            self.index.insert(alias.clone(), pos);
        }
    }

    /// Resolve a name or definition alias.
    pub fn get(&self, name: &str) -> Option<Arc<CommandDefinition>> {
        self.index.get(name).map(|&i| self.defs[i].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CommandDefinition>> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl CommandCatalog for CommandRegistry {
    fn canonical_name(&self, name: &str) -> Option<String> {
        self.get(name).map(|def| def.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::ArgType;

    #[test]
    fn aliases_resolve_to_the_canonical_definition() {
        let mut reg = CommandRegistry::new();
        reg.register(CommandDefinition::new("websocket").aliases(&["ws"]));
        assert_eq!(reg.canonical_name("ws").as_deref(), Some("websocket"));
        assert_eq!(reg.get("ws").unwrap().name, "websocket");
        assert!(reg.canonical_name("nope").is_none());
    }

    #[test]
    fn iteration_keeps_registration_order() {
        let mut reg = CommandRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            reg.register(CommandDefinition::new(name));
        }
        let names: Vec<_> = reg.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn reregistration_replaces_in_place() {
        let mut reg = CommandRegistry::new();
        reg.register(CommandDefinition::new("gen"));
        reg.register(CommandDefinition::new("print"));
        reg.register(
            CommandDefinition::new("gen")
                .arg(ArgumentSpec::new(ArgType::NUMBER, "mi", "min")),
        );
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get("gen").unwrap().args.len(), 1);
    }

    #[test]
    fn argument_options_fall_back_to_strict_values() {
        let def = CommandDefinition::new("gen").arg(
            ArgumentSpec::new(ArgType::STRING, "t", "type")
                .strict(vec![Value::Str("int".into()), Value::Str("str".into())]),
        );
        assert_eq!(
            def.argument_options("t"),
            vec![Value::Str("int".into()), Value::Str("str".into())]
        );
        assert!(def.argument_options("nope").is_empty());

        let def = def.options_provider(|arg| match arg {
            "type" | "t" => vec![Value::Str("float".into())],
            _ => Vec::new(),
        });
        assert_eq!(def.argument_options("type"), vec![Value::Str("float".into())]);
    }

    #[tokio::test]
    async fn default_callback_fails() {
        use crate::executor::{CallbackExecutor, CommandExecutor, CommandJob};
        use crate::session::Session;

        let def = Arc::new(CommandDefinition::new("later"));
        let job = CommandJob {
            raw: "later".into(),
            name: "later".into(),
            def,
            kwargs: Default::default(),
            silent: false,
            session: Session::new(),
        };
        let err = CallbackExecutor.execute(job).await.unwrap_err();
        assert!(err.contains("not implemented"));
    }
}
