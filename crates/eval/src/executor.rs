use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use trash_core::Value;

use crate::registry::CommandDefinition;
use crate::session::Session;

/// Everything a command implementation receives: validated kwargs, the
/// resolved definition, and the session so it can read or write variables.
#[derive(Clone)]
pub struct CommandJob {
    /// Source text of the evaluation the call belongs to.
    pub raw: String,
    pub name: String,
    pub def: Arc<CommandDefinition>,
    pub kwargs: BTreeMap<String, Value>,
    /// Result printing suppressed (nested call or silent evaluation).
    pub silent: bool,
    pub session: Session,
}

impl CommandJob {
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }
}

pub type CommandFuture = Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>;
pub type CommandCallback = Arc<dyn Fn(CommandJob) -> CommandFuture + Send + Sync>;

/// Dispatch seam between the VM and command implementations. The default
/// [`CallbackExecutor`] runs the definition's own callback; embedders can
/// substitute transports of their own.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, job: CommandJob) -> Result<Value, String>;
}

#[derive(Debug, Default)]
pub struct CallbackExecutor;

#[async_trait]
impl CommandExecutor for CallbackExecutor {
    async fn execute(&self, job: CommandJob) -> Result<Value, String> {
        let callback = job.def.callback.clone();
        callback(job).await
    }
}
