//! TraSH virtual machine and command runtime.
//!
//! [`Machine`] executes the instruction stream produced by `trash-core`,
//! resolving command names through a [`CommandRegistry`], validating typed
//! arguments, expanding user aliases, and dispatching calls through a
//! pluggable [`CommandExecutor`]. Variable state between evaluations lives
//! in a [`Session`].

pub mod alias;
pub mod argument;
pub mod error;
pub mod executor;
pub mod frame;
pub mod machine;
pub mod registry;
pub mod session;

pub use alias::{expand_alias, AliasStore, MemoryAliases};
pub use argument::{
    read_parameters, split_parameters, stringify, validate_and_format, ArgType, ArgumentSpec,
};
pub use error::EvalError;
pub use executor::{CallbackExecutor, CommandCallback, CommandExecutor, CommandFuture, CommandJob};
pub use frame::Frame;
pub use machine::{EvalOptions, Machine};
pub use registry::{CommandDefinition, CommandRegistry, OptionsProvider};
pub use session::Session;
