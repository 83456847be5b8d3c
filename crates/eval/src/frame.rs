use std::collections::{BTreeMap, VecDeque};

use trash_core::Value;

/// One entry of the VM frame stack. A frame is opened either by LoadGlobal
/// (a call collecting its arguments) or by PushFrame (a parenthesized
/// sub-expression); in both cases `store` is a snapshot of the creating
/// scope cloned at frame creation, never a live reference.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Command name when this is a call frame.
    pub command: Option<String>,
    pub store: BTreeMap<String, Value>,
    /// Argument names queued by LoadArg, paired with `values` at call time.
    pub args: VecDeque<String>,
    /// The frame's value stack.
    pub values: Vec<Value>,
}

impl Frame {
    pub fn new(store: BTreeMap<String, Value>) -> Self {
        Frame {
            store,
            ..Frame::default()
        }
    }

    pub fn for_call(command: &str, store: BTreeMap<String, Value>) -> Self {
        Frame {
            command: Some(command.to_string()),
            store,
            ..Frame::default()
        }
    }
}
