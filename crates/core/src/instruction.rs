/// A single VM operation. Operand-free opcodes read their inputs from the
/// value stack; the handful that need static data carry it inline.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Push the value bound to a name in the current frame store.
    LoadName { name: String },
    /// Resolve a command by name and open a call frame for its arguments.
    LoadGlobal { name: String },
    /// Push a literal.
    LoadConst { value: crate::Value },
    /// Bind the value on top of the call frame's stack to an argument
    /// name. Valueless flags get an explicit `true` pushed by the parser.
    LoadArg { name: String },
    /// Pop two values; numeric addition when both are numbers, string
    /// concatenation otherwise.
    Concat,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Pow,
    /// Arithmetic negation of the top of stack.
    Negate,
    /// Close the innermost call frame and invoke the command.
    CallFunction { silent: bool },
    /// End of statement: surface the statement's value.
    ReturnValue,
    /// Pop a value and bind it to a name in the active store.
    StoreName { name: String },
    /// Pop value, then key; write `store[name][key] = value` in place.
    StoreSubscr { name: String },
    /// Pop key, then container; push `container[key]`.
    LoadDataAttr,
    /// Pop `count` values (pushed in order) and build a list.
    BuildList { count: usize },
    /// Pop `count` key/value pairs and build a dictionary.
    BuildMap { count: usize },
    /// Open a frame for a parenthesized sub-expression that is not a call.
    PushFrame,
    /// Close it, propagating the frame's value to the enclosing stack.
    PopFrame,
}

/// An opcode plus where it came from: the nesting level it executes at and
/// the index of the source token that produced it, when one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: Op,
    pub level: usize,
    pub token_index: Option<usize>,
}

impl Instruction {
    pub fn new(op: Op, level: usize, token_index: Option<usize>) -> Self {
        Instruction { op, level, token_index }
    }
}
