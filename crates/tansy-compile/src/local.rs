//! Per-function compiler state: the local-variable stack and the in-progress
//! [`Chunk`] a nested `fun` declaration builds before it is installed into
//! the heap as an `ObjFunction` (§4.2, §9's "compiler stack" redesign).

use tansy_value::Chunk;

/// Local-variable slots may not exceed this count per function (§4.2).
pub const MAX_LOCALS: usize = 256;

/// `depth == UNINITIALIZED` marks a local as declared but not yet
/// initialized, forbidding `var x = x;` from reading its own slot.
pub const UNINITIALIZED: i32 = -1;

#[derive(Clone, Debug)]
pub struct Local {
    pub name: String,
    pub depth: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionType {
    Script,
    Function,
}

/// One activation of the compiler, pushed when entering a `fun` body and
/// popped by `endCompiler`. The source chains these via an `enclosing`
/// pointer; a plain `Vec` with the current index as "top" is equivalent
/// and needs no unsafe aliasing (§9).
#[derive(Debug)]
pub struct CompilerState {
    pub function_type: FunctionType,
    pub function_name: Option<String>,
    pub arity: u8,
    pub chunk: Chunk,
    pub locals: Vec<Local>,
    pub scope_depth: i32,
}

impl CompilerState {
    pub fn new(function_type: FunctionType, function_name: Option<String>) -> Self {
        // Slot 0 is reserved for the callee itself (§4.6 CALL semantics),
        // matching the source's convention of seeding an empty-name local.
        let locals = vec![Local { name: String::new(), depth: 0 }];
        Self { function_type, function_name, arity: 0, chunk: Chunk::new(), locals, scope_depth: 0 }
    }
}
