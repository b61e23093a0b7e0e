//! The single-pass Pratt-precedence compiler (§4.2): turns a source buffer
//! directly into bytecode for an `ObjFunction`, with no intermediate AST.

pub mod compiler;
pub mod error;
pub mod local;
pub mod precedence;
pub mod rules;

#[cfg(feature = "disassemble")]
pub mod disassemble;

pub use compiler::Compiler;
pub use error::CompileError;
pub use local::{CompilerState, FunctionType, Local};
pub use precedence::Precedence;

use tansy_util::Handler;
use tansy_value::{Heap, ObjRef, Table};

/// Compiles `source` as the implicit top-level script function, starting
/// line numbering at `start_line`. Returns every diagnostic collected
/// during the compile (§4.2's panic-mode recovery may gather more than
/// one) wrapped in a [`CompileError`] if compilation failed.
pub fn compile(
    source: &str,
    start_line: u32,
    handler: &mut Handler,
    heap: &mut Heap,
    strings: &mut Table,
) -> Result<ObjRef, CompileError> {
    match Compiler::new(source, start_line, handler, heap, strings).compile() {
        Some(function_ref) => Ok(function_ref),
        None => Err(CompileError { diagnostics: handler.take_diagnostics() }),
    }
}
