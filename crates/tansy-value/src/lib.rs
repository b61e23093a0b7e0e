//! The value model shared by the compiler and the runtime: the tagged
//! [`Value`] union, the heap [`Object`] variants and their arena, the
//! bytecode [`chunk::Chunk`]/[`chunk::OpCode`] container, and the
//! open-addressed [`table::Table`] used for globals and string interning.

pub mod chunk;
pub mod heap;
pub mod object;
pub mod table;
pub mod value;

pub use chunk::{Chunk, OpCode, MAX_CONSTANTS};
pub use heap::Heap;
pub use object::{
    fnv1a_32, ErrorKind, NativeContext, NativeFail, NativeFn, NativeResult, Object, ObjFError,
    ObjFileHandle, ObjFunction, ObjNative, ObjRef, ObjString, ObjUserArray, ObjUserHash,
};
pub use table::Table;
pub use value::{format_number, Value};
