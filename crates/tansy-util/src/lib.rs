//! Shared low-level utilities used across the compiler and runtime crates:
//! typed-index collections and the diagnostic/error-accumulation
//! infrastructure used by the scanner, compiler, and VM.

pub mod diagnostic;
pub mod index_vec;

pub use diagnostic::{Diagnostic, Handler, Level};
pub use index_vec::{Idx, IndexVec};
