//! The scanner: turns a source buffer into a lazy stream of [`Token`]s
//! (§4.1). Escape interpretation and quote trimming are deliberately not
//! done here -- that is the compiler's job (§4.2).

pub mod scanner;
pub mod token;

pub use scanner::Scanner;
pub use token::{Token, TokenKind};
