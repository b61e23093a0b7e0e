//! The thiserror-derived error boundary this crate reports through (§7),
//! matching the teacher's per-crate `thiserror` enum pattern
//! (`faxc-util::error`).

use thiserror::Error;

/// A runtime fault (§4.6, §7): the message bound for the error stream,
/// raised by an opcode handler and carried via `?` until `Vm::interpret`
/// unwinds the call-frame stack. `trace` is filled in at that unwind
/// point with one `[line L] in <fn>` entry per live frame, innermost
/// first, matching the source's single `runtimeError` call site.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    pub trace: Vec<String>,
}

impl RuntimeError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), trace: Vec::new() }
    }
}
