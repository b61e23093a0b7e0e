//! The thiserror-derived error boundary this crate hands back to callers
//! (§7), matching the teacher's per-crate `thiserror` enum pattern
//! (`faxc-util::error`).

use tansy_util::Diagnostic;
use thiserror::Error;

/// Returned by [`crate::compile`] when one or more compile errors were
/// recorded (§4.2's "no function" outcome). Carries every diagnostic
/// panic-mode recovery collected during the compile, not just the first.
#[derive(Debug, Error)]
#[error("compilation failed with {} error(s)", .diagnostics.len())]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}
