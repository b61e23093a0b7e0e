//! Diagnostic reporting infrastructure shared by the scanner and compiler.
//!
//! Unlike a multi-file compiler's span-tracking diagnostics, this language
//! compiles one source buffer per [`tansy_runtime::interpret`] call, so a
//! diagnostic only needs to carry a line number, not a byte-range span.

use std::cell::RefCell;
use std::fmt;

/// Severity of a [`Diagnostic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// A compile-time error; compilation cannot succeed.
    Error,
    /// A runtime error; execution has unwound the call stack.
    Runtime,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Runtime => write!(f, "runtime error"),
        }
    }
}

/// A single reported problem, tied to a source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub line: u32,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] {}: {}", self.line, self.level, self.message)
    }
}

/// Accumulates diagnostics during a single compile.
///
/// The compiler consults [`Handler::had_error`] rather than bailing out on
/// the first diagnostic, mirroring the source's panic-mode error recovery:
/// many syntax errors can be collected and reported together.
#[derive(Default)]
pub struct Handler {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl Handler {
    pub fn new() -> Self {
        Self { diagnostics: RefCell::new(Vec::new()) }
    }

    pub fn error(&self, message: impl Into<String>, line: u32) {
        self.diagnostics.borrow_mut().push(Diagnostic {
            level: Level::Error,
            message: message.into(),
            line,
        });
    }

    pub fn had_error(&self) -> bool {
        !self.diagnostics.borrow().is_empty()
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_no_errors() {
        let handler = Handler::new();
        assert!(!handler.had_error());
    }

    #[test]
    fn error_sets_had_error() {
        let handler = Handler::new();
        handler.error("bad token", 3);
        assert!(handler.had_error());
        let diags = handler.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 3);
    }

    #[test]
    fn take_diagnostics_drains() {
        let handler = Handler::new();
        handler.error("one", 1);
        handler.error("two", 2);
        assert_eq!(handler.take_diagnostics().len(), 2);
        assert!(handler.take_diagnostics().is_empty());
    }

    #[test]
    fn display_format() {
        let d = Diagnostic { level: Level::Error, message: "oops".into(), line: 7 };
        assert_eq!(format!("{d}"), "[line 7] error: oops");
    }
}
