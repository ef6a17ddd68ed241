//! Error taxonomy and recovery classification.
//!
//! Errors are values, not exceptions: every fallible operation in
//! `joy-core`/`joy-runtime` returns `Result<T, JoyError>` and the
//! evaluator loop short-circuits on `Err`, replacing the reference
//! implementation's `setjmp`/`longjmp` error jump (`spec.md` §9).

use std::fmt;
use std::sync::Arc;

/// Stable result code exposed at the embedding boundary. Numeric values
/// are part of the ABI contract mirrored in `joy-embed`; do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum JoyErrorKind {
    Ok = 0,
    Syntax = 1,
    Runtime = 2,
    Type = 3,
    StackUnderflow = 4,
    OutOfMemory = 5,
    Io = 6,
    Quit = 7,
    Abort = 8,
}

impl JoyErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JoyErrorKind::Ok => "OK",
            JoyErrorKind::Syntax => "SYNTAX",
            JoyErrorKind::Runtime => "RUNTIME",
            JoyErrorKind::Type => "TYPE",
            JoyErrorKind::StackUnderflow => "STACK_UNDERFLOW",
            JoyErrorKind::OutOfMemory => "OUT_OF_MEMORY",
            JoyErrorKind::Io => "IO",
            JoyErrorKind::Quit => "QUIT",
            JoyErrorKind::Abort => "ABORT",
        }
    }
}

/// How the evaluation entry point should respond to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The REPL discards the rest of the offending phrase and continues.
    Retry,
    /// Terminal: propagates to the embedder.
    Quit,
}

/// A captured runtime error: kind, message, and the source position if
/// known (line/column default to 0 when not applicable, e.g. a type
/// error raised mid-evaluation with no active scanner position).
#[derive(Debug, Clone)]
pub struct JoyError {
    pub kind: JoyErrorKind,
    pub message: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl JoyError {
    pub fn new(kind: JoyErrorKind, message: impl Into<Arc<str>>) -> Self {
        JoyError {
            kind,
            message: message.into(),
            line: 0,
            column: 0,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn syntax(message: impl Into<Arc<str>>) -> Self {
        Self::new(JoyErrorKind::Syntax, message)
    }

    pub fn runtime(message: impl Into<Arc<str>>) -> Self {
        Self::new(JoyErrorKind::Runtime, message)
    }

    pub fn type_error(message: impl Into<Arc<str>>) -> Self {
        Self::new(JoyErrorKind::Type, message)
    }

    pub fn stack_underflow(factor: &str) -> Self {
        Self::new(
            JoyErrorKind::StackUnderflow,
            format!("stack underflow in {factor}"),
        )
    }

    pub fn io(message: impl Into<Arc<str>>) -> Self {
        Self::new(JoyErrorKind::Io, message)
    }

    pub fn out_of_memory() -> Self {
        Self::new(JoyErrorKind::OutOfMemory, "heap exhausted")
    }

    pub fn quit() -> Self {
        Self::new(JoyErrorKind::Quit, "quit")
    }

    pub fn abort(message: impl Into<Arc<str>>) -> Self {
        Self::new(JoyErrorKind::Abort, message)
    }

    /// Maps an error to the recovery the evaluation entry point takes.
    /// Memory growth failures always behave as QUIT-equivalent
    /// (`spec.md` §4.2 "Failure semantics").
    pub fn recovery(&self) -> Recovery {
        match self.kind {
            JoyErrorKind::OutOfMemory | JoyErrorKind::Quit | JoyErrorKind::Abort => {
                Recovery::Quit
            }
            _ => Recovery::Retry,
        }
    }
}

impl fmt::Display for JoyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for JoyError {}

pub type JoyResult<T> = Result<T, JoyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_memory_is_quit_equivalent() {
        assert_eq!(JoyError::out_of_memory().recovery(), Recovery::Quit);
    }

    #[test]
    fn runtime_error_retries() {
        let err = JoyError::runtime("division by zero");
        assert_eq!(err.recovery(), Recovery::Retry);
        assert_eq!(err.kind, JoyErrorKind::Runtime);
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = JoyError::type_error("expected integer");
        assert_eq!(err.to_string(), "TYPE: expected integer");
    }
}
