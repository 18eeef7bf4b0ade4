//! Error types shared by the Procedural language crates.
//!
//! Every language-level failure raised while evaluating a program is an
//! [`Error`]. Errors are ordinary values: the evaluator lifts them into its
//! unwind channel next to (but never confused with) return, break and continue
//! signals, so a `try`/`catch` handler that intercepts errors cannot swallow a
//! return.
//!
//! # Examples
//!
//! ```rust
//! use procedural_syntax::error::{Error, Result};
//!
//! fn lookup(name: &str) -> Result<i64> {
//!     Err(Error::UndefinedVariable { name: name.to_string() })
//! }
//!
//! let err = lookup("x").unwrap_err();
//! assert_eq!(err.to_string(), "Undefined variable 'x'");
//! ```

use thiserror::Error;

/// An error raised while evaluating a Procedural program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String },

    #[error("Undefined function '{name}'")]
    UndefinedFunction { name: String },

    #[error("Assignment to undefined variable '{name}'")]
    AssignToUndefined { name: String },

    #[error("Type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("Function '{name}' expected {expected} args, got {received}")]
    ArityMismatch {
        name: String,
        expected: usize,
        received: usize,
    },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    /// A handle that does not name a live heap object. Indicates an evaluator
    /// bookkeeping defect rather than a user mistake.
    #[error("dangling object reference #{handle}")]
    DanglingReference { handle: usize },

    #[error("maximum call depth of {limit} exceeded")]
    CallDepthExceeded { limit: usize },

    #[error("loop exceeded the configured limit of {limit} iterations")]
    LoopLimitExceeded { limit: u64 },

    /// Raised by the `throw` statement.
    #[error("{message}")]
    Thrown { message: String },

    #[error("'return' outside of function")]
    ReturnOutsideFunction,

    #[error("'break' outside of loop")]
    BreakOutsideLoop,

    #[error("'continue' outside of loop")]
    ContinueOutsideLoop,
}

impl Error {
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Error::TypeMismatch { message: message.into() }
    }

    pub fn thrown(message: impl Into<String>) -> Self {
        Error::Thrown { message: message.into() }
    }

    /// True for errors that signal a broken call-boundary bookkeeping in the
    /// evaluator; embedders should treat these as fatal.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::DanglingReference { .. }
                | Error::ReturnOutsideFunction
                | Error::BreakOutsideLoop
                | Error::ContinueOutsideLoop
        )
    }
}

/// A specialized `Result` type for Procedural operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_render_context() {
        let e = Error::ArityMismatch { name: "add".into(), expected: 2, received: 1 };
        assert_eq!(e.to_string(), "Function 'add' expected 2 args, got 1");
        assert_eq!(Error::thrown("boom").to_string(), "boom");
        assert_eq!(
            Error::IndexOutOfBounds { index: 10, len: 3 }.to_string(),
            "index 10 out of bounds for length 3"
        );
    }

    #[test]
    fn escaped_control_signals_are_internal() {
        assert!(Error::ReturnOutsideFunction.is_internal());
        assert!(Error::BreakOutsideLoop.is_internal());
        assert!(!Error::thrown("user").is_internal());
        assert!(!Error::DivisionByZero.is_internal());
    }
}
