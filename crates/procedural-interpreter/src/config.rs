//! Interpreter configuration.
//!
//! Defines evaluation limits only; the interpreter enforces them.

/// Evaluation limits for an [`Interpreter`](crate::Interpreter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Maximum nesting of user function calls (recursion limit)
    pub max_call_depth: usize,

    /// Maximum iterations of a single loop; `None` is unlimited
    pub max_loop_iterations: Option<u64>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_call_depth: 64,
            max_loop_iterations: None,
        }
    }
}

impl InterpreterConfig {
    /// Create a new configuration with default limits
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_loop_iterations(mut self, limit: u64) -> Self {
        self.max_loop_iterations = Some(limit);
        self
    }
}
