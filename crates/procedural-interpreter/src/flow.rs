//! Control flow for the interpreter.
//!
//! Every evaluation step returns [`Exec<T>`]. The normal result travels in
//! `Ok`; anything that has to skip the normal completion of the frames above
//! it travels in `Err` as an [`Unwind`], so `?` carries it upward without the
//! intervening frames inspecting it.
//!
//! A `return` produces a [`ReturnSignal`]: exactly one of five value kinds,
//! stored inline. Only the call dispatcher consumes it, through
//! [`catch_return`]. Language-level errors share the channel but not the
//! variant, and [`catch_error`] intercepts errors only.

use std::fmt;

use procedural_syntax::error::Error;

use crate::value::{ObjRef, Value};

/// The tag of a [`ReturnSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    Reference,
    Integer,
    Float,
    Boolean,
    Unit,
}

impl ReturnKind {
    pub const ALL: [ReturnKind; 5] = [
        ReturnKind::Reference,
        ReturnKind::Integer,
        ReturnKind::Float,
        ReturnKind::Boolean,
        ReturnKind::Unit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReturnKind::Reference => "reference",
            ReturnKind::Integer => "integer",
            ReturnKind::Float => "float",
            ReturnKind::Boolean => "boolean",
            ReturnKind::Unit => "unit",
        }
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value carried out of a function by an explicit `return`.
///
/// Built once when the returned expression has been evaluated, consumed once
/// by the nearest enclosing call dispatcher. The payload is fixed at
/// construction; there are no setters.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnSignal {
    /// Handle to a heap object. The signal does not own the object.
    Reference(ObjRef),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// `return` without an operand.
    Unit,
}

impl ReturnSignal {
    pub fn reference(handle: ObjRef) -> Self {
        ReturnSignal::Reference(handle)
    }

    pub fn integer(n: i64) -> Self {
        ReturnSignal::Integer(n)
    }

    pub fn float(x: f64) -> Self {
        ReturnSignal::Float(x)
    }

    pub fn boolean(b: bool) -> Self {
        ReturnSignal::Boolean(b)
    }

    pub fn unit() -> Self {
        ReturnSignal::Unit
    }

    pub fn kind(&self) -> ReturnKind {
        match self {
            ReturnSignal::Reference(_) => ReturnKind::Reference,
            ReturnSignal::Integer(_) => ReturnKind::Integer,
            ReturnSignal::Float(_) => ReturnKind::Float,
            ReturnSignal::Boolean(_) => ReturnKind::Boolean,
            ReturnSignal::Unit => ReturnKind::Unit,
        }
    }

    /// Converts to the interpreter's uniform value representation. Done by the
    /// dispatcher at the call boundary, never while the signal is in flight.
    pub fn into_value(self) -> Value {
        match self {
            ReturnSignal::Reference(r) => Value::Ref(r),
            ReturnSignal::Integer(n) => Value::Int(n),
            ReturnSignal::Float(x) => Value::Float(x),
            ReturnSignal::Boolean(b) => Value::Bool(b),
            ReturnSignal::Unit => Value::Unit,
        }
    }
}

impl From<Value> for ReturnSignal {
    fn from(v: Value) -> Self {
        match v {
            Value::Ref(r) => ReturnSignal::Reference(r),
            Value::Int(n) => ReturnSignal::Integer(n),
            Value::Float(x) => ReturnSignal::Float(x),
            Value::Bool(b) => ReturnSignal::Boolean(b),
            Value::Unit => ReturnSignal::Unit,
        }
    }
}

impl From<ReturnSignal> for Value {
    fn from(signal: ReturnSignal) -> Self {
        signal.into_value()
    }
}

/// Anything that abandons the normal completion of the frames it passes.
#[derive(Debug, Clone, PartialEq)]
pub enum Unwind {
    /// Explicit `return`; caught by the innermost call dispatcher.
    Return(ReturnSignal),
    /// `break`; caught by the innermost loop.
    Break,
    /// `continue`; caught by the innermost loop.
    Continue,
    /// A language-level error; caught by `try` or reported to the embedder.
    Error(Error),
}

impl From<Error> for Unwind {
    fn from(e: Error) -> Self {
        Unwind::Error(e)
    }
}

impl From<ReturnSignal> for Unwind {
    fn from(signal: ReturnSignal) -> Self {
        Unwind::Return(signal)
    }
}

impl Unwind {
    /// Converts an unwind that reached a boundary it may not cross into the
    /// error describing the evaluator defect.
    pub fn into_escape_error(self) -> Error {
        match self {
            Unwind::Return(_) => Error::ReturnOutsideFunction,
            Unwind::Break => Error::BreakOutsideLoop,
            Unwind::Continue => Error::ContinueOutsideLoop,
            Unwind::Error(e) => e,
        }
    }
}

pub type Exec<T> = std::result::Result<T, Unwind>;

/// How a function body finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// An explicit `return` was caught.
    Returned(ReturnSignal),
    /// The body ran to its end; the value is the last evaluated statement's.
    FellThrough(Value),
}

impl Completion {
    pub fn into_value(self) -> Value {
        match self {
            Completion::Returned(signal) => signal.into_value(),
            Completion::FellThrough(v) => v,
        }
    }
}

/// Call-boundary catch point: takes the return signal out of the unwind
/// channel and lets every other unwind continue.
pub fn catch_return(outcome: Exec<Value>) -> Exec<Completion> {
    match outcome {
        Ok(v) => Ok(Completion::FellThrough(v)),
        Err(Unwind::Return(signal)) => Ok(Completion::Returned(signal)),
        Err(other) => Err(other),
    }
}

/// Error catch point for `try`: yields `Ok(Err(e))` for a language-level
/// error and re-propagates returns, breaks and continues untouched.
pub fn catch_error<T>(outcome: Exec<T>) -> Exec<Result<T, Error>> {
    match outcome {
        Ok(v) => Ok(Ok(v)),
        Err(Unwind::Error(e)) => Ok(Err(e)),
        Err(other) => Err(other),
    }
}
