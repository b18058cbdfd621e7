use std::fmt;

use thiserror::Error;

use crate::value::Value;

/// Result type used across the TableScript runtime.
pub type ScriptResult<T> = std::result::Result<T, Interrupt>;

/// Errors raised by the dispatcher and registry.
///
/// These always propagate to the nearest macro-invocation boundary and
/// terminate that macro's run with a visible message; the dispatcher
/// never swallows one.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScriptError {
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("'{name}' requires at least {min} parameter(s); {got} were provided")]
    NotEnoughArguments { name: String, min: usize, got: usize },
    #[error("'{name}' accepts at most {max} parameter(s); {got} were provided")]
    TooManyArguments { name: String, max: usize, got: usize },
    #[error("argument {index} to '{name}' must be a {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("you do not have permission to call '{0}'")]
    PermissionDenied(String),
    #[error("no previous definition exists for function '{0}'")]
    NoShadowedDefinition(String),
    #[error("maximum macro recursion depth of {0} exceeded")]
    RecursionLimitExceeded(usize),
    #[error("cannot assign to constant '{0}'")]
    CannotAssignConstant(String),
    #[error("{0}")]
    Internal(String),
}

/// Non-local control transfer raised by `abort` / `assert` / `return`.
///
/// A signal unwinds the execution context stack exactly like an error
/// but may be intercepted at a user-defined-call boundary whose caller
/// scope sets the matching catch variable. `Return` has no catch
/// variable; it is always consumed by the nearest enclosing
/// user-defined-function invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Abort(String),
    Assert(String),
    Return(Option<Value>),
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Abort(msg) => write!(f, "{msg}"),
            Signal::Assert(msg) => write!(f, "{msg}"),
            Signal::Return(Some(value)) => write!(f, "return {value}"),
            Signal::Return(None) => write!(f, "return"),
        }
    }
}

/// Either an ordinary error or a control-flow signal.
///
/// Every dispatch step returns `Result<_, Interrupt>` so both kinds of
/// unwinding share one propagation path through `?`.
#[derive(Debug, Clone, PartialEq)]
pub enum Interrupt {
    Error(ScriptError),
    Signal(Signal),
}

impl Interrupt {
    /// The user-facing message carried by this interrupt.
    pub fn message(&self) -> String {
        match self {
            Interrupt::Error(err) => err.to_string(),
            Interrupt::Signal(signal) => signal.to_string(),
        }
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, Interrupt::Signal(_))
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl From<ScriptError> for Interrupt {
    fn from(value: ScriptError) -> Self {
        Interrupt::Error(value)
    }
}

impl From<Signal> for Interrupt {
    fn from(value: Signal) -> Self {
        Interrupt::Signal(value)
    }
}
