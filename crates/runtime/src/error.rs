//! Runtime faults
//!
//! Every failure inside the runtime is a value of [`RuntimeError`]. A protected
//! call converts it into the error-slot string; nothing in the runtime panics
//! on bad script input.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Source text failed to parse
    Syntax(String),
    /// Raised by the `error` word
    Raised(String),
    /// An operation received a value of the wrong kind
    Type {
        op: String,
        expected: &'static str,
        found: &'static str,
    },
    /// An operation needed more values than the current frame holds
    StackUnderflow(String),
    UndefinedWord(String),
    NotCallable(&'static str),
    DivideByZero,
    /// Table key is nil, NaN, or otherwise unusable
    InvalidKey(&'static str),
    /// A stack index does not name a live slot
    InvalidIndex(i32),
    CallDepthExceeded(usize),
    /// A string result would exceed the runtime's size limit
    StringTooLong { op: String, limit: usize },
    /// Failure reported by a host function
    Host(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Syntax(msg) => write!(f, "syntax error: {}", msg),
            RuntimeError::Raised(msg) => write!(f, "{}", msg),
            RuntimeError::Type {
                op,
                expected,
                found,
            } => write!(f, "'{}' expected {}, got {}", op, expected, found),
            RuntimeError::StackUnderflow(op) => write!(f, "stack underflow in '{}'", op),
            RuntimeError::UndefinedWord(name) => write!(f, "undefined word '{}'", name),
            RuntimeError::NotCallable(kind) => write!(f, "attempt to call a {} value", kind),
            RuntimeError::DivideByZero => write!(f, "attempt to divide by zero"),
            RuntimeError::InvalidKey(kind) => write!(f, "table index is {}", kind),
            RuntimeError::InvalidIndex(idx) => write!(f, "invalid stack index {}", idx),
            RuntimeError::CallDepthExceeded(limit) => {
                write!(f, "call depth exceeded ({} frames)", limit)
            }
            RuntimeError::StringTooLong { op, limit } => {
                write!(f, "'{}' result exceeds {} bytes", op, limit)
            }
            RuntimeError::Host(msg) => write!(f, "host function failed: {}", msg),
        }
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raised_message_is_verbatim() {
        let err = RuntimeError::Raised("boom".to_string());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_type_error_names_operation() {
        let err = RuntimeError::Type {
            op: "+".to_string(),
            expected: "number",
            found: "string",
        };
        assert_eq!(err.to_string(), "'+' expected number, got string");
    }
}
