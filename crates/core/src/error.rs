//! Value-level errors
//!
//! These are contract violations on a single holder: reading a type other
//! than the one stored, or reading before anything was stored. They surface
//! immediately to the caller of `retrieve` and are never swallowed.

use crate::value::ValueType;

/// Error raised when reading a [`TaggedValue`](crate::TaggedValue)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The holder stores a different type than the one requested
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },
    /// The holder was never populated (or was cleared)
    EmptyValue,
}

impl std::fmt::Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueError::TypeMismatch { expected, found } => {
                write!(f, "Incorrect stored type: expected {}, found {}", expected, found)
            }
            ValueError::EmptyValue => write!(f, "No value stored"),
        }
    }
}

impl std::error::Error for ValueError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ValueError::TypeMismatch {
            expected: ValueType::Integer,
            found: ValueType::String,
        };
        assert_eq!(
            err.to_string(),
            "Incorrect stored type: expected integer, found string"
        );
        assert_eq!(ValueError::EmptyValue.to_string(), "No value stored");
    }
}
