//! Call-level errors
//!
//! Everything the `Script` facade and the marshal engine can report. Value
//! errors from the core crate convert in through `From`, so `?` works on
//! `retrieve` inside host callables.

use stackbind_core::{ValueError, ValueType};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ScriptError {
    /// The name is already a registered signature or a runtime global
    AlreadyRegistered(String),
    /// `invoke` on a name with no registered signature
    NotRegistered(String),
    /// Parse failure or fault while running a script's top-level code
    CompileFailure { chunk: String, message: String },
    /// Script file missing or unreadable
    ScriptNotFound {
        path: PathBuf,
        source: std::io::Error,
    },
    /// No script path was configured before `compile`
    NoScriptPath,
    /// The protected call faulted; `message` is the runtime's error text
    InvocationFailed { function: String, message: String },
    /// Declared return type does not match the value produced
    ReturnTypeMismatch {
        expected: ValueType,
        actual: String,
        /// 1-based position in the return list
        position: usize,
    },
    /// A host callable read an argument of the wrong kind
    ArgumentTypeMismatch {
        index: i32,
        expected: ValueType,
        actual: String,
    },
    /// A global holds a different kind than the one asked for
    GlobalTypeMismatch {
        name: String,
        expected: ValueType,
        actual: String,
    },
    /// The runtime rejected a stack operation while marshaling
    Marshal(String),
    UserDataMissing(String),
    Config(String),
    Value(ValueError),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::AlreadyRegistered(name) => {
                write!(f, "Function '{}' is already registered", name)
            }
            ScriptError::NotRegistered(name) => {
                write!(f, "Function '{}' is not registered", name)
            }
            ScriptError::CompileFailure { chunk, message } => {
                write!(f, "Failed to compile {}: {}", chunk, message)
            }
            ScriptError::ScriptNotFound { path, source } => {
                write!(f, "Script not found: {}: {}", path.display(), source)
            }
            ScriptError::NoScriptPath => write!(f, "No script path configured"),
            ScriptError::InvocationFailed { function, message } => {
                write!(f, "Call to '{}' failed: {}", function, message)
            }
            ScriptError::ReturnTypeMismatch {
                expected,
                actual,
                position,
            } => write!(
                f,
                "Return value {} has type {}, expected {}",
                position, actual, expected
            ),
            ScriptError::ArgumentTypeMismatch {
                index,
                expected,
                actual,
            } => write!(
                f,
                "Argument {} has type {}, expected {}",
                index, actual, expected
            ),
            ScriptError::GlobalTypeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "Global '{}' has type {}, expected {}",
                name, actual, expected
            ),
            ScriptError::Marshal(msg) => write!(f, "Marshal error: {}", msg),
            ScriptError::UserDataMissing(name) => {
                write!(f, "No user data registered as '{}'", name)
            }
            ScriptError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ScriptError::Value(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScriptError::ScriptNotFound { source, .. } => Some(source),
            ScriptError::Value(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValueError> for ScriptError {
    fn from(e: ValueError) -> Self {
        ScriptError::Value(e)
    }
}
