//! stackbind-runtime: the embedded script runtime
//!
//! A small dynamically-typed, stack-based language together with the
//! stack protocol a host uses to drive it:
//!
//! - `value` / `aggregate`: runtime values and tables
//! - `state`: evaluation stack, globals, protected calls, host functions
//! - `parser` / `ast`: script source to statements
//! - `interp` / `builtins`: evaluation and the builtin word libraries
//! - `libs`: which builtin libraries a state exposes
//! - `userdata`: named host data reachable from host functions
//!
//! A `State` is single-threaded by construction (`Rc` everywhere), so one
//! runtime belongs to one thread.

pub mod aggregate;
pub mod ast;
mod builtins;
pub mod error;
mod interp;
pub mod libs;
pub mod parser;
pub mod state;
pub mod userdata;
pub mod value;

pub use aggregate::Aggregate;
pub use error::RuntimeError;
pub use libs::Libs;
pub use state::{DEFAULT_MAX_CALL_DEPTH, HostFn, MAX_CALL_DEPTH, MAX_STRING_LEN, State};
pub use userdata::UserData;
pub use value::{Function, HostId, Kind, MapKey, TableRef, Value};
