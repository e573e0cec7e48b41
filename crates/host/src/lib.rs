//! stackbind: call into an embedded stack-based script runtime with typed
//! values
//!
//! The host describes each script function with a [`CallSignature`]
//! (argument values and expected return types), registers it on a
//! [`Script`], and invokes it by name. The [`MarshalEngine`] pushes the
//! arguments, runs a protected call, type-checks the results and pops them,
//! leaving the runtime stack balanced on every path. Tables cross the
//! boundary recursively in both directions.
//!
//! Host functions go the other way: [`Script::register_fn`] exposes a
//! closure to scripts, and the closure reads its arguments and pushes its
//! results through a [`HostCall`].
//!
//! # Modules
//!
//! - `engine`: stack-level marshaling
//! - `script`: the facade owning a runtime and its signature registry
//! - `host_call`: callback context for host functions
//! - `config`: TOML configuration
//! - `error`: call-level errors

pub mod config;
pub mod engine;
pub mod error;
pub mod host_call;
pub mod script;

pub use config::ScriptConfig;
pub use engine::MarshalEngine;
pub use error::ScriptError;
pub use host_call::HostCall;
pub use script::Script;

pub use stackbind_core::{
    CallSignature, Entry, Payload, Returns, Storable, Table, TableMode, TaggedValue, ValueError,
    ValueType,
};
pub use stackbind_runtime::{Libs, MAX_CALL_DEPTH, State};
