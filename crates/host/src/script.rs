//! Script facade
//!
//! A `Script` owns one runtime state together with the registry of call
//! signatures the host has declared for it. Typical use:
//!
//! ```ignore
//! let mut script = Script::open("update.sb");
//! script.register("update", CallSignature::new()
//!     .with_arg(5_i64)
//!     .with_arg(String::from("go"))
//!     .with_ret(ValueType::String))?;
//! script.compile()?;
//! let out = script.invoke("update")?;
//! ```
//!
//! The runtime is released when the `Script` is dropped.

use crate::config::ScriptConfig;
use crate::engine::MarshalEngine;
use crate::error::ScriptError;
use crate::host_call::HostCall;
use stackbind_core::{CallSignature, Returns, Table, TaggedValue, ValueType};
use stackbind_runtime::{Kind, Libs, RuntimeError, State};
use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct Script {
    state: State,
    signatures: HashMap<String, CallSignature>,
    path: Option<PathBuf>,
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl Script {
    /// A script with no standard libraries and no file
    pub fn new() -> Self {
        Script {
            state: State::new(),
            signatures: HashMap::new(),
            path: None,
        }
    }

    /// A script backed by `path` with every library open
    ///
    /// The file is not read until `compile`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Script {
            state: State::with_libs(Libs::ALL),
            signatures: HashMap::new(),
            path: Some(path.into()),
        }
    }

    pub fn with_config(config: &ScriptConfig) -> Result<Self, ScriptError> {
        config.validate()?;
        let mut state = State::with_libs(config.lib_mask()?);
        state.set_max_call_depth(config.max_call_depth);
        Ok(Script {
            state,
            signatures: HashMap::new(),
            path: config.script.clone(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn open_libs(&mut self, libs: Libs) {
        self.state.open_libs(libs);
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    fn ensure_unregistered(&self, name: &str) -> Result<(), ScriptError> {
        if self.signatures.contains_key(name) || self.state.has_global(name) {
            return Err(ScriptError::AlreadyRegistered(name.to_string()));
        }
        Ok(())
    }

    /// Declare the calling shape of script function `name`
    ///
    /// Fails with `AlreadyRegistered` when the name already has a signature
    /// or is already defined in the runtime.
    pub fn register(&mut self, name: &str, signature: CallSignature) -> Result<(), ScriptError> {
        self.ensure_unregistered(name)?;
        debug!(
            name,
            args = signature.arg_count(),
            rets = signature.ret_count(),
            "registered signature"
        );
        self.signatures.insert(name.to_string(), signature);
        Ok(())
    }

    /// Expose a host callable to scripts as global `name`
    ///
    /// The runtime passes it `signature.pushed_arg_count()` arguments;
    /// absent argument slots are never pushed, so they take no part in the
    /// callable's frame. The signature is also recorded, so the host can `invoke` the callable
    /// through the runtime like any script function.
    pub fn register_fn<F>(
        &mut self,
        name: &str,
        signature: CallSignature,
        callable: F,
    ) -> Result<(), ScriptError>
    where
        F: Fn(&mut HostCall<'_>) -> Result<(), ScriptError> + 'static,
    {
        self.ensure_unregistered(name)?;
        let label = name.to_string();
        self.state
            .register_function(name, signature.pushed_arg_count(), move |state: &mut State| {
                let mut call = HostCall::new(state);
                callable(&mut call)
                    .map_err(|e| RuntimeError::Host(format!("{}: {}", label, e)))?;
                Ok(call.ret_count())
            });
        self.signatures.insert(name.to_string(), signature);
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.signatures.contains_key(name)
    }

    pub fn signature(&self, name: &str) -> Option<&CallSignature> {
        self.signatures.get(name)
    }

    /// Rebind arguments of a registered signature between calls
    pub fn signature_mut(&mut self, name: &str) -> Option<&mut CallSignature> {
        self.signatures.get_mut(name)
    }

    // ------------------------------------------------------------------
    // Invocation
    // ------------------------------------------------------------------

    /// Call registered function `name` with its signature's arguments
    pub fn invoke(&mut self, name: &str) -> Result<Returns, ScriptError> {
        let signature = self
            .signatures
            .get(name)
            .ok_or_else(|| ScriptError::NotRegistered(name.to_string()))?;
        MarshalEngine::new(&mut self.state).call(name, signature)
    }

    /// Call `name` with an ad-hoc signature, without registering it
    pub fn call(&mut self, name: &str, signature: &CallSignature) -> Result<Returns, ScriptError> {
        MarshalEngine::new(&mut self.state).call(name, signature)
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Load and run the script file this `Script` was opened with
    pub fn compile(&mut self) -> Result<(), ScriptError> {
        let path = self.path.clone().ok_or(ScriptError::NoScriptPath)?;
        let source = fs::read_to_string(&path).map_err(|source| ScriptError::ScriptNotFound {
            path: path.clone(),
            source,
        })?;
        self.load(&source, &path.display().to_string())?;
        info!(path = %path.display(), "script compiled");
        Ok(())
    }

    /// Load and run script source held in memory
    pub fn compile_string(&mut self, source: &str) -> Result<(), ScriptError> {
        self.load(source, "<string>")
    }

    fn load(&mut self, source: &str, chunk: &str) -> Result<(), ScriptError> {
        self.state
            .do_string(source)
            .map_err(|e| ScriptError::CompileFailure {
                chunk: chunk.to_string(),
                message: e.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Globals
    // ------------------------------------------------------------------

    /// Set global `name`; an unset holder removes it
    pub fn set_global_value(&mut self, name: &str, value: &TaggedValue) -> Result<(), ScriptError> {
        let mut engine = MarshalEngine::new(&mut self.state);
        if engine.push_value(value)? == 0 {
            engine.state().push_nil();
        }
        self.state
            .set_global(name)
            .map_err(|e| ScriptError::Marshal(e.to_string()))
    }

    /// Read global `name` as whatever host type matches it
    ///
    /// Undefined globals and functions read as an unset holder.
    pub fn global_value(&mut self, name: &str) -> Result<TaggedValue, ScriptError> {
        let expected = match self.state.get_global(name) {
            Kind::Integer => ValueType::Integer,
            Kind::Float => ValueType::Double,
            Kind::Boolean => ValueType::Boolean,
            Kind::String => ValueType::String,
            Kind::Table => ValueType::Table,
            Kind::None | Kind::Nil | Kind::Function => ValueType::None,
        };
        let value = MarshalEngine::new(&mut self.state).read_value(-1, expected, 1);
        self.state.pop(1);
        value
    }

    pub fn set_global_table(&mut self, name: &str, table: &Table) -> Result<(), ScriptError> {
        MarshalEngine::new(&mut self.state).push_table(table)?;
        self.state
            .set_global(name)
            .map_err(|e| ScriptError::Marshal(e.to_string()))
    }

    /// Read global table `name`; the result is named after the global
    pub fn global_table(&mut self, name: &str) -> Result<Table, ScriptError> {
        let kind = self.state.get_global(name);
        let result = if kind == Kind::Table {
            MarshalEngine::new(&mut self.state).read_table(-1, name)
        } else {
            Err(ScriptError::GlobalTypeMismatch {
                name: name.to_string(),
                expected: ValueType::Table,
                actual: kind.name().to_string(),
            })
        };
        self.state.pop(1);
        result
    }

    // ------------------------------------------------------------------
    // User data
    // ------------------------------------------------------------------

    /// Make `value` reachable from host callables as `name`
    ///
    /// Replaces any previous entry of the same name.
    pub fn add_user_data<T: Any>(&mut self, name: &str, value: T) {
        self.state.user_data_mut().insert(name, value);
    }

    pub fn user_data<T: Any>(&self, name: &str) -> Result<&T, ScriptError> {
        self.state
            .user_data()
            .get::<T>(name)
            .ok_or_else(|| ScriptError::UserDataMissing(name.to_string()))
    }

    pub fn user_data_mut<T: Any>(&mut self, name: &str) -> Result<&mut T, ScriptError> {
        self.state
            .user_data_mut()
            .get_mut::<T>(name)
            .ok_or_else(|| ScriptError::UserDataMissing(name.to_string()))
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Values currently on the runtime stack
    pub fn stack_depth(&self) -> usize {
        self.state.top()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice() {
        let mut script = Script::new();
        script.register("f", CallSignature::new()).unwrap();
        assert!(matches!(
            script.register("f", CallSignature::new()),
            Err(ScriptError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_register_collides_with_global() {
        let mut script = Script::new();
        script.compile_string(": existing ( -- ) ;").unwrap();
        assert!(matches!(
            script.register("existing", CallSignature::new()),
            Err(ScriptError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_compile_without_path() {
        let mut script = Script::new();
        assert!(matches!(script.compile(), Err(ScriptError::NoScriptPath)));
    }

    #[test]
    fn test_signature_rebinding() {
        let mut script = Script::new();
        script
            .register("f", CallSignature::new().with_arg(1_i64))
            .unwrap();
        assert!(script.signature_mut("f").unwrap().set_arg(0, 2_i64));
        let arg = &script.signature("f").unwrap().args()[0];
        assert_eq!(arg.retrieve::<i64>(), Ok(&2));
    }

    #[test]
    fn test_global_value_kinds() {
        let mut script = Script::open("unused.sb");
        script
            .compile_string("3 \"i\" set-global 2.5 \"d\" set-global \"s\" \"str\" set-global")
            .unwrap();
        assert_eq!(script.global_value("i").unwrap().retrieve::<i64>(), Ok(&3));
        assert_eq!(script.global_value("d").unwrap().retrieve::<f64>(), Ok(&2.5));
        assert_eq!(
            script.global_value("str").unwrap().retrieve::<String>().map(String::as_str),
            Ok("s")
        );
        assert!(!script.global_value("missing").unwrap().has_value());
        assert_eq!(script.stack_depth(), 0);
    }

    #[test]
    fn test_unset_global_value_removes() {
        let mut script = Script::new();
        script.set_global_value("x", &TaggedValue::of(1_i64)).unwrap();
        assert!(script.state().has_global("x"));
        script.set_global_value("x", &TaggedValue::new()).unwrap();
        assert!(!script.state().has_global("x"));
    }

    #[test]
    fn test_global_table_type_mismatch() {
        let mut script = Script::new();
        script.set_global_value("n", &TaggedValue::of(1_i64)).unwrap();
        let err = script.global_table("n").unwrap_err();
        assert!(matches!(err, ScriptError::GlobalTypeMismatch { .. }));
        assert_eq!(script.stack_depth(), 0);
    }

    #[test]
    fn test_user_data_missing() {
        let script = Script::new();
        assert!(matches!(
            script.user_data::<u8>("nope"),
            Err(ScriptError::UserDataMissing(_))
        ));
    }
}
