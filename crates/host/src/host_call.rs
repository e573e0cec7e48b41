//! Context handed to host callables
//!
//! While a host callable runs, the runtime frame holds exactly its
//! arguments: index 1 is the first argument. Every `push_*` adds one result;
//! the count is reported back to the runtime when the callable returns.

use crate::engine::MarshalEngine;
use crate::error::ScriptError;
use stackbind_core::{Table, TaggedValue, ValueType};
use stackbind_runtime::{Kind, State};
use std::any::Any;

pub struct HostCall<'a> {
    state: &'a mut State,
    args: usize,
    rets: usize,
}

impl<'a> HostCall<'a> {
    pub(crate) fn new(state: &'a mut State) -> Self {
        let args = state.top();
        HostCall {
            state,
            args,
            rets: 0,
        }
    }

    pub fn arg_count(&self) -> usize {
        self.args
    }

    /// Number of results pushed so far
    pub fn ret_count(&self) -> usize {
        self.rets
    }

    fn check_arg(&self, index: i32, expected: ValueType, ok: bool) -> Result<(), ScriptError> {
        if ok {
            Ok(())
        } else {
            Err(ScriptError::ArgumentTypeMismatch {
                index,
                expected,
                actual: self.state.kind_of(index).name().to_string(),
            })
        }
    }

    pub fn to_string(&self, index: i32) -> Result<String, ScriptError> {
        self.check_arg(index, ValueType::String, self.state.kind_of(index) == Kind::String)?;
        Ok(self.state.to_str(index).unwrap_or_default())
    }

    /// Integers, and floats with an exact integral value
    pub fn to_integer(&self, index: i32) -> Result<i64, ScriptError> {
        let value = self.state.to_integer(index);
        self.check_arg(index, ValueType::Integer, value.is_some())?;
        Ok(value.unwrap_or_default())
    }

    pub fn to_number(&self, index: i32) -> Result<f64, ScriptError> {
        let value = self.state.to_number(index);
        self.check_arg(index, ValueType::Double, value.is_some())?;
        Ok(value.unwrap_or_default())
    }

    pub fn to_boolean(&self, index: i32) -> Result<bool, ScriptError> {
        self.check_arg(index, ValueType::Boolean, self.state.kind_of(index) == Kind::Boolean)?;
        Ok(self.state.to_boolean(index))
    }

    pub fn to_table(&mut self, index: i32) -> Result<Table, ScriptError> {
        self.check_arg(index, ValueType::Table, self.state.kind_of(index) == Kind::Table)?;
        MarshalEngine::new(self.state).read_table(index, "")
    }

    pub fn push_string(&mut self, s: &str) {
        self.state.push_string(s);
        self.rets += 1;
    }

    pub fn push_integer(&mut self, n: i64) {
        self.state.push_integer(n);
        self.rets += 1;
    }

    pub fn push_number(&mut self, f: f64) {
        self.state.push_number(f);
        self.rets += 1;
    }

    pub fn push_boolean(&mut self, b: bool) {
        self.state.push_boolean(b);
        self.rets += 1;
    }

    pub fn push_table(&mut self, table: &Table) -> Result<(), ScriptError> {
        MarshalEngine::new(self.state).push_table(table)?;
        self.rets += 1;
        Ok(())
    }

    /// Push any set holder; an unset one pushes nothing
    pub fn push_value(&mut self, value: &TaggedValue) -> Result<(), ScriptError> {
        self.rets += MarshalEngine::new(self.state).push_value(value)?;
        Ok(())
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
}
