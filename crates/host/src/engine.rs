//! Marshal engine
//!
//! Binds host values to the runtime's stack protocol. Pushing turns
//! `TaggedValue`s and `Table`s into runtime values; reading turns the values
//! at given stack indices back into host values, checking them against the
//! declared types. `call` ties both together around a protected call.
//!
//! Every public operation leaves the runtime stack at the depth it found it
//! (plus the pushed value, for the push operations), on success and on
//! every error path.

use crate::error::ScriptError;
use stackbind_core::{CallSignature, Payload, Returns, Table, TableMode, TaggedValue, ValueType};
use stackbind_runtime::{Kind, RuntimeError, State};
use tracing::{debug, trace, warn};

/// Deepest aggregate nesting `read_table` follows
pub const MAX_TABLE_DEPTH: usize = 100;

pub struct MarshalEngine<'a> {
    state: &'a mut State,
}

impl<'a> MarshalEngine<'a> {
    pub fn new(state: &'a mut State) -> Self {
        MarshalEngine { state }
    }

    pub fn state(&mut self) -> &mut State {
        &mut *self.state
    }

    // ------------------------------------------------------------------
    // Host -> runtime
    // ------------------------------------------------------------------

    /// Push one argument; an unset holder pushes nothing
    ///
    /// Returns the number of values pushed (0 or 1).
    pub fn push_value(&mut self, value: &TaggedValue) -> Result<usize, ScriptError> {
        let Some(payload) = value.payload() else {
            return Ok(0);
        };
        match payload {
            Payload::Integer(n) => self.state.push_integer(*n),
            Payload::Float(f) => self.state.push_number(f64::from(*f)),
            Payload::Double(d) => self.state.push_number(*d),
            Payload::Boolean(b) => self.state.push_boolean(*b),
            Payload::String(s) => self.state.push_string(s),
            Payload::Table(t) => self.push_table(t)?,
        }
        Ok(1)
    }

    /// Push arguments in declared order, returning how many were pushed
    ///
    /// On error nothing pushed by this call remains on the stack.
    pub fn push_args(&mut self, args: &[TaggedValue]) -> Result<usize, ScriptError> {
        let mark = self.state.top();
        let mut pushed = 0;
        for arg in args {
            match self.push_value(arg) {
                Ok(n) => pushed += n,
                Err(e) => {
                    self.state.set_top(mark);
                    return Err(e);
                }
            }
        }
        Ok(pushed)
    }

    /// Serialize `table` as a new aggregate on top of the stack
    pub fn push_table(&mut self, table: &Table) -> Result<(), ScriptError> {
        self.push_table_from(table, 1)
    }

    /// Serialize `table`; indexed entries are bound from position `start`
    ///
    /// Keyed tables bind named entries by name and unnamed ones at
    /// sequential positions from 1. Unset entries are skipped either way.
    pub fn push_table_from(&mut self, table: &Table, start: i64) -> Result<(), ScriptError> {
        let mark = self.state.top();
        let result = match table.mode() {
            TableMode::Keyed => self.push_keyed(table),
            TableMode::Indexed => self.push_indexed(table, start),
        };
        if result.is_err() {
            self.state.set_top(mark);
        }
        result
    }

    fn push_keyed(&mut self, table: &Table) -> Result<(), ScriptError> {
        self.state.create_table(0, table.len());
        let mut position = 0;
        for entry in table.entries() {
            if !entry.value.has_value() {
                trace!(table = table.name(), key = %entry.key, "skipping unset entry");
                continue;
            }
            if entry.is_positional() {
                position += 1;
                self.push_value(&entry.value)?;
                self.state.raw_seti(-2, position).map_err(marshal)?;
            } else {
                self.state.push_string(&entry.key);
                self.push_value(&entry.value)?;
                self.state.set_table(-3).map_err(marshal)?;
            }
        }
        Ok(())
    }

    fn push_indexed(&mut self, table: &Table, start: i64) -> Result<(), ScriptError> {
        self.state.create_table(table.len(), 0);
        let mut position = start;
        for entry in table.entries() {
            if !entry.value.has_value() {
                trace!(table = table.name(), position, "skipping unset entry");
                continue;
            }
            self.push_value(&entry.value)?;
            self.state.raw_seti(-2, position).map_err(marshal)?;
            position += 1;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Runtime -> host
    // ------------------------------------------------------------------

    /// Read the value at `index` as `expected`
    ///
    /// `ValueType::None` accepts anything and yields an unset holder.
    /// `position` is only used for the error report.
    pub fn read_value(
        &mut self,
        index: i32,
        expected: ValueType,
        position: usize,
    ) -> Result<TaggedValue, ScriptError> {
        let kind = self.state.kind_of(index);
        let mismatch = || ScriptError::ReturnTypeMismatch {
            expected,
            actual: kind.name().to_string(),
            position,
        };
        let value = match expected {
            ValueType::None => TaggedValue::new(),
            ValueType::Integer => match kind {
                Kind::Integer | Kind::Float => {
                    TaggedValue::of(self.state.to_integer(index).ok_or_else(mismatch)?)
                }
                _ => return Err(mismatch()),
            },
            ValueType::Float => match self.state.to_number(index) {
                Some(f) if kind.is_number() => TaggedValue::of(f as f32),
                _ => return Err(mismatch()),
            },
            ValueType::Double => match self.state.to_number(index) {
                Some(d) if kind.is_number() => TaggedValue::of(d),
                _ => return Err(mismatch()),
            },
            ValueType::Boolean => match kind {
                Kind::Boolean => TaggedValue::of(self.state.to_boolean(index)),
                _ => return Err(mismatch()),
            },
            ValueType::String => match kind {
                Kind::String => TaggedValue::of(self.state.to_str(index).ok_or_else(mismatch)?),
                _ => return Err(mismatch()),
            },
            ValueType::Table => match kind {
                Kind::Table => TaggedValue::of(self.read_table(index, "")?),
                _ => return Err(mismatch()),
            },
        };
        Ok(value)
    }

    /// Deserialize the aggregate at `index` into a table called `name`
    ///
    /// An aggregate with an empty array part is walked as a keyed table,
    /// otherwise its positions `1..=len` are read in order. Nested
    /// aggregates take their key as name. Values with no host counterpart
    /// are skipped. An aggregate that contains itself, or nesting deeper
    /// than [`MAX_TABLE_DEPTH`], is a `Marshal` error.
    pub fn read_table(&mut self, index: i32, name: &str) -> Result<Table, ScriptError> {
        let mark = self.state.top();
        let mut path = Vec::new();
        let result = self.read_table_at(index, name, &mut path);
        if result.is_err() {
            self.state.set_top(mark);
        }
        result
    }

    fn read_table_at(
        &mut self,
        index: i32,
        name: &str,
        path: &mut Vec<usize>,
    ) -> Result<Table, ScriptError> {
        let Some(at) = self.state.absolute(index) else {
            return Err(ScriptError::Marshal(format!("no value at stack index {}", index)));
        };
        let Some(identity) = self.state.table_identity(at) else {
            return Err(ScriptError::Marshal(format!(
                "expected a table at stack index {}, found {}",
                index,
                self.state.kind_of(at)
            )));
        };
        if path.contains(&identity) {
            return Err(ScriptError::Marshal(format!(
                "table '{}' contains itself",
                name
            )));
        }
        if path.len() >= MAX_TABLE_DEPTH {
            return Err(ScriptError::Marshal(format!(
                "tables nested deeper than {} levels",
                MAX_TABLE_DEPTH
            )));
        }
        path.push(identity);

        let len = self.state.raw_len(at);
        let table = if len == 0 {
            let mut table = Table::named(name).with_mode(TableMode::Keyed);
            self.state.push_nil();
            while self.state.next(at).map_err(marshal)? {
                let key = self.key_string(-2);
                self.read_entry(&mut table, key, path)?;
                self.state.pop(1);
            }
            table
        } else {
            let mut table = Table::named(name).with_mode(TableMode::Indexed);
            for i in 1..=len {
                self.state.raw_geti(at, i as i64).map_err(marshal)?;
                self.read_entry(&mut table, String::new(), path)?;
                self.state.pop(1);
            }
            table
        };

        path.pop();
        Ok(table)
    }

    /// Append the value on top of the stack to `table` under `key`
    fn read_entry(
        &mut self,
        table: &mut Table,
        key: String,
        path: &mut Vec<usize>,
    ) -> Result<(), ScriptError> {
        let value = match self.state.kind_of(-1) {
            Kind::Integer => self.state.to_integer(-1).map(TaggedValue::of),
            Kind::Float => self.state.to_number(-1).map(TaggedValue::of),
            Kind::Boolean => Some(TaggedValue::of(self.state.to_boolean(-1))),
            Kind::String => self.state.to_str(-1).map(TaggedValue::of),
            Kind::Table => Some(TaggedValue::of(self.read_table_at(-1, &key, path)?)),
            other => {
                warn!(table = table.name(), key = %key, kind = %other, "skipping value with no host type");
                None
            }
        };
        if let Some(value) = value {
            table.add_entry(key, value);
        }
        Ok(())
    }

    fn key_string(&self, index: i32) -> String {
        match self.state.kind_of(index) {
            Kind::Boolean => self.state.to_boolean(index).to_string(),
            _ => self.state.to_str(index).unwrap_or_default(),
        }
    }

    /// Read the top `rets.len()` values as returns and pop them
    ///
    /// The first declared return is the deepest of the block. The values
    /// are popped whether or not extraction succeeds.
    pub fn pull_returns(&mut self, rets: &[ValueType]) -> Result<Returns, ScriptError> {
        let n = rets.len();
        let mut values = Vec::with_capacity(n);
        let mut outcome = Ok(());
        for (i, expected) in rets.iter().enumerate() {
            let index = -((n - i) as i32);
            match self.read_value(index, *expected, i + 1) {
                Ok(value) => values.push(value),
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        self.state.pop(n);
        outcome.map(|()| Returns::new(values))
    }

    // ------------------------------------------------------------------
    // Invocation
    // ------------------------------------------------------------------

    /// Look up global `name`, push `signature`'s arguments, call it
    /// protected and extract the declared returns
    pub fn call(&mut self, name: &str, signature: &CallSignature) -> Result<Returns, ScriptError> {
        let mark = self.state.top();
        self.state.get_global(name);
        let pushed = match self.push_args(signature.args()) {
            Ok(n) => n,
            Err(e) => {
                self.state.set_top(mark);
                return Err(e);
            }
        };

        debug!(
            function = name,
            args = pushed,
            rets = signature.ret_count(),
            "calling"
        );
        if let Err(fault) = self.state.pcall(pushed, signature.ret_count()) {
            let message = self
                .state
                .to_str(-1)
                .unwrap_or_else(|| fault.to_string());
            self.state.pop(1);
            warn!(function = name, %message, "call faulted");
            return Err(ScriptError::InvocationFailed {
                function: name.to_string(),
                message,
            });
        }

        self.pull_returns(signature.rets())
    }
}

fn marshal(e: RuntimeError) -> ScriptError {
    ScriptError::Marshal(e.to_string())
}
