//! Runtime state and the stack protocol
//!
//! A `State` owns the evaluation stack, the globals, the host-function
//! registration table and the user-data registry. Hosts talk to it only
//! through the stack: push values, call, read results back by index.
//!
//! Indices follow the usual embedded-runtime convention. Positive indices
//! count from the bottom of the current frame starting at 1; negative
//! indices count from the top, -1 being the topmost value. Index 0 is never
//! valid. While a host function runs, its frame starts at its first
//! argument.

use crate::aggregate::Aggregate;
use crate::error::RuntimeError;
use crate::libs::Libs;
use crate::parser::Parser;
use crate::userdata::UserData;
use crate::value::{Function, HostId, Kind, MapKey, TableRef, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

/// Ceiling for `set_max_call_depth`; deeper nesting risks the native stack
pub const MAX_CALL_DEPTH: usize = 256;

/// Largest string a builtin may produce, in bytes
pub const MAX_STRING_LEN: usize = 1 << 26;

/// Host function body: reads its arguments from the frame, pushes results,
/// and returns how many of the topmost values are results
pub type HostFn = Rc<dyn Fn(&mut State) -> Result<usize, RuntimeError>>;

pub(crate) struct HostEntry {
    pub(crate) name: String,
    pub(crate) arity: usize,
    pub(crate) func: HostFn,
}

pub struct State {
    pub(crate) stack: Vec<Value>,
    /// Absolute position of the current frame's first slot
    pub(crate) base: usize,
    pub(crate) globals: HashMap<String, Value>,
    pub(crate) hosts: Vec<HostEntry>,
    pub(crate) libs: Libs,
    pub(crate) depth: usize,
    pub(crate) max_call_depth: usize,
    user_data: UserData,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// A state with only the language primitives available
    pub fn new() -> Self {
        Self::with_libs(Libs::empty())
    }

    pub fn with_libs(libs: Libs) -> Self {
        State {
            stack: Vec::new(),
            base: 0,
            globals: HashMap::new(),
            hosts: Vec::new(),
            libs,
            depth: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            user_data: UserData::new(),
        }
    }

    pub fn open_libs(&mut self, libs: Libs) {
        self.libs |= libs;
    }

    pub fn libs(&self) -> Libs {
        self.libs
    }

    /// Values above [`MAX_CALL_DEPTH`] are clamped to it
    pub fn set_max_call_depth(&mut self, depth: usize) {
        self.max_call_depth = depth.min(MAX_CALL_DEPTH);
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    // ------------------------------------------------------------------
    // Indices
    // ------------------------------------------------------------------

    /// Number of values in the current frame
    pub fn top(&self) -> usize {
        self.stack.len() - self.base
    }

    /// Truncate the frame to `n` values, or pad it with nil
    pub fn set_top(&mut self, n: usize) {
        self.stack.resize(self.base + n, Value::Nil);
    }

    /// Remove `n` values from the top, never below the frame base
    pub fn pop(&mut self, n: usize) {
        let keep = self.stack.len().saturating_sub(n).max(self.base);
        self.stack.truncate(keep);
    }

    fn slot(&self, idx: i32) -> Option<usize> {
        if idx > 0 {
            let pos = self.base + idx as usize - 1;
            (pos < self.stack.len()).then_some(pos)
        } else if idx < 0 {
            let back = idx.unsigned_abs() as usize;
            (back <= self.top()).then(|| self.stack.len() - back)
        } else {
            None
        }
    }

    /// Positive equivalent of `idx`, stable across later pushes
    pub fn absolute(&self, idx: i32) -> Option<i32> {
        self.slot(idx).map(|pos| (pos - self.base + 1) as i32)
    }

    pub fn value_at(&self, idx: i32) -> Option<&Value> {
        self.slot(idx).map(|pos| &self.stack[pos])
    }

    fn table_at(&self, idx: i32, op: &str) -> Result<TableRef, RuntimeError> {
        match self.value_at(idx) {
            Some(Value::Table(t)) => Ok(Rc::clone(t)),
            Some(other) => Err(RuntimeError::Type {
                op: op.to_string(),
                expected: "table",
                found: other.type_name(),
            }),
            None => Err(RuntimeError::InvalidIndex(idx)),
        }
    }

    // ------------------------------------------------------------------
    // Push
    // ------------------------------------------------------------------

    pub fn push_value(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn push_nil(&mut self) {
        self.stack.push(Value::Nil);
    }

    pub fn push_integer(&mut self, n: i64) {
        self.stack.push(Value::Int(n));
    }

    pub fn push_number(&mut self, f: f64) {
        self.stack.push(Value::Float(f));
    }

    pub fn push_boolean(&mut self, b: bool) {
        self.stack.push(Value::Bool(b));
    }

    /// Push a copy of `s`
    pub fn push_string(&mut self, s: &str) {
        self.stack.push(Value::string(s));
    }

    /// Push a new empty table sized for `narr` positional and `nrec` keyed entries
    pub fn create_table(&mut self, narr: usize, nrec: usize) {
        let table = Aggregate::with_capacity(narr, nrec);
        self.stack.push(Value::Table(Rc::new(RefCell::new(table))));
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Kind at `idx`; `Kind::None` for an index outside the frame
    pub fn kind_of(&self, idx: i32) -> Kind {
        self.value_at(idx).map_or(Kind::None, Value::kind)
    }

    pub fn to_integer(&self, idx: i32) -> Option<i64> {
        self.value_at(idx)?.as_integer()
    }

    pub fn to_number(&self, idx: i32) -> Option<f64> {
        self.value_at(idx)?.as_number()
    }

    /// Truthiness at `idx`; false for an invalid index
    pub fn to_boolean(&self, idx: i32) -> bool {
        self.value_at(idx).is_some_and(Value::truthy)
    }

    /// Strings as-is, numbers converted; `None` for anything else
    pub fn to_str(&self, idx: i32) -> Option<String> {
        match self.value_at(idx)? {
            Value::Str(s) => Some(s.to_string()),
            v @ (Value::Int(_) | Value::Float(_)) => Some(v.to_display_string()),
            _ => None,
        }
    }

    /// Identity of the table at `idx`, equal for every reference to the same
    /// table; `None` for anything else
    pub fn table_identity(&self, idx: i32) -> Option<usize> {
        match self.value_at(idx)? {
            Value::Table(t) => Some(Rc::as_ptr(t) as usize),
            _ => None,
        }
    }

    /// Array border of a table, byte length of a string, 0 otherwise
    pub fn raw_len(&self, idx: i32) -> usize {
        match self.value_at(idx) {
            Some(Value::Table(t)) => t.borrow().raw_len(),
            Some(Value::Str(s)) => s.len(),
            _ => 0,
        }
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    /// `t[k] = v` where `t` is at `idx`, `v` on top and `k` just below it
    ///
    /// Stack effect: ( k v -- )
    pub fn set_table(&mut self, idx: i32) -> Result<(), RuntimeError> {
        let table = self.table_at(idx, "set_table")?;
        let value = self.pop_operand("set_table")?;
        let key = self.pop_operand("set_table")?;
        let key = MapKey::from_value(&key).map_err(RuntimeError::InvalidKey)?;
        table.borrow_mut().set(key, value);
        Ok(())
    }

    /// `t[name] = v` where `t` is at `idx` and `v` on top
    ///
    /// Stack effect: ( v -- )
    pub fn set_field(&mut self, idx: i32, name: &str) -> Result<(), RuntimeError> {
        let table = self.table_at(idx, "set_field")?;
        let value = self.pop_operand("set_field")?;
        table.borrow_mut().set(MapKey::from(name), value);
        Ok(())
    }

    /// `t[n] = v` where `t` is at `idx` and `v` on top
    ///
    /// Stack effect: ( v -- )
    pub fn raw_seti(&mut self, idx: i32, n: i64) -> Result<(), RuntimeError> {
        let table = self.table_at(idx, "raw_seti")?;
        let value = self.pop_operand("raw_seti")?;
        table.borrow_mut().set_int(n, value);
        Ok(())
    }

    /// Push `t[n]` where `t` is at `idx`
    ///
    /// Stack effect: ( -- v )
    pub fn raw_geti(&mut self, idx: i32, n: i64) -> Result<Kind, RuntimeError> {
        let value = self.table_at(idx, "raw_geti")?.borrow().get_int(n);
        let kind = value.kind();
        self.stack.push(value);
        Ok(kind)
    }

    /// Replace the key on top with `t[key]` where `t` is at `idx`
    ///
    /// Stack effect: ( k -- v )
    pub fn get_table(&mut self, idx: i32) -> Result<Kind, RuntimeError> {
        let table = self.table_at(idx, "get_table")?;
        let key = self.pop_operand("get_table")?;
        let value = match MapKey::from_value(&key) {
            Ok(key) => table.borrow().get(&key),
            Err(_) => Value::Nil,
        };
        let kind = value.kind();
        self.stack.push(value);
        Ok(kind)
    }

    /// Push `t[name]` where `t` is at `idx`
    ///
    /// Stack effect: ( -- v )
    pub fn get_field(&mut self, idx: i32, name: &str) -> Result<Kind, RuntimeError> {
        let value = self
            .table_at(idx, "get_field")?
            .borrow()
            .get(&MapKey::from(name));
        let kind = value.kind();
        self.stack.push(value);
        Ok(kind)
    }

    /// Table traversal step
    ///
    /// Pops a key (nil to start) and, if the table at `idx` has an entry
    /// after it, pushes that entry's key and value and returns true. At the
    /// end nothing is pushed and false is returned.
    ///
    /// Stack effect: ( k -- k' v ) or ( k -- )
    pub fn next(&mut self, idx: i32) -> Result<bool, RuntimeError> {
        let table = self.table_at(idx, "next")?;
        let key = self.pop_operand("next")?;
        let cursor = if key.is_nil() {
            None
        } else {
            Some(MapKey::from_value(&key).map_err(RuntimeError::InvalidKey)?)
        };
        let entry = table.borrow().next(cursor.as_ref());
        match entry {
            Some((key, value)) => {
                self.stack.push(key.to_value());
                self.stack.push(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ------------------------------------------------------------------
    // Globals
    // ------------------------------------------------------------------

    /// Pop the top value into global `name`; nil removes the global
    pub fn set_global(&mut self, name: &str) -> Result<(), RuntimeError> {
        let value = self.pop_operand("set_global")?;
        self.assign_global(name, value);
        Ok(())
    }

    /// Push global `name`, nil when it is not defined
    pub fn get_global(&mut self, name: &str) -> Kind {
        let value = self.globals.get(name).cloned().unwrap_or_default();
        let kind = value.kind();
        self.stack.push(value);
        kind
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    pub(crate) fn assign_global(&mut self, name: &str, value: Value) {
        if value.is_nil() {
            self.globals.remove(name);
        } else {
            self.globals.insert(name.to_string(), value);
        }
    }

    // ------------------------------------------------------------------
    // Host functions and user data
    // ------------------------------------------------------------------

    /// Register a host function as global `name`
    ///
    /// The function value stored in the global carries only the returned id;
    /// the body stays in the registration table for the life of the state.
    pub fn register_function<F>(&mut self, name: &str, arity: usize, func: F) -> HostId
    where
        F: Fn(&mut State) -> Result<usize, RuntimeError> + 'static,
    {
        let id = HostId(self.hosts.len());
        self.hosts.push(HostEntry {
            name: name.to_string(),
            arity,
            func: Rc::new(func),
        });
        self.globals
            .insert(name.to_string(), Value::Function(Function::Host(id)));
        debug!(name, arity, id = id.index(), "registered host function");
        id
    }

    pub fn host_name(&self, id: HostId) -> Option<&str> {
        self.hosts.get(id.index()).map(|entry| entry.name.as_str())
    }

    pub fn user_data(&self) -> &UserData {
        &self.user_data
    }

    pub fn user_data_mut(&mut self) -> &mut UserData {
        &mut self.user_data
    }

    // ------------------------------------------------------------------
    // Calls and loading
    // ------------------------------------------------------------------

    /// Protected call
    ///
    /// The callee sits just below its `nargs` arguments. On success the
    /// callee and arguments are replaced by exactly `nresults` values: the
    /// topmost values the callee left, padded with nil when it left fewer.
    /// On a fault everything from the callee slot up is removed, the error
    /// message is pushed as a string, and the fault is returned.
    pub fn pcall(&mut self, nargs: usize, nresults: usize) -> Result<(), RuntimeError> {
        if self.top() < nargs + 1 {
            let consumed = self.top().min(nargs + 1);
            self.pop(consumed);
            let err = RuntimeError::StackUnderflow("pcall".to_string());
            self.push_string(&err.to_string());
            return Err(err);
        }

        let func_slot = self.stack.len() - nargs - 1;
        let callee = self.stack.remove(func_slot);
        let saved_base = std::mem::replace(&mut self.base, func_slot);
        let saved_depth = self.depth;

        let outcome = match &callee {
            Value::Function(function) => self.call_function(function),
            other => Err(RuntimeError::NotCallable(other.type_name())),
        };

        self.base = saved_base;
        self.depth = saved_depth;

        match outcome {
            Ok(()) => {
                let produced = self.stack.split_off(func_slot);
                let surplus = produced.len().saturating_sub(nresults);
                self.stack.extend(produced.into_iter().skip(surplus));
                self.stack.resize(func_slot + nresults, Value::Nil);
                trace!(nargs, nresults, "pcall returned");
                Ok(())
            }
            Err(err) => {
                self.stack.truncate(func_slot);
                self.push_string(&err.to_string());
                debug!(error = %err, "pcall faulted");
                Err(err)
            }
        }
    }

    /// Parse `source`, define its words as globals, then run its top-level
    /// statements in a fresh frame
    ///
    /// Values the top-level code leaves behind are discarded. The stack is
    /// restored to its previous depth on every path.
    pub fn do_string(&mut self, source: &str) -> Result<(), RuntimeError> {
        let program = Parser::new(source)
            .parse()
            .map_err(RuntimeError::Syntax)?;

        debug!(
            words = program.words.len(),
            statements = program.body.len(),
            "loading script"
        );
        for word in program.words {
            let name = word.name.clone();
            self.globals
                .insert(name, Value::Function(Function::Script(Rc::new(word))));
        }

        let mark = self.stack.len();
        let saved_base = std::mem::replace(&mut self.base, mark);
        let saved_depth = self.depth;
        let outcome = self.exec(&program.body);
        self.base = saved_base;
        self.depth = saved_depth;
        self.stack.truncate(mark);
        outcome
    }

    /// Pop for protocol operations: never crosses the frame base
    fn pop_operand(&mut self, op: &str) -> Result<Value, RuntimeError> {
        if self.top() == 0 {
            return Err(RuntimeError::StackUnderflow(op.to_string()));
        }
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::StackUnderflow(op.to_string()))
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("stack", &self.stack.len())
            .field("base", &self.base)
            .field("globals", &self.globals.len())
            .field("hosts", &self.hosts.len())
            .field("libs", &self.libs)
            .finish()
    }
}
