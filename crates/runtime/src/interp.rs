//! Statement evaluation
//!
//! Script words share the caller's stack: a word consumes its inputs from
//! the values below it and leaves its outputs in their place. The only
//! frame boundaries are protected calls, host functions and script loading,
//! and no word may pop across one.

use crate::ast::{Statement, WordDef};
use crate::builtins;
use crate::error::RuntimeError;
use crate::state::State;
use crate::value::{Function, HostId, TableRef, Value};
use std::rc::Rc;

const QUOTATION_NAME: &str = "[quotation]";

impl State {
    pub(crate) fn exec(&mut self, body: &[Statement]) -> Result<(), RuntimeError> {
        for statement in body {
            match statement {
                Statement::IntLiteral(n) => self.push_integer(*n),
                Statement::FloatLiteral(f) => self.push_number(*f),
                Statement::BoolLiteral(b) => self.push_boolean(*b),
                Statement::StringLiteral(s) => self.push_value(Value::Str(Rc::clone(s))),
                Statement::NilLiteral => self.push_nil(),
                Statement::WordCall(name) => self.call_word(name)?,
                Statement::If {
                    then_branch,
                    else_branch,
                } => {
                    if self.pop_value("if")?.truthy() {
                        self.exec(then_branch)?;
                    } else if let Some(branch) = else_branch {
                        self.exec(branch)?;
                    }
                }
                Statement::Quotation(body) => {
                    let word = WordDef {
                        name: QUOTATION_NAME.to_string(),
                        body: Rc::clone(body),
                        line: 0,
                    };
                    self.push_value(Value::Function(Function::Script(Rc::new(word))));
                }
            }
        }
        Ok(())
    }

    /// Globals shadow builtins so scripts and hosts can redefine them
    fn call_word(&mut self, name: &str) -> Result<(), RuntimeError> {
        if let Some(value) = self.globals.get(name) {
            return match value.clone() {
                Value::Function(function) => self.call_function(&function),
                other => {
                    self.push_value(other);
                    Ok(())
                }
            };
        }
        match builtins::lookup(name, self.libs) {
            Some(builtin) => builtin(self),
            None => Err(RuntimeError::UndefinedWord(name.to_string())),
        }
    }

    pub(crate) fn call_function(&mut self, function: &Function) -> Result<(), RuntimeError> {
        if self.depth >= self.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded(self.max_call_depth));
        }
        self.depth += 1;
        let result = match function {
            Function::Script(word) => self.exec(&word.body),
            Function::Host(id) => self.call_host(*id),
        };
        self.depth -= 1;
        result
    }

    fn call_host(&mut self, id: HostId) -> Result<(), RuntimeError> {
        let (name, arity, func) = match self.hosts.get(id.index()) {
            Some(entry) => (entry.name.clone(), entry.arity, Rc::clone(&entry.func)),
            None => return Err(RuntimeError::NotCallable("stale host function")),
        };
        if self.top() < arity {
            return Err(RuntimeError::StackUnderflow(name));
        }

        let frame = self.stack.len() - arity;
        let saved_base = std::mem::replace(&mut self.base, frame);
        let outcome = func(self);
        self.base = saved_base;

        let count = outcome?;
        let produced = self.stack.len() - frame;
        if count > produced {
            return Err(RuntimeError::Host(format!(
                "'{}' reported {} results but left {}",
                name, count, produced
            )));
        }
        let results = self.stack.split_off(self.stack.len() - count);
        self.stack.truncate(frame);
        self.stack.extend(results);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Typed pops used by builtins
    // ------------------------------------------------------------------

    pub(crate) fn pop_value(&mut self, op: &str) -> Result<Value, RuntimeError> {
        if self.top() == 0 {
            return Err(RuntimeError::StackUnderflow(op.to_string()));
        }
        Ok(self.stack.pop().unwrap_or_default())
    }

    pub(crate) fn pop_integer(&mut self, op: &str) -> Result<i64, RuntimeError> {
        let value = self.pop_value(op)?;
        value
            .as_integer()
            .ok_or_else(|| type_error(op, "integer", &value))
    }

    pub(crate) fn pop_string(&mut self, op: &str) -> Result<Rc<str>, RuntimeError> {
        match self.pop_value(op)? {
            Value::Str(s) => Ok(s),
            other => Err(type_error(op, "string", &other)),
        }
    }

    pub(crate) fn pop_table(&mut self, op: &str) -> Result<TableRef, RuntimeError> {
        match self.pop_value(op)? {
            Value::Table(t) => Ok(t),
            other => Err(type_error(op, "table", &other)),
        }
    }

    pub(crate) fn pop_function(&mut self, op: &str) -> Result<Function, RuntimeError> {
        match self.pop_value(op)? {
            Value::Function(f) => Ok(f),
            other => Err(type_error(op, "function", &other)),
        }
    }
}

pub(crate) fn type_error(op: &str, expected: &'static str, found: &Value) -> RuntimeError {
    RuntimeError::Type {
        op: op.to_string(),
        expected,
        found: found.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use crate::error::RuntimeError;
    use crate::libs::Libs;
    use crate::state::State;
    use crate::value::Value;

    fn run(source: &str) -> Result<Value, RuntimeError> {
        let mut state = State::with_libs(Libs::ALL);
        state.do_string(&format!("{}\n\"result\" set-global", source))?;
        Ok(state.global("result").cloned().unwrap_or_default())
    }

    #[test]
    fn test_word_calls_word() {
        let source = ": double ( n -- n ) 2 * ;\n: quad ( n -- n ) double double ;\n3 quad";
        assert_eq!(run(source), Ok(Value::Int(12)));
    }

    #[test]
    fn test_if_else() {
        let source = ": sign ( n -- s ) 0 < if \"neg\" else \"non-neg\" then ;\n-4 sign";
        assert_eq!(run(source), Ok(Value::string("neg")));
        let source = ": sign ( n -- s ) 0 < if \"neg\" else \"non-neg\" then ;\n4 sign";
        assert_eq!(run(source), Ok(Value::string("non-neg")));
    }

    #[test]
    fn test_if_without_else() {
        assert_eq!(run("1 false if drop 2 then"), Ok(Value::Int(1)));
        assert_eq!(run("1 nil not if drop 2 then"), Ok(Value::Int(2)));
    }

    #[test]
    fn test_recursion() {
        let source = ": fact ( n -- n! ) dup 1 <= if drop 1 else dup 1 - fact * then ;\n10 fact";
        assert_eq!(run(source), Ok(Value::Int(3_628_800)));
    }

    #[test]
    fn test_quotation_call() {
        assert_eq!(run("5 [ 1 + ] call"), Ok(Value::Int(6)));
    }

    #[test]
    fn test_global_value_is_pushed() {
        let source = "7 \"seven\" set-global\nseven seven +";
        assert_eq!(run(source), Ok(Value::Int(14)));
    }

    #[test]
    fn test_undefined_word() {
        assert_eq!(
            run("nope"),
            Err(RuntimeError::UndefinedWord("nope".to_string()))
        );
    }

    #[test]
    fn test_global_shadows_builtin() {
        let source = ": neg ( n -- n ) drop 99 ;\n5 neg";
        assert_eq!(run(source), Ok(Value::Int(99)));
    }

    #[test]
    fn test_if_underflow() {
        assert_eq!(
            run("if 1 then"),
            Err(RuntimeError::StackUnderflow("if".to_string()))
        );
    }
}
