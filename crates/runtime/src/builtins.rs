//! Builtin words
//!
//! Each builtin documents its stack effect. Primitives are always
//! available; the rest belong to a library in [`Libs`] and resolve only
//! when that library is open.

use crate::error::RuntimeError;
use crate::interp::type_error;
use crate::libs::Libs;
use crate::state::{MAX_STRING_LEN, State};
use crate::value::{MapKey, Value, float_to_integer};
use std::cmp::Ordering;

pub(crate) type Builtin = fn(&mut State) -> Result<(), RuntimeError>;

pub(crate) fn lookup(name: &str, libs: Libs) -> Option<Builtin> {
    let (lib, word): (Libs, Builtin) = match name {
        // Stack shuffles
        "dup" => (Libs::empty(), dup),
        "drop" => (Libs::empty(), drop),
        "swap" => (Libs::empty(), swap),
        "over" => (Libs::empty(), over),
        "rot" => (Libs::empty(), rot),
        "nip" => (Libs::empty(), nip),
        // Arithmetic
        "+" => (Libs::empty(), add),
        "-" => (Libs::empty(), subtract),
        "*" => (Libs::empty(), multiply),
        "/" => (Libs::empty(), divide),
        "//" => (Libs::empty(), floor_divide),
        "%" => (Libs::empty(), modulo),
        "neg" => (Libs::empty(), negate),
        // Comparison and logic
        "=" => (Libs::empty(), equal),
        "<>" => (Libs::empty(), not_equal),
        "<" => (Libs::empty(), less),
        ">" => (Libs::empty(), greater),
        "<=" => (Libs::empty(), less_equal),
        ">=" => (Libs::empty(), greater_equal),
        "not" => (Libs::empty(), not),
        // Control
        "call" => (Libs::empty(), call),
        "times" => (Libs::empty(), times),
        "while" => (Libs::empty(), while_loop),
        // Tables and strings
        "{}" => (Libs::empty(), new_table),
        "table-set" => (Libs::empty(), table_set),
        "table-get" => (Libs::empty(), table_get),
        "len" => (Libs::empty(), length),
        ".." => (Libs::empty(), concat),
        // base
        "error" => (Libs::BASE, error),
        "type" => (Libs::BASE, type_of),
        "tostring" => (Libs::BASE, tostring),
        "tonumber" => (Libs::BASE, tonumber),
        "get-global" => (Libs::BASE, get_global),
        "set-global" => (Libs::BASE, set_global),
        // math
        "abs" => (Libs::MATH, abs),
        "floor" => (Libs::MATH, floor),
        "ceil" => (Libs::MATH, ceil),
        "min" => (Libs::MATH, min),
        "max" => (Libs::MATH, max),
        "sqrt" => (Libs::MATH, sqrt),
        // string
        "upper" => (Libs::STRING, upper),
        "lower" => (Libs::STRING, lower),
        "string-length" => (Libs::STRING, string_length),
        "rep" => (Libs::STRING, rep),
        "substr" => (Libs::STRING, substr),
        // table
        "table-append" => (Libs::TABLE, table_append),
        "table-remove" => (Libs::TABLE, table_remove),
        "each" => (Libs::TABLE, each),
        // io
        "print" => (Libs::IO, print),
        _ => return None,
    };
    libs.contains(lib).then_some(word)
}

// ============================================================================
// Stack shuffles
// ============================================================================

/// Stack effect: ( a -- a a )
fn dup(state: &mut State) -> Result<(), RuntimeError> {
    let a = state.pop_value("dup")?;
    state.push_value(a.clone());
    state.push_value(a);
    Ok(())
}

/// Stack effect: ( a -- )
fn drop(state: &mut State) -> Result<(), RuntimeError> {
    state.pop_value("drop")?;
    Ok(())
}

/// Stack effect: ( a b -- b a )
fn swap(state: &mut State) -> Result<(), RuntimeError> {
    let b = state.pop_value("swap")?;
    let a = state.pop_value("swap")?;
    state.push_value(b);
    state.push_value(a);
    Ok(())
}

/// Stack effect: ( a b -- a b a )
fn over(state: &mut State) -> Result<(), RuntimeError> {
    let b = state.pop_value("over")?;
    let a = state.pop_value("over")?;
    state.push_value(a.clone());
    state.push_value(b);
    state.push_value(a);
    Ok(())
}

/// Stack effect: ( a b c -- b c a )
fn rot(state: &mut State) -> Result<(), RuntimeError> {
    let c = state.pop_value("rot")?;
    let b = state.pop_value("rot")?;
    let a = state.pop_value("rot")?;
    state.push_value(b);
    state.push_value(c);
    state.push_value(a);
    Ok(())
}

/// Stack effect: ( a b -- b )
fn nip(state: &mut State) -> Result<(), RuntimeError> {
    let b = state.pop_value("nip")?;
    state.pop_value("nip")?;
    state.push_value(b);
    Ok(())
}

// ============================================================================
// Arithmetic
// ============================================================================

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn float(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(n) => Value::Int(n),
            Num::Float(f) => Value::Float(f),
        }
    }
}

fn pop_num(state: &mut State, op: &str) -> Result<Num, RuntimeError> {
    match state.pop_value(op)? {
        Value::Int(n) => Ok(Num::Int(n)),
        Value::Float(f) => Ok(Num::Float(f)),
        other => Err(type_error(op, "number", &other)),
    }
}

fn pop_nums(state: &mut State, op: &str) -> Result<(Num, Num), RuntimeError> {
    let b = pop_num(state, op)?;
    let a = pop_num(state, op)?;
    Ok((a, b))
}

/// Integer operands stay integers (wrapping); anything else goes through f64
fn arith(
    state: &mut State,
    op: &str,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<(), RuntimeError> {
    let result = match pop_nums(state, op)? {
        (Num::Int(a), Num::Int(b)) => Value::Int(int_op(a, b)),
        (a, b) => Value::Float(float_op(a.float(), b.float())),
    };
    state.push_value(result);
    Ok(())
}

/// Stack effect: ( a b -- a+b )
fn add(state: &mut State) -> Result<(), RuntimeError> {
    arith(state, "+", i64::wrapping_add, |a, b| a + b)
}

/// Stack effect: ( a b -- a-b )
fn subtract(state: &mut State) -> Result<(), RuntimeError> {
    arith(state, "-", i64::wrapping_sub, |a, b| a - b)
}

/// Stack effect: ( a b -- a*b )
fn multiply(state: &mut State) -> Result<(), RuntimeError> {
    arith(state, "*", i64::wrapping_mul, |a, b| a * b)
}

/// Always produces a float
///
/// Stack effect: ( a b -- a/b )
fn divide(state: &mut State) -> Result<(), RuntimeError> {
    let (a, b) = pop_nums(state, "/")?;
    state.push_number(a.float() / b.float());
    Ok(())
}

/// Quotient rounded toward negative infinity
///
/// Stack effect: ( a b -- q )
fn floor_divide(state: &mut State) -> Result<(), RuntimeError> {
    let result = match pop_nums(state, "//")? {
        (Num::Int(_), Num::Int(0)) => return Err(RuntimeError::DivideByZero),
        (Num::Int(a), Num::Int(b)) => {
            let q = a.wrapping_div(b);
            if a.wrapping_rem(b) != 0 && (a < 0) != (b < 0) {
                Value::Int(q - 1)
            } else {
                Value::Int(q)
            }
        }
        (a, b) => Value::Float((a.float() / b.float()).floor()),
    };
    state.push_value(result);
    Ok(())
}

/// Remainder with the sign of the divisor
///
/// Stack effect: ( a b -- r )
fn modulo(state: &mut State) -> Result<(), RuntimeError> {
    let result = match pop_nums(state, "%")? {
        (Num::Int(_), Num::Int(0)) => return Err(RuntimeError::DivideByZero),
        (Num::Int(a), Num::Int(b)) => {
            let r = a.wrapping_rem(b);
            if r != 0 && (r < 0) != (b < 0) {
                Value::Int(r + b)
            } else {
                Value::Int(r)
            }
        }
        (a, b) => {
            let (a, b) = (a.float(), b.float());
            Value::Float(a - (a / b).floor() * b)
        }
    };
    state.push_value(result);
    Ok(())
}

/// Stack effect: ( a -- -a )
fn negate(state: &mut State) -> Result<(), RuntimeError> {
    let result = match pop_num(state, "neg")? {
        Num::Int(n) => Value::Int(n.wrapping_neg()),
        Num::Float(f) => Value::Float(-f),
    };
    state.push_value(result);
    Ok(())
}

// ============================================================================
// Comparison and logic
// ============================================================================

/// Stack effect: ( a b -- bool )
fn equal(state: &mut State) -> Result<(), RuntimeError> {
    let b = state.pop_value("=")?;
    let a = state.pop_value("=")?;
    state.push_boolean(a == b);
    Ok(())
}

/// Stack effect: ( a b -- bool )
fn not_equal(state: &mut State) -> Result<(), RuntimeError> {
    let b = state.pop_value("<>")?;
    let a = state.pop_value("<>")?;
    state.push_boolean(a != b);
    Ok(())
}

/// Numbers compare numerically, strings lexically; NaN compares false
fn compare(
    state: &mut State,
    op: &str,
    accept: fn(Ordering) -> bool,
) -> Result<(), RuntimeError> {
    let b = state.pop_value(op)?;
    let a = state.pop_value(op)?;
    let ordering = match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            (Some(_), None) => return Err(type_error(op, "number", &b)),
            _ => return Err(type_error(op, "number or string", &a)),
        },
    };
    state.push_boolean(ordering.is_some_and(accept));
    Ok(())
}

fn less(state: &mut State) -> Result<(), RuntimeError> {
    compare(state, "<", Ordering::is_lt)
}

fn greater(state: &mut State) -> Result<(), RuntimeError> {
    compare(state, ">", Ordering::is_gt)
}

fn less_equal(state: &mut State) -> Result<(), RuntimeError> {
    compare(state, "<=", Ordering::is_le)
}

fn greater_equal(state: &mut State) -> Result<(), RuntimeError> {
    compare(state, ">=", Ordering::is_ge)
}

/// Stack effect: ( a -- bool )
fn not(state: &mut State) -> Result<(), RuntimeError> {
    let a = state.pop_value("not")?;
    state.push_boolean(!a.truthy());
    Ok(())
}

// ============================================================================
// Control
// ============================================================================

/// Stack effect: ( ..a q -- ..b )
fn call(state: &mut State) -> Result<(), RuntimeError> {
    let q = state.pop_function("call")?;
    state.call_function(&q)
}

/// Call `q` n times
///
/// Stack effect: ( n q -- )
fn times(state: &mut State) -> Result<(), RuntimeError> {
    let q = state.pop_function("times")?;
    let n = state.pop_integer("times")?;
    for _ in 0..n.max(0) {
        state.call_function(&q)?;
    }
    Ok(())
}

/// Call `body` while `cond` leaves a true value
///
/// Stack effect: ( cond body -- )
fn while_loop(state: &mut State) -> Result<(), RuntimeError> {
    let body = state.pop_function("while")?;
    let cond = state.pop_function("while")?;
    loop {
        state.call_function(&cond)?;
        if !state.pop_value("while")?.truthy() {
            return Ok(());
        }
        state.call_function(&body)?;
    }
}

// ============================================================================
// Tables and strings
// ============================================================================

/// Stack effect: ( -- t )
fn new_table(state: &mut State) -> Result<(), RuntimeError> {
    state.create_table(0, 0);
    Ok(())
}

/// Stack effect: ( t k v -- t )
fn table_set(state: &mut State) -> Result<(), RuntimeError> {
    let value = state.pop_value("table-set")?;
    let key = state.pop_value("table-set")?;
    let table = state.pop_table("table-set")?;
    let key = MapKey::from_value(&key).map_err(RuntimeError::InvalidKey)?;
    table.borrow_mut().set(key, value);
    state.push_value(Value::Table(table));
    Ok(())
}

/// Stack effect: ( t k -- v )
fn table_get(state: &mut State) -> Result<(), RuntimeError> {
    let key = state.pop_value("table-get")?;
    let table = state.pop_table("table-get")?;
    let value = match MapKey::from_value(&key) {
        Ok(key) => table.borrow().get(&key),
        Err(_) => Value::Nil,
    };
    state.push_value(value);
    Ok(())
}

/// Byte length of a string or array border of a table
///
/// Stack effect: ( v -- n )
fn length(state: &mut State) -> Result<(), RuntimeError> {
    let n = match state.pop_value("len")? {
        Value::Str(s) => s.len(),
        Value::Table(t) => t.borrow().raw_len(),
        other => return Err(type_error("len", "string or table", &other)),
    };
    state.push_integer(n as i64);
    Ok(())
}

/// Stack effect: ( a b -- ab )
fn concat(state: &mut State) -> Result<(), RuntimeError> {
    let b = state.pop_value("..")?;
    let a = state.pop_value("..")?;
    for v in [&a, &b] {
        if !matches!(v, Value::Str(_) | Value::Int(_) | Value::Float(_)) {
            return Err(type_error("..", "string or number", v));
        }
    }
    let (a, b) = (a.to_display_string(), b.to_display_string());
    check_string_len("..", a.len().checked_add(b.len()))?;
    let joined = format!("{}{}", a, b);
    state.push_string(&joined);
    Ok(())
}

// ============================================================================
// base
// ============================================================================

/// Stack effect: ( msg -- )
fn error(state: &mut State) -> Result<(), RuntimeError> {
    let msg = state.pop_value("error")?;
    Err(RuntimeError::Raised(msg.to_display_string()))
}

/// Stack effect: ( v -- name )
fn type_of(state: &mut State) -> Result<(), RuntimeError> {
    let v = state.pop_value("type")?;
    state.push_string(v.type_name());
    Ok(())
}

/// Stack effect: ( v -- s )
fn tostring(state: &mut State) -> Result<(), RuntimeError> {
    let v = state.pop_value("tostring")?;
    state.push_string(&v.to_display_string());
    Ok(())
}

/// Numbers pass through, numeric strings convert, anything else is nil
///
/// Stack effect: ( v -- n|nil )
fn tonumber(state: &mut State) -> Result<(), RuntimeError> {
    let result = match state.pop_value("tonumber")? {
        v @ (Value::Int(_) | Value::Float(_)) => v,
        Value::Str(s) => {
            let text = s.trim();
            if let Ok(n) = text.parse::<i64>() {
                Value::Int(n)
            } else {
                match text.parse::<f64>() {
                    Ok(f) if f.is_finite() => Value::Float(f),
                    _ => Value::Nil,
                }
            }
        }
        _ => Value::Nil,
    };
    state.push_value(result);
    Ok(())
}

/// Stack effect: ( name -- v )
fn get_global(state: &mut State) -> Result<(), RuntimeError> {
    let name = state.pop_string("get-global")?;
    state.get_global(&name);
    Ok(())
}

/// Stack effect: ( v name -- )
fn set_global(state: &mut State) -> Result<(), RuntimeError> {
    let name = state.pop_string("set-global")?;
    let value = state.pop_value("set-global")?;
    state.assign_global(&name, value);
    Ok(())
}

// ============================================================================
// math
// ============================================================================

/// Stack effect: ( n -- |n| )
fn abs(state: &mut State) -> Result<(), RuntimeError> {
    let result = match pop_num(state, "abs")? {
        Num::Int(n) => Value::Int(n.wrapping_abs()),
        Num::Float(f) => Value::Float(f.abs()),
    };
    state.push_value(result);
    Ok(())
}

fn rounded(state: &mut State, op: &str, round: fn(f64) -> f64) -> Result<(), RuntimeError> {
    let result = match pop_num(state, op)? {
        Num::Int(n) => Value::Int(n),
        Num::Float(f) => {
            let r = round(f);
            float_to_integer(r).map_or(Value::Float(r), Value::Int)
        }
    };
    state.push_value(result);
    Ok(())
}

/// Stack effect: ( n -- i )
fn floor(state: &mut State) -> Result<(), RuntimeError> {
    rounded(state, "floor", f64::floor)
}

/// Stack effect: ( n -- i )
fn ceil(state: &mut State) -> Result<(), RuntimeError> {
    rounded(state, "ceil", f64::ceil)
}

/// Stack effect: ( a b -- min )
fn min(state: &mut State) -> Result<(), RuntimeError> {
    let (a, b) = pop_nums(state, "min")?;
    let pick = if b.float() < a.float() { b } else { a };
    state.push_value(pick.into_value());
    Ok(())
}

/// Stack effect: ( a b -- max )
fn max(state: &mut State) -> Result<(), RuntimeError> {
    let (a, b) = pop_nums(state, "max")?;
    let pick = if b.float() > a.float() { b } else { a };
    state.push_value(pick.into_value());
    Ok(())
}

/// Stack effect: ( n -- f )
fn sqrt(state: &mut State) -> Result<(), RuntimeError> {
    let n = pop_num(state, "sqrt")?;
    state.push_number(n.float().sqrt());
    Ok(())
}

// ============================================================================
// string
// ============================================================================

/// Stack effect: ( s -- S )
fn upper(state: &mut State) -> Result<(), RuntimeError> {
    let s = state.pop_string("upper")?;
    state.push_string(&s.to_uppercase());
    Ok(())
}

/// Stack effect: ( s -- s )
fn lower(state: &mut State) -> Result<(), RuntimeError> {
    let s = state.pop_string("lower")?;
    state.push_string(&s.to_lowercase());
    Ok(())
}

/// Length in characters
///
/// Stack effect: ( s -- n )
fn string_length(state: &mut State) -> Result<(), RuntimeError> {
    let s = state.pop_string("string-length")?;
    state.push_integer(s.chars().count() as i64);
    Ok(())
}

/// Stack effect: ( s n -- s* )
fn rep(state: &mut State) -> Result<(), RuntimeError> {
    let n = state.pop_integer("rep")?;
    let s = state.pop_string("rep")?;
    let count = usize::try_from(n.max(0)).unwrap_or(usize::MAX);
    check_string_len("rep", s.len().checked_mul(count))?;
    state.push_string(&s.repeat(count));
    Ok(())
}

fn check_string_len(op: &str, len: Option<usize>) -> Result<(), RuntimeError> {
    match len {
        Some(len) if len <= MAX_STRING_LEN => Ok(()),
        _ => Err(RuntimeError::StringTooLong {
            op: op.to_string(),
            limit: MAX_STRING_LEN,
        }),
    }
}

/// Characters `i` through `j`, 1-based and inclusive; negative positions
/// count from the end
///
/// Stack effect: ( s i j -- sub )
fn substr(state: &mut State) -> Result<(), RuntimeError> {
    let j = state.pop_integer("substr")?;
    let i = state.pop_integer("substr")?;
    let s = state.pop_string("substr")?;
    let len = s.chars().count() as i64;
    let resolve = |pos: i64| if pos < 0 { len + pos + 1 } else { pos };
    let start = resolve(i).max(1);
    let end = resolve(j).min(len);
    let sub: String = if start > end {
        String::new()
    } else {
        s.chars()
            .skip((start - 1) as usize)
            .take((end - start + 1) as usize)
            .collect()
    };
    state.push_string(&sub);
    Ok(())
}

// ============================================================================
// table
// ============================================================================

/// Stack effect: ( t v -- t )
fn table_append(state: &mut State) -> Result<(), RuntimeError> {
    let value = state.pop_value("table-append")?;
    let table = state.pop_table("table-append")?;
    table.borrow_mut().push(value);
    state.push_value(Value::Table(table));
    Ok(())
}

/// Remove the last positional value
///
/// Stack effect: ( t -- t v )
fn table_remove(state: &mut State) -> Result<(), RuntimeError> {
    let table = state.pop_table("table-remove")?;
    let value = table.borrow_mut().pop();
    state.push_value(Value::Table(table));
    state.push_value(value);
    Ok(())
}

/// Call `q` with each key and value; the entries are snapshotted first
///
/// Stack effect: ( t q -- )  where q: ( k v -- )
fn each(state: &mut State) -> Result<(), RuntimeError> {
    let q = state.pop_function("each")?;
    let table = state.pop_table("each")?;
    let pairs = table.borrow().pairs();
    for (key, value) in pairs {
        state.push_value(key.to_value());
        state.push_value(value);
        state.call_function(&q)?;
    }
    Ok(())
}

// ============================================================================
// io
// ============================================================================

/// Stack effect: ( v -- )
fn print(state: &mut State) -> Result<(), RuntimeError> {
    let v = state.pop_value("print")?;
    println!("{}", v.to_display_string());
    Ok(())
}
