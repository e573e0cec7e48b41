//! Runtime values
//!
//! `Value` is what lives on the evaluation stack, in globals and inside
//! aggregates. Strings and tables are reference counted: pushing a value
//! never deep-copies it, and two table values are equal only when they are
//! the same table.

use crate::aggregate::Aggregate;
use crate::ast::WordDef;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to an aggregate
pub type TableRef = Rc<RefCell<Aggregate>>;

/// Opaque handle into the state's host-function registration table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostId(pub(crate) usize);

impl HostId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Something that can be called
#[derive(Clone)]
pub enum Function {
    /// A script word or quotation
    Script(Rc<WordDef>),
    /// A host function, looked up by id at call time
    Host(HostId),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Script(word) => &word.name,
            Function::Host(_) => "host",
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Script(word) => write!(f, "Script({})", word.name),
            Function::Host(id) => write!(f, "Host({})", id.0),
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::Script(a), Function::Script(b)) => Rc::ptr_eq(a, b),
            (Function::Host(a), Function::Host(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Table(TableRef),
    Function(Function),
}

/// Kind of the value at a stack slot
///
/// Integers and floats are both numbers to scripts, but the host side needs
/// to tell them apart when checking return types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// The index does not name a live slot
    None,
    Nil,
    Boolean,
    Integer,
    Float,
    String,
    Table,
    Function,
}

impl Kind {
    /// Script-visible type name (`type` word)
    pub fn name(self) -> &'static str {
        match self {
            Kind::None => "no value",
            Kind::Nil => "nil",
            Kind::Boolean => "boolean",
            Kind::Integer | Kind::Float => "number",
            Kind::String => "string",
            Kind::Table => "table",
            Kind::Function => "function",
        }
    }

    pub fn is_number(self) -> bool {
        matches!(self, Kind::Integer | Kind::Float)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn new_table() -> Self {
        Value::Table(Rc::new(RefCell::new(Aggregate::new())))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Nil => Kind::Nil,
            Value::Bool(_) => Kind::Boolean,
            Value::Int(_) => Kind::Integer,
            Value::Float(_) => Kind::Float,
            Value::Str(_) => Kind::String,
            Value::Table(_) => Kind::Table,
            Value::Function(_) => Kind::Function,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only nil and false are false
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer view: integers, and floats with an exact integral value
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) => float_to_integer(*f),
            _ => None,
        }
    }

    /// Text shown by `tostring` and `print`
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.to_string(),
            Value::Table(t) => format!("table: {:p}", Rc::as_ptr(t)),
            Value::Function(func) => format!("function: {}", func.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(n) => write!(f, "Int({})", n),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Table(t) => write!(f, "Table({:p})", Rc::as_ptr(t)),
            Value::Function(func) => write!(f, "Function({:?})", func),
        }
    }
}

/// Raw equality: numbers compare by value across integer and float,
/// tables and functions by identity
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                float_to_integer(*b) == Some(*a)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

/// Hashable table key
///
/// Floats are not keys: an integral float is normalized to `Int` before it
/// reaches the table, anything else is rejected. Ordering is total so the
/// hash part iterates deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    Int(i64),
    Str(Rc<str>),
    Bool(bool),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Result<MapKey, &'static str> {
        match value {
            Value::Int(n) => Ok(MapKey::Int(*n)),
            Value::Float(f) if f.is_nan() => Err("NaN"),
            Value::Float(f) => float_to_integer(*f)
                .map(MapKey::Int)
                .ok_or("a non-integral number"),
            Value::Str(s) => Ok(MapKey::Str(Rc::clone(s))),
            Value::Bool(b) => Ok(MapKey::Bool(*b)),
            Value::Nil => Err("nil"),
            Value::Table(_) => Err("a table"),
            Value::Function(_) => Err("a function"),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Int(n) => Value::Int(*n),
            MapKey::Str(s) => Value::Str(Rc::clone(s)),
            MapKey::Bool(b) => Value::Bool(*b),
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::Str(Rc::from(s))
    }
}

impl From<i64> for MapKey {
    fn from(n: i64) -> Self {
        MapKey::Int(n)
    }
}

pub(crate) fn float_to_integer(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(Value::Bool(true).truthy());
        assert!(Value::Int(0).truthy());
        assert!(Value::string("").truthy());
    }

    #[test]
    fn test_number_equality_across_kinds() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::Float(3.5));
        assert_ne!(Value::Int(1), Value::Bool(true));
    }

    #[test]
    fn test_tables_compare_by_identity() {
        let a = Value::new_table();
        let b = Value::new_table();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_integral_float_key_normalizes() {
        assert_eq!(MapKey::from_value(&Value::Float(2.0)), Ok(MapKey::Int(2)));
        assert!(MapKey::from_value(&Value::Float(2.5)).is_err());
        assert_eq!(MapKey::from_value(&Value::Float(f64::NAN)), Err("NaN"));
        assert_eq!(MapKey::from_value(&Value::Nil), Err("nil"));
    }

    #[test]
    fn test_display_strings() {
        assert_eq!(Value::Float(10.0).to_display_string(), "10.0");
        assert_eq!(Value::Float(2.5).to_display_string(), "2.5");
        assert_eq!(Value::Int(-4).to_display_string(), "-4");
        assert_eq!(Value::Nil.to_display_string(), "nil");
        assert!(Value::new_table().to_display_string().starts_with("table: "));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::Int(1).type_name(), "number");
        assert_eq!(Value::Float(1.0).kind(), Kind::Float);
        assert!(Kind::Integer.is_number());
        assert!(!Kind::String.is_number());
    }
}
