//! TaggedValue: a closed-set discriminated union
//!
//! A holder stores at most one payload drawn from a fixed set of host types:
//! `i64`, `f32`, `f64`, `bool`, `String` and [`Table`]. The set is closed at
//! compile time through the sealed [`Storable`] trait, so `store::<u8>(..)`
//! does not build.
//!
//! Reads are checked against the live tag:
//!
//! ```rust
//! use stackbind_core::{TaggedValue, ValueError};
//!
//! let mut value = TaggedValue::new();
//! assert_eq!(value.retrieve::<i64>(), Err(ValueError::EmptyValue));
//!
//! value.store(42_i64);
//! assert_eq!(value.retrieve::<i64>(), Ok(&42));
//! assert!(value.retrieve::<String>().is_err());
//! ```

use crate::error::ValueError;
use crate::table::Table;

/// Type tag of a stored value (or of a declared argument/return slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    /// Nothing stored / optional absent slot
    #[default]
    None,
    Integer,
    Boolean,
    /// 32-bit host float
    Float,
    /// 64-bit host float
    Double,
    String,
    Table,
}

impl ValueType {
    /// Parse a type name as written in configuration and on the command line
    pub fn from_name(name: &str) -> Option<ValueType> {
        match name {
            "none" => Some(ValueType::None),
            "int" | "integer" => Some(ValueType::Integer),
            "bool" | "boolean" => Some(ValueType::Boolean),
            "float" => Some(ValueType::Float),
            "double" | "number" => Some(ValueType::Double),
            "str" | "string" => Some(ValueType::String),
            "table" => Some(ValueType::Table),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::None => "none",
            ValueType::Integer => "integer",
            ValueType::Boolean => "boolean",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Table => "table",
        }
    }

    /// True for the two floating-point tags
    pub fn is_number(self) -> bool {
        matches!(self, ValueType::Float | ValueType::Double)
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The live payload of a set holder
///
/// Exposed so callers can match exhaustively instead of probing with
/// `has_type` one type at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Integer(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    Table(Table),
}

impl Payload {
    pub fn value_type(&self) -> ValueType {
        match self {
            Payload::Integer(_) => ValueType::Integer,
            Payload::Float(_) => ValueType::Float,
            Payload::Double(_) => ValueType::Double,
            Payload::Boolean(_) => ValueType::Boolean,
            Payload::String(_) => ValueType::String,
            Payload::Table(_) => ValueType::Table,
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Host types a [`TaggedValue`] may hold
///
/// Sealed: the allowed set is exactly the implementors in this module.
pub trait Storable: sealed::Sealed + Sized {
    /// Tag recorded when a value of this type is stored
    const TYPE: ValueType;

    #[doc(hidden)]
    fn into_payload(self) -> Payload;

    #[doc(hidden)]
    fn from_payload(payload: &Payload) -> Option<&Self>;

    #[doc(hidden)]
    fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self>;

    #[doc(hidden)]
    fn take_payload(payload: Payload) -> Option<Self>;
}

macro_rules! storable {
    ($ty:ty, $variant:ident) => {
        impl sealed::Sealed for $ty {}

        impl Storable for $ty {
            const TYPE: ValueType = ValueType::$variant;

            fn into_payload(self) -> Payload {
                Payload::$variant(self)
            }

            fn from_payload(payload: &Payload) -> Option<&Self> {
                match payload {
                    Payload::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_payload_mut(payload: &mut Payload) -> Option<&mut Self> {
                match payload {
                    Payload::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn take_payload(payload: Payload) -> Option<Self> {
                match payload {
                    Payload::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

storable!(i64, Integer);
storable!(f32, Float);
storable!(f64, Double);
storable!(bool, Boolean);
storable!(String, String);
storable!(Table, Table);

/// Holder for exactly one value of the allowed host types
///
/// Created empty; `store` overwrites tag and payload together, so only one
/// payload is ever live.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggedValue {
    slot: Option<Payload>,
}

impl TaggedValue {
    /// Create an empty holder
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Create a holder already populated with `value`
    pub fn of<T: Storable>(value: T) -> Self {
        Self {
            slot: Some(value.into_payload()),
        }
    }

    /// Store `value`, replacing whatever was stored before
    pub fn store<T: Storable>(&mut self, value: T) {
        self.slot = Some(value.into_payload());
    }

    /// Borrow the stored value as `T`
    pub fn retrieve<T: Storable>(&self) -> Result<&T, ValueError> {
        let payload = self.slot.as_ref().ok_or(ValueError::EmptyValue)?;
        T::from_payload(payload).ok_or(ValueError::TypeMismatch {
            expected: T::TYPE,
            found: payload.value_type(),
        })
    }

    /// Mutably borrow the stored value as `T`
    pub fn retrieve_mut<T: Storable>(&mut self) -> Result<&mut T, ValueError> {
        let payload = self.slot.as_mut().ok_or(ValueError::EmptyValue)?;
        let found = payload.value_type();
        T::from_payload_mut(payload).ok_or(ValueError::TypeMismatch {
            expected: T::TYPE,
            found,
        })
    }

    /// Consume the holder, returning the stored value as `T`
    pub fn take<T: Storable>(self) -> Result<T, ValueError> {
        let payload = self.slot.ok_or(ValueError::EmptyValue)?;
        let found = payload.value_type();
        T::take_payload(payload).ok_or(ValueError::TypeMismatch {
            expected: T::TYPE,
            found,
        })
    }

    /// True only when a value of type `T` is currently stored
    ///
    /// An empty holder reports `false` for every type.
    pub fn has_type<T: Storable>(&self) -> bool {
        self.value_type() == T::TYPE && self.has_value()
    }

    pub fn has_value(&self) -> bool {
        self.slot.is_some()
    }

    /// Live tag, `ValueType::None` when empty
    pub fn value_type(&self) -> ValueType {
        self.slot
            .as_ref()
            .map_or(ValueType::None, Payload::value_type)
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.slot.as_ref()
    }

    pub fn payload_mut(&mut self) -> Option<&mut Payload> {
        self.slot.as_mut()
    }

    /// Return the holder to the empty state
    pub fn clear(&mut self) {
        self.slot = None;
    }
}

impl<T: Storable> From<T> for TaggedValue {
    fn from(value: T) -> Self {
        TaggedValue::of(value)
    }
}

impl From<&str> for TaggedValue {
    fn from(value: &str) -> Self {
        TaggedValue::of(value.to_string())
    }
}
