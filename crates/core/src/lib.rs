//! stackbind core: the host-side value model
//!
//! This crate knows nothing about the embedded runtime. It provides the
//! types the marshaling layer moves across the boundary:
//!
//! - `value`: [`TaggedValue`], a closed-set discriminated union, and its tags
//! - `table`: [`Table`], ordered keyed-or-indexed aggregates that nest
//! - `render`: nested-brace rendering of tables
//! - `signature`: [`CallSignature`] and [`Returns`]
//! - `error`: value-level errors

pub mod error;
pub mod render;
pub mod signature;
pub mod table;
pub mod value;

pub use error::ValueError;
pub use signature::{CallSignature, Returns};
pub use table::{Entry, Table, TableMode};
pub use value::{Payload, Storable, TaggedValue, ValueType};
