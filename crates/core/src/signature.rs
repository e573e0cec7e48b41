//! Call signatures and structured results
//!
//! A [`CallSignature`] describes one function's calling shape: the argument
//! values pushed in declared order, and the types expected back. Results are
//! returned as [`Returns`], in declared order, instead of being written
//! through caller-supplied pointers.

use crate::error::ValueError;
use crate::value::{Storable, TaggedValue, ValueType};

/// Argument and return descriptors for one function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSignature {
    args: Vec<TaggedValue>,
    rets: Vec<ValueType>,
}

impl CallSignature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument; push order is declaration order
    pub fn add_arg<T: Storable>(&mut self, value: T) -> &mut Self {
        self.args.push(TaggedValue::of(value));
        self
    }

    /// Append a pre-built holder; an unset one pushes nothing
    pub fn add_tagged_arg(&mut self, value: TaggedValue) -> &mut Self {
        self.args.push(value);
        self
    }

    /// Append an argument slot that pushes nothing until a value is bound
    pub fn add_absent_arg(&mut self) -> &mut Self {
        self.args.push(TaggedValue::new());
        self
    }

    /// Append an expected return type
    pub fn add_ret(&mut self, ty: ValueType) -> &mut Self {
        self.rets.push(ty);
        self
    }

    pub fn add_ret_of<T: Storable>(&mut self) -> &mut Self {
        self.add_ret(T::TYPE)
    }

    pub fn with_arg<T: Storable>(mut self, value: T) -> Self {
        self.add_arg(value);
        self
    }

    pub fn with_ret(mut self, ty: ValueType) -> Self {
        self.add_ret(ty);
        self
    }

    /// Rebind the value of argument `index`, keeping the slot count
    ///
    /// Returns `false` when `index` is out of range.
    pub fn set_arg<T: Storable>(&mut self, index: usize, value: T) -> bool {
        match self.args.get_mut(index) {
            Some(slot) => {
                slot.store(value);
                true
            }
            None => false,
        }
    }

    pub fn args(&self) -> &[TaggedValue] {
        &self.args
    }

    pub fn rets(&self) -> &[ValueType] {
        &self.rets
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Number of arguments that will actually be pushed
    pub fn pushed_arg_count(&self) -> usize {
        self.args.iter().filter(|a| a.has_value()).count()
    }

    pub fn ret_count(&self) -> usize {
        self.rets.len()
    }
}

/// Values extracted from a call, in declared return order
///
/// A `ValueType::None` return descriptor yields an empty holder at its
/// position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Returns {
    values: Vec<TaggedValue>,
}

impl Returns {
    pub fn new(values: Vec<TaggedValue>) -> Self {
        Self { values }
    }

    /// Borrow return `index` as `T`
    ///
    /// An out-of-range index reads as an empty holder.
    pub fn get<T: Storable>(&self, index: usize) -> Result<&T, ValueError> {
        self.values
            .get(index)
            .ok_or(ValueError::EmptyValue)?
            .retrieve::<T>()
    }

    pub fn value(&self, index: usize) -> Option<&TaggedValue> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaggedValue> {
        self.values.iter()
    }

    pub fn into_values(self) -> Vec<TaggedValue> {
        self.values
    }
}

impl IntoIterator for Returns {
    type Item = TaggedValue;
    type IntoIter = std::vec::IntoIter<TaggedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_builder_order() {
        let sig = CallSignature::new()
            .with_arg(5_i64)
            .with_arg("go".to_string())
            .with_ret(ValueType::String);

        assert_eq!(sig.arg_count(), 2);
        assert_eq!(sig.ret_count(), 1);
        assert_eq!(sig.args()[0].retrieve::<i64>(), Ok(&5));
        assert_eq!(sig.args()[1].retrieve::<String>().unwrap(), "go");
        assert_eq!(sig.rets(), &[ValueType::String]);
    }

    #[test]
    fn test_absent_args_are_not_pushed() {
        let mut sig = CallSignature::new();
        sig.add_arg(1_i64).add_absent_arg().add_arg(true);
        assert_eq!(sig.arg_count(), 3);
        assert_eq!(sig.pushed_arg_count(), 2);

        assert!(sig.set_arg(1, 2.5_f64));
        assert_eq!(sig.pushed_arg_count(), 3);
        assert!(!sig.set_arg(9, 0_i64));
    }

    #[test]
    fn test_tagged_arg_keeps_holder() {
        let mut sig = CallSignature::new();
        sig.add_tagged_arg(TaggedValue::from("x"))
            .add_tagged_arg(TaggedValue::new());
        assert_eq!(sig.arg_count(), 2);
        assert_eq!(sig.pushed_arg_count(), 1);
        assert_eq!(sig.args()[0].value_type(), ValueType::String);
    }

    #[test]
    fn test_add_ret_of_uses_static_tag() {
        let mut sig = CallSignature::new();
        sig.add_ret_of::<f32>().add_ret_of::<bool>();
        assert_eq!(sig.rets(), &[ValueType::Float, ValueType::Boolean]);
    }

    #[test]
    fn test_returns_access() {
        let returns = Returns::new(vec![TaggedValue::of(1_i64), TaggedValue::new()]);
        assert_eq!(returns.get::<i64>(0), Ok(&1));
        assert_eq!(returns.get::<i64>(1), Err(ValueError::EmptyValue));
        assert_eq!(returns.get::<i64>(5), Err(ValueError::EmptyValue));
        assert_eq!(returns.len(), 2);
    }
}
