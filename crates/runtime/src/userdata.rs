//! Named host data reachable from host functions
//!
//! Entries are owned by the registry and dropped with the state. Lookups are
//! typed: asking for the wrong type behaves like a missing entry.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

#[derive(Default)]
pub struct UserData {
    slots: HashMap<String, Box<dyn Any>>,
}

impl UserData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name`, returning the previous entry if any
    pub fn insert<T: Any>(&mut self, name: &str, value: T) -> Option<Box<dyn Any>> {
        self.slots.insert(name.to_string(), Box::new(value))
    }

    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.slots.get(name)?.downcast_ref::<T>()
    }

    pub fn get_mut<T: Any>(&mut self, name: &str) -> Option<&mut T> {
        self.slots.get_mut(name)?.downcast_mut::<T>()
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Any>> {
        self.slots.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.slots.keys().collect();
        names.sort();
        f.debug_struct("UserData").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_lookup() {
        let mut data = UserData::new();
        data.insert("counter", 41_u32);
        *data.get_mut::<u32>("counter").unwrap() += 1;
        assert_eq!(data.get::<u32>("counter"), Some(&42));
    }

    #[test]
    fn test_wrong_type_is_missing() {
        let mut data = UserData::new();
        data.insert("name", String::from("x"));
        assert!(data.get::<i64>("name").is_none());
        assert!(data.contains("name"));
    }

    #[test]
    fn test_replace_returns_previous() {
        let mut data = UserData::new();
        assert!(data.insert("v", 1_i32).is_none());
        let old = data.insert("v", 2_i32).unwrap();
        assert_eq!(old.downcast_ref::<i32>(), Some(&1));
        assert_eq!(data.len(), 1);
    }
}
