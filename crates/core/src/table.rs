//! Table: the host-side model of a runtime aggregate
//!
//! A table is an ordered list of `(key, value)` entries. Entries appended
//! without a key are positional; a table made only of positional entries is
//! [`TableMode::Indexed`] and maps to a 1-based array on the runtime side.
//! A single named entry makes it [`TableMode::Keyed`], mapped by name.
//!
//! Tables nest: an entry's [`TaggedValue`] may itself hold a `Table`, owned by
//! that entry. Nesting is strictly tree-shaped.
//!
//! # Examples
//!
//! ```rust
//! use stackbind_core::{Table, TableMode};
//!
//! let mut config = Table::named("config");
//! config.add_named("width", 640_i64);
//! config.add_named("title", "demo".to_string());
//! assert_eq!(config.mode(), TableMode::Keyed);
//!
//! let mut list = Table::new();
//! list.add_value(1_i64);
//! list.add_value(2_i64);
//! assert_eq!(list.mode(), TableMode::Indexed);
//! ```

use crate::value::{Storable, TaggedValue};

/// How a table maps onto the runtime aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    /// Name-based association
    Keyed,
    /// 1-based contiguous positions
    Indexed,
}

/// One table entry; `key` is empty for positional entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    pub key: String,
    pub value: TaggedValue,
}

impl Entry {
    pub fn is_positional(&self) -> bool {
        self.key.is_empty()
    }
}

/// Ordered, optionally named, recursively nestable collection of values
#[derive(Debug, Clone, Default)]
pub struct Table {
    name: String,
    entries: Vec<Entry>,
    cursor: usize,
    pinned: Option<TableMode>,
}

impl Table {
    /// Create an anonymous, empty table
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder form of [`Table::set_mode`]
    pub fn with_mode(mut self, mode: TableMode) -> Self {
        self.set_mode(mode);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Declare the mode before population
    ///
    /// Returns `false` (and changes nothing) once the table has entries.
    pub fn set_mode(&mut self, mode: TableMode) -> bool {
        if !self.entries.is_empty() {
            return false;
        }
        self.pinned = Some(mode);
        true
    }

    /// Declared mode, or the mode implied by the entries
    pub fn mode(&self) -> TableMode {
        if let Some(mode) = self.pinned {
            return mode;
        }
        if self.entries.iter().any(|e| !e.is_positional()) {
            TableMode::Keyed
        } else {
            TableMode::Indexed
        }
    }

    /// True when the mode was declared rather than inferred
    pub fn is_mode_pinned(&self) -> bool {
        self.pinned.is_some()
    }

    /// Append a positional entry
    pub fn add_value<T: Storable>(&mut self, value: T) -> &mut TaggedValue {
        self.add_entry("", TaggedValue::of(value))
    }

    /// Append a named entry
    pub fn add_named<T: Storable>(&mut self, name: impl Into<String>, value: T) -> &mut TaggedValue {
        self.add_entry(name, TaggedValue::of(value))
    }

    /// Append a pre-built holder, which may be empty
    pub fn add_entry(&mut self, key: impl Into<String>, value: TaggedValue) -> &mut TaggedValue {
        self.entries.push(Entry {
            key: key.into(),
            value,
        });
        let last = self.entries.len() - 1;
        &mut self.entries[last].value
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    /// First entry named `name`
    pub fn get(&self, name: &str) -> Option<&TaggedValue> {
        self.entries
            .iter()
            .find(|e| !e.is_positional() && e.key == name)
            .map(|e| &e.value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TaggedValue> {
        self.entries
            .iter_mut()
            .find(|e| !e.is_positional() && e.key == name)
            .map(|e| &mut e.value)
    }

    /// Entry at 0-based position `index`
    pub fn get_index(&self, index: usize) -> Option<&TaggedValue> {
        self.entries.get(index).map(|e| &e.value)
    }

    /// Return the entry under the cursor and advance
    ///
    /// Returns `None` once the cursor reached the end; check [`Table::is_end`]
    /// to distinguish an exhausted traversal from an empty table.
    pub fn get_next_value(&mut self) -> Option<(&str, &TaggedValue)> {
        if self.is_end() {
            return None;
        }
        let entry = &self.entries[self.cursor];
        self.cursor += 1;
        Some((entry.key.as_str(), &entry.value))
    }

    /// Key of the entry most recently returned by `get_next_value`
    pub fn value_name(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(|e| e.key.as_str())
    }

    pub fn is_end(&self) -> bool {
        self.cursor == self.entries.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Advance the cursor by one without borrowing the entry
    pub(crate) fn advance_cursor(&mut self) -> Option<usize> {
        if self.is_end() {
            return None;
        }
        self.cursor += 1;
        Some(self.cursor - 1)
    }
}

// Equality is structural: name, entries and mode. The cursor is traversal
// state, not content.
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.entries == other.entries && self.mode() == other.mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_only_is_indexed() {
        let mut table = Table::new();
        table.add_value(1_i64);
        table.add_value("two".to_string());
        table.add_value(3.0_f64);
        assert_eq!(table.mode(), TableMode::Indexed);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_named_entry_makes_keyed() {
        let mut table = Table::new();
        table.add_value(1_i64);
        table.add_named("x", 2_i64);
        assert_eq!(table.mode(), TableMode::Keyed);
    }

    #[test]
    fn test_empty_table_defaults_to_indexed() {
        assert_eq!(Table::new().mode(), TableMode::Indexed);
    }

    #[test]
    fn test_pinned_mode_only_while_empty() {
        let mut table = Table::new().with_mode(TableMode::Keyed);
        assert_eq!(table.mode(), TableMode::Keyed);
        assert!(table.is_mode_pinned());

        table.add_value(1_i64);
        assert_eq!(table.mode(), TableMode::Keyed, "pinned mode survives appends");
        assert!(!table.set_mode(TableMode::Indexed));
        assert_eq!(table.mode(), TableMode::Keyed);
    }

    #[test]
    fn test_cursor_traversal() {
        let mut table = Table::named("t");
        table.add_named("a", 1_i64);
        table.add_named("b", true);

        assert!(!table.is_end());
        let (name, value) = table.get_next_value().unwrap();
        assert_eq!(name, "a");
        assert_eq!(value.retrieve::<i64>(), Ok(&1));
        assert_eq!(table.value_name(), Some("a"));

        let (name, value) = table.get_next_value().unwrap();
        assert_eq!(name, "b");
        assert_eq!(value.retrieve::<bool>(), Ok(&true));

        assert!(table.is_end());
        assert!(table.get_next_value().is_none());

        table.reset_cursor();
        assert_eq!(table.cursor(), 0);
        assert!(!table.is_end());
    }

    #[test]
    fn test_add_returns_slot_for_restore() {
        let mut table = Table::new();
        table.add_value(1_i64).store(9_i64);
        assert_eq!(table.get_index(0).unwrap().retrieve::<i64>(), Ok(&9));
    }

    #[test]
    fn test_get_by_name_skips_positional() {
        let mut table = Table::new();
        table.add_value("positional".to_string());
        table.add_named("k", 5_i64);
        assert_eq!(table.get("k").unwrap().retrieve::<i64>(), Ok(&5));
        assert!(table.get("").is_none());
        assert!(table.get("missing").is_none());
    }

    #[test]
    fn test_equality_ignores_cursor() {
        let mut a = Table::named("same");
        a.add_value(1_i64);
        let b = a.clone();
        a.get_next_value();
        assert_eq!(a, b);
    }

    #[test]
    fn test_nested_tables_are_owned_by_entry() {
        let mut inner = Table::new();
        inner.add_value(10_i64);
        let mut outer = Table::named("outer");
        outer.add_named("inner", inner);

        outer
            .get_mut("inner")
            .unwrap()
            .retrieve_mut::<Table>()
            .unwrap()
            .add_value(20_i64);

        let inner = outer.get("inner").unwrap().retrieve::<Table>().unwrap();
        assert_eq!(inner.len(), 2);
    }
}
