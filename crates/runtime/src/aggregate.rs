//! Tables as the runtime sees them
//!
//! An aggregate has two parts: a 1-based contiguous array part and an
//! ordered hash part for every other key. The array part's length is the
//! border reported by `raw_len`; integer keys just past the border migrate
//! into the array part as it grows, and a nil stored inside the array part
//! moves the tail back into the hash part, so the array part never holds
//! nil.

use crate::value::{MapKey, Value};
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Default)]
pub struct Aggregate {
    array: Vec<Value>,
    hash: BTreeMap<MapKey, Value>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with room for `narr` positional values
    ///
    /// The record hint is accepted for protocol symmetry; the ordered hash
    /// part has no capacity to reserve.
    pub fn with_capacity(narr: usize, _nrec: usize) -> Self {
        Aggregate {
            array: Vec::with_capacity(narr),
            hash: BTreeMap::new(),
        }
    }

    /// Length of the array part
    pub fn raw_len(&self) -> usize {
        self.array.len()
    }

    /// Total number of non-nil entries
    pub fn entry_count(&self) -> usize {
        self.array.len() + self.hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty() && self.hash.is_empty()
    }

    /// Value at `key`, nil when absent
    pub fn get(&self, key: &MapKey) -> Value {
        if let MapKey::Int(n) = key
            && let Some(value) = self.array_slot(*n)
        {
            return value.clone();
        }
        self.hash.get(key).cloned().unwrap_or_default()
    }

    pub fn get_int(&self, n: i64) -> Value {
        self.get(&MapKey::Int(n))
    }

    /// Store `value` at `key`; storing nil removes the entry
    pub fn set(&mut self, key: MapKey, value: Value) {
        if let MapKey::Int(n) = key {
            let len = self.array.len() as i64;
            if (1..=len).contains(&n) {
                let idx = (n - 1) as usize;
                if value.is_nil() {
                    let tail = self.array.split_off(idx);
                    for (offset, moved) in tail.into_iter().enumerate().skip(1) {
                        self.hash.insert(MapKey::Int(n + offset as i64), moved);
                    }
                } else {
                    self.array[idx] = value;
                }
                return;
            }
            if n == len + 1 && !value.is_nil() {
                self.hash.remove(&key);
                self.array.push(value);
                self.migrate_border();
                return;
            }
        }
        if value.is_nil() {
            self.hash.remove(&key);
        } else {
            self.hash.insert(key, value);
        }
    }

    pub fn set_int(&mut self, n: i64, value: Value) {
        self.set(MapKey::Int(n), value);
    }

    /// Append after the border
    pub fn push(&mut self, value: Value) {
        let next = self.array.len() as i64 + 1;
        self.set_int(next, value);
    }

    /// Remove and return the last array value
    pub fn pop(&mut self) -> Value {
        self.array.pop().unwrap_or_default()
    }

    /// Entry following `key` in iteration order
    ///
    /// `None` starts the walk. The array part comes first in index order,
    /// then the hash part in key order. Returns `None` when the walk is done.
    pub fn next(&self, key: Option<&MapKey>) -> Option<(MapKey, Value)> {
        let hash_from = match key {
            None => {
                if let Some(first) = self.array.first() {
                    return Some((MapKey::Int(1), first.clone()));
                }
                Bound::Unbounded
            }
            Some(MapKey::Int(n)) if self.array_slot(*n).is_some() => {
                if let Some(value) = self.array_slot(n + 1) {
                    return Some((MapKey::Int(n + 1), value.clone()));
                }
                Bound::Unbounded
            }
            Some(key) => Bound::Excluded(key),
        };
        self.hash
            .range((hash_from, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Snapshot of all entries in iteration order
    pub fn pairs(&self) -> Vec<(MapKey, Value)> {
        let positional = self
            .array
            .iter()
            .enumerate()
            .map(|(i, v)| (MapKey::Int(i as i64 + 1), v.clone()));
        let keyed = self.hash.iter().map(|(k, v)| (k.clone(), v.clone()));
        positional.chain(keyed).collect()
    }

    fn array_slot(&self, n: i64) -> Option<&Value> {
        if n >= 1 {
            self.array.get((n - 1) as usize)
        } else {
            None
        }
    }

    fn migrate_border(&mut self) {
        loop {
            let next = MapKey::Int(self.array.len() as i64 + 1);
            match self.hash.remove(&next) {
                Some(value) => self.array.push(value),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(agg: &Aggregate) -> Vec<MapKey> {
        let mut keys = Vec::new();
        let mut cursor = None;
        while let Some((key, _)) = agg.next(cursor.as_ref()) {
            keys.push(key.clone());
            cursor = Some(key);
        }
        keys
    }

    #[test]
    fn test_sequential_inserts_extend_border() {
        let mut agg = Aggregate::with_capacity(3, 0);
        agg.set_int(1, Value::Int(10));
        agg.set_int(2, Value::Int(20));
        agg.set_int(3, Value::Int(30));
        assert_eq!(agg.raw_len(), 3);
        assert_eq!(agg.get_int(2), Value::Int(20));
    }

    #[test]
    fn test_keyed_table_has_zero_border() {
        let mut agg = Aggregate::new();
        agg.set(MapKey::from("name"), Value::string("x"));
        agg.set(MapKey::from("count"), Value::Int(2));
        assert_eq!(agg.raw_len(), 0);
        assert_eq!(agg.entry_count(), 2);
    }

    #[test]
    fn test_out_of_order_keys_migrate_into_array() {
        let mut agg = Aggregate::new();
        agg.set_int(3, Value::Int(3));
        agg.set_int(2, Value::Int(2));
        assert_eq!(agg.raw_len(), 0);
        agg.set_int(1, Value::Int(1));
        assert_eq!(agg.raw_len(), 3);
        assert_eq!(agg.get_int(3), Value::Int(3));
    }

    #[test]
    fn test_nil_inside_array_moves_tail_to_hash() {
        let mut agg = Aggregate::new();
        for i in 1..=4 {
            agg.push(Value::Int(i));
        }
        agg.set_int(2, Value::Nil);
        assert_eq!(agg.raw_len(), 1);
        assert_eq!(agg.get_int(2), Value::Nil);
        assert_eq!(agg.get_int(4), Value::Int(4));
        assert_eq!(agg.entry_count(), 3);
    }

    #[test]
    fn test_next_walks_array_then_hash() {
        let mut agg = Aggregate::new();
        agg.push(Value::Int(1));
        agg.push(Value::Int(2));
        agg.set(MapKey::from("b"), Value::Bool(true));
        agg.set(MapKey::from("a"), Value::Bool(false));
        assert_eq!(
            walk(&agg),
            vec![
                MapKey::Int(1),
                MapKey::Int(2),
                MapKey::from("a"),
                MapKey::from("b")
            ]
        );
    }

    #[test]
    fn test_next_on_empty() {
        let agg = Aggregate::new();
        assert!(agg.next(None).is_none());
        assert!(walk(&agg).is_empty());
    }

    #[test]
    fn test_set_nil_removes_hash_entry() {
        let mut agg = Aggregate::new();
        agg.set(MapKey::from("k"), Value::Int(1));
        agg.set(MapKey::from("k"), Value::Nil);
        assert!(agg.is_empty());
    }

    #[test]
    fn test_pop_shrinks_border() {
        let mut agg = Aggregate::new();
        agg.push(Value::Int(1));
        agg.push(Value::Int(2));
        assert_eq!(agg.pop(), Value::Int(2));
        assert_eq!(agg.raw_len(), 1);
        agg.pop();
        assert_eq!(agg.pop(), Value::Nil);
    }
}
