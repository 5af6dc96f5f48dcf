use std::fmt::Write;

use ahash::AHashMap;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::{ValueError, ValueResult};
use crate::heap::{Heap, HeapId};
use crate::resource::ResourceTracker;
use crate::value::{Value, ValueKind};
use crate::values::MjTrait;

/// Slots of the entries whose keys share one hash.
type Bucket = SmallVec<[u64; 1]>;

/// Insertion-ordered mapping from hashable keys to values.
///
/// # Storage Strategy
/// Pairs live in an `IndexMap` keyed by a per-map slot number that only grows, so
/// iteration follows insertion order even when key hashes collide. A second table maps
/// each key hash to the slots holding keys with that hash; colliding keys are told
/// apart by equality.
///
/// Only bools, numbers and strings are accepted as keys, and NaN is rejected since it
/// never equals itself. Integers and integral floats are the same key (`3` and `3.0`);
/// replacing a value keeps the key that was stored first, in its original position.
///
/// # Reference Counting
/// The map owns one reference for each key and each value it stores.
#[derive(Debug, Default)]
pub struct Map {
    entries: IndexMap<u64, (Value, Value)>,
    index: AHashMap<u64, Bucket>,
    next_slot: u64,
}

impl Map {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slot of the entry whose key equals `key`, given the key's hash.
    fn find<T: ResourceTracker>(&self, hash: u64, key: &Value, heap: &Heap<T>) -> Option<u64> {
        self.index.get(&hash)?.iter().copied().find(|slot| {
            self.entries
                .get(slot)
                .is_some_and(|(stored, _)| stored.eq_with_heap(key, heap))
        })
    }

    /// Looks up `key`; `None` when absent or when `key` cannot be a map key.
    #[must_use]
    pub fn get<T: ResourceTracker>(&self, key: &Value, heap: &Heap<T>) -> Option<&Value> {
        let slot = self.find(key.key_hash(heap)?, key, heap)?;
        self.entries.get(&slot).map(|(_, v)| v)
    }

    /// Inserts or replaces the value for `key`, taking ownership of both.
    ///
    /// Returns the replaced value, if any. On replacement the stored key is kept and the
    /// new key is released. Invalid keys are rejected with `InvalidKey` after releasing
    /// both arguments.
    pub(crate) fn set<T: ResourceTracker>(
        &mut self,
        key: Value,
        value: Value,
        heap: &mut Heap<T>,
    ) -> ValueResult<Option<Value>> {
        let Some(hash) = key.key_hash(heap) else {
            let kind = key.kind(heap);
            key.drop_with_heap(heap);
            value.drop_with_heap(heap);
            return Err(ValueError::InvalidKey { kind });
        };
        Ok(self.set_hashed(hash, key, value, heap))
    }

    fn set_hashed<T: ResourceTracker>(
        &mut self,
        hash: u64,
        key: Value,
        value: Value,
        heap: &mut Heap<T>,
    ) -> Option<Value> {
        let existing = self
            .find(hash, &key, heap)
            .and_then(|slot| self.entries.get_mut(&slot));
        if let Some((_, stored)) = existing {
            let old = std::mem::replace(stored, value);
            key.drop_with_heap(heap);
            return Some(old);
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.entries.insert(slot, (key, value));
        self.index.entry(hash).or_default().push(slot);
        None
    }

    /// Removes `key`, handing the stored key and value to the caller.
    pub(crate) fn remove<T: ResourceTracker>(&mut self, key: &Value, heap: &Heap<T>) -> Option<(Value, Value)> {
        let hash = key.key_hash(heap)?;
        let slot = self.find(hash, key, heap)?;
        // shift keeps the order of the remaining entries
        let pair = self.entries.shift_remove(&slot)?;
        if let Some(bucket) = self.index.get_mut(&hash) {
            bucket.retain(|s| *s != slot);
            if bucket.is_empty() {
                self.index.remove(&hash);
            }
        }
        Some(pair)
    }

    /// Iterates pairs in insertion order without touching reference counts.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.values().map(|(k, v)| (k, v))
    }

    /// Shallow copy: every key and value is retained.
    #[must_use]
    pub fn clone_with_heap<T: ResourceTracker>(&self, heap: &mut Heap<T>) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(slot, (k, v))| (*slot, (k.clone_with_heap(heap), v.clone_with_heap(heap))))
            .collect();
        Self {
            entries,
            index: self.index.clone(),
            next_slot: self.next_slot,
        }
    }
}

impl MjTrait for Map {
    fn mj_kind(&self) -> ValueKind {
        ValueKind::Map
    }

    fn mj_estimate_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.entries.len() * std::mem::size_of::<(u64, (Value, Value))>()
            + self.index.len() * std::mem::size_of::<(u64, Bucket)>()
    }

    fn mj_len(&self) -> Option<usize> {
        Some(self.entries.len())
    }

    /// Same key set and equal values per key, regardless of insertion order.
    fn mj_eq<'a, T: ResourceTracker>(
        &'a self,
        other: &'a Self,
        heap: &Heap<T>,
        pending: &mut Vec<(&'a Value, &'a Value)>,
    ) -> bool {
        if self.len() != other.len() {
            return false;
        }
        for (key, value) in self.iter() {
            match other.get(key, heap) {
                Some(other_value) => pending.push((value, other_value)),
                None => return false,
            }
        }
        true
    }

    fn mj_dec_ref_ids(self, stack: &mut Vec<HeapId>) {
        for (key, value) in self.entries.into_values() {
            stack.extend(key.into_raw());
            stack.extend(value.into_raw());
        }
    }

    fn mj_repr_fmt<W: Write, T: ResourceTracker>(&self, f: &mut W, heap: &Heap<T>, depth: usize) -> std::fmt::Result {
        let Some(depth) = heap.incr_recursion_depth_for_repr(depth) else {
            return f.write_str("{...}");
        };
        f.write_char('{')?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            key.repr_fmt_at(f, heap, depth)?;
            f.write_str(": ")?;
            value.repr_fmt_at(f, heap, depth)?;
        }
        f.write_char('}')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_float_share_a_key() {
        let mut heap = Heap::default();
        let mut map = Map::new();
        assert!(map.set(Value::Int(3), Value::Int(1), &mut heap).unwrap().is_none());
        let old = map.set(Value::Float(3.0), Value::Int(2), &mut heap).unwrap();
        assert!(matches!(old, Some(Value::Int(1))));
        assert_eq!(map.len(), 1);
        // the first key is kept
        assert!(matches!(map.iter().next(), Some((Value::Int(3), Value::Int(2)))));
    }

    #[test]
    fn remove_keeps_order_of_the_rest() {
        let mut heap = Heap::default();
        let mut map = Map::new();
        for i in 0..4 {
            map.set(Value::Int(i), Value::Bool(i % 2 == 0), &mut heap).unwrap();
        }
        let removed = map.remove(&Value::Int(1), &heap);
        assert!(matches!(removed, Some((Value::Int(1), Value::Bool(false)))));
        assert!(map.remove(&Value::Int(1), &heap).is_none());
        assert_eq!(int_keys(&map), [0, 2, 3]);
        assert_eq!(map.len(), 3);
    }

    fn int_keys(map: &Map) -> Vec<i64> {
        map.iter()
            .map(|(k, _)| match k {
                Value::Int(i) => *i,
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn colliding_hashes_keep_insertion_order() {
        let mut heap = Heap::default();
        let mut map = Map::new();
        assert!(map.set_hashed(7, Value::Int(1), Value::None, &mut heap).is_none());
        assert!(map.set_hashed(8, Value::Int(2), Value::None, &mut heap).is_none());
        assert!(map.set_hashed(7, Value::Int(3), Value::None, &mut heap).is_none());
        assert_eq!(int_keys(&map), [1, 2, 3]);
        assert_eq!(map.index.get(&7).map(|bucket| bucket.len()), Some(2));

        // replacing a colliding key keeps its position
        let old = map.set_hashed(7, Value::Int(1), Value::Bool(true), &mut heap);
        assert!(matches!(old, Some(Value::None)));
        assert_eq!(int_keys(&map), [1, 2, 3]);
        assert!(matches!(map.iter().next(), Some((Value::Int(1), Value::Bool(true)))));
        assert!(map.find(7, &Value::Int(3), &heap).is_some());
        assert!(map.find(8, &Value::Int(3), &heap).is_none());
    }

    #[test]
    fn nan_is_not_a_key() {
        let mut heap = Heap::default();
        let mut map = Map::new();
        let err = map.set(Value::Float(f64::NAN), Value::Int(1), &mut heap).unwrap_err();
        assert_eq!(err, ValueError::InvalidKey { kind: ValueKind::Number });
        assert!(map.get(&Value::Float(f64::NAN), &heap).is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn invalid_key_releases_arguments() {
        let mut heap = Heap::default();
        let mut map = Map::new();
        let key = heap.new_seq().unwrap();
        let value = heap.new_string("v").unwrap();
        let err = map.set(key, value, &mut heap).unwrap_err();
        assert_eq!(err, ValueError::InvalidKey { kind: ValueKind::Seq });
        assert_eq!(heap.entry_count(), 0);
        assert!(map.is_empty());
    }
}
