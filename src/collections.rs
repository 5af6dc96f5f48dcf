//! Constructors and container operations.
//!
//! Ownership follows one rule: functions returning a [`Value`] hand the caller one
//! owned reference, functions taking `&Value` only borrow, and functions taking a
//! `Value` by move consume it, also when they fail.
use std::borrow::Cow;

use crate::{
    error::{ValueError, ValueResult},
    heap::{Heap, HeapData, HeapId},
    resource::{ResourceError, ResourceTracker},
    value::{Value, ValueKind},
    values::{Bytes, Callable, Map, Seq, Str},
};

impl<T: ResourceTracker> Heap<T> {
    fn new_ref(&mut self, data: HeapData<T>) -> Result<Value, ResourceError> {
        self.allocate(data).map(Value::Ref)
    }

    pub fn new_string(&mut self, s: impl Into<String>) -> Result<Value, ResourceError> {
        self.new_ref(HeapData::Str(Str::new(s.into())))
    }

    pub fn new_bytes(&mut self, bytes: impl Into<Vec<u8>>) -> Result<Value, ResourceError> {
        self.new_ref(HeapData::Bytes(Bytes::new(bytes.into())))
    }

    /// Creates an empty sequence.
    pub fn new_seq(&mut self) -> Result<Value, ResourceError> {
        self.new_ref(HeapData::Seq(Seq::default()))
    }

    /// Creates a sequence that takes ownership of `items`.
    pub fn new_seq_from(&mut self, items: Vec<Value>) -> Result<Value, ResourceError> {
        self.new_ref(HeapData::Seq(Seq::new(items)))
    }

    /// Creates an empty map.
    pub fn new_map(&mut self) -> Result<Value, ResourceError> {
        self.new_ref(HeapData::Map(Map::new()))
    }

    pub fn new_callable<F>(&mut self, name: impl Into<Cow<'static, str>>, func: F) -> Result<Value, ResourceError>
    where
        F: Fn(&mut Heap<T>, Vec<Value>) -> ValueResult<Value> + Send + Sync + 'static,
    {
        self.new_ref(HeapData::Callable(Callable::new(name, func)))
    }

    /// Number of characters of a string, bytes of a buffer or entries of a container.
    pub fn len(&self, value: &Value) -> ValueResult<usize> {
        match value {
            Value::Ref(id) => self
                .get(*id)
                .len()
                .ok_or_else(|| ValueError::type_mismatch("len", ValueKind::Callable)),
            other => Err(ValueError::type_mismatch("len", other.kind(self))),
        }
    }

    /// Checks the container kind, then makes its payload uniquely owned.
    fn unique_container(&mut self, value: &mut Value, kind: ValueKind, operation: &'static str) -> ValueResult<HeapId> {
        self.container_id(value, kind, operation)?;
        Ok(self.make_unique(value)?)
    }

    fn seq_mut(&mut self, id: HeapId) -> &mut Seq {
        match self.get_mut(id) {
            HeapData::Seq(seq) => seq,
            _ => panic!("Heap::seq_mut: entry is not a sequence"),
        }
    }

    fn seq_ref(&self, id: HeapId) -> &Seq {
        match self.get(id) {
            HeapData::Seq(seq) => seq,
            _ => panic!("Heap::seq_ref: entry is not a sequence"),
        }
    }

    fn map_ref(&self, id: HeapId) -> &Map {
        match self.get(id) {
            HeapData::Map(map) => map,
            _ => panic!("Heap::map_ref: entry is not a map"),
        }
    }

    /// Returns a retained handle to the element at `index`.
    pub fn seq_get(&mut self, seq: &Value, index: i64) -> ValueResult<Value> {
        let id = self.container_id(seq, ValueKind::Seq, "get_item")?;
        let items = self.seq_ref(id);
        let item = checked_index(index, items.len())
            .map(|i| items.as_slice()[i].copy_raw())
            .ok_or(ValueError::IndexOutOfRange { index, len: items.len() })?;
        if let Value::Ref(item_id) = &item {
            self.inc_ref(*item_id);
        }
        Ok(item)
    }

    /// Appends `item` to the sequence, cloning the sequence first when it is shared.
    pub fn seq_append(&mut self, seq: &mut Value, item: Value) -> ValueResult<()> {
        match self.unique_container(seq, ValueKind::Seq, "append") {
            Ok(id) => {
                self.seq_mut(id).push(item);
                Ok(())
            }
            Err(err) => {
                item.drop_with_heap(self);
                Err(err)
            }
        }
    }

    /// Replaces the element at `index`, releasing the previous element.
    pub fn seq_set(&mut self, seq: &mut Value, index: i64, item: Value) -> ValueResult<()> {
        let checked = self
            .container_id(seq, ValueKind::Seq, "set_item")
            .and_then(|id| {
                let len = self.seq_ref(id).len();
                checked_index(index, len).ok_or(ValueError::IndexOutOfRange { index, len })
            })
            .and_then(|i| Ok((self.make_unique(seq)?, i)));
        match checked {
            Ok((id, i)) => {
                let old = self.seq_mut(id).replace(i, item);
                old.drop_with_heap(self);
                Ok(())
            }
            Err(err) => {
                item.drop_with_heap(self);
                Err(err)
            }
        }
    }

    /// Removes the last element and hands it to the caller; `None` when empty.
    pub fn seq_pop(&mut self, seq: &mut Value) -> ValueResult<Option<Value>> {
        let id = self.container_id(seq, ValueKind::Seq, "pop")?;
        if self.seq_ref(id).is_empty() {
            return Ok(None);
        }
        let id = self.make_unique(seq)?;
        Ok(self.seq_mut(id).pop())
    }

    /// Borrows the elements of a sequence without touching reference counts.
    pub fn seq_iter(&self, seq: &Value) -> ValueResult<std::slice::Iter<'_, Value>> {
        let id = self.container_id(seq, ValueKind::Seq, "iterate")?;
        Ok(self.seq_ref(id).as_slice().iter())
    }

    /// Looks up `key`, returning a retained handle or Undefined when the key is absent.
    pub fn map_get(&mut self, map: &Value, key: &Value) -> ValueResult<Value> {
        let id = self.container_id(map, ValueKind::Map, "get")?;
        let found = self.map_ref(id).get(key, self).map(Value::copy_raw);
        match found {
            Some(value) => {
                if let Value::Ref(value_id) = &value {
                    self.inc_ref(*value_id);
                }
                Ok(value)
            }
            None => Ok(Value::Undefined),
        }
    }

    pub fn map_contains(&self, map: &Value, key: &Value) -> ValueResult<bool> {
        let id = self.container_id(map, ValueKind::Map, "contains")?;
        Ok(self.map_ref(id).get(key, self).is_some())
    }

    /// Inserts or replaces the entry for `key`, consuming both `key` and `value`.
    ///
    /// A replaced value is released. Keys other than bools, numbers and strings, and NaN,
    /// are rejected with `InvalidKey` before the map is touched.
    pub fn map_set(&mut self, map: &mut Value, key: Value, value: Value) -> ValueResult<()> {
        let checked = self.container_id(map, ValueKind::Map, "set_key").and_then(|_| {
            if key.key_hash(self).is_some() {
                Ok(self.make_unique(map)?)
            } else {
                Err(ValueError::InvalidKey { kind: key.kind(self) })
            }
        });
        let id = match checked {
            Ok(id) => id,
            Err(err) => {
                key.drop_with_heap(self);
                value.drop_with_heap(self);
                return Err(err);
            }
        };
        let old = self.with_entry_mut(id, |heap, data| match data {
            HeapData::Map(m) => m.set(key, value, heap),
            _ => panic!("Heap::map_set: entry is not a map"),
        })?;
        if let Some(old) = old {
            old.drop_with_heap(self);
        }
        Ok(())
    }

    /// Removes `key`, handing its value to the caller; `None` when absent.
    pub fn map_remove(&mut self, map: &mut Value, key: &Value) -> ValueResult<Option<Value>> {
        if !self.map_contains(map, key)? {
            return Ok(None);
        }
        let id = self.make_unique(map)?;
        let removed = self.with_entry_mut(id, |heap, data| match data {
            HeapData::Map(m) => m.remove(key, heap),
            _ => panic!("Heap::map_remove: entry is not a map"),
        });
        Ok(removed.map(|(stored_key, value)| {
            stored_key.drop_with_heap(self);
            value
        }))
    }

    /// Borrows the pairs of a map in insertion order without touching reference counts.
    pub fn map_iter(&self, map: &Value) -> ValueResult<impl Iterator<Item = (&Value, &Value)>> {
        let id = self.container_id(map, ValueKind::Map, "iterate")?;
        Ok(self.map_ref(id).iter())
    }

    /// Retained snapshot of the keys, in insertion order.
    pub fn map_keys(&mut self, map: &Value) -> ValueResult<Vec<Value>> {
        let items = self.map_items(map)?;
        Ok(items
            .into_iter()
            .map(|(k, v)| {
                v.drop_with_heap(self);
                k
            })
            .collect())
    }

    /// Retained snapshot of the values, in insertion order.
    pub fn map_values(&mut self, map: &Value) -> ValueResult<Vec<Value>> {
        let items = self.map_items(map)?;
        Ok(items
            .into_iter()
            .map(|(k, v)| {
                k.drop_with_heap(self);
                v
            })
            .collect())
    }

    /// Retained snapshot of the pairs, in insertion order.
    pub fn map_items(&mut self, map: &Value) -> ValueResult<Vec<(Value, Value)>> {
        let pairs: Vec<(Value, Value)> = self
            .map_iter(map)?
            .map(|(k, v)| (k.copy_raw(), v.copy_raw()))
            .collect();
        for value in pairs.iter().flat_map(|(k, v)| [k, v]) {
            if let Value::Ref(id) = value {
                self.inc_ref(*id);
            }
        }
        Ok(pairs)
    }

    /// Invokes a callable, moving `args` into it.
    ///
    /// Calling anything other than a callable fails with `TypeMismatch` and releases `args`.
    pub fn call(&mut self, callable: &Value, args: Vec<Value>) -> ValueResult<Value> {
        let func = match callable {
            Value::Ref(id) => match self.get(*id) {
                HeapData::Callable(c) => Some(c.func()),
                _ => None,
            },
            _ => None,
        };
        match func {
            Some(func) => func(self, args),
            None => {
                let kind = callable.kind(self);
                for arg in args {
                    arg.drop_with_heap(self);
                }
                Err(ValueError::type_mismatch("call", kind))
            }
        }
    }
}

/// Maps an index onto `[0, len)`; negative indexes are rejected, not counted from the end.
fn checked_index(index: i64, len: usize) -> Option<usize> {
    usize::try_from(index).ok().filter(|&i| i < len)
}
