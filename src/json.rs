//! Conversion between values and `serde_json` trees, used to load template contexts.
use crate::{
    error::{ValueError, ValueResult},
    heap::{Heap, HeapData, HeapGuard},
    resource::ResourceTracker,
    value::Value,
};

impl<T: ResourceTracker> Heap<T> {
    /// Builds a value from JSON.
    ///
    /// Integers that fit in `i64` become integers, every other number a float. Objects
    /// become maps in document order (with the `preserve_order` feature of `serde_json`).
    /// Documents nested deeper than the tracker's recursion limit fail with
    /// `ResourceError::Recursion`.
    pub fn from_json(&mut self, json: &serde_json::Value) -> ValueResult<Value> {
        self.from_json_at(json, 0)
    }

    fn from_json_at(&mut self, json: &serde_json::Value, depth: usize) -> ValueResult<Value> {
        let value = match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => self.new_string(s.as_str())?,
            serde_json::Value::Array(array) => {
                let depth = self.incr_recursion_depth(depth)?;
                // the guard releases the elements built so far if a later one fails
                let mut guard = HeapGuard::new(Vec::<Value>::with_capacity(array.len()), self);
                for element in array {
                    let (items, heap) = guard.as_parts_mut();
                    let item = heap.from_json_at(element, depth)?;
                    items.push(item);
                }
                let items = guard.into_inner();
                self.new_seq_from(items)?
            }
            serde_json::Value::Object(object) => {
                let depth = self.incr_recursion_depth(depth)?;
                let map = self.new_map()?;
                let mut guard = HeapGuard::new(map, self);
                for (key, element) in object {
                    let (map, heap) = guard.as_parts_mut();
                    let key = heap.new_string(key.as_str())?;
                    let element = match heap.from_json_at(element, depth) {
                        Ok(element) => element,
                        Err(err) => {
                            key.drop_with_heap(heap);
                            return Err(err);
                        }
                    };
                    heap.map_set(map, key, element)?;
                }
                guard.into_inner()
            }
        };
        Ok(value)
    }

    /// Converts a value to JSON.
    ///
    /// Undefined, none and non-finite floats become `null`, bytes an array of numbers.
    /// Map keys are rendered as strings; two keys rendering to the same string (`1` and
    /// `'1'`) fail with `TypeMismatch` rather than silently dropping an entry. Callables
    /// have no JSON form and fail with `TypeMismatch`, values nested deeper than the
    /// tracker's recursion limit with `ResourceError::Recursion`.
    pub fn to_json(&self, value: &Value) -> ValueResult<serde_json::Value> {
        self.to_json_at(value, 0)
    }

    fn to_json_at(&self, value: &Value, depth: usize) -> ValueResult<serde_json::Value> {
        Ok(match value {
            Value::Undefined | Value::None => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, Into::into),
            Value::Ref(id) => match self.get(*id) {
                HeapData::Str(s) => serde_json::Value::String(s.as_str().to_owned()),
                HeapData::Bytes(b) => b.as_slice().iter().copied().collect(),
                HeapData::Seq(seq) => {
                    let depth = self.incr_recursion_depth(depth)?;
                    seq.as_slice()
                        .iter()
                        .map(|item| self.to_json_at(item, depth))
                        .collect::<ValueResult<serde_json::Value>>()?
                }
                HeapData::Map(map) => {
                    let depth = self.incr_recursion_depth(depth)?;
                    let mut object = serde_json::Map::with_capacity(map.len());
                    for (key, item) in map.iter() {
                        let name = self.to_display_string(key);
                        if object.contains_key(&name) {
                            return Err(ValueError::type_mismatch("to_json", key.kind(self)));
                        }
                        object.insert(name, self.to_json_at(item, depth)?);
                    }
                    serde_json::Value::Object(object)
                }
                HeapData::Callable(_) => return Err(ValueError::type_mismatch("to_json", value.kind(self))),
            },
        })
    }
}
