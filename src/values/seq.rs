use std::fmt::Write;

use crate::heap::{Heap, HeapId};
use crate::resource::ResourceTracker;
use crate::value::{Value, ValueKind};
use crate::values::MjTrait;

/// Ordered, index-addressable list of values.
///
/// # Reference Counting
/// The sequence owns one reference for every `Ref` slot. Items moved in (via `new`,
/// `push` or `set`) transfer their reference; items moved out are handed to the caller,
/// who becomes responsible for releasing them.
#[derive(Debug, Default)]
pub struct Seq(Vec<Value>);

impl Seq {
    /// Creates a sequence that takes ownership of `items`.
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self(items)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Slot at `index`, `None` when out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub(crate) fn push(&mut self, item: Value) {
        self.0.push(item);
    }

    /// Replaces the slot at `index`, returning the previous occupant.
    ///
    /// # Panics
    /// Panics if `index` is out of range; callers check bounds first.
    pub(crate) fn replace(&mut self, index: usize, item: Value) -> Value {
        std::mem::replace(&mut self.0[index], item)
    }

    pub(crate) fn pop(&mut self) -> Option<Value> {
        self.0.pop()
    }

    pub(crate) fn items_mut(&mut self) -> &mut [Value] {
        &mut self.0
    }

    /// Shallow copy: every slot is retained, payloads are shared.
    #[must_use]
    pub fn clone_with_heap<T: ResourceTracker>(&self, heap: &mut Heap<T>) -> Self {
        Self(self.0.iter().map(|v| v.clone_with_heap(heap)).collect())
    }
}

impl MjTrait for Seq {
    fn mj_kind(&self) -> ValueKind {
        ValueKind::Seq
    }

    fn mj_estimate_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.0.len() * std::mem::size_of::<Value>()
    }

    fn mj_len(&self) -> Option<usize> {
        Some(self.0.len())
    }

    fn mj_eq<'a, T: ResourceTracker>(
        &'a self,
        other: &'a Self,
        _heap: &Heap<T>,
        pending: &mut Vec<(&'a Value, &'a Value)>,
    ) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        // reversed so the work stack compares elements front to back
        pending.extend(self.0.iter().zip(&other.0).rev());
        true
    }

    fn mj_dec_ref_ids(self, stack: &mut Vec<HeapId>) {
        stack.extend(self.0.into_iter().filter_map(Value::into_raw));
    }

    fn mj_repr_fmt<W: Write, T: ResourceTracker>(&self, f: &mut W, heap: &Heap<T>, depth: usize) -> std::fmt::Result {
        let Some(depth) = heap.incr_recursion_depth_for_repr(depth) else {
            return f.write_str("[...]");
        };
        f.write_char('[')?;
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            item.repr_fmt_at(f, heap, depth)?;
        }
        f.write_char(']')
    }
}
