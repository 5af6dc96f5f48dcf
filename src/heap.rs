use std::mem::ManuallyDrop;

use ahash::AHashMap;

use crate::{
    error::ValueResult,
    resource::{LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker},
    value::{Value, ValueKind},
    values::{Bytes, Callable, Map, MjTrait, Seq, Str},
};

/// Unique identifier for payloads stored inside the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(usize);

impl HeapId {
    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }

    /// Rebuilds an id from a raw slot index, used when handles cross the C boundary.
    ///
    /// The id is not checked here; callers must validate it with [`Heap::contains`].
    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// HeapData captures every payload that lives in the arena.
///
/// Scalars (undefined, none, bools and numbers) never reach the heap, they are stored
/// inline in [`Value`]. Only `Seq` and `Map` are ever mutated, and only through the
/// copy-on-write path in [`Heap::make_unique`].
#[derive(Debug)]
pub enum HeapData<T: ResourceTracker> {
    Str(Str),
    Bytes(Bytes),
    Seq(Seq),
    Map(Map),
    Callable(Callable<T>),
}

impl<T: ResourceTracker> HeapData<T> {
    /// Returns the kind of the value that refers to this payload.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Str(s) => s.mj_kind(),
            Self::Bytes(b) => b.mj_kind(),
            Self::Seq(s) => s.mj_kind(),
            Self::Map(m) => m.mj_kind(),
            Self::Callable(c) => c.mj_kind(),
        }
    }

    pub(crate) fn estimate_size(&self) -> usize {
        match self {
            Self::Str(s) => s.mj_estimate_size(),
            Self::Bytes(b) => b.mj_estimate_size(),
            Self::Seq(s) => s.mj_estimate_size(),
            Self::Map(m) => m.mj_estimate_size(),
            Self::Callable(c) => c.mj_estimate_size(),
        }
    }

    pub(crate) fn len(&self) -> Option<usize> {
        match self {
            Self::Str(s) => s.mj_len(),
            Self::Bytes(b) => b.mj_len(),
            Self::Seq(s) => s.mj_len(),
            Self::Map(m) => m.mj_len(),
            Self::Callable(c) => c.mj_len(),
        }
    }

    pub(crate) fn is_true(&self) -> bool {
        match self {
            Self::Str(s) => s.mj_bool(),
            Self::Bytes(b) => b.mj_bool(),
            Self::Seq(s) => s.mj_bool(),
            Self::Map(m) => m.mj_bool(),
            Self::Callable(c) => c.mj_bool(),
        }
    }

    /// One step of structural equality, see [`Value::eq_with_heap`].
    ///
    /// Nested values still to be compared are pushed onto `pending`.
    pub(crate) fn eq_shallow<'a>(
        &'a self,
        other: &'a Self,
        heap: &Heap<T>,
        pending: &mut Vec<(&'a Value, &'a Value)>,
    ) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a.mj_eq(b, heap, pending),
            (Self::Bytes(a), Self::Bytes(b)) => a.mj_eq(b, heap, pending),
            (Self::Seq(a), Self::Seq(b)) => a.mj_eq(b, heap, pending),
            (Self::Map(a), Self::Map(b)) => a.mj_eq(b, heap, pending),
            (Self::Callable(a), Self::Callable(b)) => a.mj_eq(b, heap, pending),
            _ => false,
        }
    }

    pub(crate) fn repr_fmt<W: std::fmt::Write>(&self, f: &mut W, heap: &Heap<T>, depth: usize) -> std::fmt::Result {
        match self {
            Self::Str(s) => s.mj_repr_fmt(f, heap, depth),
            Self::Bytes(b) => b.mj_repr_fmt(f, heap, depth),
            Self::Seq(s) => s.mj_repr_fmt(f, heap, depth),
            Self::Map(m) => m.mj_repr_fmt(f, heap, depth),
            Self::Callable(c) => c.mj_repr_fmt(f, heap, depth),
        }
    }

    /// Consumes the payload, pushing the ids of every heap value it owned.
    fn into_child_ids(self, stack: &mut Vec<HeapId>) {
        match self {
            Self::Str(s) => s.mj_dec_ref_ids(stack),
            Self::Bytes(b) => b.mj_dec_ref_ids(stack),
            Self::Seq(s) => s.mj_dec_ref_ids(stack),
            Self::Map(m) => m.mj_dec_ref_ids(stack),
            Self::Callable(c) => c.mj_dec_ref_ids(stack),
        }
    }

    /// Shallow copy used by copy-on-write: every contained slot is retained, not deep copied.
    fn clone_with_heap(&self, heap: &mut Heap<T>) -> Self {
        match self {
            Self::Str(s) => Self::Str(s.clone()),
            Self::Bytes(b) => Self::Bytes(b.clone()),
            Self::Seq(s) => Self::Seq(s.clone_with_heap(heap)),
            Self::Map(m) => Self::Map(m.clone_with_heap(heap)),
            Self::Callable(c) => Self::Callable(c.clone()),
        }
    }
}

/// A single entry inside the heap arena.
///
/// The `data` field is an Option to support temporary borrowing: `with_entry_mut`
/// takes the payload out (leaving `None`) so the closure can use `&mut Heap` for
/// reference counting while it mutates the payload, then puts it back.
#[derive(Debug)]
struct HeapValue<T: ResourceTracker> {
    refcount: usize,
    /// Size reported to the tracker at allocation, handed back on free.
    size: usize,
    /// The payload. Temporarily `None` while borrowed via `with_entry_mut`.
    data: Option<HeapData<T>>,
}

/// Reference-counted arena that owns every heap payload.
///
/// Uses a free list to reuse slots from freed payloads. With the `ref-count-panic`
/// feature freed slots are poisoned instead: they are never reused, so any stale
/// handle hits a freed slot and panics rather than aliasing a newer payload.
///
/// All count changes and mutations need `&mut Heap`, so a heap has a single mutating
/// owner at a time; `&Heap` can be shared for inspection.
///
/// Generic over `T: ResourceTracker`. With `NoLimitTracker` (the default) allocation
/// never fails.
#[derive(Debug)]
pub struct Heap<T: ResourceTracker = NoLimitTracker> {
    entries: Vec<Option<HeapValue<T>>>,
    /// Freed slots available for reuse. Populated by `dec_ref`, consumed by `allocate`.
    free_list: Vec<HeapId>,
    tracker: T,
}

impl Default for Heap<NoLimitTracker> {
    fn default() -> Self {
        Self::new(0, NoLimitTracker::default())
    }
}

impl Heap<LimitedTracker> {
    /// Creates a heap that enforces the given limits.
    #[must_use]
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self::new(0, LimitedTracker::new(limits))
    }
}

macro_rules! take_data {
    ($self:ident, $id:expr, $func_name:literal) => {
        $self
            .entries
            .get_mut($id.index())
            .expect(concat!("Heap::", $func_name, ": slot missing"))
            .as_mut()
            .expect(concat!("Heap::", $func_name, ": value already freed"))
            .data
            .take()
            .expect(concat!("Heap::", $func_name, ": data already borrowed"))
    };
}

macro_rules! restore_data {
    ($self:ident, $id:expr, $new_data:expr, $func_name:literal) => {{
        let entry = $self
            .entries
            .get_mut($id.index())
            .expect(concat!("Heap::", $func_name, ": slot missing"))
            .as_mut()
            .expect(concat!("Heap::", $func_name, ": value already freed"));
        entry.data = Some($new_data);
    }};
}

impl<T: ResourceTracker> Heap<T> {
    /// Creates a new heap with the given resource tracker.
    pub fn new(capacity: usize, tracker: T) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            tracker,
        }
    }

    /// Returns a reference to the resource tracker.
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Returns a mutable reference to the resource tracker.
    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    /// Checks the nesting limit before descending one level below `depth`.
    ///
    /// Returns the depth of the nested level, or `Err(ResourceError::Recursion)` when
    /// the tracker's limit would be exceeded. The depth is threaded through the walk by
    /// the caller rather than stored on the heap, so shared `&Heap` borrows on several
    /// threads do not interfere.
    #[inline]
    pub fn incr_recursion_depth(&self, depth: usize) -> Result<usize, ResourceError> {
        self.tracker.check_recursion_depth(depth)?;
        Ok(depth + 1)
    }

    /// Like [`incr_recursion_depth`](Self::incr_recursion_depth), returning `None` past
    /// the limit.
    ///
    /// Used by repr, which truncates nested output (`[...]`) instead of failing.
    #[inline]
    pub fn incr_recursion_depth_for_repr(&self, depth: usize) -> Option<usize> {
        self.incr_recursion_depth(depth).ok()
    }

    /// Allocates a new heap entry with a reference count of 1.
    ///
    /// Takes ownership of `data`. If the tracker refuses the allocation, the values
    /// `data` holds are released before the error is returned.
    pub fn allocate(&mut self, data: HeapData<T>) -> Result<HeapId, ResourceError> {
        let size = data.estimate_size();
        if let Err(err) = self.tracker.on_allocate(|| size) {
            let mut child_ids = Vec::new();
            data.into_child_ids(&mut child_ids);
            for child_id in child_ids {
                self.dec_ref(child_id);
            }
            return Err(err);
        }

        let new_entry = HeapValue {
            refcount: 1,
            size,
            data: Some(data),
        };

        let id = if let Some(id) = self.free_list.pop() {
            self.entries[id.index()] = Some(new_entry);
            id
        } else {
            let id = HeapId(self.entries.len());
            self.entries.push(Some(new_entry));
            id
        };
        Ok(id)
    }

    /// Increments the reference count for an existing heap entry.
    ///
    /// # Panics
    /// Panics if the id is invalid or the value has already been freed.
    pub fn inc_ref(&mut self, id: HeapId) {
        let value = self
            .entries
            .get_mut(id.index())
            .expect("Heap::inc_ref: slot missing")
            .as_mut()
            .expect("Heap::inc_ref: value already freed");
        value.refcount += 1;
    }

    /// Decrements the reference count and frees the value (plus children) once it hits zero.
    ///
    /// Uses a work stack instead of recursion so releasing a deeply nested structure
    /// cannot overflow the Rust stack.
    ///
    /// # Panics
    /// Panics if the id is invalid or the value has already been freed.
    pub fn dec_ref(&mut self, id: HeapId) {
        let mut current_id = id;
        let mut work_stack = Vec::new();
        loop {
            let slot = self
                .entries
                .get_mut(current_id.index())
                .expect("Heap::dec_ref: slot missing");
            let entry = slot.as_mut().expect("Heap::dec_ref: value already freed");
            if entry.refcount > 1 {
                entry.refcount -= 1;
            } else if let Some(value) = slot.take() {
                #[cfg(not(feature = "ref-count-panic"))]
                self.free_list.push(current_id);

                self.tracker.on_free(value.size);
                let data = value
                    .data
                    .expect("Heap::dec_ref: value released while borrowed");
                data.into_child_ids(&mut work_stack);
            }

            let Some(next_id) = work_stack.pop() else {
                break;
            };
            current_id = next_id;
        }
    }

    /// Duplicates a handle, incrementing the payload's reference count for heap values.
    ///
    /// The returned handle must be released independently of `value`.
    #[must_use]
    pub fn retain(&mut self, value: &Value) -> Value {
        value.clone_with_heap(self)
    }

    /// Releases a handle, freeing its payload when this was the last reference.
    ///
    /// Consumes the handle; releasing a handle that was never owned by the caller
    /// (for example one rebuilt from a raw id) is a programmer error.
    pub fn release(&mut self, value: Value) {
        value.drop_with_heap(self);
    }

    /// True if `id` refers to a live entry in this heap.
    #[must_use]
    pub fn contains(&self, id: HeapId) -> bool {
        matches!(self.entries.get(id.index()), Some(Some(_)))
    }

    /// Returns an immutable reference to the heap data stored at the given id.
    ///
    /// # Panics
    /// Panics if the id is invalid, the value has already been freed,
    /// or the data is currently borrowed via `with_entry_mut`.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData<T> {
        self.entries
            .get(id.index())
            .expect("Heap::get: slot missing")
            .as_ref()
            .expect("Heap::get: value already freed")
            .data
            .as_ref()
            .expect("Heap::get: data currently borrowed")
    }

    /// Returns a mutable reference to the heap data stored at the given id.
    ///
    /// Only for payloads that were made unique first.
    pub(crate) fn get_mut(&mut self, id: HeapId) -> &mut HeapData<T> {
        self.entries
            .get_mut(id.index())
            .expect("Heap::get_mut: slot missing")
            .as_mut()
            .expect("Heap::get_mut: value already freed")
            .data
            .as_mut()
            .expect("Heap::get_mut: data currently borrowed")
    }

    /// Gives mutable access to a heap entry while allowing reentrant heap usage
    /// inside the closure (reference counting, reading other entries, allocating).
    pub(crate) fn with_entry_mut<F, R>(&mut self, id: HeapId, f: F) -> R
    where
        F: FnOnce(&mut Heap<T>, &mut HeapData<T>) -> R,
    {
        let mut data = take_data!(self, id, "with_entry_mut");
        let result = f(self, &mut data);
        restore_data!(self, id, data, "with_entry_mut");
        result
    }

    /// Makes the payload behind `value` uniquely owned, cloning it when it is shared.
    ///
    /// When the count is 1 the payload is returned as is and may be mutated in place.
    /// Otherwise a shallow copy is allocated (every slot retained), the caller's share
    /// of the original is released and `value` is moved to the copy, so the other
    /// owners keep observing the original.
    ///
    /// # Panics
    /// Panics if `value` is not a heap value.
    pub(crate) fn make_unique(&mut self, value: &mut Value) -> Result<HeapId, ResourceError> {
        let Value::Ref(id) = *value else {
            panic!("Heap::make_unique: value is not heap allocated");
        };
        if self.refcount_of(id) == 1 {
            return Ok(id);
        }

        let data = take_data!(self, id, "make_unique");
        let copy = data.clone_with_heap(self);
        restore_data!(self, id, data, "make_unique");

        let new_id = self.allocate(copy)?;
        self.dec_ref(id);
        let old = std::mem::replace(value, Value::Ref(new_id));
        // the share `old` stood for was released just above
        let _ = old.into_raw();
        Ok(new_id)
    }

    fn refcount_of(&self, id: HeapId) -> usize {
        self.entries
            .get(id.index())
            .expect("Heap::refcount: slot missing")
            .as_ref()
            .expect("Heap::refcount: value already freed")
            .refcount
    }

    /// Returns the reference count of a heap value, or `None` for inline scalars,
    /// which are copied rather than counted.
    ///
    /// # Panics
    /// Panics if the value has already been freed.
    #[must_use]
    pub fn ref_count(&self, value: &Value) -> Option<usize> {
        match value {
            Value::Ref(id) => Some(self.refcount_of(*id)),
            _ => None,
        }
    }

    /// Returns the number of live (non-freed) entries on the heap.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.iter().filter(|o| o.is_some()).count()
    }

    /// Snapshot of the reference count of every live entry.
    #[must_use]
    pub fn ref_counts(&self) -> AHashMap<HeapId, usize> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.as_ref().map(|e| (HeapId(index), e.refcount)))
            .collect()
    }

    /// Returns the id of `value` if it refers to a payload of the given kind.
    pub(crate) fn container_id(&self, value: &Value, kind: ValueKind, operation: &'static str) -> ValueResult<HeapId> {
        match value {
            Value::Ref(id) if self.get(*id).kind() == kind => Ok(*id),
            other => Err(crate::error::ValueError::type_mismatch(operation, other.kind(self))),
        }
    }
}

/// Drop implementation that silences the leak check for payloads still owned by the
/// heap when it goes away; those handles are owned by the heap, not by the caller.
#[cfg(feature = "ref-count-panic")]
impl<T: ResourceTracker> Drop for Heap<T> {
    fn drop(&mut self) {
        let mut dummy_stack = Vec::new();
        for entry in self.entries.drain(..).flatten() {
            if let Some(data) = entry.data {
                data.into_child_ids(&mut dummy_stack);
            }
        }
    }
}

/// Trait for types that require heap access for proper cleanup.
///
/// Rust's standard `Drop` trait cannot decrement heap reference counts because it has no
/// access to the `Heap`. This trait provides an explicit drop-with-heap method so that
/// handles (and containers of them) can release their references.
///
/// Prefer [`defer_drop!`] or [`HeapGuard`] to guarantee cleanup on every code path.
pub trait DropWithHeap {
    /// Consume `self` and release every heap reference contained within.
    fn drop_with_heap<T: ResourceTracker>(self, heap: &mut Heap<T>);
}

impl DropWithHeap for Value {
    #[inline]
    fn drop_with_heap<T: ResourceTracker>(self, heap: &mut Heap<T>) {
        Self::drop_with_heap(self, heap);
    }
}

impl<U: DropWithHeap> DropWithHeap for Option<U> {
    #[inline]
    fn drop_with_heap<T: ResourceTracker>(self, heap: &mut Heap<T>) {
        if let Some(value) = self {
            value.drop_with_heap(heap);
        }
    }
}

impl<U: DropWithHeap> DropWithHeap for Vec<U> {
    fn drop_with_heap<T: ResourceTracker>(self, heap: &mut Heap<T>) {
        for value in self {
            value.drop_with_heap(heap);
        }
    }
}

impl<U: DropWithHeap, V: DropWithHeap> DropWithHeap for (U, V) {
    fn drop_with_heap<T: ResourceTracker>(self, heap: &mut Heap<T>) {
        let (left, right) = self;
        left.drop_with_heap(heap);
        right.drop_with_heap(heap);
    }
}

/// Scoped owner of a [`DropWithHeap`] value: releases it exactly once when the guard
/// goes out of scope, whether the scope exits normally, via `?` or an early return.
///
/// This is the host-side counterpart of manual retain/release: obtain the handle from
/// a constructor or [`Heap::retain`], hand it to a guard, and never release it by hand.
/// Use [`into_inner`](Self::into_inner) to keep the value past the guard's scope.
pub struct HeapGuard<'a, T: ResourceTracker, V: DropWithHeap> {
    // manually dropped because it needs to be dropped by move.
    value: ManuallyDrop<V>,
    heap: &'a mut Heap<T>,
}

impl<'a, T: ResourceTracker, V: DropWithHeap> HeapGuard<'a, T, V> {
    /// Creates a new `HeapGuard` for the given value and heap.
    #[inline]
    pub fn new(value: V, heap: &'a mut Heap<T>) -> Self {
        Self {
            value: ManuallyDrop::new(value),
            heap,
        }
    }

    /// Consumes the guard and returns the contained value without releasing it.
    #[inline]
    pub fn into_inner(self) -> V {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: `ManuallyDrop::new(self)` prevents `Drop` on self, so the value is taken exactly once
        unsafe { ManuallyDrop::take(&mut this.value) }
    }

    /// Borrows the value (immutably) and heap (mutably) out of the guard.
    #[inline]
    pub fn as_parts(&mut self) -> (&V, &mut Heap<T>) {
        (&self.value, self.heap)
    }

    /// Borrows the value (mutably) and heap (mutably) out of the guard.
    #[inline]
    pub fn as_parts_mut(&mut self) -> (&mut V, &mut Heap<T>) {
        (&mut self.value, self.heap)
    }

    /// Borrows just the heap out of the guard.
    #[inline]
    pub fn heap(&mut self) -> &mut Heap<T> {
        self.heap
    }
}

impl<T: ResourceTracker, V: DropWithHeap> Drop for HeapGuard<'_, T, V> {
    fn drop(&mut self) {
        // SAFETY: value is never taken before this point; `into_inner` skips this Drop
        unsafe { ManuallyDrop::take(&mut self.value) }.drop_with_heap(self.heap);
    }
}

/// Releases `$value` when the current scope exits.
///
/// Creates a [`HeapGuard`] and immediately rebinds `$value` as `&V` and `$heap` as
/// `&mut Heap<T>`. For mutable access to the value use [`defer_drop_mut!`].
///
/// The macro rebinds `$heap` as a new `let` binding, so `$heap` must be a local
/// binding of type `&mut Heap<T>`.
#[macro_export]
macro_rules! defer_drop {
    ($value:ident, $heap:ident) => {
        let mut _guard = $crate::HeapGuard::new($value, $heap);
        #[allow(unused_variables)]
        let ($value, $heap) = _guard.as_parts();
    };
}

/// Like [`defer_drop!`], but rebinds `$value` as `&mut V`, e.g. to append to a
/// sequence that is released at scope exit.
#[macro_export]
macro_rules! defer_drop_mut {
    ($value:ident, $heap:ident) => {
        let mut _guard = $crate::HeapGuard::new($value, $heap);
        #[allow(unused_variables)]
        let ($value, $heap) = _guard.as_parts_mut();
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_starts_at_one_and_reuses_slots() {
        let mut heap = Heap::default();
        let id = heap.allocate(HeapData::Str("a".into())).unwrap();
        assert_eq!(heap.refcount_of(id), 1);
        heap.inc_ref(id);
        assert_eq!(heap.refcount_of(id), 2);
        heap.dec_ref(id);
        heap.dec_ref(id);
        assert!(!heap.contains(id));
        assert_eq!(heap.entry_count(), 0);

        let again = heap.allocate(HeapData::Bytes(b"b".to_vec().into())).unwrap();
        #[cfg(not(feature = "ref-count-panic"))]
        assert_eq!(again, id);
        #[cfg(feature = "ref-count-panic")]
        assert_ne!(again, id);
        heap.dec_ref(again);
    }

    #[test]
    fn dec_ref_frees_children() {
        let mut heap = Heap::default();
        let child = heap.allocate(HeapData::Str("child".into())).unwrap();
        let parent = heap
            .allocate(HeapData::Seq(Seq::new(vec![Value::Ref(child), Value::Int(1)])))
            .unwrap();
        assert_eq!(heap.entry_count(), 2);
        heap.dec_ref(parent);
        assert_eq!(heap.entry_count(), 0);
        assert_eq!(heap.tracker().live_allocations(), 0);
    }

    #[test]
    fn deep_nesting_releases_without_recursion() {
        let mut heap = Heap::default();
        let mut current = heap.allocate(HeapData::Seq(Seq::default())).unwrap();
        for _ in 0..100_000 {
            current = heap
                .allocate(HeapData::Seq(Seq::new(vec![Value::Ref(current)])))
                .unwrap();
        }
        heap.dec_ref(current);
        assert_eq!(heap.entry_count(), 0);
    }

    #[test]
    fn failed_allocation_releases_moved_children() {
        let mut heap = Heap::with_limits(ResourceLimits::new().max_allocations(1));
        let child = heap.allocate(HeapData::Str("only".into())).unwrap();
        let err = heap
            .allocate(HeapData::Seq(Seq::new(vec![Value::Ref(child)])))
            .unwrap_err();
        assert_eq!(err, ResourceError::Allocation { limit: 1, count: 2 });
        assert!(!heap.contains(child));
        assert_eq!(heap.tracker().live_allocations(), 0);
    }

    #[test]
    fn make_unique_clones_shared_payload() {
        let mut heap = Heap::default();
        let child = heap.allocate(HeapData::Str("x".into())).unwrap();
        let id = heap.allocate(HeapData::Seq(Seq::new(vec![Value::Ref(child)]))).unwrap();
        let mut a = Value::Ref(id);
        let b = heap.retain(&a);

        let unique = heap.make_unique(&mut a).unwrap();
        assert_ne!(unique, id);
        assert_eq!(heap.ref_count(&a), Some(1));
        assert_eq!(heap.ref_count(&b), Some(1));
        // both sequences hold the child
        assert_eq!(heap.refcount_of(child), 2);

        // already unique: no further copy
        assert_eq!(heap.make_unique(&mut a).unwrap(), unique);

        heap.release(a);
        heap.release(b);
        assert_eq!(heap.entry_count(), 0);
    }

    #[test]
    fn guard_releases_on_scope_exit() {
        let mut heap = Heap::default();
        let value = heap.new_string("scoped").unwrap();
        {
            let mut guard = HeapGuard::new(value, &mut heap);
            let (value, heap) = guard.as_parts();
            assert_eq!(heap.ref_count(value), Some(1));
        }
        assert_eq!(heap.entry_count(), 0);
    }

    #[test]
    fn guard_into_inner_keeps_value() {
        let mut heap = Heap::default();
        let value = heap.new_seq().unwrap();
        let guard = HeapGuard::new(value, &mut heap);
        let value = guard.into_inner();
        assert_eq!(heap.entry_count(), 1);
        heap.release(value);
    }
}
