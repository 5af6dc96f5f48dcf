//! Payload types stored on the heap.
//!
//! Each payload implements [`MjTrait`], the common interface the heap dispatches to.
pub mod bytes;
pub mod callable;
pub mod map;
pub mod seq;
pub mod str;

use std::fmt::Write;

pub use bytes::Bytes;
pub use callable::{Callable, HostFn};
pub use map::Map;
pub use seq::Seq;
pub use str::Str;

use crate::{
    heap::{Heap, HeapId},
    resource::ResourceTracker,
    value::{Value, ValueKind},
};

/// Common operations of heap payloads.
///
/// Inline scalars are handled by [`Value`](crate::Value) directly and never go through
/// this trait.
pub trait MjTrait {
    /// Kind of the value that refers to this payload.
    fn mj_kind(&self) -> ValueKind;

    /// Approximate memory used by the payload, reported to the resource tracker.
    fn mj_estimate_size(&self) -> usize;

    /// Number of elements, characters or bytes; `None` when the payload has no length.
    fn mj_len(&self) -> Option<usize>;

    /// Truthiness; by default a payload is true unless it has a length of zero.
    fn mj_bool(&self) -> bool {
        self.mj_len() != Some(0)
    }

    /// Structural equality with another payload of the same type.
    ///
    /// Compares what the payload holds directly and pushes pairs of nested values onto
    /// `pending` instead of comparing them, so the caller can walk arbitrarily deep
    /// containers without recursion. Returns false as soon as a difference is found.
    fn mj_eq<'a, T: ResourceTracker>(
        &'a self,
        other: &'a Self,
        heap: &Heap<T>,
        pending: &mut Vec<(&'a Value, &'a Value)>,
    ) -> bool;

    /// Consumes the payload, pushing the ids of all heap values it owned onto `stack`
    /// so the heap can release them.
    fn mj_dec_ref_ids(self, stack: &mut Vec<HeapId>)
    where
        Self: Sized;

    /// Writes the debug representation of the payload.
    ///
    /// `depth` is the nesting depth of the payload; containers check it against the
    /// tracker's recursion limit before writing their children.
    fn mj_repr_fmt<W: Write, T: ResourceTracker>(&self, f: &mut W, heap: &Heap<T>, depth: usize) -> std::fmt::Result;
}
