#![doc = include_str!("../README.md")]
// first to include defer_drop macro
mod heap;

mod collections;
mod error;
pub mod ffi;
mod json;
mod resource;
mod sorting;
mod value;
mod values;

pub use crate::{
    error::{ValueError, ValueResult},
    heap::{DropWithHeap, Heap, HeapData, HeapGuard, HeapId},
    resource::{DEFAULT_RECURSION_LIMIT, LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker},
    value::{Number, Value, ValueKind},
    values::{Bytes, Callable, HostFn, Map, MjTrait, Seq, Str},
};
