use std::cmp::Ordering;
use std::fmt::{self, Write};
use std::hash::{BuildHasher, Hash, Hasher};
use std::mem::ManuallyDrop;

use ahash::RandomState;
use strum::{AsRefStr, Display, EnumIter};

use crate::{
    error::{ValueError, ValueResult},
    heap::{Heap, HeapData, HeapId},
    resource::ResourceTracker,
};

/// Discriminator of a [`Value`].
///
/// A value's kind is fixed at construction. `Number` covers both integers and floats,
/// see [`Number`] for the sub-tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter, serde::Serialize, serde::Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Undefined,
    None,
    Bool,
    Number,
    String,
    Bytes,
    Seq,
    Map,
    Callable,
}

impl ValueKind {
    /// Kinds accepted as map keys. Of the numbers, NaN is still rejected.
    #[must_use]
    pub fn is_hashable(self) -> bool {
        matches!(self, Self::Bool | Self::Number | Self::String)
    }
}

/// Numeric payload of a `Number` value.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Float view of the number; large integers round to the nearest float.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    /// True if the number is zero (including `-0.0`).
    #[must_use]
    pub fn is_zero(self) -> bool {
        match self {
            Self::Int(i) => i == 0,
            Self::Float(f) => f == 0.0,
        }
    }

    /// The integer with the same mathematical value, if there is one.
    fn as_exact_int(self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(i),
            Self::Float(f) => float_to_exact_int(f),
        }
    }

    /// Compares two numbers by mathematical value without rounding integers to floats.
    ///
    /// Returns `None` if either side is NaN.
    #[must_use]
    pub fn compare(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(&b),
            (Self::Int(a), Self::Float(b)) => cmp_int_float(a, b),
            (Self::Float(a), Self::Int(b)) => cmp_int_float(b, a).map(Ordering::reverse),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.compare(*other) == Some(Ordering::Equal)
    }
}

/// 2^63 as a float, the first float outside the i64 range.
const I64_END: f64 = 9_223_372_036_854_775_808.0;

fn float_to_exact_int(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && (-I64_END..I64_END).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

fn cmp_int_float(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        None
    } else if f >= I64_END {
        Some(Ordering::Less)
    } else if f < -I64_END {
        Some(Ordering::Greater)
    } else {
        let truncated = f.trunc();
        // in range, so the cast is exact
        match i.cmp(&(truncated as i64)) {
            Ordering::Equal => 0.0_f64.partial_cmp(&(f - truncated)),
            ord => Some(ord),
        }
    }
}

/// Hashes of map keys are stable for the process lifetime so equal keys stored in
/// different maps land in the same bucket.
static KEY_HASHER: RandomState = RandomState::with_seeds(
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
);

/// Primary value type of the template runtime.
///
/// Scalars are stored inline and copied. Strings, bytes, sequences, maps and callables
/// live in a [`Heap`] and are referenced via `Ref(HeapId)`; each `Ref` handle owns one
/// reference to its payload.
///
/// NOTE: `Clone` is intentionally not derived. Use `clone_with_heap()` (retain) for heap
/// values, and give each handle back with `drop_with_heap()` (release).
#[derive(Debug)]
pub enum Value {
    Undefined,
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Ref(HeapId),
}

/// Drop implementation that panics if a `Ref` is dropped without `drop_with_heap`.
/// This catches reference counting bugs at the point where the handle is lost.
/// Only enabled with the `ref-count-panic` feature.
#[cfg(feature = "ref-count-panic")]
impl Drop for Value {
    fn drop(&mut self) {
        if let Self::Ref(id) = self
            && !std::thread::panicking()
        {
            panic!("Value::Ref({id:?}) dropped without drop_with_heap() - reference leaked");
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Self::Int(i),
            Number::Float(f) => Self::Float(f),
        }
    }
}

impl Value {
    /// A value that was never bound.
    #[must_use]
    pub fn new_undefined() -> Self {
        Self::Undefined
    }

    #[must_use]
    pub fn new_none() -> Self {
        Self::None
    }

    #[must_use]
    pub fn new_bool(v: bool) -> Self {
        Self::Bool(v)
    }

    #[must_use]
    pub fn new_int(v: i64) -> Self {
        Self::Int(v)
    }

    #[must_use]
    pub fn new_float(v: f64) -> Self {
        Self::Float(v)
    }

    /// Returns the kind of this value.
    #[must_use]
    pub fn kind<T: ResourceTracker>(&self, heap: &Heap<T>) -> ValueKind {
        match self {
            Self::Undefined => ValueKind::Undefined,
            Self::None => ValueKind::None,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) | Self::Float(_) => ValueKind::Number,
            Self::Ref(id) => heap.get(*id).kind(),
        }
    }

    /// Truthiness used by conditionals in templates.
    ///
    /// Undefined and none are false, numbers are false when zero, strings, bytes and
    /// containers are false when empty, callables are always true.
    #[must_use]
    pub fn is_true<T: ResourceTracker>(&self, heap: &Heap<T>) -> bool {
        match self {
            Self::Undefined | Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Ref(id) => heap.get(*id).is_true(),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_bool<T: ResourceTracker>(&self, heap: &Heap<T>) -> ValueResult<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(ValueError::type_mismatch("as_bool", other.kind(heap))),
        }
    }

    /// Integer payload; floats are rejected even when integral.
    pub fn as_int<T: ResourceTracker>(&self, heap: &Heap<T>) -> ValueResult<i64> {
        match self {
            Self::Int(i) => Ok(*i),
            other => Err(ValueError::type_mismatch("as_int", other.kind(heap))),
        }
    }

    /// Float payload; integers are converted.
    pub fn as_float<T: ResourceTracker>(&self, heap: &Heap<T>) -> ValueResult<f64> {
        self.as_number(heap).map(Number::as_f64)
    }

    pub fn as_number<T: ResourceTracker>(&self, heap: &Heap<T>) -> ValueResult<Number> {
        match self {
            Self::Int(i) => Ok(Number::Int(*i)),
            Self::Float(f) => Ok(Number::Float(*f)),
            other => Err(ValueError::type_mismatch("as_number", other.kind(heap))),
        }
    }

    pub fn as_str<'h, T: ResourceTracker>(&self, heap: &'h Heap<T>) -> ValueResult<&'h str> {
        if let Self::Ref(id) = self
            && let HeapData::Str(s) = heap.get(*id)
        {
            return Ok(s.as_str());
        }
        Err(ValueError::type_mismatch("as_str", self.kind(heap)))
    }

    pub fn as_bytes<'h, T: ResourceTracker>(&self, heap: &'h Heap<T>) -> ValueResult<&'h [u8]> {
        if let Self::Ref(id) = self
            && let HeapData::Bytes(b) = heap.get(*id)
        {
            return Ok(b.as_slice());
        }
        Err(ValueError::type_mismatch("as_bytes", self.kind(heap)))
    }

    /// Equality between values.
    ///
    /// Values of different kinds are never equal, except integers and floats with the
    /// same mathematical value. Sequences compare element-wise, maps by key set and
    /// per-key value, callables by identity.
    ///
    /// Nested containers are compared with a work stack rather than recursion, so any
    /// nesting depth is handled.
    #[must_use]
    pub fn eq_with_heap<T: ResourceTracker>(&self, other: &Self, heap: &Heap<T>) -> bool {
        let mut pending = Vec::new();
        let (mut left, mut right) = (self, other);
        loop {
            let equal = match (left, right) {
                (Self::Undefined, Self::Undefined) | (Self::None, Self::None) => true,
                (Self::Bool(a), Self::Bool(b)) => a == b,
                (Self::Ref(a), Self::Ref(b)) => a == b || heap.get(*a).eq_shallow(heap.get(*b), heap, &mut pending),
                (a, b) => match (a.number(), b.number()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
            };
            if !equal {
                return false;
            }
            match pending.pop() {
                Some((l, r)) => (left, right) = (l, r),
                None => return true,
            }
        }
    }

    /// Ordering between two numbers or two strings.
    ///
    /// Any other pairing, and NaN, has no ordering and fails with `NotComparable`.
    pub fn cmp_with_heap<T: ResourceTracker>(&self, other: &Self, heap: &Heap<T>) -> ValueResult<Ordering> {
        let ordering = match (self.number(), other.number()) {
            (Some(a), Some(b)) => a.compare(b),
            _ => match (self, other) {
                (Self::Ref(a), Self::Ref(b)) => match (heap.get(*a), heap.get(*b)) {
                    (HeapData::Str(a), HeapData::Str(b)) => Some(a.as_str().cmp(b.as_str())),
                    _ => None,
                },
                _ => None,
            },
        };
        ordering.ok_or_else(|| ValueError::NotComparable {
            left: self.kind(heap),
            right: other.kind(heap),
        })
    }

    fn number(&self) -> Option<Number> {
        match self {
            Self::Int(i) => Some(Number::Int(*i)),
            Self::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Hash used for map buckets, `None` when the value is not a valid key.
    ///
    /// Integers and integral floats hash identically, so `3` and `3.0` are one key. NaN
    /// is not a key: it would never be found again.
    pub(crate) fn key_hash<T: ResourceTracker>(&self, heap: &Heap<T>) -> Option<u64> {
        let mut hasher = KEY_HASHER.build_hasher();
        match self {
            Self::Bool(b) => {
                ValueKind::Bool.hash(&mut hasher);
                b.hash(&mut hasher);
            }
            Self::Int(_) | Self::Float(_) => {
                ValueKind::Number.hash(&mut hasher);
                match (self.number().and_then(Number::as_exact_int), self) {
                    (Some(i), _) => i.hash(&mut hasher),
                    (None, Self::Float(f)) if f.is_nan() => return None,
                    (None, Self::Float(f)) => f.to_bits().hash(&mut hasher),
                    (None, _) => {}
                }
            }
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => {
                    ValueKind::String.hash(&mut hasher);
                    s.as_str().hash(&mut hasher);
                }
                _ => return None,
            },
            Self::Undefined | Self::None => return None,
        }
        Some(hasher.finish())
    }

    /// Returns a new handle to the same value, incrementing the payload's reference
    /// count for heap values.
    #[must_use]
    pub fn clone_with_heap<T: ResourceTracker>(&self, heap: &mut Heap<T>) -> Self {
        if let Self::Ref(id) = self {
            heap.inc_ref(*id);
        }
        self.copy_raw()
    }

    /// Releases this handle, decrementing the payload's reference count for heap values.
    pub fn drop_with_heap<T: ResourceTracker>(self, heap: &mut Heap<T>) {
        if let Some(id) = self.into_raw() {
            heap.dec_ref(id);
        }
    }

    /// Bitwise copy that does not touch reference counts.
    ///
    /// The copy does not own a reference of its own; it is only valid where the caller
    /// accounts for it, e.g. right after an `inc_ref` or when it is never released.
    pub(crate) fn copy_raw(&self) -> Self {
        match self {
            Self::Undefined => Self::Undefined,
            Self::None => Self::None,
            Self::Bool(b) => Self::Bool(*b),
            Self::Int(i) => Self::Int(*i),
            Self::Float(f) => Self::Float(*f),
            Self::Ref(id) => Self::Ref(*id),
        }
    }

    /// Consumes the handle without touching the reference count, returning the heap id
    /// it pointed at. Ownership of that reference passes to the caller.
    pub(crate) fn into_raw(self) -> Option<HeapId> {
        let this = ManuallyDrop::new(self);
        match &*this {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Writes the debug form of the value: strings quoted, floats always with a
    /// fractional part, containers recursively.
    ///
    /// Containers nested deeper than the tracker's recursion limit are written as
    /// `[...]` or `{...}`.
    pub fn repr_fmt<W: Write, T: ResourceTracker>(&self, f: &mut W, heap: &Heap<T>) -> fmt::Result {
        self.repr_fmt_at(f, heap, 0)
    }

    pub(crate) fn repr_fmt_at<W: Write, T: ResourceTracker>(
        &self,
        f: &mut W,
        heap: &Heap<T>,
        depth: usize,
    ) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::None => f.write_str("none"),
            Self::Bool(true) => f.write_str("true"),
            Self::Bool(false) => f.write_str("false"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => float_repr_fmt(*v, f),
            Self::Ref(id) => heap.get(*id).repr_fmt(f, heap, depth),
        }
    }
}

/// Floats print with a fractional part so they stay distinguishable from integers.
pub(crate) fn float_repr_fmt<W: Write>(v: f64, f: &mut W) -> fmt::Result {
    if v.is_nan() {
        f.write_str("nan")
    } else if v.is_infinite() {
        f.write_str(if v > 0.0 { "inf" } else { "-inf" })
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        write!(f, "{v:.1}")
    } else {
        write!(f, "{v}")
    }
}

impl<T: ResourceTracker> Heap<T> {
    /// Debug representation of a value, e.g. `[1, 'a', none]`.
    #[must_use]
    pub fn repr(&self, value: &Value) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = value.repr_fmt(&mut out, self);
        out
    }

    /// Output form used when a value is rendered into a template.
    ///
    /// Undefined renders as nothing and strings render without quotes; everything else
    /// uses [`repr`](Self::repr).
    #[must_use]
    pub fn to_display_string(&self, value: &Value) -> String {
        match value {
            Value::Undefined => String::new(),
            other => match other.as_str(self) {
                Ok(s) => s.to_owned(),
                Err(_) => self.repr(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn kind_names_are_lowercase() {
        let names: Vec<String> = ValueKind::iter().map(|k| k.to_string()).collect();
        assert_eq!(
            names,
            ["undefined", "none", "bool", "number", "string", "bytes", "seq", "map", "callable"]
        );
        assert_eq!(ValueKind::Seq.as_ref(), "seq");
    }

    #[test]
    fn key_kinds_match_key_hashes() {
        let heap = Heap::default();
        assert!(ValueKind::Number.is_hashable());
        assert!(!ValueKind::Bytes.is_hashable());
        for value in [Value::Undefined, Value::None, Value::Bool(true), Value::Int(1), Value::Float(0.5)] {
            assert_eq!(value.kind(&heap).is_hashable(), value.key_hash(&heap).is_some());
        }
        assert!(Value::Float(f64::NAN).key_hash(&heap).is_none());
    }

    #[test]
    fn int_float_compare_exactly() {
        assert_eq!(Number::Int(3), Number::Float(3.0));
        assert_ne!(Number::Int(i64::MAX), Number::Float(I64_END));
        assert_eq!(Number::Int(i64::MAX).compare(Number::Float(I64_END)), Some(Ordering::Less));
        assert_eq!(Number::Int(-2).compare(Number::Float(-1.5)), Some(Ordering::Less));
        assert_eq!(Number::Int(1).compare(Number::Float(1.5)), Some(Ordering::Less));
        assert_eq!(Number::Float(f64::NEG_INFINITY).compare(Number::Int(i64::MIN)), Some(Ordering::Less));
        assert_eq!(Number::Int(0).compare(Number::Float(f64::NAN)), None);
    }

    #[test]
    fn equal_numbers_hash_equal() {
        let heap = Heap::default();
        assert_eq!(Value::Int(3).key_hash(&heap), Value::Float(3.0).key_hash(&heap));
        assert_eq!(Value::Int(0).key_hash(&heap), Value::Float(-0.0).key_hash(&heap));
        assert_ne!(Value::Int(1).key_hash(&heap), Value::Bool(true).key_hash(&heap));
        assert_eq!(Value::None.key_hash(&heap), None);
    }

    #[test]
    fn float_repr_keeps_fraction() {
        let heap = Heap::default();
        assert_eq!(heap.repr(&Value::Float(1.0)), "1.0");
        assert_eq!(heap.repr(&Value::Float(2.5)), "2.5");
        assert_eq!(heap.repr(&Value::Float(f64::INFINITY)), "inf");
        assert_eq!(heap.repr(&Value::Int(-7)), "-7");
        assert_eq!(heap.to_display_string(&Value::Undefined), "");
    }
}
