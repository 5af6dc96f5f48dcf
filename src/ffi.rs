//! C ABI over the value API.
//!
//! A handle is a plain [`MjValue`] struct: scalars are carried inline, heap values as
//! a slot index into the [`MjHeap`] that created them. Like the Rust API, every
//! handle returned to the caller owns one reference, which must be given back with
//! [`mj_value_decref`]; functions taking `MjValue` by value only borrow, functions
//! taking `*mut MjValue` may consume or update the handle in place.
//!
//! Handles are validated against the heap before use: a handle whose slot is free, or
//! whose kind tag disagrees with the slot, yields [`MjStatus::InvalidHandle`].
use std::mem::ManuallyDrop;

use strum::FromRepr;

use crate::{
    error::ValueError,
    heap::{Heap, HeapId},
    resource::NoLimitTracker,
    value::{Value, ValueKind},
};

/// Heap type behind the opaque `MjHeap*` pointer.
pub type MjHeap = Heap<NoLimitTracker>;

/// Set in [`MjValue::flags`] when a number handle carries a float.
pub const MJ_FLAG_FLOAT: u32 = 1;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
pub enum MjValueKind {
    Undefined = 0,
    None = 1,
    Bool = 2,
    Number = 3,
    String = 4,
    Bytes = 5,
    Seq = 6,
    Map = 7,
    Callable = 8,
}

impl From<ValueKind> for MjValueKind {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Undefined => Self::Undefined,
            ValueKind::None => Self::None,
            ValueKind::Bool => Self::Bool,
            ValueKind::Number => Self::Number,
            ValueKind::String => Self::String,
            ValueKind::Bytes => Self::Bytes,
            ValueKind::Seq => Self::Seq,
            ValueKind::Map => Self::Map,
            ValueKind::Callable => Self::Callable,
        }
    }
}

/// Result code of fallible C functions.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MjStatus {
    Ok = 0,
    TypeMismatch = 1,
    NotComparable = 2,
    IndexOutOfRange = 3,
    InvalidKey = 4,
    ResourceLimit = 5,
    HostError = 6,
    InvalidHandle = 7,
    NullPointer = 8,
    InvalidUtf8 = 9,
}

impl From<ValueError> for MjStatus {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::TypeMismatch { .. } => Self::TypeMismatch,
            ValueError::NotComparable { .. } => Self::NotComparable,
            ValueError::IndexOutOfRange { .. } => Self::IndexOutOfRange,
            ValueError::InvalidKey { .. } => Self::InvalidKey,
            ValueError::Host(_) => Self::HostError,
            ValueError::Resource(_) => Self::ResourceLimit,
        }
    }
}

/// A value handle as seen from C.
///
/// `kind` holds an [`MjValueKind`] discriminant. `data` is the bool (0 or 1), the
/// integer bits, the float bits (with [`MJ_FLAG_FLOAT`] set) or the heap slot index.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MjValue {
    pub kind: u32,
    pub flags: u32,
    pub data: u64,
}

impl MjValue {
    const UNDEFINED: Self = Self {
        kind: MjValueKind::Undefined as u32,
        flags: 0,
        data: 0,
    };

    fn scalar(kind: MjValueKind, flags: u32, data: u64) -> Self {
        Self {
            kind: kind as u32,
            flags,
            data,
        }
    }
}

/// Turns a value into a handle; the reference `value` owned now belongs to the handle.
fn encode(value: Value, heap: &MjHeap) -> MjValue {
    match value {
        Value::Undefined => MjValue::UNDEFINED,
        Value::None => MjValue::scalar(MjValueKind::None, 0, 0),
        Value::Bool(b) => MjValue::scalar(MjValueKind::Bool, 0, u64::from(b)),
        Value::Int(i) => MjValue::scalar(MjValueKind::Number, 0, i as u64),
        Value::Float(f) => MjValue::scalar(MjValueKind::Number, MJ_FLAG_FLOAT, f.to_bits()),
        Value::Ref(id) => {
            let kind = MjValueKind::from(heap.get(id).kind());
            let _ = value.into_raw();
            MjValue::scalar(kind, 0, id.index() as u64)
        }
    }
}

/// Validates a handle and returns a view of it that is never released.
///
/// `heap` may be `None` for scalar handles.
fn decode(heap: Option<&MjHeap>, handle: &MjValue) -> Result<ManuallyDrop<Value>, MjStatus> {
    let kind = MjValueKind::from_repr(handle.kind).ok_or(MjStatus::InvalidHandle)?;
    let value = match kind {
        MjValueKind::Undefined => Value::Undefined,
        MjValueKind::None => Value::None,
        MjValueKind::Bool => match handle.data {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            _ => return Err(MjStatus::InvalidHandle),
        },
        MjValueKind::Number if handle.flags & MJ_FLAG_FLOAT != 0 => Value::Float(f64::from_bits(handle.data)),
        MjValueKind::Number => Value::Int(handle.data as i64),
        _ => {
            let heap = heap.ok_or(MjStatus::NullPointer)?;
            let id = usize::try_from(handle.data)
                .map(HeapId::from_index)
                .map_err(|_| MjStatus::InvalidHandle)?;
            if !heap.contains(id) || MjValueKind::from(heap.get(id).kind()) != kind {
                return Err(MjStatus::InvalidHandle);
            }
            Value::Ref(id)
        }
    };
    Ok(ManuallyDrop::new(value))
}

/// Turns a validated view into an owned value.
///
/// A handle that already handed its reference to another argument of the same call
/// (the caller passed one pointer twice) is retained instead, so each argument owns
/// its own reference.
fn claim(heap: &mut MjHeap, view: ManuallyDrop<Value>, aliased: bool) -> Value {
    if aliased {
        view.clone_with_heap(heap)
    } else {
        ManuallyDrop::into_inner(view)
    }
}

fn status<T>(result: Result<T, ValueError>) -> Result<T, MjStatus> {
    result.map_err(MjStatus::from)
}

/// Creates an empty heap. Free it with [`mj_heap_free`].
#[unsafe(no_mangle)]
pub extern "C" fn mj_heap_new() -> *mut MjHeap {
    Box::into_raw(Box::new(MjHeap::default()))
}

/// Frees a heap and every payload still on it. Handles into it become invalid.
///
/// # Safety
/// `heap` must be null or a pointer returned by [`mj_heap_new`] that was not freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_heap_free(heap: *mut MjHeap) {
    if !heap.is_null() {
        // SAFETY: the caller guarantees the pointer came from `mj_heap_new`
        drop(unsafe { Box::from_raw(heap) });
    }
}

/// Number of live payloads on the heap, 0 for a null heap.
///
/// # Safety
/// `heap` must be null or a live heap pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_heap_live_count(heap: *const MjHeap) -> usize {
    // SAFETY: the caller guarantees the pointer is null or live
    unsafe { heap.as_ref() }.map_or(0, MjHeap::entry_count)
}

#[unsafe(no_mangle)]
pub extern "C" fn mj_value_new_undefined() -> MjValue {
    MjValue::UNDEFINED
}

#[unsafe(no_mangle)]
pub extern "C" fn mj_value_new_none() -> MjValue {
    MjValue::scalar(MjValueKind::None, 0, 0)
}

#[unsafe(no_mangle)]
pub extern "C" fn mj_value_new_bool(value: bool) -> MjValue {
    MjValue::scalar(MjValueKind::Bool, 0, u64::from(value))
}

#[unsafe(no_mangle)]
pub extern "C" fn mj_value_new_int(value: i64) -> MjValue {
    MjValue::scalar(MjValueKind::Number, 0, value as u64)
}

#[unsafe(no_mangle)]
pub extern "C" fn mj_value_new_float(value: f64) -> MjValue {
    MjValue::scalar(MjValueKind::Number, MJ_FLAG_FLOAT, value.to_bits())
}

/// Copies `len` bytes of UTF-8 text into a new string value written to `out`.
///
/// # Safety
/// `heap` must be a live heap, `ptr` must be valid for reading `len` bytes (it may be
/// null when `len` is 0) and `out` must be valid for writing.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_new_string(
    heap: *mut MjHeap,
    ptr: *const u8,
    len: usize,
    out: *mut MjValue,
) -> MjStatus {
    // SAFETY: the caller guarantees the pointers are valid
    let (Some(heap), Some(bytes), Some(out)) = (
        unsafe { heap.as_mut() },
        unsafe { byte_slice(ptr, len) },
        unsafe { out.as_mut() },
    ) else {
        return MjStatus::NullPointer;
    };
    let Ok(text) = std::str::from_utf8(bytes) else {
        return MjStatus::InvalidUtf8;
    };
    match heap.new_string(text) {
        Ok(value) => {
            *out = encode(value, heap);
            MjStatus::Ok
        }
        Err(err) => ValueError::from(err).into(),
    }
}

/// Copies `len` bytes into a new bytes value written to `out`.
///
/// # Safety
/// Same requirements as [`mj_value_new_string`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_new_bytes(
    heap: *mut MjHeap,
    ptr: *const u8,
    len: usize,
    out: *mut MjValue,
) -> MjStatus {
    // SAFETY: the caller guarantees the pointers are valid
    let (Some(heap), Some(bytes), Some(out)) = (
        unsafe { heap.as_mut() },
        unsafe { byte_slice(ptr, len) },
        unsafe { out.as_mut() },
    ) else {
        return MjStatus::NullPointer;
    };
    match heap.new_bytes(bytes) {
        Ok(value) => {
            *out = encode(value, heap);
            MjStatus::Ok
        }
        Err(err) => ValueError::from(err).into(),
    }
}

/// # Safety
/// `ptr` must be valid for reading `len` bytes, or null with `len == 0`.
unsafe fn byte_slice<'a>(ptr: *const u8, len: usize) -> Option<&'a [u8]> {
    if len == 0 {
        Some(&[])
    } else if ptr.is_null() {
        None
    } else {
        // SAFETY: guaranteed by the caller
        Some(unsafe { std::slice::from_raw_parts(ptr, len) })
    }
}

/// Creates an empty sequence; returns an undefined handle if `heap` is null.
///
/// # Safety
/// `heap` must be null or a live heap.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_new_list(heap: *mut MjHeap) -> MjValue {
    // SAFETY: the caller guarantees the pointer is null or live
    let Some(heap) = (unsafe { heap.as_mut() }) else {
        return MjValue::UNDEFINED;
    };
    heap.new_seq().map_or(MjValue::UNDEFINED, |value| encode(value, heap))
}

/// Creates an empty map; returns an undefined handle if `heap` is null.
///
/// # Safety
/// `heap` must be null or a live heap.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_new_map(heap: *mut MjHeap) -> MjValue {
    // SAFETY: the caller guarantees the pointer is null or live
    let Some(heap) = (unsafe { heap.as_mut() }) else {
        return MjValue::UNDEFINED;
    };
    heap.new_map().map_or(MjValue::UNDEFINED, |value| encode(value, heap))
}

/// Kind of a handle, read from its tag. Unknown tags report undefined.
#[unsafe(no_mangle)]
pub extern "C" fn mj_value_get_kind(value: MjValue) -> MjValueKind {
    MjValueKind::from_repr(value.kind).unwrap_or(MjValueKind::Undefined)
}

/// Truthiness of a handle; invalid handles are false. Scalars accept a null heap.
///
/// # Safety
/// `heap` must be null or a live heap.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_is_true(heap: *const MjHeap, value: MjValue) -> bool {
    // SAFETY: the caller guarantees the pointer is null or live
    let heap = unsafe { heap.as_ref() };
    match decode(heap, &value) {
        Ok(value) => match heap {
            Some(heap) => value.is_true(heap),
            None => value.is_true(&MjHeap::default()),
        },
        Err(_) => false,
    }
}

/// Writes the length of a string, bytes, sequence or map to `out_len`.
///
/// # Safety
/// `heap` must be a live heap and `out_len` valid for writing.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_len(heap: *const MjHeap, value: MjValue, out_len: *mut usize) -> MjStatus {
    // SAFETY: the caller guarantees the pointers are valid
    let (Some(heap), Some(out_len)) = (unsafe { heap.as_ref() }, unsafe { out_len.as_mut() }) else {
        return MjStatus::NullPointer;
    };
    let result = decode(Some(heap), &value).and_then(|value| status(heap.len(&value)));
    match result {
        Ok(len) => {
            *out_len = len;
            MjStatus::Ok
        }
        Err(status) => status,
    }
}

/// Equality of two handles; false if either is invalid.
///
/// # Safety
/// `heap` must be null or a live heap.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_eq(heap: *const MjHeap, a: MjValue, b: MjValue) -> bool {
    // SAFETY: the caller guarantees the pointer is null or live
    let heap = unsafe { heap.as_ref() };
    match (decode(heap, &a), decode(heap, &b), heap) {
        (Ok(a), Ok(b), Some(heap)) => a.eq_with_heap(&b, heap),
        (Ok(a), Ok(b), None) => a.eq_with_heap(&b, &MjHeap::default()),
        _ => false,
    }
}

/// Returns a new handle sharing the payload of `value` (retain).
///
/// Invalid handles yield an undefined handle.
///
/// # Safety
/// `heap` must be null or a live heap.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_incref(heap: *mut MjHeap, value: MjValue) -> MjValue {
    // SAFETY: the caller guarantees the pointer is null or live
    let heap = unsafe { heap.as_mut() };
    match (decode(heap.as_deref(), &value), heap) {
        (Ok(_), None) => value,
        (Ok(view), Some(heap)) => {
            let copy = view.clone_with_heap(heap);
            encode(copy, heap)
        }
        (Err(_), _) => MjValue::UNDEFINED,
    }
}

/// Releases the reference owned by `*value` and resets the handle to undefined.
///
/// Invalid handles are left untouched.
///
/// # Safety
/// `value` must be valid for reading and writing; `heap` must be a live heap unless
/// the handle is a scalar.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_decref(heap: *mut MjHeap, value: *mut MjValue) {
    // SAFETY: the caller guarantees the pointers are valid
    let (heap, Some(handle)) = (unsafe { heap.as_mut() }, unsafe { value.as_mut() }) else {
        return;
    };
    if let Ok(view) = decode(heap.as_deref(), handle) {
        let owned = ManuallyDrop::into_inner(view);
        match heap {
            Some(heap) => owned.drop_with_heap(heap),
            // decode only succeeds without a heap for scalars
            None => drop(owned),
        }
        *handle = MjValue::UNDEFINED;
    }
}

/// Appends `*item` to the sequence `*seq`.
///
/// `*item` is consumed (reset to undefined) whenever both handles are valid, even if
/// the append fails. `*seq` may be replaced by a handle to a fresh copy when its
/// payload was shared. `seq` and `item` may be the same pointer: the sequence is then
/// appended to a copy of itself and the handle moves to the copy.
///
/// # Safety
/// `heap` must be a live heap; `seq` and `item` must be valid for reading and writing.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_append(heap: *mut MjHeap, seq: *mut MjValue, item: *mut MjValue) -> MjStatus {
    // SAFETY: the caller guarantees the heap pointer is valid
    let Some(heap) = (unsafe { heap.as_mut() }) else {
        return MjStatus::NullPointer;
    };
    if seq.is_null() || item.is_null() {
        return MjStatus::NullPointer;
    }
    // handles are copied out and written back through the raw pointers, which may alias
    // SAFETY: both pointers are non-null and valid for reads per the caller's contract
    let (seq_handle, item_handle) = unsafe { (seq.read(), item.read()) };
    let (target, item_view) = match (decode(Some(&*heap), &seq_handle), decode(Some(&*heap), &item_handle)) {
        (Ok(target), Ok(item_view)) => (target, item_view),
        (Err(status), _) | (_, Err(status)) => return status,
    };
    let mut target = ManuallyDrop::into_inner(target);
    let item_value = claim(heap, item_view, std::ptr::eq(item, seq));

    let result = heap.seq_append(&mut target, item_value);
    // SAFETY: valid for writes per the caller's contract; `seq` goes last so it wins
    // when both pointers refer to one handle
    unsafe {
        item.write(MjValue::UNDEFINED);
        seq.write(encode(target, heap));
    }
    result.map_or_else(MjStatus::from, |()| MjStatus::Ok)
}

/// Writes a new handle to the element at `index` into `out`.
///
/// # Safety
/// `heap` must be a live heap and `out` valid for writing.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_get_item_by_index(
    heap: *mut MjHeap,
    seq: MjValue,
    index: i64,
    out: *mut MjValue,
) -> MjStatus {
    // SAFETY: the caller guarantees the pointers are valid
    let (Some(heap), Some(out)) = (unsafe { heap.as_mut() }, unsafe { out.as_mut() }) else {
        return MjStatus::NullPointer;
    };
    let result = decode(Some(&*heap), &seq).and_then(|seq| status(heap.seq_get(&seq, index)));
    match result {
        Ok(item) => {
            *out = encode(item, heap);
            MjStatus::Ok
        }
        Err(status) => status,
    }
}

/// Inserts or replaces `*key` in the map `*map`, consuming `*key` and `*value`.
///
/// Both are reset to undefined whenever all three handles are valid, even if the
/// insert fails. `*map` may be replaced by a handle to a fresh copy. Passing the same
/// pointer for several arguments is allowed; each use counts as its own reference.
///
/// # Safety
/// `heap` must be a live heap; `map`, `key` and `value` must be valid for reading
/// and writing.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_set_key(
    heap: *mut MjHeap,
    map: *mut MjValue,
    key: *mut MjValue,
    value: *mut MjValue,
) -> MjStatus {
    // SAFETY: the caller guarantees the heap pointer is valid
    let Some(heap) = (unsafe { heap.as_mut() }) else {
        return MjStatus::NullPointer;
    };
    if map.is_null() || key.is_null() || value.is_null() {
        return MjStatus::NullPointer;
    }
    // handles are copied out and written back through the raw pointers, which may alias
    // SAFETY: all pointers are non-null and valid for reads per the caller's contract
    let (map_handle, key_handle, value_handle) = unsafe { (map.read(), key.read(), value.read()) };
    let views = (
        decode(Some(&*heap), &map_handle),
        decode(Some(&*heap), &key_handle),
        decode(Some(&*heap), &value_handle),
    );
    let (target, key_view, value_view) = match views {
        (Ok(target), Ok(key_view), Ok(value_view)) => (target, key_view, value_view),
        (Err(status), _, _) | (_, Err(status), _) | (_, _, Err(status)) => return status,
    };
    let mut target = ManuallyDrop::into_inner(target);
    let key_value = claim(heap, key_view, std::ptr::eq(key, map));
    let value_value = claim(heap, value_view, std::ptr::eq(value, map) || std::ptr::eq(value, key));

    let result = heap.map_set(&mut target, key_value, value_value);
    // SAFETY: valid for writes per the caller's contract; `map` goes last so it wins
    // when pointers alias
    unsafe {
        key.write(MjValue::UNDEFINED);
        value.write(MjValue::UNDEFINED);
        map.write(encode(target, heap));
    }
    result.map_or_else(MjStatus::from, |()| MjStatus::Ok)
}

/// Writes a new handle to the value stored under `key` into `out`; undefined when absent.
///
/// # Safety
/// `heap` must be a live heap and `out` valid for writing.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mj_value_get_by_key(
    heap: *mut MjHeap,
    map: MjValue,
    key: MjValue,
    out: *mut MjValue,
) -> MjStatus {
    // SAFETY: the caller guarantees the pointers are valid
    let (Some(heap), Some(out)) = (unsafe { heap.as_mut() }, unsafe { out.as_mut() }) else {
        return MjStatus::NullPointer;
    };
    let result = decode(Some(&*heap), &map)
        .and_then(|map| decode(Some(&*heap), &key).map(|key| (map, key)))
        .and_then(|(map, key)| status(heap.map_get(&map, &key)));
    match result {
        Ok(found) => {
            *out = encode(found, heap);
            MjStatus::Ok
        }
        Err(status) => status,
    }
}
