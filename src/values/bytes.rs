use std::fmt::Write;

use crate::heap::{Heap, HeapId};
use crate::resource::ResourceTracker;
use crate::value::{Value, ValueKind};
use crate::values::MjTrait;

/// Immutable binary buffer stored on the heap.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bytes(Vec<u8>);

impl Bytes {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Bytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl MjTrait for Bytes {
    fn mj_kind(&self) -> ValueKind {
        ValueKind::Bytes
    }

    fn mj_estimate_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.0.len()
    }

    fn mj_len(&self) -> Option<usize> {
        Some(self.0.len())
    }

    fn mj_eq<'a, T: ResourceTracker>(
        &'a self,
        other: &'a Self,
        _heap: &Heap<T>,
        _pending: &mut Vec<(&'a Value, &'a Value)>,
    ) -> bool {
        self.0 == other.0
    }

    fn mj_dec_ref_ids(self, _stack: &mut Vec<HeapId>) {}

    fn mj_repr_fmt<W: Write, T: ResourceTracker>(&self, f: &mut W, _heap: &Heap<T>, _depth: usize) -> std::fmt::Result {
        bytes_repr_fmt(&self.0, f)
    }
}

/// Writes a bytes literal: `b'...'`, or `b"..."` when the content has `'` but no `"`.
///
/// Escapes `\\`, `\t`, `\n`, `\r` and uses `\xNN` for non-printable bytes.
pub(crate) fn bytes_repr_fmt<W: Write>(bytes: &[u8], f: &mut W) -> std::fmt::Result {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        '"'
    } else {
        '\''
    };

    f.write_char('b')?;
    f.write_char(quote)?;
    for &byte in bytes {
        match byte {
            b'\\' => f.write_str("\\\\")?,
            b'\t' => f.write_str("\\t")?,
            b'\n' => f.write_str("\\n")?,
            b'\r' => f.write_str("\\r")?,
            b'\'' if quote == '\'' => f.write_str("\\'")?,
            // printable ASCII
            0x20..=0x7e => f.write_char(byte as char)?,
            _ => write!(f, "\\x{byte:02x}")?,
        }
    }
    f.write_char(quote)
}
