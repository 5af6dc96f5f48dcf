use std::fmt::Write;

use crate::heap::{Heap, HeapId};
use crate::resource::ResourceTracker;
use crate::value::{Value, ValueKind};
use crate::values::MjTrait;

/// Immutable UTF-8 string stored on the heap.
///
/// `len()` is the number of Unicode characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Str(String);

impl Str {
    #[must_use]
    pub fn new(s: String) -> Self {
        Self(s)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Str {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Str {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl MjTrait for Str {
    fn mj_kind(&self) -> ValueKind {
        ValueKind::String
    }

    fn mj_estimate_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.0.len()
    }

    fn mj_len(&self) -> Option<usize> {
        Some(self.0.chars().count())
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
        string_repr_fmt(&self.0, f)
    }
}

/// Writes a quoted, escaped form of a string.
///
/// Uses double quotes if the string contains single quotes but no double quotes,
/// otherwise single quotes with embedded single quotes escaped.
pub(crate) fn string_repr_fmt<W: Write>(s: &str, f: &mut W) -> std::fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    f.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\'' if quote == '\'' => f.write_str("\\'")?,
            _ => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}
