use std::borrow::Cow;
use std::fmt;

use crate::resource::ResourceError;
use crate::value::ValueKind;

/// Recoverable failure of a value operation.
///
/// Every variant is returned at the call site that detected it; nothing in the
/// value core aborts the process. Misusing handles (releasing a handle the caller
/// does not own, using one after its last release) is not represented here: it is a
/// programmer error and panics inside the heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The operation is not supported by a value of this kind,
    /// e.g. numeric coercion of a sequence or appending to a map.
    TypeMismatch { operation: &'static str, found: ValueKind },
    /// Ordering was requested between values without a common ordering,
    /// e.g. a number and a string, or a NaN float.
    NotComparable { left: ValueKind, right: ValueKind },
    /// Sequence index outside `[0, len)`.
    IndexOutOfRange { index: i64, len: usize },
    /// Map key of a kind that cannot be hashed.
    InvalidKey { kind: ValueKind },
    /// Failure reported by a host callable.
    Host(Cow<'static, str>),
    /// A configured resource limit was exceeded.
    Resource(ResourceError),
}

impl ValueError {
    pub(crate) fn type_mismatch(operation: &'static str, found: ValueKind) -> Self {
        Self::TypeMismatch { operation, found }
    }

    /// Creates an error to return from a host callable.
    pub fn host(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Host(message.into())
    }

    /// True for the type-mismatch class of errors, which includes failed comparisons.
    #[must_use]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. } | Self::NotComparable { .. })
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { operation, found } => {
                write!(f, "{operation} is not supported for values of kind {found}")
            }
            Self::NotComparable { left, right } => {
                write!(f, "cannot compare {left} with {right}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for sequence of length {len}")
            }
            Self::InvalidKey { kind } => write!(f, "values of kind {kind} cannot be used as map keys"),
            Self::Host(message) => f.write_str(message),
            Self::Resource(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ValueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for ValueError {
    fn from(err: ResourceError) -> Self {
        Self::Resource(err)
    }
}

/// Result alias used across the value API.
pub type ValueResult<T> = Result<T, ValueError>;
