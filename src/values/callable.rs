use std::borrow::Cow;
use std::fmt::{self, Write};
use std::sync::Arc;

use crate::error::ValueResult;
use crate::heap::{Heap, HeapId};
use crate::resource::ResourceTracker;
use crate::value::{Value, ValueKind};
use crate::values::MjTrait;

/// Signature of a host function.
///
/// Receives the heap and owns its arguments: it must release every argument it does
/// not return or store.
pub type HostFn<T> = dyn Fn(&mut Heap<T>, Vec<Value>) -> ValueResult<Value> + Send + Sync;

/// Host function exposed to templates.
///
/// Callables are immutable; copies share the function through an `Arc`. Two callables
/// are equal when they wrap the same function.
pub struct Callable<T: ResourceTracker> {
    name: Cow<'static, str>,
    func: Arc<HostFn<T>>,
}

impl<T: ResourceTracker> Callable<T> {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn(&mut Heap<T>, Vec<Value>) -> ValueResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn func(&self) -> Arc<HostFn<T>> {
        Arc::clone(&self.func)
    }
}

impl<T: ResourceTracker> Clone for Callable<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<T: ResourceTracker> fmt::Debug for Callable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<T: ResourceTracker> MjTrait for Callable<T> {
    fn mj_kind(&self) -> ValueKind {
        ValueKind::Callable
    }

    fn mj_estimate_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.name.len()
    }

    fn mj_len(&self) -> Option<usize> {
        None
    }

    fn mj_eq<'a, U: ResourceTracker>(
        &'a self,
        other: &'a Self,
        _heap: &Heap<U>,
        _pending: &mut Vec<(&'a Value, &'a Value)>,
    ) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }

    fn mj_dec_ref_ids(self, _stack: &mut Vec<HeapId>) {}

    fn mj_repr_fmt<W: Write, U: ResourceTracker>(&self, f: &mut W, _heap: &Heap<U>, _depth: usize) -> fmt::Result {
        write!(f, "<callable {}>", self.name)
    }
}
