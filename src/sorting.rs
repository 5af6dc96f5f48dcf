use std::cmp::Ordering;

use crate::{
    error::{ValueError, ValueResult},
    heap::{Heap, HeapData},
    resource::ResourceTracker,
    value::{Value, ValueKind},
};

impl<T: ResourceTracker> Heap<T> {
    /// Sorts a sequence in ascending order.
    ///
    /// Every element must be a number or every element a string; mixed kinds, other
    /// kinds and NaN fail with `NotComparable` before anything is moved. The sort is
    /// stable, so `1` and `1.0` keep their relative order. A shared sequence is cloned
    /// first (copy-on-write).
    pub fn seq_sort(&mut self, seq: &mut Value) -> ValueResult<()> {
        let id = self.container_id(seq, ValueKind::Seq, "sort")?;
        let HeapData::Seq(items) = self.get(id) else {
            panic!("Heap::seq_sort: entry is not a sequence");
        };
        check_sortable(items.as_slice(), self)?;
        if items.len() < 2 {
            return Ok(());
        }

        let id = self.make_unique(seq)?;
        self.with_entry_mut(id, |heap, data| {
            let HeapData::Seq(items) = data else {
                panic!("Heap::seq_sort: entry is not a sequence");
            };
            let heap = &*heap;
            // elements were checked above, every pair has an ordering
            items
                .items_mut()
                .sort_by(|a, b| a.cmp_with_heap(b, heap).unwrap_or(Ordering::Equal));
        });
        Ok(())
    }
}

/// Verifies that all elements share one ordered family: numbers without NaN, or strings.
fn check_sortable<T: ResourceTracker>(items: &[Value], heap: &Heap<T>) -> ValueResult<()> {
    let Some(first) = items.first() else {
        return Ok(());
    };
    let family = first.kind(heap);
    for item in items {
        let kind = item.kind(heap);
        let ordered = match kind {
            ValueKind::Number => !matches!(item, Value::Float(f) if f.is_nan()),
            ValueKind::String => true,
            _ => false,
        };
        if kind != family || !ordered {
            return Err(ValueError::NotComparable {
                left: family,
                right: kind,
            });
        }
    }
    Ok(())
}
