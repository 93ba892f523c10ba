// Table Heap
//
// Slot-addressed tuple storage backing the executors. Rows live in memory
// behind a read-write lock; RIDs are synthesized as (slot / SLOTS_PER_PAGE,
// slot % SLOTS_PER_PAGE) so identities look and behave like page-resident
// ones. MVCC version chains for these rows are kept by the transaction
// manager, keyed by RID.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::types::{PageId, Rid};
use crate::storage::table::tuple::{Tuple, TupleMeta};

/// Synthetic slots-per-page factor for RID construction.
const SLOTS_PER_PAGE: u32 = 64;

struct Slot {
    meta: TupleMeta,
    tuple: Tuple,
}

pub struct TableHeap {
    slots: RwLock<Vec<Slot>>,
}

impl Default for TableHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl TableHeap {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    fn rid_for(index: usize) -> Rid {
        Rid::new(
            (index as u32 / SLOTS_PER_PAGE) as PageId,
            index as u32 % SLOTS_PER_PAGE,
        )
    }

    fn index_for(rid: Rid) -> usize {
        rid.page_id as usize * SLOTS_PER_PAGE as usize + rid.slot as usize
    }

    /// Append a tuple, returning its new identity. Never fails in this
    /// in-memory heap, but the option mirrors a page-full outcome.
    pub fn insert_tuple(&self, meta: TupleMeta, tuple: Tuple) -> Option<Rid> {
        let mut slots = self.slots.write();
        let index = slots.len();
        slots.push(Slot { meta, tuple });
        Some(Self::rid_for(index))
    }

    pub fn get_tuple(&self, rid: Rid) -> Option<(TupleMeta, Tuple)> {
        let slots = self.slots.read();
        slots
            .get(Self::index_for(rid))
            .map(|slot| (slot.meta, slot.tuple.clone()))
    }

    pub fn get_tuple_meta(&self, rid: Rid) -> Option<TupleMeta> {
        let slots = self.slots.read();
        slots.get(Self::index_for(rid)).map(|slot| slot.meta)
    }

    /// Replace only the metadata of an existing tuple.
    pub fn update_tuple_meta(&self, meta: TupleMeta, rid: Rid) {
        let mut slots = self.slots.write();
        if let Some(slot) = slots.get_mut(Self::index_for(rid)) {
            slot.meta = meta;
        }
    }

    /// Overwrite an existing tuple and its metadata in place. The MVCC write
    /// protocol guarantees a single in-progress writer per RID.
    pub fn update_tuple_in_place(&self, meta: TupleMeta, tuple: Tuple, rid: Rid) {
        let mut slots = self.slots.write();
        if let Some(slot) = slots.get_mut(Self::index_for(rid)) {
            slot.meta = meta;
            slot.tuple = tuple;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Iterator over the rows present at creation time. Rows appended later
    /// are not visited, so an executor writing through the same table does
    /// not chase its own inserts.
    pub fn make_iterator(self: &Arc<Self>) -> TableIterator {
        TableIterator {
            heap: Arc::clone(self),
            index: 0,
            stop_at: self.slots.read().len(),
        }
    }
}

pub struct TableIterator {
    heap: Arc<TableHeap>,
    index: usize,
    stop_at: usize,
}

impl TableIterator {
    /// Advance and return the next row, or None at the end of the snapshot.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(Rid, TupleMeta, Tuple)> {
        if self.index >= self.stop_at {
            return None;
        }
        let rid = TableHeap::rid_for(self.index);
        self.index += 1;
        let (meta, tuple) = self.heap.get_tuple(rid)?;
        Some((rid, meta, tuple))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::value::Value;

    fn row(id: i64) -> Tuple {
        Tuple::new(vec![Value::Integer(id)])
    }

    #[test]
    fn test_insert_and_get() {
        let heap = TableHeap::new();
        let rid = heap.insert_tuple(TupleMeta::new(0, false), row(7)).unwrap();
        let (meta, tuple) = heap.get_tuple(rid).unwrap();
        assert_eq!(meta.ts, 0);
        assert!(!meta.is_deleted);
        assert_eq!(tuple.value(0), &Value::Integer(7));
    }

    #[test]
    fn test_rids_cross_page_boundary() {
        let heap = TableHeap::new();
        let mut last = None;
        for i in 0..(SLOTS_PER_PAGE as i64 + 3) {
            last = heap.insert_tuple(TupleMeta::new(0, false), row(i));
        }
        let rid = last.unwrap();
        assert_eq!(rid.page_id, 1);
        assert_eq!(rid.slot, 2);
        assert!(heap.get_tuple(rid).is_some());
    }

    #[test]
    fn test_update_in_place() {
        let heap = TableHeap::new();
        let rid = heap.insert_tuple(TupleMeta::new(0, false), row(1)).unwrap();
        heap.update_tuple_in_place(TupleMeta::new(9, true), row(2), rid);
        let (meta, tuple) = heap.get_tuple(rid).unwrap();
        assert_eq!(meta.ts, 9);
        assert!(meta.is_deleted);
        assert_eq!(tuple.value(0), &Value::Integer(2));
    }

    #[test]
    fn test_iterator_snapshots_length() {
        let heap = Arc::new(TableHeap::new());
        heap.insert_tuple(TupleMeta::new(0, false), row(1));
        heap.insert_tuple(TupleMeta::new(0, false), row(2));

        let mut iter = heap.make_iterator();
        heap.insert_tuple(TupleMeta::new(0, false), row(3));

        let mut seen = Vec::new();
        while let Some((_, _, tuple)) = iter.next() {
            seen.push(tuple.value(0).clone());
        }
        assert_eq!(seen, vec![Value::Integer(1), Value::Integer(2)]);
    }
}
