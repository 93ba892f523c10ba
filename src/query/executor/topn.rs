use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::catalog::SchemaRef;
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::sort::compare_tuples;
use crate::query::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::query::plan::{OrderBy, TopNPlanNode};
use crate::storage::table::Tuple;

/// Heap entry ordered by the plan's sort criteria; the heap keeps the
/// worst-ranked entry on top so it can be dropped when capacity overflows.
struct HeapEntry {
    tuple: Tuple,
    order_bys: Arc<Vec<OrderBy>>,
    schema: SchemaRef,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_tuples(&self.tuple, &other.tuple, &self.order_bys, &self.schema)
    }
}

/// Top-N: a bounded heap of the N best rows by the sort criteria, streamed
/// out in sorted order. Equivalent to Sort followed by Limit without
/// materializing everything in sorted form.
pub struct TopNExecutor {
    plan: TopNPlanNode,
    child: BoxedExecutor,
    output: Vec<Tuple>,
    cursor: usize,
}

impl TopNExecutor {
    pub fn new(plan: TopNPlanNode, child: BoxedExecutor) -> Self {
        Self {
            plan,
            child,
            output: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for TopNExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()?;
        self.output.clear();
        self.cursor = 0;

        let order_bys = Arc::new(self.plan.order_bys.clone());
        let schema: SchemaRef = self.child.output_schema();

        // Max-heap by sort order: the root is the worst candidate and gets
        // popped whenever the heap exceeds N.
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        while let Some((tuple, _)) = self.child.next()? {
            heap.push(HeapEntry {
                tuple,
                order_bys: Arc::clone(&order_bys),
                schema: Arc::clone(&schema),
            });
            if heap.len() > self.plan.n {
                heap.pop();
            }
        }

        // Popping yields worst-first; reverse into sorted order.
        let mut collected: Vec<Tuple> = Vec::with_capacity(heap.len());
        while let Some(entry) = heap.pop() {
            collected.push(entry.tuple);
        }
        collected.reverse();
        self.output = collected;
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        let Some(tuple) = self.output.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        Ok(Some((tuple.clone(), Rid::new(INVALID_PAGE_ID, 0))))
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.plan.output_schema)
    }
}
