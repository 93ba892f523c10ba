use std::cmp::Ordering;
use std::sync::Arc;

use crate::catalog::{Schema, SchemaRef};
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::query::plan::{OrderBy, SortPlanNode};
use crate::storage::table::Tuple;

/// Compare two tuples by an ordered list of (direction, expression)
/// criteria. Later criteria break ties of earlier ones.
pub fn compare_tuples(a: &Tuple, b: &Tuple, order_bys: &[OrderBy], schema: &Schema) -> Ordering {
    for (direction, expr) in order_bys {
        let va = expr.evaluate(a, schema);
        let vb = expr.evaluate(b, schema);
        let ord = va.sort_cmp(&vb);
        if ord != Ordering::Equal {
            return if direction.is_descending() { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}

/// Materializes its child, sorts by the plan's order-by list, and streams
/// the result.
pub struct SortExecutor {
    plan: SortPlanNode,
    child: BoxedExecutor,
    sorted: Vec<Tuple>,
    cursor: usize,
}

impl SortExecutor {
    pub fn new(plan: SortPlanNode, child: BoxedExecutor) -> Self {
        Self {
            plan,
            child,
            sorted: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for SortExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()?;
        self.sorted.clear();
        self.cursor = 0;

        while let Some((tuple, _)) = self.child.next()? {
            self.sorted.push(tuple);
        }
        let schema = self.child.output_schema();
        let order_bys = self.plan.order_bys.clone();
        self.sorted
            .sort_by(|a, b| compare_tuples(a, b, &order_bys, &schema));
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        let Some(tuple) = self.sorted.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        Ok(Some((tuple.clone(), Rid::new(INVALID_PAGE_ID, 0))))
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.plan.output_schema)
    }
}
