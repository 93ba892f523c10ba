use std::sync::Arc;

use crate::catalog::SchemaRef;
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::{ExecutionResult, Executor};
use crate::query::plan::ValuesPlanNode;
use crate::storage::table::Tuple;

/// Produces literal rows; the usual child of an insert.
pub struct ValuesExecutor {
    plan: ValuesPlanNode,
    cursor: usize,
}

impl ValuesExecutor {
    pub fn new(plan: ValuesPlanNode) -> Self {
        Self { plan, cursor: 0 }
    }
}

impl Executor for ValuesExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        let Some(row) = self.plan.rows.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;

        let dummy = Tuple::empty();
        let values = row
            .iter()
            .map(|expr| expr.evaluate(&dummy, &self.plan.output_schema))
            .collect();
        Ok(Some((Tuple::new(values), Rid::new(INVALID_PAGE_ID, 0))))
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.plan.output_schema)
    }
}
