use std::sync::Arc;

use crate::catalog::SchemaRef;
use crate::common::types::Rid;
use crate::query::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::query::plan::FilterPlanNode;
use crate::storage::table::Tuple;

/// Passes through child rows satisfying the predicate.
pub struct FilterExecutor {
    plan: FilterPlanNode,
    child: BoxedExecutor,
}

impl FilterExecutor {
    pub fn new(plan: FilterPlanNode, child: BoxedExecutor) -> Self {
        Self { plan, child }
    }
}

impl Executor for FilterExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        while let Some((tuple, rid)) = self.child.next()? {
            if self
                .plan
                .predicate
                .evaluate(&tuple, &self.plan.output_schema)
                .is_true()
            {
                return Ok(Some((tuple, rid)));
            }
        }
        Ok(None)
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.plan.output_schema)
    }
}
