use std::sync::Arc;

use crate::catalog::SchemaRef;
use crate::common::types::Rid;
use crate::query::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::query::plan::LimitPlanNode;
use crate::storage::table::Tuple;

/// Emits at most `limit` child rows.
pub struct LimitExecutor {
    plan: LimitPlanNode,
    child: BoxedExecutor,
    emitted: usize,
}

impl LimitExecutor {
    pub fn new(plan: LimitPlanNode, child: BoxedExecutor) -> Self {
        Self {
            plan,
            child,
            emitted: 0,
        }
    }
}

impl Executor for LimitExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.emitted = 0;
        self.child.init()
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        if self.emitted >= self.plan.limit {
            return Ok(None);
        }
        match self.child.next()? {
            Some(row) => {
                self.emitted += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.plan.output_schema)
    }
}
