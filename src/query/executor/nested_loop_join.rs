use std::sync::Arc;

use crate::catalog::{SchemaRef, Value};
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::query::plan::{JoinType, NestedLoopJoinPlanNode};
use crate::storage::table::Tuple;

/// Cartesian product filtered by the join predicate. Supports INNER and
/// LEFT joins; an unmatched left row of a LEFT join is padded with NULLs
/// for the right side's columns.
pub struct NestedLoopJoinExecutor {
    plan: NestedLoopJoinPlanNode,
    left: BoxedExecutor,
    right: BoxedExecutor,
    left_tuple: Option<Tuple>,
    left_matched: bool,
}

impl NestedLoopJoinExecutor {
    pub fn new(plan: NestedLoopJoinPlanNode, left: BoxedExecutor, right: BoxedExecutor) -> Self {
        Self {
            plan,
            left,
            right,
            left_tuple: None,
            left_matched: false,
        }
    }

    fn joined(&self, left: &Tuple, right: &Tuple) -> Tuple {
        let mut values = left.values().to_vec();
        values.extend(right.values().iter().cloned());
        Tuple::new(values)
    }

    fn padded(&self, left: &Tuple) -> Tuple {
        let mut values = left.values().to_vec();
        values.extend((0..self.right.output_schema().column_count()).map(|_| Value::Null));
        Tuple::new(values)
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.left.init()?;
        self.right.init()?;
        self.left_tuple = self.left.next()?.map(|(tuple, _)| tuple);
        self.left_matched = false;
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        let left_schema = self.left.output_schema();
        let right_schema = self.right.output_schema();

        loop {
            let Some(left_tuple) = self.left_tuple.clone() else {
                return Ok(None);
            };

            while let Some((right_tuple, _)) = self.right.next()? {
                let verdict = self.plan.predicate.evaluate_join(
                    &left_tuple,
                    &left_schema,
                    &right_tuple,
                    &right_schema,
                );
                if verdict.is_true() {
                    self.left_matched = true;
                    let row = self.joined(&left_tuple, &right_tuple);
                    return Ok(Some((row, Rid::new(INVALID_PAGE_ID, 0))));
                }
            }

            // Right side exhausted for this left row.
            let emit_padding = self.plan.join_type == JoinType::Left && !self.left_matched;
            self.left_tuple = self.left.next()?.map(|(tuple, _)| tuple);
            self.right.init()?;
            self.left_matched = false;

            if emit_padding {
                let row = self.padded(&left_tuple);
                return Ok(Some((row, Rid::new(INVALID_PAGE_ID, 0))));
            }
        }
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.plan.output_schema)
    }
}
