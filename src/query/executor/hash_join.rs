use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{SchemaRef, Value};
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::query::plan::{HashJoinPlanNode, JoinType};
use crate::storage::table::Tuple;

/// Hash join over equi-conditions: fully materializes the right side into a
/// multimap keyed by the right key expressions, then streams left rows,
/// probing with the left key expressions. LEFT joins pad unmatched left
/// rows with NULLs.
pub struct HashJoinExecutor {
    plan: HashJoinPlanNode,
    left: BoxedExecutor,
    right: BoxedExecutor,
    table: HashMap<Vec<Value>, Vec<Tuple>>,
    left_tuple: Option<Tuple>,
    matches: Vec<Tuple>,
    match_idx: usize,
}

impl HashJoinExecutor {
    pub fn new(plan: HashJoinPlanNode, left: BoxedExecutor, right: BoxedExecutor) -> Self {
        Self {
            plan,
            left,
            right,
            table: HashMap::new(),
            left_tuple: None,
            matches: Vec::new(),
            match_idx: 0,
        }
    }

    fn left_key(&self, tuple: &Tuple) -> Vec<Value> {
        let schema = self.left.output_schema();
        self.plan
            .left_key_expressions
            .iter()
            .map(|expr| expr.evaluate(tuple, &schema))
            .collect()
    }

    fn right_key(&self, tuple: &Tuple) -> Vec<Value> {
        let schema = self.right.output_schema();
        self.plan
            .right_key_expressions
            .iter()
            .map(|expr| expr.evaluate(tuple, &schema))
            .collect()
    }

    /// Load the next left row and its probe matches.
    fn advance_left(&mut self) -> ExecutionResult<()> {
        self.left_tuple = self.left.next()?.map(|(tuple, _)| tuple);
        self.match_idx = 0;
        self.matches = match &self.left_tuple {
            Some(tuple) => self
                .table
                .get(&self.left_key(tuple))
                .cloned()
                .unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(())
    }
}

impl Executor for HashJoinExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.left.init()?;
        self.right.init()?;

        self.table.clear();
        while let Some((tuple, _)) = self.right.next()? {
            let key = self.right_key(&tuple);
            self.table.entry(key).or_default().push(tuple);
        }

        self.advance_left()
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        loop {
            let Some(left_tuple) = self.left_tuple.clone() else {
                return Ok(None);
            };

            if self.match_idx < self.matches.len() {
                let right_tuple = self.matches[self.match_idx].clone();
                self.match_idx += 1;
                let mut values = left_tuple.values().to_vec();
                values.extend(right_tuple.values().iter().cloned());
                return Ok(Some((Tuple::new(values), Rid::new(INVALID_PAGE_ID, 0))));
            }

            let unmatched = self.matches.is_empty();
            self.advance_left()?;

            if unmatched && self.plan.join_type == JoinType::Left {
                let mut values = left_tuple.values().to_vec();
                values.extend((0..self.right.output_schema().column_count()).map(|_| Value::Null));
                return Ok(Some((Tuple::new(values), Rid::new(INVALID_PAGE_ID, 0))));
            }
        }
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.plan.output_schema)
    }
}
