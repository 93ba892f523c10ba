use std::sync::Arc;

use linked_hash_map::LinkedHashMap;

use crate::catalog::{SchemaRef, Value};
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::query::plan::{AggregationPlanNode, AggregationType};
use crate::storage::table::Tuple;

/// Hash aggregation: group-by keys map to running aggregate states. Groups
/// are kept in insertion order so output is deterministic. With no group-by
/// columns and empty input, a single row of initial values is produced
/// (NULLs, except COUNT(*) = 0).
pub struct AggregationExecutor {
    plan: AggregationPlanNode,
    child: BoxedExecutor,
    groups: LinkedHashMap<Vec<Value>, Vec<Value>>,
    output: Vec<Tuple>,
    cursor: usize,
}

impl AggregationExecutor {
    pub fn new(plan: AggregationPlanNode, child: BoxedExecutor) -> Self {
        Self {
            plan,
            child,
            groups: LinkedHashMap::new(),
            output: Vec::new(),
            cursor: 0,
        }
    }

    fn initial_values(&self) -> Vec<Value> {
        self.plan
            .agg_types
            .iter()
            .map(|agg| match agg {
                AggregationType::CountStar => Value::Integer(0),
                _ => Value::Null,
            })
            .collect()
    }

}

/// Fold one input into a running aggregate state. NULL inputs are ignored
/// by everything except COUNT(*).
pub(crate) fn combine_aggregate(agg: AggregationType, state: &mut Value, input: &Value) {
    match agg {
        AggregationType::CountStar => {
            *state = state.add(&Value::Integer(1));
        }
        AggregationType::Count => {
            if !input.is_null() {
                if state.is_null() {
                    *state = Value::Integer(0);
                }
                *state = state.add(&Value::Integer(1));
            }
        }
        AggregationType::Sum => {
            if !input.is_null() {
                if state.is_null() {
                    *state = input.clone();
                } else {
                    *state = state.add(input);
                }
            }
        }
        AggregationType::Min => {
            if !input.is_null()
                && (state.is_null() || matches!(input.compare(state), Some(std::cmp::Ordering::Less)))
            {
                *state = input.clone();
            }
        }
        AggregationType::Max => {
            if !input.is_null()
                && (state.is_null() || matches!(input.compare(state), Some(std::cmp::Ordering::Greater)))
            {
                *state = input.clone();
            }
        }
    }
}

impl Executor for AggregationExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()?;
        self.groups.clear();
        self.output.clear();
        self.cursor = 0;

        let schema = self.child.output_schema();
        while let Some((tuple, _)) = self.child.next()? {
            let key: Vec<Value> = self
                .plan
                .group_bys
                .iter()
                .map(|expr| expr.evaluate(&tuple, &schema))
                .collect();
            if !self.groups.contains_key(&key) {
                let init = self.initial_values();
                self.groups.insert(key.clone(), init);
            }
            let state = self.groups.get_mut(&key).unwrap();
            for (i, agg_type) in self.plan.agg_types.iter().enumerate() {
                let input = self.plan.aggregates[i].evaluate(&tuple, &schema);
                combine_aggregate(*agg_type, &mut state[i], &input);
            }
        }

        if self.groups.is_empty() && self.plan.group_bys.is_empty() {
            self.output.push(Tuple::new(self.initial_values()));
        } else {
            for (key, aggregates) in self.groups.iter() {
                let mut values = key.clone();
                values.extend(aggregates.iter().cloned());
                self.output.push(Tuple::new(values));
            }
        }
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
