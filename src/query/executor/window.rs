use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{SchemaRef, Value};
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::aggregation::combine_aggregate;
use crate::query::executor::sort::compare_tuples;
use crate::query::executor::{BoxedExecutor, ExecutionResult, Executor};
use crate::query::plan::{AggregationType, WindowFunctionType, WindowPlanNode};
use crate::storage::table::Tuple;

/// RANK bookkeeping per partition: rows seen so far, the rank of the last
/// distinct ordering value, and that value.
struct RankState {
    rows_seen: i64,
    last_rank: i64,
    prev_value: Value,
}

/// Running state for one window column, keyed by partition.
struct WindowState {
    window_type: WindowFunctionType,
    totals: HashMap<Vec<Value>, Value>,
    ranks: HashMap<Vec<Value>, RankState>,
}

impl WindowState {
    fn new(window_type: WindowFunctionType) -> Self {
        Self {
            window_type,
            totals: HashMap::new(),
            ranks: HashMap::new(),
        }
    }

    fn as_aggregation(window_type: WindowFunctionType) -> AggregationType {
        match window_type {
            WindowFunctionType::CountStar => AggregationType::CountStar,
            WindowFunctionType::Count => AggregationType::Count,
            WindowFunctionType::Sum => AggregationType::Sum,
            WindowFunctionType::Min => AggregationType::Min,
            WindowFunctionType::Max => AggregationType::Max,
            WindowFunctionType::Rank => unreachable!("rank is not an aggregate"),
        }
    }

    /// Fold one value into the partition's running aggregate and return the
    /// running result.
    fn combine(&mut self, key: Vec<Value>, input: &Value) -> Value {
        let initial = match self.window_type {
            WindowFunctionType::CountStar => Value::Integer(0),
            _ => Value::Null,
        };
        let state = self.totals.entry(key).or_insert(initial);
        combine_aggregate(Self::as_aggregation(self.window_type), state, input);
        state.clone()
    }

    /// RANK over the partition, in encounter (i.e. sorted) order: ties on
    /// the ordering value share a rank, the next distinct value jumps to
    /// its row number.
    fn rank(&mut self, key: Vec<Value>, order_value: Value) -> Value {
        let state = self.ranks.entry(key).or_insert(RankState {
            rows_seen: 0,
            last_rank: 0,
            prev_value: Value::Null,
        });
        state.rows_seen += 1;
        if state.prev_value != order_value {
            state.prev_value = order_value;
            state.last_rank = state.rows_seen;
        }
        Value::Integer(state.last_rank)
    }

    fn total(&self, key: &[Value]) -> Value {
        self.totals.get(key).cloned().unwrap_or(Value::Null)
    }
}

/// Window functions over a materialized input.
///
/// When any window carries an ORDER BY, the input is sorted once by the
/// first such window's ordering; the behavior with several disagreeing
/// orderings is undefined. Windows with an ORDER BY emit running values
/// (UNBOUNDED PRECEDING .. CURRENT ROW); windows without emit the final
/// partition-wide value for every row.
pub struct WindowFunctionExecutor {
    plan: WindowPlanNode,
    child: BoxedExecutor,
    output: Vec<Tuple>,
    cursor: usize,
}

impl WindowFunctionExecutor {
    pub fn new(plan: WindowPlanNode, child: BoxedExecutor) -> Self {
        Self {
            plan,
            child,
            output: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for WindowFunctionExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()?;
        self.output.clear();
        self.cursor = 0;

        let schema = self.child.output_schema();
        let mut rows = Vec::new();
        while let Some((tuple, _)) = self.child.next()? {
            rows.push(tuple);
        }

        // Sort by the first window ordering, if any window has one.
        let column_count = self.plan.columns.len();
        for idx in 0..column_count {
            if let Some(window) = self.plan.window_functions.get(&idx) {
                if !window.order_by.is_empty() {
                    let order_by = window.order_by.clone();
                    rows.sort_by(|a, b| compare_tuples(a, b, &order_by, &schema));
                    break;
                }
            }
        }

        let mut states: Vec<Option<WindowState>> = (0..column_count)
            .map(|idx| {
                self.plan
                    .window_functions
                    .get(&idx)
                    .map(|w| WindowState::new(w.window_type))
            })
            .collect();

        // First pass: non-window columns and running window values.
        let mut results: Vec<Vec<Value>> = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = vec![Value::Null; column_count];
            for idx in 0..column_count {
                match self.plan.window_functions.get(&idx) {
                    None => {
                        values[idx] = self.plan.columns[idx].evaluate(row, &schema);
                    }
                    Some(window) => {
                        let key: Vec<Value> = window
                            .partition_by
                            .iter()
                            .map(|expr| expr.evaluate(row, &schema))
                            .collect();
                        let state = states[idx].as_mut().unwrap();

                        if window.window_type == WindowFunctionType::Rank {
                            let order_value = window
                                .order_by
                                .first()
                                .map(|(_, expr)| expr.evaluate(row, &schema))
                                .unwrap_or(Value::Null);
                            values[idx] = state.rank(key, order_value);
                        } else {
                            let input = match &window.function {
                                Some(expr) => expr.evaluate(row, &schema),
                                None => Value::Integer(1),
                            };
                            let running = state.combine(key, &input);
                            if !window.order_by.is_empty() {
                                values[idx] = running;
                            }
                        }
                    }
                }
            }
            results.push(values);
        }

        // Second pass: windows without ORDER BY see the whole partition.
        for (row, values) in rows.iter().zip(results.iter_mut()) {
            for idx in 0..column_count {
                let Some(window) = self.plan.window_functions.get(&idx) else {
                    continue;
                };
                if window.order_by.is_empty() && window.window_type != WindowFunctionType::Rank {
                    let key: Vec<Value> = window
                        .partition_by
                        .iter()
                        .map(|expr| expr.evaluate(row, &schema))
                        .collect();
                    values[idx] = states[idx].as_ref().unwrap().total(&key);
                }
            }
        }

        self.output = results.into_iter().map(Tuple::new).collect();
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
