// Expression Trees
//
// Bound scalar expressions evaluated against tuples. Expressed as an enum
// so the plan-rewrite rules can pattern-match on shapes like
// `column = constant` and conjunctions of cross-side equalities.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::catalog::schema::Schema;
use crate::catalog::value::Value;
use crate::storage::table::Tuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A bound column: which input tuple of a join (0 = left/only,
    /// 1 = right) and the column offset within it.
    ColumnRef { tuple_idx: usize, col_idx: usize },
    Constant(Value),
    Comparison {
        op: ComparisonOp,
        left: ExpressionRef,
        right: ExpressionRef,
    },
    Logic {
        op: LogicOp,
        left: ExpressionRef,
        right: ExpressionRef,
    },
}

pub type ExpressionRef = Arc<Expression>;

impl Expression {
    pub fn column(col_idx: usize) -> ExpressionRef {
        Arc::new(Expression::ColumnRef {
            tuple_idx: 0,
            col_idx,
        })
    }

    pub fn join_column(tuple_idx: usize, col_idx: usize) -> ExpressionRef {
        Arc::new(Expression::ColumnRef { tuple_idx, col_idx })
    }

    pub fn constant(value: Value) -> ExpressionRef {
        Arc::new(Expression::Constant(value))
    }

    pub fn comparison(op: ComparisonOp, left: ExpressionRef, right: ExpressionRef) -> ExpressionRef {
        Arc::new(Expression::Comparison { op, left, right })
    }

    pub fn and(left: ExpressionRef, right: ExpressionRef) -> ExpressionRef {
        Arc::new(Expression::Logic {
            op: LogicOp::And,
            left,
            right,
        })
    }

    /// Evaluate against a single tuple.
    pub fn evaluate(&self, tuple: &Tuple, schema: &Schema) -> Value {
        match self {
            Expression::ColumnRef { col_idx, .. } => tuple.value(*col_idx).clone(),
            Expression::Constant(value) => value.clone(),
            Expression::Comparison { op, left, right } => compare(
                *op,
                &left.evaluate(tuple, schema),
                &right.evaluate(tuple, schema),
            ),
            Expression::Logic { op, left, right } => logic(
                *op,
                &left.evaluate(tuple, schema),
                &right.evaluate(tuple, schema),
            ),
        }
    }

    /// Evaluate against a pair of join inputs; column references pick their
    /// side by `tuple_idx`.
    pub fn evaluate_join(
        &self,
        left_tuple: &Tuple,
        left_schema: &Schema,
        right_tuple: &Tuple,
        right_schema: &Schema,
    ) -> Value {
        match self {
            Expression::ColumnRef { tuple_idx, col_idx } => {
                if *tuple_idx == 0 {
                    left_tuple.value(*col_idx).clone()
                } else {
                    right_tuple.value(*col_idx).clone()
                }
            }
            Expression::Constant(value) => value.clone(),
            Expression::Comparison { op, left, right } => compare(
                *op,
                &left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema),
                &right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema),
            ),
            Expression::Logic { op, left, right } => logic(
                *op,
                &left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema),
                &right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema),
            ),
        }
    }
}

fn compare(op: ComparisonOp, left: &Value, right: &Value) -> Value {
    let Some(ordering) = left.compare(right) else {
        return Value::Null;
    };
    let result = match op {
        ComparisonOp::Equal => ordering == Ordering::Equal,
        ComparisonOp::NotEqual => ordering != Ordering::Equal,
        ComparisonOp::LessThan => ordering == Ordering::Less,
        ComparisonOp::LessThanOrEqual => ordering != Ordering::Greater,
        ComparisonOp::GreaterThan => ordering == Ordering::Greater,
        ComparisonOp::GreaterThanOrEqual => ordering != Ordering::Less,
    };
    Value::Boolean(result)
}

/// Three-valued logic: NULL propagates unless the other side decides.
fn logic(op: LogicOp, left: &Value, right: &Value) -> Value {
    let as_bool = |v: &Value| match v {
        Value::Boolean(b) => Some(*b),
        _ => None,
    };
    match (op, as_bool(left), as_bool(right)) {
        (LogicOp::And, Some(false), _) | (LogicOp::And, _, Some(false)) => Value::Boolean(false),
        (LogicOp::And, Some(true), Some(true)) => Value::Boolean(true),
        (LogicOp::Or, Some(true), _) | (LogicOp::Or, _, Some(true)) => Value::Boolean(true),
        (LogicOp::Or, Some(false), Some(false)) => Value::Boolean(false),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::schema::{Column, DataType};

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("a", DataType::Integer),
            Column::new("b", DataType::Integer),
        ])
    }

    #[test]
    fn test_column_and_constant() {
        let tuple = Tuple::new(vec![Value::Integer(3), Value::Integer(7)]);
        let expr = Expression::comparison(
            ComparisonOp::Equal,
            Expression::column(1),
            Expression::constant(Value::Integer(7)),
        );
        assert_eq!(expr.evaluate(&tuple, &schema()), Value::Boolean(true));
    }

    #[test]
    fn test_null_comparison_is_null() {
        let tuple = Tuple::new(vec![Value::Null, Value::Integer(7)]);
        let expr = Expression::comparison(
            ComparisonOp::LessThan,
            Expression::column(0),
            Expression::constant(Value::Integer(1)),
        );
        assert_eq!(expr.evaluate(&tuple, &schema()), Value::Null);
    }

    #[test]
    fn test_evaluate_join_picks_sides() {
        let left = Tuple::new(vec![Value::Integer(1)]);
        let right = Tuple::new(vec![Value::Integer(1)]);
        let left_schema = Schema::new(vec![Column::new("a", DataType::Integer)]);
        let right_schema = Schema::new(vec![Column::new("a", DataType::Integer)]);
        let expr = Expression::comparison(
            ComparisonOp::Equal,
            Expression::join_column(0, 0),
            Expression::join_column(1, 0),
        );
        assert_eq!(
            expr.evaluate_join(&left, &left_schema, &right, &right_schema),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_three_valued_and() {
        let t = Value::Boolean(true);
        let f = Value::Boolean(false);
        assert_eq!(logic(LogicOp::And, &t, &Value::Null), Value::Null);
        assert_eq!(logic(LogicOp::And, &f, &Value::Null), Value::Boolean(false));
        assert_eq!(logic(LogicOp::Or, &t, &Value::Null), Value::Boolean(true));
    }
}
