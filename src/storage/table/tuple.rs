use std::fmt;

use crate::catalog::schema::Schema;
use crate::catalog::value::Value;
use crate::common::types::Timestamp;

/// Per-tuple metadata stored alongside the values in a table heap.
///
/// `ts` is overloaded: with `TXN_START_ID` set it is the id of an in-flight
/// writer; otherwise it is the commit timestamp of the latest committed
/// version of this tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleMeta {
    pub ts: Timestamp,
    pub is_deleted: bool,
}

impl TupleMeta {
    pub fn new(ts: Timestamp, is_deleted: bool) -> Self {
        Self { ts, is_deleted }
    }
}

/// A row of values. Tuples are schema-agnostic containers; the schema
/// travels separately, as plan output schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// An empty placeholder tuple.
    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    pub fn value(&self, idx: usize) -> &Value {
        &self.values[idx]
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    pub fn display(&self, schema: &Schema) -> String {
        debug_assert_eq!(schema.column_count(), self.values.len());
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        format!("({})", parts.join(", "))
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}
