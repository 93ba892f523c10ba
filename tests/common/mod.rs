use std::sync::Arc;

use anyhow::Result;
use tempfile::NamedTempFile;

use karstdb::catalog::schema::{Column, DataType, Schema};
use karstdb::catalog::{Catalog, SchemaRef, TableInfo, Value};
use karstdb::common::config::DEFAULT_LRUK_K;
use karstdb::query::expression::Expression;
use karstdb::query::plan::{
    InsertPlanNode, PlanNode, PlanNodeRef, SeqScanPlanNode, ValuesPlanNode,
};
use karstdb::query::ExecutorContext;
use karstdb::storage::buffer::BufferPoolManager;
use karstdb::storage::disk::DiskManager;
use karstdb::transaction::{IsolationLevel, Transaction, TransactionManager};

/// A complete engine instance backed by a temporary database file.
pub struct TestDb {
    pub bpm: Arc<BufferPoolManager>,
    pub catalog: Arc<Catalog>,
    pub txn_mgr: Arc<TransactionManager>,
    _file: NamedTempFile,
}

#[allow(dead_code)]
pub fn create_test_db() -> Result<TestDb> {
    let _ = env_logger::builder().is_test(true).try_init();
    let file = NamedTempFile::new()?;
    let disk_manager = Arc::new(DiskManager::new(file.path())?);
    let bpm = Arc::new(BufferPoolManager::new(128, DEFAULT_LRUK_K, disk_manager));
    let catalog = Arc::new(Catalog::new(Arc::clone(&bpm)));
    let txn_mgr = Arc::new(TransactionManager::new(Arc::clone(&catalog)));
    Ok(TestDb {
        bpm,
        catalog,
        txn_mgr,
        _file: file,
    })
}

/// Schema with two integer columns, the workhorse of the executor tests.
#[allow(dead_code)]
pub fn two_int_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Column::new("c1", DataType::Integer),
        Column::new("c2", DataType::Integer),
    ]))
}

/// Output schema of the writing executors: a single row count.
#[allow(dead_code)]
pub fn count_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![Column::new("count", DataType::Integer)]))
}

#[allow(dead_code)]
pub fn exec_ctx(db: &TestDb, txn: &Arc<Transaction>) -> Arc<ExecutorContext> {
    Arc::new(ExecutorContext::new(
        Arc::clone(&db.catalog),
        Arc::clone(txn),
        Arc::clone(&db.txn_mgr),
    ))
}

#[allow(dead_code)]
pub fn begin(db: &TestDb) -> Arc<Transaction> {
    db.txn_mgr.begin(IsolationLevel::SnapshotIsolation).unwrap()
}

/// Plan producing the given integer rows as literals.
#[allow(dead_code)]
pub fn values_plan(schema: SchemaRef, rows: &[Vec<i64>]) -> PlanNodeRef {
    let rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|&v| Expression::constant(Value::Integer(v)))
                .collect()
        })
        .collect();
    Arc::new(PlanNode::Values(ValuesPlanNode {
        output_schema: schema,
        rows,
    }))
}

/// Insert the given integer rows into a table through the executor stack.
#[allow(dead_code)]
pub fn insert_plan(table: &TableInfo, rows: &[Vec<i64>]) -> PlanNodeRef {
    Arc::new(PlanNode::Insert(InsertPlanNode {
        output_schema: count_schema(),
        table_oid: table.oid,
        child: values_plan(Arc::clone(&table.schema), rows),
    }))
}

/// Unfiltered sequential scan over a table.
#[allow(dead_code)]
pub fn seq_scan_plan(table: &TableInfo) -> PlanNodeRef {
    Arc::new(PlanNode::SeqScan(SeqScanPlanNode {
        output_schema: Arc::clone(&table.schema),
        table_oid: table.oid,
        table_name: table.name.clone(),
        filter_predicate: None,
    }))
}

/// Collapse tuples into integer rows for easy assertions.
#[allow(dead_code)]
pub fn as_int_rows(tuples: &[karstdb::storage::table::Tuple]) -> Vec<Vec<Option<i64>>> {
    tuples
        .iter()
        .map(|t| {
            t.values()
                .iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect()
        })
        .collect()
}
