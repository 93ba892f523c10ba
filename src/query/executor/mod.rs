// Query Executors
//
// Pull-based operators. Every executor exposes `init` and `next`; plan
// trees are turned into executor trees by `create_executor`, and tuples are
// pulled from the root. Writing executors run the MVCC write protocol from
// `common` and emit a single count tuple.

pub mod aggregation;
pub mod common;
pub mod delete;
pub mod filter;
pub mod hash_join;
pub mod index_scan;
pub mod insert;
pub mod limit;
pub mod nested_loop_join;
pub mod seq_scan;
pub mod sort;
pub mod topn;
pub mod update;
pub mod values;
pub mod window;

use std::sync::Arc;

use thiserror::Error;

use crate::catalog::{Catalog, CatalogError, SchemaRef};
use crate::common::types::Rid;
use crate::index::hash::HashIndexError;
use crate::query::plan::{PlanNode, PlanNodeRef};
use crate::storage::table::Tuple;
use crate::transaction::{Transaction, TransactionError, TransactionManager};

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Write-write conflict: {0}")]
    WriteConflict(String),

    #[error("Execution invariant violated: {0}")]
    Internal(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Hash index error: {0}")]
    Index(#[from] HashIndexError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Everything an executor needs to borrow: the catalog, the running
/// transaction, and the transaction manager.
pub struct ExecutorContext {
    pub catalog: Arc<Catalog>,
    pub txn: Arc<Transaction>,
    pub txn_mgr: Arc<TransactionManager>,
}

impl ExecutorContext {
    pub fn new(catalog: Arc<Catalog>, txn: Arc<Transaction>, txn_mgr: Arc<TransactionManager>) -> Self {
        Self { catalog, txn, txn_mgr }
    }
}

/// The pull interface every operator implements.
pub trait Executor {
    fn init(&mut self) -> ExecutionResult<()>;

    /// Produce the next tuple, or None when exhausted.
    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>>;

    fn output_schema(&self) -> SchemaRef;
}

pub type BoxedExecutor = Box<dyn Executor>;

/// Build an executor tree from a plan tree.
pub fn create_executor(ctx: &Arc<ExecutorContext>, plan: &PlanNodeRef) -> ExecutionResult<BoxedExecutor> {
    Ok(match plan.as_ref() {
        PlanNode::SeqScan(node) => Box::new(seq_scan::SeqScanExecutor::new(Arc::clone(ctx), node.clone())?),
        PlanNode::IndexScan(node) => Box::new(index_scan::IndexScanExecutor::new(Arc::clone(ctx), node.clone())?),
        PlanNode::Values(node) => Box::new(values::ValuesExecutor::new(node.clone())),
        PlanNode::Filter(node) => {
            let child = create_executor(ctx, &node.child)?;
            Box::new(filter::FilterExecutor::new(node.clone(), child))
        }
        PlanNode::Insert(node) => {
            let child = create_executor(ctx, &node.child)?;
            Box::new(insert::InsertExecutor::new(Arc::clone(ctx), node.clone(), child)?)
        }
        PlanNode::Update(node) => {
            let child = create_executor(ctx, &node.child)?;
            Box::new(update::UpdateExecutor::new(Arc::clone(ctx), node.clone(), child)?)
        }
        PlanNode::Delete(node) => {
            let child = create_executor(ctx, &node.child)?;
            Box::new(delete::DeleteExecutor::new(Arc::clone(ctx), node.clone(), child)?)
        }
        PlanNode::NestedLoopJoin(node) => {
            let left = create_executor(ctx, &node.left)?;
            let right = create_executor(ctx, &node.right)?;
            Box::new(nested_loop_join::NestedLoopJoinExecutor::new(node.clone(), left, right))
        }
        PlanNode::HashJoin(node) => {
            let left = create_executor(ctx, &node.left)?;
            let right = create_executor(ctx, &node.right)?;
            Box::new(hash_join::HashJoinExecutor::new(node.clone(), left, right))
        }
        PlanNode::Aggregation(node) => {
            let child = create_executor(ctx, &node.child)?;
            Box::new(aggregation::AggregationExecutor::new(node.clone(), child))
        }
        PlanNode::Sort(node) => {
            let child = create_executor(ctx, &node.child)?;
            Box::new(sort::SortExecutor::new(node.clone(), child))
        }
        PlanNode::Limit(node) => {
            let child = create_executor(ctx, &node.child)?;
            Box::new(limit::LimitExecutor::new(node.clone(), child))
        }
        PlanNode::TopN(node) => {
            let child = create_executor(ctx, &node.child)?;
            Box::new(topn::TopNExecutor::new(node.clone(), child))
        }
        PlanNode::Window(node) => {
            let child = create_executor(ctx, &node.child)?;
            Box::new(window::WindowFunctionExecutor::new(node.clone(), child))
        }
    })
}

/// Init the root and drain every tuple: the test harness entry point.
pub fn execute_plan(ctx: &Arc<ExecutorContext>, plan: &PlanNodeRef) -> ExecutionResult<Vec<Tuple>> {
    let mut root = create_executor(ctx, plan)?;
    root.init()?;
    let mut out = Vec::new();
    while let Some((tuple, _rid)) = root.next()? {
        out.push(tuple);
    }
    Ok(out)
}
