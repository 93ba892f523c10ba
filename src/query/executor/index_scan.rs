use std::sync::Arc;

use crate::catalog::{IndexInfo, SchemaRef, TableInfo, Value};
use crate::common::types::Rid;
use crate::query::executor::common::resolve_visible_tuple;
use crate::query::executor::{ExecutionResult, Executor, ExecutorContext};
use crate::query::plan::IndexScanPlanNode;
use crate::storage::table::Tuple;

/// Equality probe on a single-column hash index. Emits at most one tuple,
/// subject to the same MVCC visibility rules as the sequential scan.
pub struct IndexScanExecutor {
    ctx: Arc<ExecutorContext>,
    plan: IndexScanPlanNode,
    table_info: Arc<TableInfo>,
    index_info: Arc<IndexInfo>,
    rids: Vec<Rid>,
    done: bool,
}

impl IndexScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: IndexScanPlanNode) -> ExecutionResult<Self> {
        let table_info = ctx.catalog.get_table(plan.table_oid)?;
        let index_info = ctx.catalog.get_index(plan.index_oid).ok_or_else(|| {
            crate::query::executor::ExecutionError::Internal(format!(
                "index #{} not in catalog",
                plan.index_oid
            ))
        })?;
        Ok(Self {
            ctx,
            plan,
            table_info,
            index_info,
            rids: Vec::new(),
            done: false,
        })
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.rids.clear();
        self.done = false;
        if let Value::Integer(key) = &self.plan.pred_key {
            self.rids = self.index_info.scan_key(*key)?;
        }
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let Some(&rid) = self.rids.first() else {
            return Ok(None);
        };
        let Some((meta, tuple)) = self.table_info.table.get_tuple(rid) else {
            return Ok(None);
        };

        let Some(visible) = resolve_visible_tuple(
            &self.plan.output_schema,
            &self.ctx.txn_mgr,
            &self.ctx.txn,
            rid,
            &meta,
            tuple,
        ) else {
            return Ok(None);
        };

        if let Some(predicate) = &self.plan.filter_predicate {
            if !predicate
                .evaluate(&visible, &self.plan.output_schema)
                .is_true()
            {
                return Ok(None);
            }
        }
        Ok(Some((visible, rid)))
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.plan.output_schema)
    }
}
