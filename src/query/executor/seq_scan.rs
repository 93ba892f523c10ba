use std::sync::Arc;

use crate::catalog::{SchemaRef, TableInfo};
use crate::common::types::Rid;
use crate::query::executor::common::resolve_visible_tuple;
use crate::query::executor::{ExecutionResult, Executor, ExecutorContext};
use crate::query::plan::SeqScanPlanNode;
use crate::storage::table::{TableIterator, Tuple};

/// Full-table scan. Every base tuple goes through MVCC visibility: the
/// transaction's own writes and versions committed at or before its read
/// timestamp are taken as-is, anything newer is reconstructed from the undo
/// chain, and invisible or deleted rows are skipped.
pub struct SeqScanExecutor {
    ctx: Arc<ExecutorContext>,
    plan: SeqScanPlanNode,
    table_info: Arc<TableInfo>,
    iter: Option<TableIterator>,
}

impl SeqScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: SeqScanPlanNode) -> ExecutionResult<Self> {
        let table_info = ctx.catalog.get_table(plan.table_oid)?;
        Ok(Self {
            ctx,
            plan,
            table_info,
            iter: None,
        })
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.iter = Some(self.table_info.table.make_iterator());
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        if self.iter.is_none() {
            self.init()?;
        }
        let iter = self.iter.as_mut().unwrap();
        while let Some((rid, meta, tuple)) = iter.next() {
            let Some(visible) = resolve_visible_tuple(
                &self.plan.output_schema,
                &self.ctx.txn_mgr,
                &self.ctx.txn,
                rid,
                &meta,
                tuple,
            ) else {
                continue;
            };

            if let Some(predicate) = &self.plan.filter_predicate {
                if !predicate
                    .evaluate(&visible, &self.plan.output_schema)
                    .is_true()
                {
                    continue;
                }
            }
            return Ok(Some((visible, rid)));
        }
        Ok(None)
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.plan.output_schema)
    }
}
