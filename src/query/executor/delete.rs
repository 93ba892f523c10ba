use std::sync::Arc;

use crate::catalog::{SchemaRef, TableInfo, Value};
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::common::{claim_version_link, full_undo_log, is_write_conflict, publish_undo_log};
use crate::query::executor::{BoxedExecutor, ExecutionError, ExecutionResult, Executor, ExecutorContext};
use crate::query::plan::DeletePlanNode;
use crate::storage::table::{Tuple, TupleMeta};
use crate::transaction::UndoLog;

/// Buffers its child's rows during init (re-checking write-write conflicts
/// up front), then tombstones each one through the write protocol. Emits a
/// single count tuple.
pub struct DeleteExecutor {
    ctx: Arc<ExecutorContext>,
    plan: DeletePlanNode,
    child: BoxedExecutor,
    table_info: Arc<TableInfo>,
    buffered: Vec<Rid>,
    done: bool,
}

impl DeleteExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: DeletePlanNode, child: BoxedExecutor) -> ExecutionResult<Self> {
        let table_info = ctx.catalog.get_table(plan.table_oid)?;
        Ok(Self {
            ctx,
            plan,
            child,
            table_info,
            buffered: Vec::new(),
            done: false,
        })
    }

    /// Fold the fields this transaction has not touched yet into its
    /// existing undo log, so the log carries a full pre-transaction image.
    fn extend_own_undo_log(&self, rid: Rid, current: &Tuple) -> ExecutionResult<()> {
        let txn = &self.ctx.txn;
        let Some(link) = self.ctx.txn_mgr.get_undo_link(rid) else {
            return Ok(());
        };
        if link.prev_txn != txn.id() {
            return Ok(());
        }
        let Some(prev_log) = txn.undo_log(link.prev_log_idx) else {
            return Ok(());
        };

        let schema = self.child.output_schema();
        let mut values = Vec::with_capacity(schema.column_count());
        let mut partial_idx = 0;
        for col in 0..schema.column_count() {
            if prev_log.modified_fields[col] {
                values.push(prev_log.tuple.value(partial_idx).clone());
                partial_idx += 1;
            } else {
                values.push(current.value(col).clone());
            }
        }
        txn.modify_undo_log(
            link.prev_log_idx,
            UndoLog {
                is_deleted: prev_log.is_deleted,
                modified_fields: vec![true; schema.column_count()],
                tuple: Tuple::new(values),
                ts: prev_log.ts,
                prev_version: prev_log.prev_version,
            },
        );
        Ok(())
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()?;
        self.buffered.clear();
        self.done = false;

        let txn = &self.ctx.txn;
        while let Some((_, rid)) = self.child.next()? {
            self.buffered.push(rid);
            if let Some(meta) = self.table_info.table.get_tuple_meta(rid) {
                if is_write_conflict(&meta, txn) {
                    txn.set_tainted();
                    return Err(ExecutionError::WriteConflict(format!(
                        "tuple {} written after our snapshot",
                        rid
                    )));
                }
            }
        }
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let txn = &self.ctx.txn;
        let txn_mgr = &self.ctx.txn_mgr;
        let heap = &self.table_info.table;
        let mut count: i64 = 0;

        for &rid in &self.buffered {
            let Some((meta, current)) = heap.get_tuple(rid) else {
                continue;
            };

            if meta.is_deleted {
                // Deleted underneath us; release our lock if we hold it
                // before failing.
                if let Some(mut link) = txn_mgr.get_version_link(rid) {
                    if link.in_progress && meta.ts == txn.id() {
                        link.in_progress = false;
                        txn_mgr.update_version_link(rid, Some(link), None);
                    }
                }
                txn.set_tainted();
                return Err(ExecutionError::WriteConflict(format!(
                    "tuple {} already deleted",
                    rid
                )));
            }

            if meta.ts == txn.id() {
                self.extend_own_undo_log(rid, &current)?;
                heap.update_tuple_meta(TupleMeta::new(txn.id(), true), rid);
            } else {
                if is_write_conflict(&meta, txn) {
                    txn.set_tainted();
                    return Err(ExecutionError::WriteConflict(format!(
                        "tuple {} written after our snapshot",
                        rid
                    )));
                }
                let observed_prev = claim_version_link(txn_mgr, txn, rid)?;
                let schema = self.child.output_schema();
                let log = full_undo_log(&schema, &meta, &current, observed_prev);
                publish_undo_log(txn_mgr, txn, rid, log);
                heap.update_tuple_meta(TupleMeta::new(txn.id(), true), rid);
            }
            txn.append_write_set(self.table_info.oid, rid);
            count += 1;
        }

        Ok(Some((
            Tuple::new(vec![Value::Integer(count)]),
            Rid::new(INVALID_PAGE_ID, 0),
        )))
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.plan.output_schema)
    }
}
