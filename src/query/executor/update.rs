use std::sync::Arc;

use crate::catalog::{SchemaRef, TableInfo, Value};
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::common::{claim_version_link, is_write_conflict, publish_undo_log};
use crate::query::executor::{BoxedExecutor, ExecutionError, ExecutionResult, Executor, ExecutorContext};
use crate::query::plan::UpdatePlanNode;
use crate::storage::table::{Tuple, TupleMeta};
use crate::transaction::UndoLog;

/// Buffers its child's rows during init (re-checking write-write conflicts
/// up front), then rewrites each row in place through the write protocol.
/// Undo logs record only the fields that changed; a second write by the
/// same transaction extends its earlier log so the pre-transaction image is
/// preserved. Emits a single count tuple.
pub struct UpdateExecutor {
    ctx: Arc<ExecutorContext>,
    plan: UpdatePlanNode,
    child: BoxedExecutor,
    table_info: Arc<TableInfo>,
    buffered: Vec<Rid>,
    done: bool,
}

impl UpdateExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: UpdatePlanNode, child: BoxedExecutor) -> ExecutionResult<Self> {
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

    fn new_values(&self, old: &Tuple) -> Vec<Value> {
        let schema = self.child.output_schema();
        self.plan
            .target_expressions
            .iter()
            .map(|expr| expr.evaluate(old, &schema))
            .collect()
    }

    /// Extend this transaction's earlier undo log with pre-images of the
    /// fields this update newly touches. Fields already covered keep their
    /// original pre-images.
    fn amend_own_undo_log(&self, rid: Rid, old: &Tuple, new: &Tuple) {
        let txn = &self.ctx.txn;
        let Some(link) = self.ctx.txn_mgr.get_undo_link(rid) else {
            return;
        };
        if link.prev_txn != txn.id() {
            return;
        }
        let Some(prev_log) = txn.undo_log(link.prev_log_idx) else {
            return;
        };

        let schema = self.child.output_schema();
        let column_count = schema.column_count();

        let mut newly_modified = vec![false; column_count];
        for col in 0..column_count {
            if new.value(col) != old.value(col) && !prev_log.modified_fields[col] {
                newly_modified[col] = true;
            }
        }

        let mut merged_fields = vec![false; column_count];
        let mut merged_values = Vec::new();
        let mut partial_idx = 0;
        for col in 0..column_count {
            if prev_log.modified_fields[col] {
                merged_fields[col] = true;
                merged_values.push(prev_log.tuple.value(partial_idx).clone());
                partial_idx += 1;
            } else if newly_modified[col] {
                merged_fields[col] = true;
                // `old` still holds the value from before this statement,
                // which for an untouched field is the pre-transaction value.
                merged_values.push(old.value(col).clone());
            }
        }

        txn.modify_undo_log(
            link.prev_log_idx,
            UndoLog {
                is_deleted: prev_log.is_deleted,
                modified_fields: merged_fields,
                tuple: Tuple::new(merged_values),
                ts: prev_log.ts,
                prev_version: prev_log.prev_version,
            },
        );
    }
}

impl Executor for UpdateExecutor {
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
        let schema = self.child.output_schema();
        let mut count: i64 = 0;

        for &rid in &self.buffered {
            let Some((meta, old_tuple)) = heap.get_tuple(rid) else {
                continue;
            };
            let new_tuple = Tuple::new(self.new_values(&old_tuple));

            if meta.ts == txn.id() {
                self.amend_own_undo_log(rid, &old_tuple, &new_tuple);
                heap.update_tuple_in_place(TupleMeta::new(meta.ts, false), new_tuple, rid);
            } else {
                if is_write_conflict(&meta, txn) {
                    txn.set_tainted();
                    return Err(ExecutionError::WriteConflict(format!(
                        "tuple {} written after our snapshot",
                        rid
                    )));
                }
                let observed_prev = claim_version_link(txn_mgr, txn, rid)?;

                // Before-image of only the changed fields.
                let mut modified_fields = vec![false; schema.column_count()];
                let mut old_values = Vec::new();
                for col in 0..schema.column_count() {
                    if new_tuple.value(col) != old_tuple.value(col) {
                        modified_fields[col] = true;
                        old_values.push(old_tuple.value(col).clone());
                    }
                }
                let log = UndoLog {
                    is_deleted: meta.is_deleted,
                    modified_fields,
                    tuple: Tuple::new(old_values),
                    ts: meta.ts,
                    prev_version: observed_prev,
                };
                publish_undo_log(txn_mgr, txn, rid, log);
                heap.update_tuple_in_place(TupleMeta::new(txn.id(), false), new_tuple, rid);
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
