use std::sync::Arc;

use crate::catalog::{IndexInfo, SchemaRef, TableInfo, Value};
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::common::{claim_version_link, is_write_conflict, publish_undo_log};
use crate::query::executor::{BoxedExecutor, ExecutionError, ExecutionResult, Executor, ExecutorContext};
use crate::query::plan::InsertPlanNode;
use crate::storage::table::{Tuple, TupleMeta};
use crate::transaction::{UndoLog, VersionLink};

/// Drains its child into the table. New rows are stamped with the writing
/// transaction's id and locked via their version link; rows colliding with
/// a live index entry are a conflict, while collisions with a tombstone
/// revive the row through the write protocol. Emits a single count tuple.
pub struct InsertExecutor {
    ctx: Arc<ExecutorContext>,
    plan: InsertPlanNode,
    child: BoxedExecutor,
    table_info: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    done: bool,
}

impl InsertExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: InsertPlanNode, child: BoxedExecutor) -> ExecutionResult<Self> {
        let table_info = ctx.catalog.get_table(plan.table_oid)?;
        let indexes = ctx.catalog.table_indexes(&table_info.name);
        Ok(Self {
            ctx,
            plan,
            child,
            table_info,
            indexes,
            done: false,
        })
    }

    /// Absorb an insert whose key already exists in some index by reviving
    /// the tombstone at `rid` with the new values. A live holder of the key
    /// is a conflict.
    fn revive_tombstone(&self, tuple: &Tuple, rid: Rid) -> ExecutionResult<()> {
        let txn = &self.ctx.txn;
        let heap = &self.table_info.table;
        let Some(meta) = heap.get_tuple_meta(rid) else {
            return Err(ExecutionError::Internal(format!(
                "index entry points at missing tuple {}",
                rid
            )));
        };

        if !meta.is_deleted {
            txn.set_tainted();
            return Err(ExecutionError::WriteConflict(format!(
                "key already live at {}",
                rid
            )));
        }

        if meta.ts == txn.id() {
            // Our own tombstone: flip it back in place.
            heap.update_tuple_in_place(TupleMeta::new(meta.ts, false), tuple.clone(), rid);
            txn.append_write_set(self.table_info.oid, rid);
            return Ok(());
        }

        if is_write_conflict(&meta, txn) {
            txn.set_tainted();
            return Err(ExecutionError::WriteConflict(format!(
                "tombstone at {} written after our snapshot",
                rid
            )));
        }

        let observed_prev = claim_version_link(&self.ctx.txn_mgr, txn, rid)?;
        let undo_log = UndoLog {
            is_deleted: true,
            modified_fields: vec![false; self.child.output_schema().column_count()],
            tuple: Tuple::empty(),
            ts: meta.ts,
            prev_version: observed_prev,
        };
        publish_undo_log(&self.ctx.txn_mgr, txn, rid, undo_log);
        heap.update_tuple_in_place(TupleMeta::new(txn.id(), false), tuple.clone(), rid);
        txn.append_write_set(self.table_info.oid, rid);
        Ok(())
    }

    /// A revived row keeps its RID but carries new values, so every index
    /// must agree with them, not just the one whose probe found the
    /// tombstone. Missing entries are created; an entry held by a live row
    /// is a key conflict; one held by another tombstone lost the key to the
    /// revived row and is repointed.
    fn reindex_revived(&self, tuple: &Tuple, rid: Rid) -> ExecutionResult<()> {
        let txn = &self.ctx.txn;
        let heap = &self.table_info.table;
        for index in &self.indexes {
            let Some(key) = index.key_from_tuple(tuple) else {
                continue;
            };
            match index.scan_key(key)?.first() {
                Some(&existing) if existing == rid => {}
                Some(&other) => {
                    let live = heap.get_tuple_meta(other).map_or(false, |m| !m.is_deleted);
                    if live {
                        txn.set_tainted();
                        return Err(ExecutionError::WriteConflict(format!(
                            "key {} already live at {}",
                            key, other
                        )));
                    }
                    index.delete_entry(key)?;
                    if !index.insert_entry(key, rid)? {
                        txn.set_tainted();
                        return Err(ExecutionError::WriteConflict(format!(
                            "concurrent insert of key {}",
                            key
                        )));
                    }
                }
                None => {
                    if !index.insert_entry(key, rid)? {
                        txn.set_tainted();
                        return Err(ExecutionError::WriteConflict(format!(
                            "concurrent insert of key {}",
                            key
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let txn = &self.ctx.txn;
        let mut count: i64 = 0;

        while let Some((tuple, _)) = self.child.next()? {
            // Probe every index for a duplicate key first.
            let mut revived_at = None;
            for index in &self.indexes {
                let Some(key) = index.key_from_tuple(&tuple) else {
                    continue;
                };
                if let Some(&rid) = index.scan_key(key)?.first() {
                    self.revive_tombstone(&tuple, rid)?;
                    revived_at = Some(rid);
                    break;
                }
            }
            if let Some(rid) = revived_at {
                self.reindex_revived(&tuple, rid)?;
                count += 1;
                continue;
            }

            let Some(rid) = self
                .table_info
                .table
                .insert_tuple(TupleMeta::new(txn.id(), false), tuple.clone())
            else {
                return Err(ExecutionError::Internal("table heap is full".to_string()));
            };
            self.ctx.txn_mgr.update_version_link(
                rid,
                Some(VersionLink {
                    prev: None,
                    in_progress: true,
                }),
                None,
            );
            for index in &self.indexes {
                if let Some(key) = index.key_from_tuple(&tuple) {
                    if !index.insert_entry(key, rid)? {
                        txn.set_tainted();
                        return Err(ExecutionError::WriteConflict(format!(
                            "concurrent insert of key {}",
                            key
                        )));
                    }
                }
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
