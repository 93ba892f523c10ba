// MVCC Execution Helpers
//
// Version-chain reconstruction shared by the scans, and the conflict-checked
// write protocol shared by the writing executors.

use crate::catalog::Schema;
use crate::common::types::{is_txn_id, Rid};
use crate::query::executor::{ExecutionError, ExecutionResult};
use crate::storage::table::{Tuple, TupleMeta};
use crate::transaction::{Transaction, TransactionManager, UndoLink, UndoLog, VersionLink};

/// Rebuild a historical version of a tuple by applying undo logs newest to
/// oldest over the base version. Returns None when the reconstructed
/// version is a deletion.
pub fn reconstruct_tuple(
    schema: &Schema,
    base_tuple: &Tuple,
    base_meta: &TupleMeta,
    undo_logs: &[UndoLog],
) -> Option<Tuple> {
    let mut values: Vec<_> = base_tuple.values().to_vec();
    let mut is_deleted = base_meta.is_deleted;
    for log in undo_logs {
        is_deleted = log.is_deleted;
        // The partial tuple stores only the modified fields, in order.
        let mut partial_idx = 0;
        for (col, modified) in log.modified_fields.iter().enumerate() {
            if *modified {
                values[col] = log.tuple.value(partial_idx).clone();
                partial_idx += 1;
            }
        }
    }
    if is_deleted {
        None
    } else {
        Some(Tuple::new(values))
    }
}

/// Walk a tuple's undo chain collecting logs down to the first one visible
/// at `read_ts`. Returns None when no version is visible to the reader.
pub fn collect_undo_logs(
    txn_mgr: &TransactionManager,
    read_ts: u64,
    rid: Rid,
) -> Option<Vec<UndoLog>> {
    let mut link_opt = txn_mgr.get_undo_link(rid);
    link_opt?;

    let mut logs = Vec::new();
    while let Some(link) = link_opt {
        let log = txn_mgr.get_undo_log(link)?;
        let ts = log.ts;
        let next = log.prev_version;
        logs.push(log);
        if ts <= read_ts {
            break;
        }
        link_opt = next;
    }

    let anchored = logs.last().map_or(false, |last| last.ts <= read_ts);
    if anchored {
        Some(logs)
    } else {
        None
    }
}

/// MVCC visibility: the base version when it belongs to this transaction or
/// committed at or before the read timestamp, otherwise the reconstruction
/// from the undo chain. None when nothing is visible (including deletions).
pub fn resolve_visible_tuple(
    schema: &Schema,
    txn_mgr: &TransactionManager,
    txn: &Transaction,
    rid: Rid,
    meta: &TupleMeta,
    tuple: Tuple,
) -> Option<Tuple> {
    if meta.ts == txn.id() || meta.ts <= txn.read_ts() {
        if meta.is_deleted {
            None
        } else {
            Some(tuple)
        }
    } else {
        let logs = collect_undo_logs(txn_mgr, txn.read_ts(), rid)?;
        reconstruct_tuple(schema, &tuple, meta, &logs)
    }
}

/// True when another transaction owns the tuple's latest version: either an
/// in-flight writer that is not us, or a commit newer than our snapshot.
pub fn is_write_conflict(meta: &TupleMeta, txn: &Transaction) -> bool {
    if is_txn_id(meta.ts) {
        meta.ts != txn.id()
    } else {
        meta.ts > txn.read_ts()
    }
}

/// First half of the write protocol: claim the tuple's version link by
/// compare-and-setting `in_progress` under the link map's lock. Two writers
/// cannot both succeed; the loser is tainted. Returns the undo link that
/// was current at claim time.
pub fn claim_version_link(
    txn_mgr: &TransactionManager,
    txn: &Transaction,
    rid: Rid,
) -> ExecutionResult<Option<UndoLink>> {
    let observed_prev = txn_mgr.get_version_link(rid).and_then(|link| link.prev);
    let claimed = VersionLink {
        prev: observed_prev,
        in_progress: true,
    };
    let check = |current: Option<&VersionLink>| match current {
        None => true,
        Some(link) => !link.in_progress && link.prev == observed_prev,
    };
    if !txn_mgr.update_version_link(rid, Some(claimed), Some(&check)) {
        txn.set_tainted();
        return Err(ExecutionError::WriteConflict(format!(
            "tuple {} is locked by another writer",
            rid
        )));
    }
    Ok(observed_prev)
}

/// Second half of the write protocol: append the undo log to the
/// transaction and swing the version link's head to it, keeping the tuple
/// locked.
pub fn publish_undo_log(
    txn_mgr: &TransactionManager,
    txn: &Transaction,
    rid: Rid,
    log: UndoLog,
) -> UndoLink {
    let link = txn.append_undo_log(log);
    txn_mgr.update_version_link(
        rid,
        Some(VersionLink {
            prev: Some(link),
            in_progress: true,
        }),
        None,
    );
    link
}

/// Undo log for a full-row before-image (used by deletes).
pub fn full_undo_log(
    schema: &Schema,
    meta: &TupleMeta,
    tuple: &Tuple,
    prev_version: Option<UndoLink>,
) -> UndoLog {
    UndoLog {
        is_deleted: meta.is_deleted,
        modified_fields: vec![true; schema.column_count()],
        tuple: tuple.clone(),
        ts: meta.ts,
        prev_version,
    }
}
