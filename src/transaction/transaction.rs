use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::types::{Rid, TableOid, Timestamp, TxnId, INVALID_TS};
use crate::storage::table::Tuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    SnapshotIsolation,
    Serializable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Running,
    /// A write-write conflict was detected; the transaction can only abort.
    Tainted,
    Committed,
    Aborted,
}

/// Address of an undo log: owning transaction plus position in its log
/// vector. Undo logs are append-only, so indices are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoLink {
    pub prev_txn: TxnId,
    pub prev_log_idx: usize,
}

/// The before-image of one tuple write: which fields changed, their prior
/// values, the prior timestamp, and the link to the version before that.
#[derive(Debug, Clone)]
pub struct UndoLog {
    pub is_deleted: bool,
    pub modified_fields: Vec<bool>,
    pub tuple: Tuple,
    pub ts: Timestamp,
    pub prev_version: Option<UndoLink>,
}

/// Per-RID head of the undo chain. `in_progress` doubles as the tuple-level
/// write lock: at most one writer holds it at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionLink {
    pub prev: Option<UndoLink>,
    pub in_progress: bool,
}

pub struct Transaction {
    id: TxnId,
    isolation_level: IsolationLevel,
    read_ts: AtomicU64,
    commit_ts: AtomicU64,
    state: Mutex<TransactionState>,
    undo_logs: Mutex<Vec<UndoLog>>,
    write_set: Mutex<HashMap<TableOid, HashSet<Rid>>>,
}

impl Transaction {
    pub(crate) fn new(id: TxnId, isolation_level: IsolationLevel) -> Self {
        Self {
            id,
            isolation_level,
            read_ts: AtomicU64::new(0),
            commit_ts: AtomicU64::new(INVALID_TS),
            state: Mutex::new(TransactionState::Running),
            undo_logs: Mutex::new(Vec::new()),
            write_set: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn read_ts(&self) -> Timestamp {
        self.read_ts.load(Ordering::Acquire)
    }

    pub(crate) fn set_read_ts(&self, ts: Timestamp) {
        self.read_ts.store(ts, Ordering::Release);
    }

    pub fn commit_ts(&self) -> Timestamp {
        self.commit_ts.load(Ordering::Acquire)
    }

    pub(crate) fn set_commit_ts(&self, ts: Timestamp) {
        self.commit_ts.store(ts, Ordering::Release);
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    /// Mark the transaction un-commitable after a write-write conflict.
    pub fn set_tainted(&self) {
        *self.state.lock() = TransactionState::Tainted;
    }

    /// Append an undo log and return its stable address.
    pub fn append_undo_log(&self, log: UndoLog) -> UndoLink {
        let mut logs = self.undo_logs.lock();
        logs.push(log);
        UndoLink {
            prev_txn: self.id,
            prev_log_idx: logs.len() - 1,
        }
    }

    /// Replace an existing undo log in place (self-modification path).
    pub fn modify_undo_log(&self, idx: usize, log: UndoLog) {
        self.undo_logs.lock()[idx] = log;
    }

    pub fn undo_log(&self, idx: usize) -> Option<UndoLog> {
        self.undo_logs.lock().get(idx).cloned()
    }

    pub fn undo_log_count(&self) -> usize {
        self.undo_logs.lock().len()
    }

    /// Record a touched RID so commit can stamp it.
    pub fn append_write_set(&self, table: TableOid, rid: Rid) {
        self.write_set.lock().entry(table).or_default().insert(rid);
    }

    pub fn write_set_snapshot(&self) -> Vec<(TableOid, Vec<Rid>)> {
        self.write_set
            .lock()
            .iter()
            .map(|(&oid, rids)| (oid, rids.iter().copied().collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::TXN_START_ID;

    #[test]
    fn test_undo_log_addresses_are_stable() {
        let txn = Transaction::new(TXN_START_ID | 1, IsolationLevel::SnapshotIsolation);
        let first = txn.append_undo_log(UndoLog {
            is_deleted: false,
            modified_fields: vec![true],
            tuple: Tuple::empty(),
            ts: 1,
            prev_version: None,
        });
        let second = txn.append_undo_log(UndoLog {
            is_deleted: true,
            modified_fields: vec![false],
            tuple: Tuple::empty(),
            ts: 2,
            prev_version: Some(first),
        });
        assert_eq!(first.prev_log_idx, 0);
        assert_eq!(second.prev_log_idx, 1);
        assert_eq!(txn.undo_log(1).unwrap().prev_version, Some(first));
    }

    #[test]
    fn test_write_set_deduplicates() {
        let txn = Transaction::new(TXN_START_ID | 1, IsolationLevel::SnapshotIsolation);
        let rid = Rid::new(0, 0);
        txn.append_write_set(3, rid);
        txn.append_write_set(3, rid);
        let snapshot = txn.write_set_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].1.len(), 1);
    }
}
