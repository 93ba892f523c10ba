// Transaction Manager
//
// Owns the transaction map, timestamp allocation, the per-RID version-link
// map, and garbage collection. Commit-timestamp assignment and the advance
// of the last-commit timestamp happen under one commit mutex, so commit
// timestamps are dense and strictly increasing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};

use crate::catalog::Catalog;
use crate::common::types::{txn_id_human, Rid, Timestamp, TxnId, TXN_START_ID};
use crate::storage::table::TupleMeta;
use crate::transaction::transaction::{
    IsolationLevel, Transaction, TransactionState, UndoLink, UndoLog, VersionLink,
};
use crate::transaction::watermark::Watermark;
use crate::transaction::TransactionError;

/// Predicate run against the current version link inside the update's
/// critical section; returning false makes the update fail.
pub type VersionLinkCheck<'a> = &'a dyn Fn(Option<&VersionLink>) -> bool;

pub struct TransactionManager {
    catalog: Arc<Catalog>,
    txn_map: RwLock<HashMap<TxnId, Arc<Transaction>>>,
    next_txn_id: AtomicU64,
    commit_mutex: Mutex<()>,
    last_commit_ts: AtomicU64,
    running_txns: Mutex<Watermark>,
    version_info: RwLock<HashMap<Rid, VersionLink>>,
}

impl TransactionManager {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            txn_map: RwLock::new(HashMap::new()),
            next_txn_id: AtomicU64::new(TXN_START_ID),
            commit_mutex: Mutex::new(()),
            last_commit_ts: AtomicU64::new(0),
            running_txns: Mutex::new(Watermark::new()),
            version_info: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Start a transaction: allocate an id, snapshot the read timestamp
    /// under the commit lock, and register with the watermark.
    pub fn begin(&self, isolation_level: IsolationLevel) -> Result<Arc<Transaction>, TransactionError> {
        let mut txn_map = self.txn_map.write();
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(txn_id, isolation_level));
        txn_map.insert(txn_id, Arc::clone(&txn));

        {
            let _commit_guard = self.commit_mutex.lock();
            txn.set_read_ts(self.last_commit_ts.load(Ordering::SeqCst));
        }
        self.running_txns.lock().add_txn(txn.read_ts())?;
        trace!("txn{} begins at read_ts={}", txn_id_human(txn_id), txn.read_ts());
        Ok(txn)
    }

    /// Serializable verification hook. Snapshot isolation needs nothing
    /// here; a serializable implementation would check read/write overlap.
    fn verify_txn(&self, _txn: &Transaction) -> bool {
        true
    }

    /// Commit: stamp every tuple in the write set with the new commit
    /// timestamp, release the per-tuple write locks, and advance the
    /// last-commit frontier. Returns false when serializable verification
    /// fails (the transaction is then aborted).
    pub fn commit(&self, txn: &Arc<Transaction>) -> Result<bool, TransactionError> {
        let _txn_map = self.txn_map.write();
        let commit_guard = self.commit_mutex.lock();

        if txn.state() != TransactionState::Running {
            return Err(TransactionError::NotRunning(txn.id()));
        }

        if txn.isolation_level() == IsolationLevel::Serializable && !self.verify_txn(txn) {
            drop(commit_guard);
            self.abort_locked(txn)?;
            return Ok(false);
        }

        let commit_ts = self.last_commit_ts.load(Ordering::SeqCst) + 1;

        for (table_oid, rids) in txn.write_set_snapshot() {
            let table = self.catalog.get_table(table_oid)?;
            for rid in rids {
                if let Some(meta) = table.table.get_tuple_meta(rid) {
                    table
                        .table
                        .update_tuple_meta(TupleMeta::new(commit_ts, meta.is_deleted), rid);
                }
                let mut version_info = self.version_info.write();
                if let Some(link) = version_info.get_mut(&rid) {
                    link.in_progress = false;
                }
            }
        }

        txn.set_commit_ts(commit_ts);
        txn.set_state(TransactionState::Committed);
        {
            let mut watermark = self.running_txns.lock();
            watermark.update_commit_ts(commit_ts);
            watermark.remove_txn(txn.read_ts());
        }
        self.last_commit_ts.fetch_add(1, Ordering::SeqCst);
        debug!("txn{} committed at ts={}", txn_id_human(txn.id()), commit_ts);
        Ok(true)
    }

    /// Abort a RUNNING or TAINTED transaction. Table-heap mutations are not
    /// rolled back; versions stamped with an aborted writer's id stay
    /// invisible to every reader and are reclaimed by garbage collection.
    pub fn abort(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        let _txn_map = self.txn_map.write();
        self.abort_locked(txn)
    }

    fn abort_locked(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        match txn.state() {
            TransactionState::Running | TransactionState::Tainted => {}
            _ => return Err(TransactionError::NotAbortable(txn.id())),
        }
        txn.set_state(TransactionState::Aborted);
        self.running_txns.lock().remove_txn(txn.read_ts());
        debug!("txn{} aborted", txn_id_human(txn.id()));
        Ok(())
    }

    pub fn watermark(&self) -> Timestamp {
        self.running_txns.lock().watermark()
    }

    pub fn last_commit_ts(&self) -> Timestamp {
        self.last_commit_ts.load(Ordering::SeqCst)
    }

    pub fn get_txn(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.txn_map.read().get(&txn_id).cloned()
    }

    pub fn get_version_link(&self, rid: Rid) -> Option<VersionLink> {
        self.version_info.read().get(&rid).copied()
    }

    /// Head of the undo chain for a RID, if any.
    pub fn get_undo_link(&self, rid: Rid) -> Option<UndoLink> {
        self.get_version_link(rid).and_then(|link| link.prev)
    }

    /// Resolve an undo link to its log. Returns None when the owning
    /// transaction has been garbage collected.
    pub fn get_undo_log(&self, link: UndoLink) -> Option<UndoLog> {
        let txn = self.txn_map.read().get(&link.prev_txn).cloned()?;
        txn.undo_log(link.prev_log_idx)
    }

    /// Predicate-guarded update of a RID's version link: the tuple-level
    /// lock primitive. The check runs against the current value inside the
    /// map's write lock, making the observe-and-swap atomic. Passing `None`
    /// as the new link removes the entry.
    pub fn update_version_link(
        &self,
        rid: Rid,
        link: Option<VersionLink>,
        check: Option<VersionLinkCheck<'_>>,
    ) -> bool {
        let mut version_info = self.version_info.write();
        if let Some(check) = check {
            if !check(version_info.get(&rid)) {
                return false;
            }
        }
        match link {
            Some(link) => {
                version_info.insert(rid, link);
            }
            None => {
                version_info.remove(&rid);
            }
        }
        true
    }

    /// Reclaim finished transactions whose undo logs no reader can reach.
    ///
    /// Every tuple is visited. A tuple whose base version already sits at or
    /// below the watermark satisfies every possible reader by itself, so its
    /// chain holds nothing live. Otherwise the chain is walked: a log is
    /// live while its timestamp is above the watermark, and the first log at
    /// or below the watermark is kept too, anchoring the snapshot of a
    /// reader sitting exactly at the watermark. COMMITTED and ABORTED
    /// transactions owning no live log are dropped from the transaction map.
    pub fn garbage_collection(&self) -> Result<(), TransactionError> {
        let mut txn_map = self.txn_map.write();
        let watermark = self.running_txns.lock().watermark();
        let mut needed: HashSet<TxnId> = HashSet::new();

        for table_name in self.catalog.table_names() {
            let table = self.catalog.get_table_by_name(&table_name)?;
            let mut iter = table.table.make_iterator();
            while let Some((rid, meta, _tuple)) = iter.next() {
                // In-flight writer ids carry the high tag bit, so they always
                // compare above the watermark and keep their chain.
                if meta.ts <= watermark {
                    continue;
                }
                let mut link_opt = self.version_info.read().get(&rid).and_then(|v| v.prev);
                let mut anchored = false;
                while let Some(link) = link_opt {
                    let Some(txn) = txn_map.get(&link.prev_txn) else {
                        // Dangling link: the owner was collected earlier.
                        break;
                    };
                    let Some(log) = txn.undo_log(link.prev_log_idx) else {
                        break;
                    };
                    if log.ts > watermark {
                        needed.insert(link.prev_txn);
                    } else if !anchored {
                        needed.insert(link.prev_txn);
                        anchored = true;
                    } else {
                        break;
                    }
                    link_opt = log.prev_version;
                }
            }
        }

        let before = txn_map.len();
        txn_map.retain(|txn_id, txn| {
            needed.contains(txn_id)
                || !matches!(
                    txn.state(),
                    TransactionState::Committed | TransactionState::Aborted
                )
        });
        debug!(
            "gc reclaimed {} transactions at watermark {}",
            before - txn_map.len(),
            watermark
        );
        Ok(())
    }

    /// Log every tuple's version chain, for debugging MVCC interleavings.
    pub fn dump_version_chains(&self, table_name: &str) -> Result<(), TransactionError> {
        let table = self.catalog.get_table_by_name(table_name)?;
        let mut iter = table.table.make_iterator();
        while let Some((rid, meta, tuple)) = iter.next() {
            let ts_repr = if crate::common::types::is_txn_id(meta.ts) {
                format!("txn{}", txn_id_human(meta.ts))
            } else {
                format!("{}", meta.ts)
            };
            debug!(
                "RID {} ts={}{} tuple={} watermark={}",
                rid,
                ts_repr,
                if meta.is_deleted { " <del>" } else { "" },
                tuple,
                self.watermark()
            );
            let mut link_opt = self.get_undo_link(rid);
            while let Some(link) = link_opt {
                let Some(log) = self.get_undo_log(link) else {
                    break;
                };
                debug!(
                    "  txn{}@{} {}{} ts={}",
                    txn_id_human(link.prev_txn),
                    link.prev_log_idx,
                    log.tuple,
                    if log.is_deleted { " <del>" } else { "" },
                    log.ts
                );
                link_opt = log.prev_version;
            }
        }
        Ok(())
    }
}
