use std::collections::BTreeMap;

use crate::common::types::Timestamp;
use crate::transaction::TransactionError;

/// Multiset of the read timestamps of running transactions, maintaining the
/// minimum. Versions strictly below the watermark are unobservable and may
/// be reclaimed.
pub struct Watermark {
    commit_ts: Timestamp,
    current_reads: BTreeMap<Timestamp, usize>,
}

impl Watermark {
    pub fn new() -> Self {
        Self {
            commit_ts: 0,
            current_reads: BTreeMap::new(),
        }
    }

    /// Register a transaction's read timestamp. Reads never precede the
    /// commit frontier.
    pub fn add_txn(&mut self, read_ts: Timestamp) -> Result<(), TransactionError> {
        if read_ts < self.commit_ts {
            return Err(TransactionError::ReadBelowCommit {
                read_ts,
                commit_ts: self.commit_ts,
            });
        }
        *self.current_reads.entry(read_ts).or_insert(0) += 1;
        Ok(())
    }

    pub fn remove_txn(&mut self, read_ts: Timestamp) {
        if let Some(count) = self.current_reads.get_mut(&read_ts) {
            *count -= 1;
            if *count == 0 {
                self.current_reads.remove(&read_ts);
            }
        }
    }

    /// Advance the commit frontier used when no reader is running.
    pub fn update_commit_ts(&mut self, commit_ts: Timestamp) {
        self.commit_ts = commit_ts;
    }

    /// The minimum live read timestamp, or the commit frontier when no
    /// transaction is running.
    pub fn watermark(&self) -> Timestamp {
        self.current_reads
            .keys()
            .next()
            .copied()
            .unwrap_or(self.commit_ts)
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::new()
    }
}
