pub mod manager;
pub mod transaction;
pub mod watermark;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::common::types::{Timestamp, TxnId};

pub use manager::TransactionManager;
pub use transaction::{
    IsolationLevel, Transaction, TransactionState, UndoLink, UndoLog, VersionLink,
};
pub use watermark::Watermark;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction {0} is not running")]
    NotRunning(TxnId),

    #[error("Transaction {0} is neither running nor tainted")]
    NotAbortable(TxnId),

    #[error("Read timestamp {read_ts} precedes commit frontier {commit_ts}")]
    ReadBelowCommit {
        read_ts: Timestamp,
        commit_ts: Timestamp,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}
