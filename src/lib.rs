//! KarstDB: a teaching-grade relational database engine core.
//!
//! The crate is organized bottom-up: a buffer pool with an LRU-K replacer
//! over a paged disk, an on-disk extendible hash index, an MVCC transaction
//! manager with snapshot isolation and watermark-driven garbage collection,
//! and a pull-based executor pipeline with pattern-rewrite optimization.

pub mod catalog;
pub mod common;
pub mod index;
pub mod query;
pub mod storage;
pub mod transaction;
pub mod trie;

// Re-export the pieces most callers reach for.
pub use catalog::Catalog;
pub use index::DiskExtendibleHashTable;
pub use query::{ExecutorContext, Optimizer};
pub use storage::buffer::{BufferPoolError, BufferPoolManager, LruKReplacer};
pub use storage::disk::{DiskManager, DiskScheduler};
pub use transaction::TransactionManager;
pub use trie::Trie;
