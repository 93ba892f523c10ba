pub mod table;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use thiserror::Error;

use crate::storage::buffer::BufferPoolError;

pub use table::DiskExtendibleHashTable;

#[derive(Error, Debug)]
pub enum HashIndexError {
    #[error("Buffer pool error: {0}")]
    Buffer(#[from] BufferPoolError),
}

/// Hash function type used by the table. A plain function pointer so tests
/// can pin bucket placement with an identity hash.
pub type HashFn<K> = fn(&K) -> u32;

/// Default 32-bit hash for key types.
pub fn default_hash<K: Hash>(key: &K) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish() as u32
}
