pub mod hash;

pub use hash::{default_hash, DiskExtendibleHashTable, HashIndexError};
