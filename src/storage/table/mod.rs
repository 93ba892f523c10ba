pub mod heap;
pub mod tuple;

pub use heap::{TableHeap, TableIterator};
pub use tuple::{Tuple, TupleMeta};
