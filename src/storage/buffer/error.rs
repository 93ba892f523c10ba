use thiserror::Error;

use crate::common::types::{FrameId, PageId};
use crate::storage::disk::DiskManagerError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("Page {0} not found in buffer pool")]
    PageNotFound(PageId),

    #[error("Page {0} is pinned")]
    PagePinned(PageId),

    #[error("No free or evictable frame available")]
    PoolExhausted,

    #[error("Frame id {0} out of range")]
    InvalidFrame(FrameId),

    #[error("Frame {0} is not evictable")]
    NotEvictable(FrameId),

    #[error("Disk I/O did not complete")]
    IoIncomplete,

    #[error("Disk manager error: {0}")]
    Disk(#[from] DiskManagerError),
}
