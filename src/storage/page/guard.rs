// Page Guards
//
// Scoped handles over a pinned page. A guard owns an unpin-on-drop
// obligation; the read/write variants additionally hold the page latch for
// their lifetime and release it before unpinning. Guards are the only
// sanctioned way for layers above the buffer pool to touch page bytes.

use std::sync::Arc;

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock};

use crate::common::types::{PageId, PAGE_SIZE};
use crate::storage::buffer::{BufferPoolError, BufferPoolManager};
use crate::storage::page::{Frame, PageBytes};

/// Pin-only guard. Holds no latch; use [`PageGuard::upgrade_read`] or
/// [`PageGuard::upgrade_write`] to get at the bytes.
pub struct PageGuard {
    bpm: Arc<BufferPoolManager>,
    frame: Arc<Frame>,
    page_id: PageId,
    is_dirty: bool,
}

impl PageGuard {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, frame: Arc<Frame>, page_id: PageId) -> Self {
        Self {
            bpm,
            frame,
            page_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Marks the page dirty when the guard is eventually dropped.
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Re-acquires the page with a read latch. The pin taken by the new
    /// guard overlaps this one's, so the page cannot be evicted in between.
    pub fn upgrade_read(self) -> Result<ReadPageGuard, BufferPoolError> {
        self.bpm.clone().fetch_page_read(self.page_id)
    }

    /// Re-acquires the page with a write latch.
    pub fn upgrade_write(self) -> Result<WritePageGuard, BufferPoolError> {
        self.bpm.clone().fetch_page_write(self.page_id)
    }

    pub(crate) fn frame(&self) -> &Arc<Frame> {
        &self.frame
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        let _ = self.bpm.unpin_page(self.page_id, self.is_dirty);
    }
}

/// Guard holding the page's read latch plus a pin.
///
/// Field order matters: the latch is declared before the pin guard so it is
/// released first on drop.
pub struct ReadPageGuard {
    latch: ArcRwLockReadGuard<RawRwLock, PageBytes>,
    guard: PageGuard,
}

impl ReadPageGuard {
    pub(crate) fn new(guard: PageGuard) -> Self {
        let latch = guard.frame().data_ptr().read_arc();
        Self { latch, guard }
    }

    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.latch
    }
}

/// Guard holding the page's write latch plus a pin. Mutable access marks the
/// page dirty.
pub struct WritePageGuard {
    latch: ArcRwLockWriteGuard<RawRwLock, PageBytes>,
    guard: PageGuard,
}

impl WritePageGuard {
    pub(crate) fn new(guard: PageGuard) -> Self {
        let latch = guard.frame().data_ptr().write_arc();
        Self { latch, guard }
    }

    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.latch
    }

    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        self.guard.mark_dirty();
        &mut self.latch
    }
}
