// Buffer Pool Manager
//
// Maps page ids to in-memory frames, pinning pages while they are in use and
// evicting cold pages through the LRU-K replacer. Every public operation
// serializes on one pool-wide mutex; page bytes themselves are protected by
// per-frame latches carried by page guards.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::channel;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::types::{FrameId, PageId, INVALID_PAGE_ID};
use crate::storage::buffer::replacer::{AccessType, LruKReplacer};
use crate::storage::buffer::BufferPoolError;
use crate::storage::disk::{DiskManager, DiskRequest, DiskScheduler};
use crate::storage::page::{Frame, PageGuard, ReadPageGuard, WritePageGuard};

/// Bookkeeping shared by all operations, guarded by the pool mutex.
struct PoolState {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: LruKReplacer,
    next_page_id: PageId,
}

pub struct BufferPoolManager {
    pool_size: usize,
    frames: Vec<Arc<Frame>>,
    state: Mutex<PoolState>,
    scheduler: DiskScheduler,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let frames = (0..pool_size).map(|i| Arc::new(Frame::new(i))).collect();
        let free_list = (0..pool_size).collect();

        Self {
            pool_size,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                replacer: LruKReplacer::new(pool_size, replacer_k),
                next_page_id: 0,
            }),
            scheduler: DiskScheduler::new(disk_manager),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Allocate a fresh page pinned into a frame. Fails with
    /// [`BufferPoolError::PoolExhausted`] iff no frame is free and none is
    /// evictable.
    pub fn new_page(&self) -> Result<(PageId, Arc<Frame>), BufferPoolError> {
        let mut state = self.state.lock();
        let frame_id = self.acquire_frame(&mut state)?;

        let page_id = state.next_page_id;
        state.next_page_id += 1;

        let frame = &self.frames[frame_id];
        frame.reset();
        frame.set_page_id(page_id);
        frame.set_pin_count(1);
        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id, AccessType::Unknown)?;
        state.replacer.set_evictable(frame_id, false)?;

        Ok((page_id, Arc::clone(frame)))
    }

    /// Fetch a page, reading it from disk on a miss. The returned frame is
    /// pinned; callers must eventually `unpin_page`.
    pub fn fetch_page(
        &self,
        page_id: PageId,
        access_type: AccessType,
    ) -> Result<Arc<Frame>, BufferPoolError> {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id];
            frame.incr_pin_count();
            state.replacer.record_access(frame_id, access_type)?;
            state.replacer.set_evictable(frame_id, false)?;
            return Ok(Arc::clone(frame));
        }

        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id];
        frame.reset();
        frame.set_page_id(page_id);
        frame.set_pin_count(1);
        state.page_table.insert(page_id, frame_id);

        self.read_frame_sync(frame)?;

        state.replacer.record_access(frame_id, access_type)?;
        state.replacer.set_evictable(frame_id, false)?;

        Ok(Arc::clone(frame))
    }

    /// Drop one pin on a page. Returns false when the page is not resident
    /// or its pin count is already zero. Once dirty, a page stays dirty
    /// until flushed.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id];
        if frame.pin_count() == 0 {
            return false;
        }
        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.decr_pin_count() == 0 {
            let _ = state.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Write a resident page out and clear its dirty flag. Returns false
    /// when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> bool {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id];
        if self.write_frame_sync(frame).is_err() {
            return false;
        }
        frame.set_dirty(false);
        true
    }

    /// Flush every resident page.
    pub fn flush_all_pages(&self) {
        let state = self.state.lock();
        for (&_page_id, &frame_id) in state.page_table.iter() {
            let frame = &self.frames[frame_id];
            if self.write_frame_sync(frame).is_ok() {
                frame.set_dirty(false);
            }
        }
    }

    /// Evict a page from the pool, freeing its frame. Returns true when the
    /// page is gone (including when it was never resident), false when it is
    /// pinned.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return true;
        };
        let frame = &self.frames[frame_id];
        if frame.pin_count() != 0 {
            return false;
        }
        state.page_table.remove(&page_id);
        let _ = state.replacer.remove(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);
        true
    }

    /// Fetch with a pin-only guard.
    pub fn fetch_page_basic(self: &Arc<Self>, page_id: PageId) -> Result<PageGuard, BufferPoolError> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        Ok(PageGuard::new(Arc::clone(self), frame, page_id))
    }

    /// Fetch with a read latch held for the guard's lifetime.
    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> Result<ReadPageGuard, BufferPoolError> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        Ok(ReadPageGuard::new(PageGuard::new(Arc::clone(self), frame, page_id)))
    }

    /// Fetch with a write latch held for the guard's lifetime.
    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> Result<WritePageGuard, BufferPoolError> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        Ok(WritePageGuard::new(PageGuard::new(Arc::clone(self), frame, page_id)))
    }

    /// Allocate a fresh page behind a pin-only guard.
    pub fn new_page_guarded(self: &Arc<Self>) -> Result<PageGuard, BufferPoolError> {
        let (page_id, frame) = self.new_page()?;
        Ok(PageGuard::new(Arc::clone(self), frame, page_id))
    }

    /// Pop a free frame, or evict a victim (writing it out first when
    /// dirty). The victim's page-table entry is removed here.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = state.replacer.evict() else {
            return Err(BufferPoolError::PoolExhausted);
        };

        let frame = &self.frames[frame_id];
        let old_page_id = frame.page_id();
        if frame.is_dirty() {
            debug!("evicting dirty page {} from frame {}", old_page_id, frame_id);
            self.write_frame_sync(frame)?;
        }
        if old_page_id != INVALID_PAGE_ID {
            state.page_table.remove(&old_page_id);
        }
        Ok(frame_id)
    }

    fn read_frame_sync(&self, frame: &Frame) -> Result<(), BufferPoolError> {
        let (tx, rx) = channel();
        self.scheduler.schedule(DiskRequest {
            is_write: false,
            data: frame.data_ptr(),
            page_id: frame.page_id(),
            callback: tx,
        });
        match rx.recv() {
            Ok(true) => Ok(()),
            _ => Err(BufferPoolError::IoIncomplete),
        }
    }

    fn write_frame_sync(&self, frame: &Frame) -> Result<(), BufferPoolError> {
        let (tx, rx) = channel();
        self.scheduler.schedule(DiskRequest {
            is_write: true,
            data: frame.data_ptr(),
            page_id: frame.page_id(),
            callback: tx,
        });
        match rx.recv() {
            Ok(true) => Ok(()),
            _ => Err(BufferPoolError::IoIncomplete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn test_pool(pool_size: usize, k: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(tmp.path()).unwrap());
        (Arc::new(BufferPoolManager::new(pool_size, k, dm)), tmp)
    }

    #[test]
    fn test_new_page_pins_frame() {
        let (pool, _tmp) = test_pool(4, 2);
        let (page_id, frame) = pool.new_page().unwrap();
        assert_eq!(page_id, 0);
        assert_eq!(frame.pin_count(), 1);
        assert!(pool.unpin_page(page_id, false));
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_fetch_increments_pin() {
        let (pool, _tmp) = test_pool(4, 2);
        let (page_id, frame) = pool.new_page().unwrap();
        pool.fetch_page(page_id, AccessType::Unknown).unwrap();
        assert_eq!(frame.pin_count(), 2);
        assert!(pool.unpin_page(page_id, false));
        assert!(pool.unpin_page(page_id, false));
        // A third unpin has nothing to release.
        assert!(!pool.unpin_page(page_id, false));
    }

    #[test]
    fn test_pool_exhaustion() {
        let (pool, _tmp) = test_pool(2, 2);
        let (a, _) = pool.new_page().unwrap();
        let (b, _) = pool.new_page().unwrap();
        assert!(matches!(pool.new_page(), Err(BufferPoolError::PoolExhausted)));
        assert!(pool.unpin_page(a, false));
        // One evictable frame frees the pool up again.
        let (c, _) = pool.new_page().unwrap();
        assert_ne!(c, a);
        assert_ne!(c, b);
    }

    #[test]
    fn test_eviction_writes_dirty_page() {
        let (pool, _tmp) = test_pool(1, 2);
        let (page_id, frame) = pool.new_page().unwrap();
        frame.data_ptr().write()[0..4].copy_from_slice(b"keep");
        assert!(pool.unpin_page(page_id, true));

        // Evicts the dirty page, writing it to disk first.
        let (next_id, _) = pool.new_page().unwrap();
        assert_eq!(next_id, 1);
        assert!(pool.unpin_page(next_id, false));

        // Fetch the original back and check the bytes survived the round trip.
        let frame = pool.fetch_page(page_id, AccessType::Unknown).unwrap();
        assert_eq!(&frame.data_ptr().read()[0..4], b"keep");
        assert!(pool.unpin_page(page_id, false));
    }

    #[test]
    fn test_delete_page() {
        let (pool, _tmp) = test_pool(2, 2);
        let (page_id, _) = pool.new_page().unwrap();
        // Pinned pages cannot be deleted.
        assert!(!pool.delete_page(page_id));
        assert!(pool.unpin_page(page_id, false));
        assert!(pool.delete_page(page_id));
        // Deleting a non-resident page is trivially true.
        assert!(pool.delete_page(999));
    }

    #[test]
    fn test_guard_unpins_on_drop() {
        let (pool, _tmp) = test_pool(2, 2);
        let (page_id, frame) = pool.new_page().unwrap();
        assert!(pool.unpin_page(page_id, false));
        {
            let _guard = pool.fetch_page_read(page_id).unwrap();
            assert_eq!(frame.pin_count(), 1);
        }
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_write_guard_marks_dirty() {
        let (pool, _tmp) = test_pool(2, 2);
        let (page_id, frame) = pool.new_page().unwrap();
        assert!(pool.unpin_page(page_id, false));
        {
            let mut guard = pool.fetch_page_write(page_id).unwrap();
            guard.data_mut()[0] = 7;
        }
        assert!(frame.is_dirty());
    }
}
