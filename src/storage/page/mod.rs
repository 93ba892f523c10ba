pub mod guard;
pub mod hash;

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::types::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

pub use guard::{PageGuard, ReadPageGuard, WritePageGuard};

/// Raw bytes of one page.
pub type PageBytes = Box<[u8; PAGE_SIZE]>;

/// Shared handle to a page's bytes. The `RwLock` is the page latch; it is
/// carried by read/write page guards and taken by the disk scheduler's
/// worker for the duration of a single I/O.
pub type PageBytesPtr = Arc<RwLock<PageBytes>>;

/// A buffer pool frame: one slot of the in-memory page array.
///
/// The bookkeeping fields are atomics so guards can read them without the
/// pool lock, but they are only ever mutated by buffer pool operations that
/// hold it.
pub struct Frame {
    id: FrameId,
    page_id: AtomicI32,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
    data: PageBytesPtr,
}

impl Frame {
    pub fn new(id: FrameId) -> Self {
        Self {
            id,
            page_id: AtomicI32::new(INVALID_PAGE_ID),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE]))),
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn page_id(&self) -> PageId {
        self.page_id.load(Ordering::Acquire)
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id, Ordering::Release);
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    pub fn set_pin_count(&self, count: u32) {
        self.pin_count.store(count, Ordering::Release);
    }

    pub fn incr_pin_count(&self) {
        self.pin_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrements the pin count and returns the new value.
    pub fn decr_pin_count(&self) -> u32 {
        self.pin_count.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Shared handle to the page bytes, for guards and the disk scheduler.
    pub fn data_ptr(&self) -> PageBytesPtr {
        Arc::clone(&self.data)
    }

    /// Zero the bytes and reset the bookkeeping to the free state.
    pub fn reset(&self) {
        self.data.write().fill(0);
        self.page_id.store(INVALID_PAGE_ID, Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
    }
}
