// Disk Scheduler
//
// Serializes page I/O onto a single background worker. Requests are queued
// FIFO; each carries a one-shot completion channel the caller can block on.
// The structure is asynchronous so batching or reordering can be added later
// without changing the API, even though the buffer pool currently awaits
// every request synchronously.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::warn;

use crate::common::types::PageId;
use crate::storage::disk::DiskManager;
use crate::storage::page::PageBytesPtr;

/// A single read or write request against the disk manager.
pub struct DiskRequest {
    /// Whether the request is a write.
    pub is_write: bool,
    /// Shared handle to the page bytes to read into or write from.
    pub data: PageBytesPtr,
    /// Target page id on disk.
    pub page_id: PageId,
    /// Completion channel; the worker sends `true` once the I/O finished.
    pub callback: Sender<bool>,
}

/// Background worker that drains the request queue in FIFO order.
pub struct DiskScheduler {
    request_queue: Sender<Option<DiskRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (tx, rx) = channel::<Option<DiskRequest>>();
        let worker = std::thread::spawn(move || Self::worker_loop(disk_manager, rx));
        Self {
            request_queue: tx,
            worker: Some(worker),
        }
    }

    /// Enqueue a request. The caller observes completion through the
    /// request's callback channel.
    pub fn schedule(&self, request: DiskRequest) {
        // Send only fails when the worker is gone, which happens after drop.
        if self.request_queue.send(Some(request)).is_err() {
            warn!("disk scheduler queue closed; request dropped");
        }
    }

    fn worker_loop(disk_manager: Arc<DiskManager>, queue: Receiver<Option<DiskRequest>>) {
        while let Ok(Some(request)) = queue.recv() {
            let ok = if request.is_write {
                let data = request.data.read();
                disk_manager.write_page(request.page_id, &data).is_ok()
            } else {
                let mut data = request.data.write();
                disk_manager.read_page(request.page_id, &mut data).is_ok()
            };
            // The receiver may have given up waiting; that is not an error.
            let _ = request.callback.send(ok);
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // A `None` sentinel terminates the worker loop; join for a clean exit.
        let _ = self.request_queue.send(None);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::PAGE_SIZE;
    use parking_lot::RwLock;
    use std::sync::mpsc::channel;
    use tempfile::NamedTempFile;

    fn new_bytes() -> PageBytesPtr {
        Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE])))
    }

    #[test]
    fn test_schedule_write_then_read() {
        let tmp = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(tmp.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let out = new_bytes();
        out.write()[0..4].copy_from_slice(b"data");

        let (tx, rx) = channel();
        scheduler.schedule(DiskRequest {
            is_write: true,
            data: out,
            page_id: 0,
            callback: tx,
        });
        assert!(rx.recv().unwrap());

        let back = new_bytes();
        let (tx, rx) = channel();
        scheduler.schedule(DiskRequest {
            is_write: false,
            data: back.clone(),
            page_id: 0,
            callback: tx,
        });
        assert!(rx.recv().unwrap());
        assert_eq!(&back.read()[0..4], b"data");
    }

    #[test]
    fn test_requests_complete_in_order() {
        let tmp = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(tmp.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let mut receivers = Vec::new();
        for i in 0..8 {
            let data = new_bytes();
            data.write()[0] = i as u8;
            let (tx, rx) = channel();
            scheduler.schedule(DiskRequest {
                is_write: true,
                data,
                page_id: i,
                callback: tx,
            });
            receivers.push(rx);
        }
        for rx in receivers {
            assert!(rx.recv().unwrap());
        }
    }
}
