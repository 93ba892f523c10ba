// LRU-K Replacement Policy
//
// Frames with fewer than K recorded accesses live in the history list and
// are evicted first, in classic LRU order; frames with at least K accesses
// live in the buffer list. This approximates backward K-distance: everything
// still in history has distance +inf and loses to anything in buffer.
//
// Both lists are recency-ordered maps (front = least recent) so moving,
// removing, and victim scans are cheap. The replacer carries no lock of its
// own; the buffer pool serializes access under its pool-wide mutex.

use linked_hash_map::LinkedHashMap;

use crate::common::types::FrameId;
use crate::storage::buffer::BufferPoolError;

/// How a frame access came about. Recorded for parity with the original API;
/// the policy currently treats all access types alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    #[default]
    Unknown,
    Lookup,
    Scan,
    Index,
}

#[derive(Debug)]
struct LruKNode {
    access_count: usize,
    evictable: bool,
}

pub struct LruKReplacer {
    k: usize,
    num_frames: usize,
    /// Frames seen fewer than K times; front is the LRU end.
    history: LinkedHashMap<FrameId, LruKNode>,
    /// Frames seen at least K times; front is the LRU end.
    buffer: LinkedHashMap<FrameId, LruKNode>,
    history_evictable: usize,
    buffer_evictable: usize,
}

impl LruKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k >= 1, "LRU-K requires k >= 1");
        Self {
            k,
            num_frames,
            history: LinkedHashMap::new(),
            buffer: LinkedHashMap::new(),
            history_evictable: 0,
            buffer_evictable: 0,
        }
    }

    /// Record an access to `frame_id`, promoting it to the buffer list once
    /// it has been seen K times.
    pub fn record_access(
        &mut self,
        frame_id: FrameId,
        _access_type: AccessType,
    ) -> Result<(), BufferPoolError> {
        if frame_id >= self.num_frames {
            return Err(BufferPoolError::InvalidFrame(frame_id));
        }

        if let Some(node) = self.history.get_refresh(&frame_id) {
            node.access_count += 1;
            if node.access_count >= self.k {
                let node = self.history.remove(&frame_id).unwrap();
                if node.evictable {
                    self.history_evictable -= 1;
                    self.buffer_evictable += 1;
                }
                self.buffer.insert(frame_id, node);
            }
        } else if self.buffer.get_refresh(&frame_id).is_some() {
            // Already moved to the most-recent end by get_refresh.
        } else {
            self.history.insert(
                frame_id,
                LruKNode {
                    access_count: 1,
                    evictable: false,
                },
            );
        }
        Ok(())
    }

    /// Toggle a frame's evictable flag, adjusting the evictable tally.
    /// Untracked frames are ignored.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) -> Result<(), BufferPoolError> {
        if frame_id >= self.num_frames {
            return Err(BufferPoolError::InvalidFrame(frame_id));
        }

        if let Some(node) = self.history.get_mut(&frame_id) {
            if node.evictable != evictable {
                node.evictable = evictable;
                if evictable {
                    self.history_evictable += 1;
                } else {
                    self.history_evictable -= 1;
                }
            }
        } else if let Some(node) = self.buffer.get_mut(&frame_id) {
            if node.evictable != evictable {
                node.evictable = evictable;
                if evictable {
                    self.buffer_evictable += 1;
                } else {
                    self.buffer_evictable -= 1;
                }
            }
        }
        Ok(())
    }

    /// Pick a victim frame and drop its access history. History-list frames
    /// (backward K-distance +inf) are preferred over buffer-list frames;
    /// within a list the least recently used evictable frame wins.
    pub fn evict(&mut self) -> Option<FrameId> {
        if self.history_evictable > 0 {
            let victim = Self::scan_lru(&self.history)?;
            self.history.remove(&victim);
            self.history_evictable -= 1;
            Some(victim)
        } else if self.buffer_evictable > 0 {
            let victim = Self::scan_lru(&self.buffer)?;
            self.buffer.remove(&victim);
            self.buffer_evictable -= 1;
            Some(victim)
        } else {
            None
        }
    }

    /// Remove a specific frame from tracking regardless of its recency.
    /// The frame must be evictable; removing an untracked frame is a no-op.
    pub fn remove(&mut self, frame_id: FrameId) -> Result<(), BufferPoolError> {
        if let Some(node) = self.history.get(&frame_id) {
            if !node.evictable {
                return Err(BufferPoolError::NotEvictable(frame_id));
            }
            self.history.remove(&frame_id);
            self.history_evictable -= 1;
        } else if let Some(node) = self.buffer.get(&frame_id) {
            if !node.evictable {
                return Err(BufferPoolError::NotEvictable(frame_id));
            }
            self.buffer.remove(&frame_id);
            self.buffer_evictable -= 1;
        }
        Ok(())
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.history_evictable + self.buffer_evictable
    }

    fn scan_lru(list: &LinkedHashMap<FrameId, LruKNode>) -> Option<FrameId> {
        for (frame_id, node) in list.iter() {
            if node.evictable {
                return Some(*frame_id);
            }
        }
        None
    }
}
