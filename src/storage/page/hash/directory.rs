use byteorder::{ByteOrder, LittleEndian};

use crate::common::config::HASH_PAGE_MAX_DEPTH;
use crate::common::types::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

// Layout:
// - max_depth: u32 (4 bytes)
// - global_depth: u32 (4 bytes)
// - local_depths: u8[2^max_depth]
// - bucket_page_ids: u32[2^max_depth]

/// A directory page of an extendible hash table. The low `global_depth`
/// bits of a hash select a slot; each slot points at a bucket page whose
/// `local_depth` says how many of those bits the bucket actually
/// distinguishes.
pub struct HashDirectoryPage {
    max_depth: u32,
    global_depth: u32,
    local_depths: Vec<u8>,
    bucket_page_ids: Vec<u32>,
}

impl HashDirectoryPage {
    pub fn init(max_depth: u32) -> Self {
        assert!(max_depth <= HASH_PAGE_MAX_DEPTH);
        let count = 1usize << max_depth;
        Self {
            max_depth,
            global_depth: 0,
            local_depths: vec![0; count],
            bucket_page_ids: vec![INVALID_PAGE_ID as u32; count],
        }
    }

    pub fn from_bytes(data: &[u8; PAGE_SIZE]) -> Self {
        let max_depth = LittleEndian::read_u32(&data[0..4]);
        let global_depth = LittleEndian::read_u32(&data[4..8]);
        let count = 1usize << max_depth;
        let local_depths = data[8..8 + count].to_vec();
        let ids_base = 8 + count;
        let mut bucket_page_ids = Vec::with_capacity(count);
        for i in 0..count {
            let off = ids_base + i * 4;
            bucket_page_ids.push(LittleEndian::read_u32(&data[off..off + 4]));
        }
        Self {
            max_depth,
            global_depth,
            local_depths,
            bucket_page_ids,
        }
    }

    pub fn write_to(&self, data: &mut [u8; PAGE_SIZE]) {
        LittleEndian::write_u32(&mut data[0..4], self.max_depth);
        LittleEndian::write_u32(&mut data[4..8], self.global_depth);
        let count = self.local_depths.len();
        data[8..8 + count].copy_from_slice(&self.local_depths);
        let ids_base = 8 + count;
        for (i, &id) in self.bucket_page_ids.iter().enumerate() {
            let off = ids_base + i * 4;
            LittleEndian::write_u32(&mut data[off..off + 4], id);
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn global_depth(&self) -> u32 {
        self.global_depth
    }

    /// Number of live directory slots.
    pub fn size(&self) -> usize {
        1 << self.global_depth
    }

    /// Bucket slot for a hash: the low `global_depth` bits.
    pub fn hash_to_bucket_index(&self, hash: u32) -> usize {
        (hash as usize) & (self.size() - 1)
    }

    pub fn bucket_page_id(&self, idx: usize) -> PageId {
        self.bucket_page_ids[idx] as PageId
    }

    pub fn set_bucket_page_id(&mut self, idx: usize, page_id: PageId) {
        self.bucket_page_ids[idx] = page_id as u32;
    }

    pub fn local_depth(&self, idx: usize) -> u32 {
        self.local_depths[idx] as u32
    }

    pub fn set_local_depth(&mut self, idx: usize, depth: u32) {
        self.local_depths[idx] = depth as u8;
    }

    pub fn incr_local_depth(&mut self, idx: usize) {
        self.local_depths[idx] += 1;
    }

    pub fn decr_local_depth(&mut self, idx: usize) {
        self.local_depths[idx] -= 1;
    }

    /// Index of the bucket this slot's bucket was split from / merges with:
    /// the slot differing in the top distinguished bit.
    pub fn split_image_index(&self, idx: usize) -> usize {
        debug_assert!(self.local_depths[idx] > 0);
        idx ^ (1 << (self.local_depths[idx] - 1))
    }

    /// Double the directory, copying the low half's mappings into the high
    /// half.
    pub fn incr_global_depth(&mut self) {
        assert!(self.global_depth < self.max_depth);
        let half = self.size();
        for i in 0..half {
            self.local_depths[half + i] = self.local_depths[i];
            self.bucket_page_ids[half + i] = self.bucket_page_ids[i];
        }
        self.global_depth += 1;
    }

    /// Halve the directory, clearing the slots that fall off.
    pub fn decr_global_depth(&mut self) {
        assert!(self.global_depth > 0);
        self.global_depth -= 1;
        let half = self.size();
        for i in 0..half {
            self.local_depths[half + i] = 0;
            self.bucket_page_ids[half + i] = INVALID_PAGE_ID as u32;
        }
    }

    /// The directory can shrink iff no live slot distinguishes all
    /// `global_depth` bits.
    pub fn can_shrink(&self) -> bool {
        if self.global_depth == 0 {
            return false;
        }
        (0..self.size()).all(|i| self.local_depths[i] as u32 != self.global_depth)
    }

    /// Asserts the directory invariants: every slot's bucket is shared by
    /// exactly the slots agreeing on its low `local_depth` bits, and no
    /// local depth exceeds the global depth.
    pub fn verify_integrity(&self) {
        for i in 0..self.size() {
            let ld = self.local_depths[i] as u32;
            assert!(ld <= self.global_depth, "local depth above global at {}", i);
            let mask = (1usize << ld) - 1;
            for j in 0..self.size() {
                if j & mask == i & mask {
                    assert_eq!(
                        self.bucket_page_ids[j], self.bucket_page_ids[i],
                        "slots {} and {} disagree on bucket",
                        i, j
                    );
                    assert_eq!(
                        self.local_depths[j], self.local_depths[i],
                        "slots {} and {} disagree on local depth",
                        i, j
                    );
                }
            }
        }
    }
}
