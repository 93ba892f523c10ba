use byteorder::{ByteOrder, LittleEndian};

use crate::common::config::HASH_PAGE_MAX_DEPTH;
use crate::common::types::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

// Layout:
// - max_depth: u32 (4 bytes)
// - directory_page_ids: u32[2^max_depth]

/// The root page of an extendible hash table. Routes a hash to one of up to
/// `2^max_depth` directory pages by the hash's top `max_depth` bits.
pub struct HashHeaderPage {
    max_depth: u32,
    directory_page_ids: Vec<u32>,
}

impl HashHeaderPage {
    pub fn init(max_depth: u32) -> Self {
        assert!(max_depth <= HASH_PAGE_MAX_DEPTH);
        Self {
            max_depth,
            directory_page_ids: vec![INVALID_PAGE_ID as u32; 1 << max_depth],
        }
    }

    pub fn from_bytes(data: &[u8; PAGE_SIZE]) -> Self {
        let max_depth = LittleEndian::read_u32(&data[0..4]);
        let count = 1usize << max_depth;
        let mut directory_page_ids = Vec::with_capacity(count);
        for i in 0..count {
            let off = 4 + i * 4;
            directory_page_ids.push(LittleEndian::read_u32(&data[off..off + 4]));
        }
        Self {
            max_depth,
            directory_page_ids,
        }
    }

    pub fn write_to(&self, data: &mut [u8; PAGE_SIZE]) {
        LittleEndian::write_u32(&mut data[0..4], self.max_depth);
        for (i, &id) in self.directory_page_ids.iter().enumerate() {
            let off = 4 + i * 4;
            LittleEndian::write_u32(&mut data[off..off + 4], id);
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn max_size(&self) -> usize {
        1 << self.max_depth
    }

    /// Directory slot for a hash: the top `max_depth` bits.
    pub fn hash_to_directory_index(&self, hash: u32) -> usize {
        if self.max_depth == 0 {
            0
        } else {
            (hash >> (32 - self.max_depth)) as usize
        }
    }

    pub fn directory_page_id(&self, idx: usize) -> PageId {
        self.directory_page_ids[idx] as PageId
    }

    pub fn set_directory_page_id(&mut self, idx: usize, page_id: PageId) {
        self.directory_page_ids[idx] = page_id as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let mut page = HashHeaderPage::init(2);
        page.set_directory_page_id(1, 7);
        page.set_directory_page_id(3, 9);

        let mut bytes = Box::new([0u8; PAGE_SIZE]);
        page.write_to(&mut bytes);

        let back = HashHeaderPage::from_bytes(&bytes);
        assert_eq!(back.max_depth(), 2);
        assert_eq!(back.directory_page_id(0), INVALID_PAGE_ID);
        assert_eq!(back.directory_page_id(1), 7);
        assert_eq!(back.directory_page_id(3), 9);
    }

    #[test]
    fn test_hash_routing_uses_top_bits() {
        let page = HashHeaderPage::init(2);
        assert_eq!(page.hash_to_directory_index(0x0000_0000), 0);
        assert_eq!(page.hash_to_directory_index(0x4000_0000), 1);
        assert_eq!(page.hash_to_directory_index(0x8000_0000), 2);
        assert_eq!(page.hash_to_directory_index(0xC000_0000), 3);

        let flat = HashHeaderPage::init(0);
        assert_eq!(flat.hash_to_directory_index(0xFFFF_FFFF), 0);
    }
}
