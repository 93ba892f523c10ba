use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::PAGE_SIZE;
use crate::storage::page::hash::Storable;

// Layout:
// - size: u32 (4 bytes)
// - max_size: u32 (4 bytes)
// - entries: (K, V)[max_size], each K::SIZE + V::SIZE bytes

const BUCKET_HEADER_SIZE: usize = 8;

/// A leaf page of the extendible hash table holding up to `max_size`
/// fixed-width key/value entries. Keys are unique within a bucket.
pub struct HashBucketPage<K: Storable, V: Storable> {
    max_size: u32,
    entries: Vec<(K, V)>,
}

impl<K: Storable, V: Storable> HashBucketPage<K, V> {
    /// Largest entry count a page can hold for these key/value widths.
    pub fn capacity_limit() -> usize {
        (PAGE_SIZE - BUCKET_HEADER_SIZE) / (K::SIZE + V::SIZE)
    }

    pub fn init(max_size: u32) -> Self {
        assert!(max_size as usize <= Self::capacity_limit());
        Self {
            max_size,
            entries: Vec::new(),
        }
    }

    pub fn from_bytes(data: &[u8; PAGE_SIZE]) -> Self {
        let size = LittleEndian::read_u32(&data[0..4]) as usize;
        let max_size = LittleEndian::read_u32(&data[4..8]);
        let stride = K::SIZE + V::SIZE;
        let mut entries = Vec::with_capacity(size);
        for i in 0..size {
            let off = BUCKET_HEADER_SIZE + i * stride;
            let key = K::decode(&data[off..off + K::SIZE]);
            let value = V::decode(&data[off + K::SIZE..off + stride]);
            entries.push((key, value));
        }
        Self { max_size, entries }
    }

    pub fn write_to(&self, data: &mut [u8; PAGE_SIZE]) {
        LittleEndian::write_u32(&mut data[0..4], self.entries.len() as u32);
        LittleEndian::write_u32(&mut data[4..8], self.max_size);
        let stride = K::SIZE + V::SIZE;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            let off = BUCKET_HEADER_SIZE + i * stride;
            key.encode(&mut data[off..off + K::SIZE]);
            value.encode(&mut data[off + K::SIZE..off + stride]);
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_size as usize
    }

    pub fn lookup(&self, key: &K) -> Option<V> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Insert an entry. Returns false when the bucket is full or already
    /// holds the key.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        if self.is_full() || self.lookup(&key).is_some() {
            return false;
        }
        self.entries.push((key, value));
        true
    }

    /// Remove the entry for `key`, returning whether it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.entries.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Take all entries out, leaving the bucket empty. Used when splitting.
    pub fn drain_entries(&mut self) -> Vec<(K, V)> {
        std::mem::take(&mut self.entries)
    }
}
