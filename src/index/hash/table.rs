// Disk Extendible Hash Table
//
// A three-level persistent hash index: one header page routes by the top
// bits of the hash to a directory page, which routes by the low
// `global_depth` bits to a bucket page. Buckets split (growing the
// directory when needed) until the depth ceiling, and merge back with their
// split image when emptied, shrinking the directory when possible.
//
// Latching: readers couple read latches top-down, releasing each level once
// the next is pinned. Writers hold the directory write latch across a whole
// split or merge sequence because those mutate directory slots.

use std::sync::Arc;

use log::debug;

use crate::common::types::{PageId, INVALID_PAGE_ID};
use crate::index::hash::{HashFn, HashIndexError};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::page::hash::{HashBucketPage, HashDirectoryPage, HashHeaderPage, Storable};
use crate::storage::page::WritePageGuard;

pub struct DiskExtendibleHashTable<K: Storable, V: Storable> {
    bpm: Arc<BufferPoolManager>,
    header_page_id: PageId,
    hash_fn: HashFn<K>,
    directory_max_depth: u32,
    bucket_max_size: u32,
    _marker: std::marker::PhantomData<(K, V)>,
}

impl<K: Storable, V: Storable> DiskExtendibleHashTable<K, V> {
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        hash_fn: HashFn<K>,
        header_max_depth: u32,
        directory_max_depth: u32,
        bucket_max_size: u32,
    ) -> Result<Self, HashIndexError> {
        assert!(bucket_max_size as usize <= HashBucketPage::<K, V>::capacity_limit());

        let guard = bpm.new_page_guarded()?;
        let header_page_id = guard.page_id();
        let mut guard = guard.upgrade_write()?;
        HashHeaderPage::init(header_max_depth).write_to(guard.data_mut());
        drop(guard);

        Ok(Self {
            bpm,
            header_page_id,
            hash_fn,
            directory_max_depth,
            bucket_max_size,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Look up the value stored for `key`.
    pub fn get_value(&self, key: &K) -> Result<Option<V>, HashIndexError> {
        let hash = (self.hash_fn)(key);

        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let header = HashHeaderPage::from_bytes(header_guard.data());
        let directory_page_id = header.directory_page_id(header.hash_to_directory_index(hash));
        drop(header_guard);
        if directory_page_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let directory_guard = self.bpm.fetch_page_read(directory_page_id)?;
        let directory = HashDirectoryPage::from_bytes(directory_guard.data());
        let bucket_page_id = directory.bucket_page_id(directory.hash_to_bucket_index(hash));
        drop(directory_guard);
        if bucket_page_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let bucket_guard = self.bpm.fetch_page_read(bucket_page_id)?;
        let bucket: HashBucketPage<K, V> = HashBucketPage::from_bytes(bucket_guard.data());
        Ok(bucket.lookup(key))
    }

    /// Insert a key/value pair. Returns false when the key is already
    /// present or the table cannot grow any further.
    pub fn insert(&self, key: K, value: V) -> Result<bool, HashIndexError> {
        let hash = (self.hash_fn)(&key);

        let mut header_guard = self.bpm.fetch_page_write(self.header_page_id)?;
        let mut header = HashHeaderPage::from_bytes(header_guard.data());
        let directory_idx = header.hash_to_directory_index(hash);
        let directory_page_id = header.directory_page_id(directory_idx);
        if directory_page_id == INVALID_PAGE_ID {
            return self.insert_to_new_directory(&mut header_guard, &mut header, directory_idx, hash, key, value);
        }
        drop(header_guard);

        let mut directory_guard = self.bpm.fetch_page_write(directory_page_id)?;
        let mut directory = HashDirectoryPage::from_bytes(directory_guard.data());
        let mut bucket_idx = directory.hash_to_bucket_index(hash);
        if directory.bucket_page_id(bucket_idx) == INVALID_PAGE_ID {
            return self.insert_to_new_bucket(&mut directory_guard, &mut directory, bucket_idx, key, value);
        }

        let mut bucket_page_id = directory.bucket_page_id(bucket_idx);
        let mut bucket_guard = self.bpm.fetch_page_write(bucket_page_id)?;
        let mut bucket: HashBucketPage<K, V> = HashBucketPage::from_bytes(bucket_guard.data());

        if bucket.lookup(&key).is_some() {
            return Ok(false);
        }
        if bucket.insert(key.clone(), value.clone()) {
            bucket.write_to(bucket_guard.data_mut());
            return Ok(true);
        }

        // The bucket is full: split until the entry fits or depth runs out.
        loop {
            if directory.local_depth(bucket_idx) == directory.global_depth()
                && directory.global_depth() == directory.max_depth()
            {
                bucket.write_to(bucket_guard.data_mut());
                directory.write_to(directory_guard.data_mut());
                return Ok(false);
            }

            let (new_bucket_page_id, _) = self.bpm.new_page()?;
            self.bpm.unpin_page(new_bucket_page_id, false);

            if directory.local_depth(bucket_idx) == directory.global_depth() {
                directory.incr_global_depth();
                debug!("hash directory grew to global depth {}", directory.global_depth());
            }
            directory.incr_local_depth(bucket_idx);
            let new_local_depth = directory.local_depth(bucket_idx);
            let new_bucket_idx = directory.split_image_index(bucket_idx);
            Self::update_directory_mapping(&mut directory, new_bucket_idx, new_bucket_page_id, new_local_depth);
            Self::update_directory_mapping(&mut directory, bucket_idx, bucket_page_id, new_local_depth);

            let mut new_bucket_guard = self.bpm.fetch_page_write(new_bucket_page_id)?;
            let mut new_bucket: HashBucketPage<K, V> = HashBucketPage::init(self.bucket_max_size);

            // Redistribute by the newly distinguished bit.
            let mask = (1usize << new_local_depth) - 1;
            for (k, v) in bucket.drain_entries() {
                let h = (self.hash_fn)(&k) as usize;
                if (h & mask) == (new_bucket_idx & mask) {
                    new_bucket.insert(k, v);
                } else {
                    bucket.insert(k, v);
                }
            }

            // Keep following the half the pending key hashes into; persist
            // and release the other half.
            if directory.hash_to_bucket_index(hash) == new_bucket_idx {
                bucket.write_to(bucket_guard.data_mut());
                std::mem::swap(&mut bucket, &mut new_bucket);
                std::mem::swap(&mut bucket_guard, &mut new_bucket_guard);
                bucket_idx = new_bucket_idx;
                bucket_page_id = new_bucket_page_id;
            } else {
                new_bucket.write_to(new_bucket_guard.data_mut());
            }
            drop(new_bucket_guard);

            if bucket.insert(key.clone(), value.clone()) {
                bucket.write_to(bucket_guard.data_mut());
                directory.write_to(directory_guard.data_mut());
                return Ok(true);
            }
        }
    }

    /// Remove a key. Empty buckets merge with their split image and the
    /// directory shrinks while it can.
    pub fn remove(&self, key: &K) -> Result<bool, HashIndexError> {
        let hash = (self.hash_fn)(key);

        // The header write latch is held across the merge sequence.
        let header_guard = self.bpm.fetch_page_write(self.header_page_id)?;
        let header = HashHeaderPage::from_bytes(header_guard.data());
        let directory_page_id = header.directory_page_id(header.hash_to_directory_index(hash));
        if directory_page_id == INVALID_PAGE_ID {
            return Ok(false);
        }

        let mut directory_guard = self.bpm.fetch_page_write(directory_page_id)?;
        let mut directory = HashDirectoryPage::from_bytes(directory_guard.data());
        let mut bucket_idx = directory.hash_to_bucket_index(hash);
        if directory.bucket_page_id(bucket_idx) == INVALID_PAGE_ID {
            return Ok(false);
        }

        let mut bucket_page_id = directory.bucket_page_id(bucket_idx);
        let mut bucket_guard = self.bpm.fetch_page_write(bucket_page_id)?;
        let mut bucket: HashBucketPage<K, V> = HashBucketPage::from_bytes(bucket_guard.data());

        if !bucket.remove(key) {
            return Ok(false);
        }
        bucket.write_to(bucket_guard.data_mut());

        while bucket.is_empty() {
            if directory.local_depth(bucket_idx) == 0 {
                break;
            }
            let split_idx = directory.split_image_index(bucket_idx);
            if directory.local_depth(bucket_idx) != directory.local_depth(split_idx) {
                break;
            }

            // Point the merged class at the surviving bucket.
            let survivor_page_id = directory.bucket_page_id(split_idx);
            directory.decr_local_depth(bucket_idx);
            let merged_depth = directory.local_depth(bucket_idx);
            Self::update_directory_mapping(&mut directory, bucket_idx, survivor_page_id, merged_depth);
            while directory.can_shrink() {
                directory.decr_global_depth();
                debug!("hash directory shrank to global depth {}", directory.global_depth());
            }

            bucket_idx = directory.hash_to_bucket_index(hash);
            bucket_page_id = directory.bucket_page_id(bucket_idx);
            drop(bucket_guard);
            bucket_guard = self.bpm.fetch_page_write(bucket_page_id)?;
            bucket = HashBucketPage::from_bytes(bucket_guard.data());

            // The other side of the merged pair may itself be empty now.
            if directory.local_depth(bucket_idx) != 0 {
                let other_idx = directory.split_image_index(bucket_idx);
                let other_page_id = directory.bucket_page_id(other_idx);
                let other_guard = self.bpm.fetch_page_write(other_page_id)?;
                let other: HashBucketPage<K, V> = HashBucketPage::from_bytes(other_guard.data());
                if other.is_empty() {
                    bucket_idx = other_idx;
                    drop(bucket_guard);
                    bucket_guard = other_guard;
                    bucket = other;
                }
            }
        }

        directory.write_to(directory_guard.data_mut());
        Ok(true)
    }

    /// Directory global depth, for tests and debugging.
    pub fn global_depth(&self, directory_slot: usize) -> Result<Option<u32>, HashIndexError> {
        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let header = HashHeaderPage::from_bytes(header_guard.data());
        let directory_page_id = header.directory_page_id(directory_slot);
        drop(header_guard);
        if directory_page_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        let directory_guard = self.bpm.fetch_page_read(directory_page_id)?;
        let directory = HashDirectoryPage::from_bytes(directory_guard.data());
        Ok(Some(directory.global_depth()))
    }

    /// Asserts directory invariants across every allocated directory page.
    pub fn verify_integrity(&self) -> Result<(), HashIndexError> {
        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let header = HashHeaderPage::from_bytes(header_guard.data());
        let directory_ids: Vec<PageId> = (0..header.max_size())
            .map(|i| header.directory_page_id(i))
            .filter(|&id| id != INVALID_PAGE_ID)
            .collect();
        drop(header_guard);

        for id in directory_ids {
            let guard = self.bpm.fetch_page_read(id)?;
            HashDirectoryPage::from_bytes(guard.data()).verify_integrity();
        }
        Ok(())
    }

    fn insert_to_new_directory(
        &self,
        header_guard: &mut WritePageGuard,
        header: &mut HashHeaderPage,
        directory_idx: usize,
        hash: u32,
        key: K,
        value: V,
    ) -> Result<bool, HashIndexError> {
        let (directory_page_id, _) = self.bpm.new_page()?;
        self.bpm.unpin_page(directory_page_id, false);

        header.set_directory_page_id(directory_idx, directory_page_id);
        header.write_to(header_guard.data_mut());

        let mut directory_guard = self.bpm.fetch_page_write(directory_page_id)?;
        let mut directory = HashDirectoryPage::init(self.directory_max_depth);
        let bucket_idx = directory.hash_to_bucket_index(hash);
        self.insert_to_new_bucket(&mut directory_guard, &mut directory, bucket_idx, key, value)
    }

    fn insert_to_new_bucket(
        &self,
        directory_guard: &mut WritePageGuard,
        directory: &mut HashDirectoryPage,
        bucket_idx: usize,
        key: K,
        value: V,
    ) -> Result<bool, HashIndexError> {
        let (bucket_page_id, _) = self.bpm.new_page()?;
        self.bpm.unpin_page(bucket_page_id, false);

        directory.set_bucket_page_id(bucket_idx, bucket_page_id);
        directory.set_local_depth(bucket_idx, 0);
        directory.write_to(directory_guard.data_mut());

        let mut bucket_guard = self.bpm.fetch_page_write(bucket_page_id)?;
        let mut bucket: HashBucketPage<K, V> = HashBucketPage::init(self.bucket_max_size);
        bucket.insert(key, value);
        bucket.write_to(bucket_guard.data_mut());
        Ok(true)
    }

    /// Point every directory slot congruent to `idx` mod `2^local_depth` at
    /// `page_id` with that depth.
    fn update_directory_mapping(
        directory: &mut HashDirectoryPage,
        idx: usize,
        page_id: PageId,
        local_depth: u32,
    ) {
        let step = 1usize << local_depth;
        let mut i = idx & (step - 1);
        while i < directory.size() {
            directory.set_bucket_page_id(i, page_id);
            directory.set_local_depth(i, local_depth);
            i += step;
        }
    }
}
