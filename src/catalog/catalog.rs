// Catalog
//
// Registry of tables and indexes. Tables pair a schema with a table heap;
// indexes wrap the on-disk extendible hash table keyed by a single integer
// column, mapping key values to RIDs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::catalog::schema::SchemaRef;
use crate::catalog::value::Value;
use crate::common::config::{
    DEFAULT_HASH_BUCKET_MAX_SIZE, DEFAULT_HASH_DIRECTORY_MAX_DEPTH, DEFAULT_HASH_HEADER_MAX_DEPTH,
};
use crate::common::types::{IndexOid, Rid, TableOid};
use crate::index::hash::{default_hash, DiskExtendibleHashTable, HashIndexError};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::table::{TableHeap, Tuple};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Column {0} not found")]
    ColumnNotFound(String),

    #[error("Hash index error: {0}")]
    Index(#[from] HashIndexError),
}

/// A registered table: schema plus its heap.
pub struct TableInfo {
    pub oid: TableOid,
    pub name: String,
    pub schema: SchemaRef,
    pub table: Arc<TableHeap>,
}

/// A registered single-column hash index over a table.
pub struct IndexInfo {
    pub oid: IndexOid,
    pub name: String,
    pub table_name: String,
    /// Offset of the indexed column in the table schema.
    pub key_column: usize,
    index: DiskExtendibleHashTable<i64, Rid>,
}

impl IndexInfo {
    /// Extract the index key from a tuple. Only integer keys are indexed;
    /// NULLs and other types yield no key.
    pub fn key_from_tuple(&self, tuple: &Tuple) -> Option<i64> {
        match tuple.value(self.key_column) {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Equality probe: RIDs holding `key` (at most one in this core).
    pub fn scan_key(&self, key: i64) -> Result<Vec<Rid>, HashIndexError> {
        Ok(self.index.get_value(&key)?.into_iter().collect())
    }

    /// Returns false when the key is already present.
    pub fn insert_entry(&self, key: i64, rid: Rid) -> Result<bool, HashIndexError> {
        self.index.insert(key, rid)
    }

    pub fn delete_entry(&self, key: i64) -> Result<bool, HashIndexError> {
        self.index.remove(&key)
    }
}

pub struct Catalog {
    bpm: Arc<BufferPoolManager>,
    tables: RwLock<HashMap<TableOid, Arc<TableInfo>>>,
    table_names: RwLock<HashMap<String, TableOid>>,
    indexes: RwLock<HashMap<IndexOid, Arc<IndexInfo>>>,
    table_indexes: RwLock<HashMap<String, Vec<IndexOid>>>,
    next_oid: AtomicU32,
}

impl Catalog {
    pub fn new(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            tables: RwLock::new(HashMap::new()),
            table_names: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            table_indexes: RwLock::new(HashMap::new()),
            next_oid: AtomicU32::new(0),
        }
    }

    pub fn create_table(&self, name: impl Into<String>, schema: SchemaRef) -> Result<Arc<TableInfo>, CatalogError> {
        let name = name.into();
        let mut names = self.table_names.write();
        if names.contains_key(&name) {
            return Err(CatalogError::TableExists(name));
        }
        let oid = self.next_oid.fetch_add(1, Ordering::SeqCst);
        let info = Arc::new(TableInfo {
            oid,
            name: name.clone(),
            schema,
            table: Arc::new(TableHeap::new()),
        });
        names.insert(name.clone(), oid);
        self.tables.write().insert(oid, Arc::clone(&info));
        self.table_indexes.write().entry(name).or_default();
        Ok(info)
    }

    /// Create a hash index on a single column of an existing table.
    pub fn create_index(
        &self,
        index_name: impl Into<String>,
        table_name: &str,
        key_column_name: &str,
    ) -> Result<Arc<IndexInfo>, CatalogError> {
        let table = self.get_table_by_name(table_name)?;
        let key_column = table
            .schema
            .index_of(key_column_name)
            .ok_or_else(|| CatalogError::ColumnNotFound(key_column_name.to_string()))?;

        let index = DiskExtendibleHashTable::new(
            Arc::clone(&self.bpm),
            default_hash::<i64>,
            DEFAULT_HASH_HEADER_MAX_DEPTH,
            DEFAULT_HASH_DIRECTORY_MAX_DEPTH,
            DEFAULT_HASH_BUCKET_MAX_SIZE,
        )?;

        let oid = self.next_oid.fetch_add(1, Ordering::SeqCst);
        let info = Arc::new(IndexInfo {
            oid,
            name: index_name.into(),
            table_name: table_name.to_string(),
            key_column,
            index,
        });
        self.indexes.write().insert(oid, Arc::clone(&info));
        self.table_indexes
            .write()
            .entry(table_name.to_string())
            .or_default()
            .push(oid);
        Ok(info)
    }

    pub fn get_table(&self, oid: TableOid) -> Result<Arc<TableInfo>, CatalogError> {
        self.tables
            .read()
            .get(&oid)
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(format!("#{}", oid)))
    }

    pub fn get_table_by_name(&self, name: &str) -> Result<Arc<TableInfo>, CatalogError> {
        let oid = *self
            .table_names
            .read()
            .get(name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))?;
        self.get_table(oid)
    }

    pub fn get_index(&self, oid: IndexOid) -> Option<Arc<IndexInfo>> {
        self.indexes.read().get(&oid).cloned()
    }

    /// All indexes over a table.
    pub fn table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        let oids = self
            .table_indexes
            .read()
            .get(table_name)
            .cloned()
            .unwrap_or_default();
        let indexes = self.indexes.read();
        oids.iter().filter_map(|oid| indexes.get(oid).cloned()).collect()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.table_names.read().keys().cloned().collect()
    }
}
