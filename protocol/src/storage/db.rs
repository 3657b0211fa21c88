//! # SledStore: Persistent Storage Engine
//!
//! The on-disk [`Store`], built on sled's embedded key-value store.
//!
//! ## Key Layout
//!
//! Every collection shares one sled tree, `records`. Keys are the
//! collection name and record id joined by a NUL byte:
//!
//! | Key                         | Value                  |
//! |-----------------------------|------------------------|
//! | `contracts\0ctr_…`          | `bincode(StoredContract)` |
//! | `collateral\0dcent1…`       | `bincode(CollateralBalance)` |
//! | `keys\0dcent1…`             | `bincode(KeyRecord)`   |
//!
//! Names and ids never contain NUL, so a prefix scan over `collection\0`
//! yields exactly that collection, in id order.
//!
//! ## Atomicity
//!
//! Keeping everything in one tree means a [`WriteBatch`] maps onto a single
//! sled `Batch`. A contract write and the collateral moves it implies land
//! on disk together or not at all.

use sled::{Batch, Db, Tree};
use std::path::Path;
use tracing::debug;

use super::store::{Store, StoreError, StoreResult, WriteBatch, WriteOp};

const RECORDS_TREE: &str = "records";
const KEY_SEPARATOR: u8 = 0;

/// Sled-backed [`Store`].
///
/// sled trees are safe to share across threads. `SledStore` is cheap to
/// clone; clones share the same database.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    records: Tree,
}

impl SledStore {
    /// Open or create a database at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database that is removed when dropped. For tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let records = db.open_tree(RECORDS_TREE)?;
        Ok(Self { db, records })
    }

    /// Block until all writes are durable.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Number of records across every collection.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn collection_prefix(collection: &str) -> StoreResult<Vec<u8>> {
    if collection.is_empty() || collection.as_bytes().contains(&KEY_SEPARATOR) {
        return Err(StoreError::UnknownCollection(collection.to_string()));
    }
    let mut prefix = Vec::with_capacity(collection.len() + 1);
    prefix.extend_from_slice(collection.as_bytes());
    prefix.push(KEY_SEPARATOR);
    Ok(prefix)
}

fn record_key(collection: &str, id: &str) -> StoreResult<Vec<u8>> {
    let mut key = collection_prefix(collection)?;
    key.extend_from_slice(id.as_bytes());
    Ok(key)
}

impl Store for SledStore {
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Vec<u8>>> {
        let key = record_key(collection, id)?;
        Ok(self.records.get(key)?.map(|v| v.to_vec()))
    }

    fn get_all(&self, collection: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let prefix = collection_prefix(collection)?;
        self.records
            .scan_prefix(&prefix)
            .map(|entry| -> StoreResult<(String, Vec<u8>)> {
                let (key, value) = entry?;
                let id = String::from_utf8(key[prefix.len()..].to_vec())
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok((id, value.to_vec()))
            })
            .collect()
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let count = batch.len();

        let mut sled_batch = Batch::default();
        for (collection, id, op) in batch.into_ops() {
            let key = record_key(&collection, &id)?;
            match op {
                WriteOp::Put(value) => sled_batch.insert(key, value),
                WriteOp::Delete => sled_batch.remove(key),
            }
        }
        self.records.apply_batch(sled_batch)?;
        self.db.flush()?;

        debug!(writes = count, "committed batch");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
