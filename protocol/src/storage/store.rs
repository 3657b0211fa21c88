//! # Store Abstraction
//!
//! The contract core talks to persistence only through [`Store`]: a flat
//! key-value space partitioned into named collections. Values are opaque
//! bytes; [`RecordExt`] layers bincode (de)serialization on top so callers
//! work with typed records.
//!
//! ## Write batches
//!
//! Contract operations touch more than one record. Creating a contract
//! debits a balance *and* writes the contract; activating one credits
//! recipients *and* rewrites the contract. Callers stage those writes in a
//! [`WriteBatch`] and hand it to [`Store::commit`] in one call. Reads made
//! through [`RecordExt::get_record_through`] see staged writes first, so
//! several credits to the same peer inside one batch accumulate correctly.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// WriteBatch
// ---------------------------------------------------------------------------

/// A single staged mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Put(Vec<u8>),
    Delete,
}

/// An ordered set of staged writes keyed by `(collection, id)`.
///
/// Staging the same key twice keeps only the last write.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: BTreeMap<(String, String), WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage raw bytes under `(collection, id)`.
    pub fn put(&mut self, collection: &str, id: &str, value: Vec<u8>) {
        self.ops
            .insert((collection.to_string(), id.to_string()), WriteOp::Put(value));
    }

    /// Stage a deletion.
    pub fn delete(&mut self, collection: &str, id: &str) {
        self.ops
            .insert((collection.to_string(), id.to_string()), WriteOp::Delete);
    }

    /// Serialize and stage a record.
    pub fn put_record<T: Serialize>(
        &mut self,
        collection: &str,
        id: &str,
        record: &T,
    ) -> StoreResult<()> {
        self.put(collection, id, encode(record)?);
        Ok(())
    }

    /// The staged write for a key, if any.
    ///
    /// `Some(None)` means "staged for deletion", which a read-through must
    /// treat as absent rather than falling back to the store.
    pub fn staged(&self, collection: &str, id: &str) -> Option<Option<&[u8]>> {
        self.ops
            .get(&(collection.to_string(), id.to_string()))
            .map(|op| match op {
                WriteOp::Put(bytes) => Some(bytes.as_slice()),
                WriteOp::Delete => None,
            })
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Consume the batch, yielding `(collection, id, op)` in key order.
    pub fn into_ops(self) -> impl Iterator<Item = (String, String, WriteOp)> {
        self.ops.into_iter().map(|((c, id), op)| (c, id, op))
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Durable key-value persistence, partitioned by collection.
///
/// Implementations must apply a single `commit` without interleaving writes
/// from another `commit` to the same key. The contract core does no locking
/// of its own.
pub trait Store: Send + Sync {
    /// Fetch a value. Missing keys are `Ok(None)`.
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Vec<u8>>>;

    /// All `(id, value)` pairs in a collection, ordered by id.
    fn get_all(&self, collection: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Apply every staged write in the batch.
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    fn put(&self, collection: &str, id: &str, value: Vec<u8>) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(collection, id, value);
        self.commit(batch)
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(collection, id);
        self.commit(batch)
    }
}

// ---------------------------------------------------------------------------
// Typed access
// ---------------------------------------------------------------------------

pub(crate) fn encode<T: Serialize>(record: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Typed helpers over any [`Store`], including `dyn Store`.
pub trait RecordExt: Store {
    fn get_record<T: DeserializeOwned>(&self, collection: &str, id: &str) -> StoreResult<Option<T>> {
        self.get(collection, id)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Read a record, preferring anything already staged in `batch`.
    fn get_record_through<T: DeserializeOwned>(
        &self,
        batch: &WriteBatch,
        collection: &str,
        id: &str,
    ) -> StoreResult<Option<T>> {
        match batch.staged(collection, id) {
            Some(Some(bytes)) => decode(bytes).map(Some),
            Some(None) => Ok(None),
            None => self.get_record(collection, id),
        }
    }

    fn put_record<T: Serialize>(&self, collection: &str, id: &str, record: &T) -> StoreResult<()> {
        self.put(collection, id, encode(record)?)
    }

    fn all_records<T: DeserializeOwned>(&self, collection: &str) -> StoreResult<Vec<T>> {
        self.get_all(collection)?
            .iter()
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }
}

impl<S: Store + ?Sized> RecordExt for S {}
