//! In-memory [`Store`] for tests and throwaway sessions.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use super::store::{Store, StoreResult, WriteBatch, WriteOp};

type Collection = BTreeMap<String, Vec<u8>>;

/// A `Store` held entirely in memory. Nothing survives a drop.
///
/// Each `commit` applies under a single write lock, so readers never see a
/// half-applied batch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    fn get_all(&self, collection: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut collections = self.collections.write();
        for (collection, id, op) in batch.into_ops() {
            let entries = collections.entry(collection).or_default();
            match op {
                WriteOp::Put(value) => {
                    entries.insert(id, value);
                }
                WriteOp::Delete => {
                    entries.remove(&id);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RecordExt;

    #[test]
    fn put_get_delete() {
        let store = MemoryStore::new();
        store.put("c", "a", vec![1, 2, 3]).unwrap();
        assert_eq!(store.get("c", "a").unwrap(), Some(vec![1, 2, 3]));

        store.delete("c", "a").unwrap();
        assert_eq!(store.get("c", "a").unwrap(), None);
    }

    #[test]
    fn missing_collection_reads_empty() {
        let store = MemoryStore::new();
        assert!(store.get("nope", "x").unwrap().is_none());
        assert!(store.get_all("nope").unwrap().is_empty());
    }

    #[test]
    fn get_all_is_ordered_by_id() {
        let store = MemoryStore::new();
        store.put("c", "b", vec![2]).unwrap();
        store.put("c", "a", vec![1]).unwrap();
        let ids: Vec<_> = store.get_all("c").unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn batch_spans_collections() {
        let store = MemoryStore::new();
        store.put_record("x", "gone", &1u64).unwrap();

        let mut batch = WriteBatch::new();
        batch.put_record("x", "k", &7u64).unwrap();
        batch.put_record("y", "k", &"seven".to_string()).unwrap();
        batch.delete("x", "gone");
        store.commit(batch).unwrap();

        assert_eq!(store.get_record::<u64>("x", "k").unwrap(), Some(7));
        assert_eq!(
            store.get_record::<String>("y", "k").unwrap().as_deref(),
            Some("seven")
        );
        assert!(store.get("x", "gone").unwrap().is_none());
    }

    #[test]
    fn read_through_prefers_staged_values() {
        let store = MemoryStore::new();
        store.put_record("c", "k", &1u64).unwrap();

        let mut batch = WriteBatch::new();
        assert_eq!(store.get_record_through::<u64>(&batch, "c", "k").unwrap(), Some(1));

        batch.put_record("c", "k", &2u64).unwrap();
        assert_eq!(store.get_record_through::<u64>(&batch, "c", "k").unwrap(), Some(2));
        // Not committed yet.
        assert_eq!(store.get_record::<u64>("c", "k").unwrap(), Some(1));
    }
}
