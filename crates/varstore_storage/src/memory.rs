//! In-memory document store for testing.

use crate::document::{validate_collection, validate_namespace, Document};
use crate::error::{StorageError, StorageResult};
use crate::store::DocumentStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;
use varstore_codec::Value;

type Collection = BTreeMap<String, Document>;
type Namespace = BTreeMap<String, Collection>;

/// An in-memory document store.
///
/// This store keeps everything in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral data that doesn't need persistence
///
/// The store can be switched offline with [`MemoryStore::set_online`] to
/// exercise connection failure paths: while offline, every call fails with
/// [`StorageError::Connection`].
///
/// # Example
///
/// ```rust
/// use varstore_storage::{DocumentStore, MemoryStore, Value};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryStore::new();
/// store.upsert("main", "motd", "motd", Value::from("hi")).await.unwrap();
/// assert_eq!(store.count("main", "motd").await.unwrap(), 1);
///
/// store.set_online(false);
/// assert!(store.count("main", "motd").await.is_err());
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Namespace>>,
    online: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            online: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the simulated connection state.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Returns the simulated connection state.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns the total number of documents across all namespaces.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.data
            .read()
            .values()
            .flat_map(|ns| ns.values())
            .map(BTreeMap::len)
            .sum()
    }

    fn check_online(&self) -> StorageResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(StorageError::Connection("memory store is offline".into()))
        }
    }

    fn check(&self, namespace: &str, collection: &str) -> StorageResult<()> {
        self.check_online()?;
        validate_namespace(namespace)?;
        validate_collection(collection)
    }

    fn read_collection<T>(
        &self,
        namespace: &str,
        collection: &str,
        f: impl FnOnce(Option<&Collection>) -> T,
    ) -> StorageResult<T> {
        self.check(namespace, collection)?;
        let data = self.data.read();
        Ok(f(data.get(namespace).and_then(|ns| ns.get(collection))))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        namespace: &str,
        collection: &str,
        key: &str,
    ) -> StorageResult<Option<Document>> {
        self.read_collection(namespace, collection, |coll| {
            coll.and_then(|c| c.get(key)).cloned()
        })
    }

    async fn upsert(
        &self,
        namespace: &str,
        collection: &str,
        key: &str,
        value: Value,
    ) -> StorageResult<Document> {
        self.check(namespace, collection)?;
        let mut data = self.data.write();
        let coll = data
            .entry(namespace.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();

        let doc = match coll.get_mut(key) {
            Some(existing) => {
                existing.value = value;
                existing.clone()
            }
            None => {
                let doc = Document::new(key, value);
                coll.insert(key.to_string(), doc.clone());
                doc
            }
        };
        Ok(doc)
    }

    async fn delete(&self, namespace: &str, collection: &str, key: &str) -> StorageResult<bool> {
        self.check(namespace, collection)?;
        let mut data = self.data.write();
        Ok(data
            .get_mut(namespace)
            .and_then(|ns| ns.get_mut(collection))
            .is_some_and(|coll| coll.remove(key).is_some()))
    }

    async fn delete_ids(
        &self,
        namespace: &str,
        collection: &str,
        ids: &[Uuid],
    ) -> StorageResult<u64> {
        self.check(namespace, collection)?;
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let mut data = self.data.write();
        let Some(coll) = data.get_mut(namespace).and_then(|ns| ns.get_mut(collection)) else {
            return Ok(0);
        };

        let before = coll.len();
        coll.retain(|_, doc| !wanted.contains(&doc.id));
        Ok((before - coll.len()) as u64)
    }

    async fn scan(&self, namespace: &str, collection: &str) -> StorageResult<Vec<Document>> {
        self.read_collection(namespace, collection, |coll| {
            coll.map(|c| c.values().cloned().collect()).unwrap_or_default()
        })
    }

    async fn first(&self, namespace: &str, collection: &str) -> StorageResult<Option<Document>> {
        self.read_collection(namespace, collection, |coll| {
            coll.and_then(|c| c.values().next()).cloned()
        })
    }

    async fn count(&self, namespace: &str, collection: &str) -> StorageResult<u64> {
        self.read_collection(namespace, collection, |coll| {
            coll.map_or(0, |c| c.len() as u64)
        })
    }

    async fn list_namespaces(&self) -> StorageResult<Vec<String>> {
        self.check_online()?;
        Ok(self.data.read().keys().cloned().collect())
    }

    async fn list_collections(&self, namespace: &str) -> StorageResult<Vec<String>> {
        self.check_online()?;
        validate_namespace(namespace)?;
        Ok(self
            .data
            .read()
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn drop_collection(&self, namespace: &str, collection: &str) -> StorageResult<bool> {
        self.check(namespace, collection)?;
        let mut data = self.data.write();
        Ok(data
            .get_mut(namespace)
            .is_some_and(|ns| ns.remove(collection).is_some()))
    }

    async fn drop_namespace(&self, namespace: &str) -> StorageResult<bool> {
        self.check_online()?;
        validate_namespace(namespace)?;
        Ok(self.data.write().remove(namespace).is_some())
    }

    async fn ping(&self) -> StorageResult<()> {
        self.check_online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_upsert_and_find() {
        let store = MemoryStore::new();
        store
            .upsert("main", "coins", "coins_1", Value::Integer(10))
            .await
            .unwrap();

        let doc = store.find("main", "coins", "coins_1").await.unwrap().unwrap();
        assert_eq!(doc.key, "coins_1");
        assert_eq!(doc.value, Value::Integer(10));
    }

    #[tokio::test]
    async fn memory_find_missing() {
        let store = MemoryStore::new();
        assert!(store.find("main", "coins", "x").await.unwrap().is_none());
        assert_eq!(store.count("nope", "nope").await.unwrap(), 0);
        assert!(store.scan("nope", "nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_upsert_keeps_identity() {
        let store = MemoryStore::new();
        let first = store.upsert("main", "c", "k", Value::Integer(1)).await.unwrap();
        let second = store.upsert("main", "c", "k", Value::Integer(2)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.count("main", "c").await.unwrap(), 1);
        assert_eq!(
            store.find("main", "c", "k").await.unwrap().unwrap().value,
            Value::Integer(2)
        );
    }

    #[tokio::test]
    async fn memory_delete() {
        let store = MemoryStore::new();
        store.upsert("main", "c", "k", Value::Null).await.unwrap();
        assert!(store.delete("main", "c", "k").await.unwrap());
        assert!(!store.delete("main", "c", "k").await.unwrap());
        // Empty collections survive until dropped.
        assert_eq!(store.list_collections("main").await.unwrap(), vec!["c"]);
    }

    #[tokio::test]
    async fn memory_delete_ids() {
        let store = MemoryStore::new();
        let a = store.upsert("ns", "c", "a", Value::Integer(1)).await.unwrap();
        store.upsert("ns", "c", "b", Value::Integer(2)).await.unwrap();
        let c = store.upsert("ns", "c", "c", Value::Integer(3)).await.unwrap();

        let removed = store
            .delete_ids("ns", "c", &[a.id, c.id, Uuid::new_v4()])
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let keys: Vec<_> = store
            .scan("ns", "c")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.key)
            .collect();
        assert_eq!(keys, vec!["b"]);
    }

    #[tokio::test]
    async fn memory_listing_is_sorted() {
        let store = MemoryStore::new();
        store.upsert("b", "z", "k", Value::Null).await.unwrap();
        store.upsert("b", "a", "k", Value::Null).await.unwrap();
        store.upsert("a", "m", "k", Value::Null).await.unwrap();

        assert_eq!(store.list_namespaces().await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.list_collections("b").await.unwrap(), vec!["a", "z"]);
        assert!(store.list_collections("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_first_returns_a_document() {
        let store = MemoryStore::new();
        assert!(store.first("ns", "board").await.unwrap().is_none());
        store.upsert("ns", "board", "only", Value::from("x")).await.unwrap();
        assert_eq!(
            store.first("ns", "board").await.unwrap().unwrap().value,
            Value::from("x")
        );
    }

    #[tokio::test]
    async fn memory_drop() {
        let store = MemoryStore::new();
        store.upsert("ns", "a", "k", Value::Null).await.unwrap();
        store.upsert("ns", "b", "k", Value::Null).await.unwrap();

        assert!(store.drop_collection("ns", "a").await.unwrap());
        assert!(!store.drop_collection("ns", "a").await.unwrap());
        assert_eq!(store.list_collections("ns").await.unwrap(), vec!["b"]);

        assert!(store.drop_namespace("ns").await.unwrap());
        assert!(!store.drop_namespace("ns").await.unwrap());
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn memory_offline_fails_every_call() {
        let store = MemoryStore::new();
        store.upsert("ns", "c", "k", Value::Null).await.unwrap();
        store.set_online(false);

        assert!(matches!(
            store.find("ns", "c", "k").await,
            Err(StorageError::Connection(_))
        ));
        assert!(store.upsert("ns", "c", "k", Value::Null).await.is_err());
        assert!(store.list_namespaces().await.is_err());
        assert!(store.ping().await.is_err());

        store.set_online(true);
        assert!(store.ping().await.is_ok());
        assert!(store.find("ns", "c", "k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn memory_rejects_invalid_names() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.upsert("", "c", "k", Value::Null).await,
            Err(StorageError::InvalidName(_))
        ));
        assert!(store.upsert("ns", "a$b", "k", Value::Null).await.is_err());
    }
}
