//! Document store trait definition.

use crate::document::Document;
use crate::error::StorageResult;
use async_trait::async_trait;
use uuid::Uuid;
use varstore_codec::Value;

/// An asynchronous document store.
///
/// The store is organised as namespaces containing collections containing
/// documents. Namespaces and collections spring into existence on the
/// first write and are only removed by an explicit drop.
///
/// # Invariants
///
/// - Within one collection, `key` is unique (`upsert` replaces)
/// - `upsert` keeps the `id` of an existing document
/// - Listing methods return names in a stable, sorted order
/// - Reads of missing namespaces or collections behave as empty
/// - An unreachable store fails every call with a connectivity error
///
/// # Implementors
///
/// - [`super::MemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Looks up a document by key.
    async fn find(
        &self,
        namespace: &str,
        collection: &str,
        key: &str,
    ) -> StorageResult<Option<Document>>;

    /// Inserts a document or replaces the value of the existing one.
    ///
    /// Returns the stored document.
    async fn upsert(
        &self,
        namespace: &str,
        collection: &str,
        key: &str,
        value: Value,
    ) -> StorageResult<Document>;

    /// Deletes a document by key.
    ///
    /// Returns `true` if the document existed.
    async fn delete(&self, namespace: &str, collection: &str, key: &str) -> StorageResult<bool>;

    /// Deletes every document whose id is in `ids`.
    ///
    /// Returns the number of documents removed. Unknown ids are ignored.
    async fn delete_ids(&self, namespace: &str, collection: &str, ids: &[Uuid])
        -> StorageResult<u64>;

    /// Returns every document of a collection in key order.
    async fn scan(&self, namespace: &str, collection: &str) -> StorageResult<Vec<Document>>;

    /// Returns one document of a collection, if any.
    ///
    /// No ordering guarantee is made.
    async fn first(&self, namespace: &str, collection: &str) -> StorageResult<Option<Document>>;

    /// Counts the documents of a collection.
    async fn count(&self, namespace: &str, collection: &str) -> StorageResult<u64>;

    /// Lists all namespaces.
    async fn list_namespaces(&self) -> StorageResult<Vec<String>>;

    /// Lists the collections of a namespace.
    async fn list_collections(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// Drops a collection and all of its documents.
    ///
    /// Returns `true` if the collection existed.
    async fn drop_collection(&self, namespace: &str, collection: &str) -> StorageResult<bool>;

    /// Drops a namespace and all of its collections.
    ///
    /// Returns `true` if the namespace existed.
    async fn drop_namespace(&self, namespace: &str) -> StorageResult<bool>;

    /// Performs a round trip to the store.
    async fn ping(&self) -> StorageResult<()>;
}
