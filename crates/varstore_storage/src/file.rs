//! Directory-backed document store for persistent storage.

use crate::document::{validate_collection, validate_namespace, Document};
use crate::error::{StorageError, StorageResult};
use crate::store::DocumentStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use varstore_codec::Value;

const EXTENSION: &str = "json";

/// A document store backed by a directory tree of JSON files.
///
/// Layout:
///
/// ```text
/// <root>/<namespace>/<collection>.json   # JSON array of documents
/// ```
///
/// Every mutation rewrites the whole collection file through a temporary
/// file and a rename, so a crash never leaves a half-written collection.
/// All access is serialized by an internal lock. File I/O is blocking; the
/// store is meant for tooling, tests and small deployments.
///
/// # Example
///
/// ```no_run
/// use varstore_storage::{DocumentStore, FileStore, Value};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = FileStore::open(Path::new("data")).unwrap();
/// store.upsert("main", "coins", "coins_1", Value::Integer(3)).await.unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Opens or creates a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn collection_path(&self, namespace: &str, collection: &str) -> PathBuf {
        self.namespace_dir(namespace)
            .join(format!("{collection}.{EXTENSION}"))
    }

    fn check_root(&self) -> StorageResult<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(StorageError::Connection(format!(
                "store root {} is not accessible",
                self.root.display()
            )))
        }
    }

    fn check(&self, namespace: &str, collection: &str) -> StorageResult<()> {
        self.check_root()?;
        validate_namespace(namespace)?;
        validate_collection(collection)
    }

    fn load(&self, namespace: &str, collection: &str) -> StorageResult<Vec<Document>> {
        let path = self.collection_path(namespace, collection);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::Corrupted(format!("{}: {e}", path.display())))
    }

    fn save(&self, namespace: &str, collection: &str, docs: &[Document]) -> StorageResult<()> {
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir)?;

        let path = self.collection_path(namespace, collection);
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        let data =
            serde_json::to_vec(docs).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut file = fs::File::create(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn list_dir(dir: &Path, want_dirs: bool) -> StorageResult<Vec<String>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if want_dirs {
                let name = entry.file_name().to_string_lossy().into_owned();
                if path.is_dir() && !name.starts_with('.') {
                    names.push(name);
                }
            } else if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(EXTENSION)
            {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn find(
        &self,
        namespace: &str,
        collection: &str,
        key: &str,
    ) -> StorageResult<Option<Document>> {
        self.check(namespace, collection)?;
        let _guard = self.lock.lock();
        Ok(self
            .load(namespace, collection)?
            .into_iter()
            .find(|doc| doc.key == key))
    }

    async fn upsert(
        &self,
        namespace: &str,
        collection: &str,
        key: &str,
        value: Value,
    ) -> StorageResult<Document> {
        self.check(namespace, collection)?;
        let _guard = self.lock.lock();
        let mut docs = self.load(namespace, collection)?;

        let doc = match docs.binary_search_by(|doc| doc.key.as_str().cmp(key)) {
            Ok(idx) => {
                docs[idx].value = value;
                docs[idx].clone()
            }
            Err(idx) => {
                let doc = Document::new(key, value);
                docs.insert(idx, doc.clone());
                doc
            }
        };

        self.save(namespace, collection, &docs)?;
        Ok(doc)
    }

    async fn delete(&self, namespace: &str, collection: &str, key: &str) -> StorageResult<bool> {
        self.check(namespace, collection)?;
        let _guard = self.lock.lock();
        let mut docs = self.load(namespace, collection)?;
        let before = docs.len();
        docs.retain(|doc| doc.key != key);
        if docs.len() == before {
            return Ok(false);
        }
        self.save(namespace, collection, &docs)?;
        Ok(true)
    }

    async fn delete_ids(
        &self,
        namespace: &str,
        collection: &str,
        ids: &[Uuid],
    ) -> StorageResult<u64> {
        self.check(namespace, collection)?;
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let _guard = self.lock.lock();
        let mut docs = self.load(namespace, collection)?;
        let before = docs.len();
        docs.retain(|doc| !wanted.contains(&doc.id));
        let removed = before - docs.len();
        if removed > 0 {
            self.save(namespace, collection, &docs)?;
        }
        Ok(removed as u64)
    }

    async fn scan(&self, namespace: &str, collection: &str) -> StorageResult<Vec<Document>> {
        self.check(namespace, collection)?;
        let _guard = self.lock.lock();
        self.load(namespace, collection)
    }

    async fn first(&self, namespace: &str, collection: &str) -> StorageResult<Option<Document>> {
        self.check(namespace, collection)?;
        let _guard = self.lock.lock();
        Ok(self.load(namespace, collection)?.into_iter().next())
    }

    async fn count(&self, namespace: &str, collection: &str) -> StorageResult<u64> {
        self.check(namespace, collection)?;
        let _guard = self.lock.lock();
        Ok(self.load(namespace, collection)?.len() as u64)
    }

    async fn list_namespaces(&self) -> StorageResult<Vec<String>> {
        self.check_root()?;
        let _guard = self.lock.lock();
        Self::list_dir(&self.root, true)
    }

    async fn list_collections(&self, namespace: &str) -> StorageResult<Vec<String>> {
        self.check_root()?;
        validate_namespace(namespace)?;
        let _guard = self.lock.lock();
        Self::list_dir(&self.namespace_dir(namespace), false)
    }

    async fn drop_collection(&self, namespace: &str, collection: &str) -> StorageResult<bool> {
        self.check(namespace, collection)?;
        let _guard = self.lock.lock();
        match fs::remove_file(self.collection_path(namespace, collection)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn drop_namespace(&self, namespace: &str) -> StorageResult<bool> {
        self.check_root()?;
        validate_namespace(namespace)?;
        let _guard = self.lock.lock();
        match fs::remove_dir_all(self.namespace_dir(namespace)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn ping(&self) -> StorageResult<()> {
        self.check_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_upsert_and_find() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store
            .upsert("main", "coins", "coins_1", Value::Integer(7))
            .await
            .unwrap();
        let doc = store.find("main", "coins", "coins_1").await.unwrap().unwrap();
        assert_eq!(doc.value, Value::Integer(7));
        assert!(dir.path().join("main").join("coins.json").is_file());
    }

    #[tokio::test]
    async fn file_data_survives_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let store = FileStore::open(dir.path()).unwrap();
            store
                .upsert("main", "motd", "motd", Value::from("hello"))
                .await
                .unwrap()
                .id
        };

        let store = FileStore::open(dir.path()).unwrap();
        let doc = store.find("main", "motd", "motd").await.unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.value, Value::from("hello"));
    }

    #[tokio::test]
    async fn file_upsert_replaces_and_keeps_order() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        for key in ["c", "a", "b"] {
            store.upsert("ns", "col", key, Value::Integer(1)).await.unwrap();
        }
        let first = store.upsert("ns", "col", "a", Value::Integer(2)).await.unwrap();

        let docs = store.scan("ns", "col").await.unwrap();
        let keys: Vec<_> = docs.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(docs[0].id, first.id);
        assert_eq!(docs[0].value, Value::Integer(2));
    }

    #[tokio::test]
    async fn file_delete_and_delete_ids() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let a = store.upsert("ns", "c", "a", Value::Integer(1)).await.unwrap();
        store.upsert("ns", "c", "b", Value::Integer(2)).await.unwrap();
        store.upsert("ns", "c", "c", Value::Integer(3)).await.unwrap();

        assert!(store.delete("ns", "c", "b").await.unwrap());
        assert!(!store.delete("ns", "c", "b").await.unwrap());
        assert_eq!(store.delete_ids("ns", "c", &[a.id]).await.unwrap(), 1);
        assert_eq!(store.count("ns", "c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn file_listing_and_drop() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.upsert("b", "y", "k", Value::Null).await.unwrap();
        store.upsert("b", "x", "k", Value::Null).await.unwrap();
        store.upsert("a", "z", "k", Value::Null).await.unwrap();

        assert_eq!(store.list_namespaces().await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.list_collections("b").await.unwrap(), vec!["x", "y"]);

        assert!(store.drop_collection("b", "x").await.unwrap());
        assert!(!store.drop_collection("b", "x").await.unwrap());
        assert_eq!(store.list_collections("b").await.unwrap(), vec!["y"]);

        assert!(store.drop_namespace("a").await.unwrap());
        assert_eq!(store.list_namespaces().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn file_corrupted_collection_is_reported() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::create_dir_all(dir.path().join("ns")).unwrap();
        fs::write(dir.path().join("ns").join("bad.json"), b"{oops").unwrap();

        assert!(matches!(
            store.scan("ns", "bad").await,
            Err(StorageError::Corrupted(_))
        ));
    }

    #[tokio::test]
    async fn file_missing_root_is_a_connection_error() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        let store = FileStore::open(&root).unwrap();
        fs::remove_dir_all(&root).unwrap();

        let err = store.ping().await.unwrap_err();
        assert!(err.is_connectivity());
    }
}
