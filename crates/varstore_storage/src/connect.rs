//! Store selection from a connection URL.

use crate::error::{StorageError, StorageResult};
use crate::file::FileStore;
use crate::memory::MemoryStore;
use crate::store::DocumentStore;
use std::path::PathBuf;
use std::sync::Arc;

/// A parsed store connection URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUrl {
    /// `memory://`
    Memory,
    /// `file://<path>` or a bare filesystem path.
    File(PathBuf),
}

impl StoreUrl {
    /// Parses a connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnsupportedUrl`] for empty input, an empty
    /// file path, or an unknown scheme.
    pub fn parse(url: &str) -> StorageResult<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(StorageError::UnsupportedUrl("empty url".into()));
        }
        if url == "memory://" || url == "mem://" {
            return Ok(Self::Memory);
        }
        if let Some(path) = url.strip_prefix("file://") {
            if path.is_empty() {
                return Err(StorageError::UnsupportedUrl(url.to_string()));
            }
            return Ok(Self::File(PathBuf::from(path)));
        }
        if url.contains("://") {
            return Err(StorageError::UnsupportedUrl(url.to_string()));
        }
        Ok(Self::File(PathBuf::from(url)))
    }
}

/// Opens the store named by `url`.
///
/// This is the single place a store handle is created; the returned handle
/// is meant to be shared by every component for the life of the process.
///
/// # Errors
///
/// Returns an error if the URL is unsupported or the store cannot be opened.
pub fn connect(url: &str) -> StorageResult<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match StoreUrl::parse(url)? {
        StoreUrl::Memory => Arc::new(MemoryStore::new()),
        StoreUrl::File(path) => Arc::new(FileStore::open(&path)?),
    };
    tracing::debug!(url, "opened document store");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_urls() {
        assert_eq!(StoreUrl::parse("memory://").unwrap(), StoreUrl::Memory);
        assert_eq!(StoreUrl::parse(" mem:// ").unwrap(), StoreUrl::Memory);
        assert_eq!(
            StoreUrl::parse("file:///var/lib/vars").unwrap(),
            StoreUrl::File(PathBuf::from("/var/lib/vars"))
        );
        assert_eq!(
            StoreUrl::parse("data/vars").unwrap(),
            StoreUrl::File(PathBuf::from("data/vars"))
        );
    }

    #[test]
    fn rejects_unsupported_urls() {
        for url in ["", "file://", "mongodb://localhost:27017", "redis://x"] {
            assert!(
                matches!(StoreUrl::parse(url), Err(StorageError::UnsupportedUrl(_))),
                "{url}"
            );
        }
    }

    #[tokio::test]
    async fn connect_opens_stores() {
        let store = connect("memory://").unwrap();
        assert!(store.ping().await.is_ok());

        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().join("db").display());
        let store = connect(&url).unwrap();
        assert!(store.ping().await.is_ok());
        assert!(dir.path().join("db").is_dir());
    }
}
