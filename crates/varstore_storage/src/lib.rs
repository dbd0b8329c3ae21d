//! # VarStore Storage
//!
//! Document store trait and implementations for VarStore.
//!
//! This crate is the seam between VarStore and the document database it
//! runs on. The database is organised as namespaces holding collections
//! holding documents; a document is a `{ id, key, value }` triple and keys
//! are unique within a collection.
//!
//! ## Design Principles
//!
//! - Namespaces and collections are created implicitly on first write
//! - Stores never interpret values
//! - Every method is async and must be `Send + Sync` for shared use
//! - Connection failures are reported, never swallowed
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For testing and ephemeral data
//! - [`FileStore`] - A directory of JSON files, one per collection
//!
//! ## Example
//!
//! ```rust
//! use varstore_storage::{DocumentStore, MemoryStore, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::new();
//! store.upsert("main", "coins", "coins_1", Value::Integer(5)).await.unwrap();
//!
//! let doc = store.find("main", "coins", "coins_1").await.unwrap().unwrap();
//! assert_eq!(doc.value, Value::Integer(5));
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod connect;
mod document;
mod error;
mod file;
mod memory;
mod store;

pub use connect::{connect, StoreUrl};
pub use document::{validate_collection, validate_namespace, Document};
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::DocumentStore;
pub use varstore_codec::Value;
