//! # VarStore Testkit
//!
//! Test utilities for VarStore.
//!
//! This crate provides:
//! - Test fixtures: engines over temporary stores and legacy dump writers
//! - Property-based test generators using proptest
//! - Cross-crate integration test helpers
//!
//! ## Usage
//!
//! ```rust
//! use varstore_testkit::prelude::*;
//! use varstore_codec::Value;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let test = TestEngine::memory();
//! test.engine.set("main", "coins", Some("1"), Value::Integer(3)).await.unwrap();
//! assert_eq!(test.memory_store().unwrap().document_count(), 1);
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
