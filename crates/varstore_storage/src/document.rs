//! Stored documents and name validation.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use varstore_codec::Value;

/// A single stored record.
///
/// `id` is the record identity, assigned on first insert and kept across
/// upserts of the same key. Bulk deletes address documents by `id` so that
/// a record rewritten under the same key between a scan and the delete is
/// still the same record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Record identity.
    pub id: Uuid,
    /// Record key, unique within its collection.
    pub key: String,
    /// Stored value.
    pub value: Value,
}

impl Document {
    /// Creates a document with a fresh identity.
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            value,
        }
    }
}

/// Validates a namespace name.
///
/// Namespaces must be non-empty, must not start with `.` and must not
/// contain NUL, `/`, `\` or `$`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidName`] describing the first violation.
pub fn validate_namespace(namespace: &str) -> StorageResult<()> {
    validate_name("namespace", namespace)?;
    if namespace.starts_with('.') {
        return Err(StorageError::InvalidName(format!(
            "namespace must not start with '.': {namespace:?}"
        )));
    }
    Ok(())
}

/// Validates a collection name.
///
/// Collections must be non-empty and must not contain NUL, `/`, `\` or `$`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidName`] describing the first violation.
pub fn validate_collection(collection: &str) -> StorageResult<()> {
    validate_name("collection", collection)
}

fn validate_name(kind: &str, name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidName(format!("{kind} must not be empty")));
    }
    if let Some(c) = name.chars().find(|c| matches!(c, '\0' | '/' | '\\' | '$')) {
        return Err(StorageError::InvalidName(format!(
            "{kind} must not contain {c:?}: {name:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_documents_get_distinct_ids() {
        let a = Document::new("k", Value::Null);
        let b = Document::new("k", Value::Null);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn valid_names() {
        assert!(validate_namespace("main").is_ok());
        assert!(validate_namespace("cooldown").is_ok());
        assert!(validate_collection("coins").is_ok());
        assert!(validate_collection(".hidden").is_ok());
    }

    #[test]
    fn rejects_empty_names() {
        assert!(validate_namespace("").is_err());
        assert!(validate_collection("").is_err());
    }

    #[test]
    fn rejects_reserved_characters() {
        for bad in ["a/b", "a\\b", "a$b", "a\0b"] {
            assert!(validate_namespace(bad).is_err(), "{bad:?}");
            assert!(validate_collection(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn rejects_dot_namespaces() {
        assert!(matches!(
            validate_namespace(".."),
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn documents_serialize_as_json_objects() {
        let doc = Document::new("coins_1", Value::Integer(5));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["key"], "coins_1");
        assert_eq!(json["value"], 5);

        let back: Document = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }
}
