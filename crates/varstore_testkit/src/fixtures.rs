//! Test fixtures.
//!
//! Provides engines over throwaway stores and writers for legacy dump
//! directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use varstore_codec::Value;
use varstore_core::{Engine, EngineOptions, MigrationConfig, StaticRegistry};
use varstore_storage::{DocumentStore, FileStore, MemoryStore};

/// The registry used by test engines.
///
/// Declares `coins` (default 0), `level` (default 1) and `motd`
/// (default "welcome") in every table.
pub fn test_registry() -> StaticRegistry {
    StaticRegistry::new()
        .with_variable("coins", Value::Integer(0))
        .with_variable("level", Value::Integer(1))
        .with_variable("motd", Value::from("welcome"))
}

/// An engine over a test store with automatic cleanup.
pub struct TestEngine {
    /// The engine instance.
    pub engine: Engine,
    /// The store behind the engine.
    pub store: Arc<dyn DocumentStore>,
    memory: Option<Arc<MemoryStore>>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestEngine {
    /// Creates an engine over an in-memory store.
    pub fn memory() -> Self {
        Self::memory_with(EngineOptions::default())
    }

    /// Creates an engine over an in-memory store with custom options.
    pub fn memory_with(options: EngineOptions) -> Self {
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn DocumentStore> = memory.clone();
        Self {
            engine: Engine::new(store.clone(), Arc::new(test_registry()), options),
            store,
            memory: Some(memory),
            _temp_dir: None,
        }
    }

    /// Creates an engine over a file store in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store: Arc<dyn DocumentStore> = Arc::new(
            FileStore::open(&temp_dir.path().join("data")).expect("Failed to open file store"),
        );
        Self {
            engine: Engine::new(
                store.clone(),
                Arc::new(test_registry()),
                EngineOptions::default(),
            ),
            store,
            memory: None,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the memory store, if this engine uses one.
    pub fn memory_store(&self) -> Option<&MemoryStore> {
        self.memory.as_deref()
    }

    /// Returns the store directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("data"))
    }
}

impl std::ops::Deref for TestEngine {
    type Target = Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// A legacy dump directory with automatic cleanup.
///
/// ```rust
/// use varstore_testkit::LegacyDump;
///
/// let dump = LegacyDump::new()
///     .file("main.sql", r#"{"coins_1": {"value": 5}}"#)
///     .entries("main2.sql", &[("level_1", Some(serde_json::json!(3)))]);
/// assert!(dump.path().join("main2.sql").exists());
/// ```
pub struct LegacyDump {
    dir: TempDir,
}

impl LegacyDump {
    /// Creates an empty dump directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Writes a file with raw contents. Parent directories are created.
    #[must_use]
    pub fn file(self, relative: &str, contents: &str) -> Self {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create dump directory");
        }
        std::fs::write(&path, contents).expect("Failed to write dump file");
        self
    }

    /// Writes a file of entries. `None` writes an entry without a value.
    #[must_use]
    pub fn entries(self, relative: &str, entries: &[(&str, Option<serde_json::Value>)]) -> Self {
        let object: serde_json::Map<String, serde_json::Value> = entries
            .iter()
            .map(|(key, value)| {
                let entry = match value {
                    Some(v) => serde_json::json!({ "key": key, "value": v }),
                    None => serde_json::json!({}),
                };
                ((*key).to_string(), entry)
            })
            .collect();
        let text = serde_json::Value::Object(object).to_string();
        self.file(relative, &text)
    }

    /// Returns the dump root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns migration settings for this dump without pacing or pauses.
    pub fn config(&self) -> MigrationConfig {
        MigrationConfig::new()
            .enabled(true)
            .source_dir(self.path())
            .keys_per_second(None)
            .file_pause(Duration::ZERO)
    }
}

impl Default for LegacyDump {
    fn default() -> Self {
        Self::new()
    }
}
