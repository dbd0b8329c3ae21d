//! VarStore configuration.
//!
//! Built in code with the builder methods, or loaded from JSON:
//!
//! ```json
//! {
//!   "url": "file://data",
//!   "tables": ["main"],
//!   "logging": true,
//!   "cleanup": { "enabled": true, "duration": 7200000, "collection": "cooldown" },
//!   "migration": { "enabled": false, "source": "database/main" }
//! }
//! ```
//!
//! `cleanup.duration` is in milliseconds and may be fractional.

use crate::engine::EngineOptions;
use crate::error::{CoreError, CoreResult};
use crate::janitor::DEFAULT_SWEEP_INTERVAL;
use crate::migration::MigrationConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use varstore_storage::validate_namespace;

/// Expiry sweeping settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    /// Whether the janitor runs.
    pub enabled: bool,
    /// Time between sweeps.
    pub interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Configuration for opening a [`crate::VarStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Store connection URL.
    pub url: String,

    /// Tables variables may be declared in.
    pub tables: Vec<String>,

    /// Whether startup progress is logged at info level.
    pub logging: bool,

    /// Namespace holding cooldowns and other expiring records.
    pub reserved_namespace: String,

    /// Variables exempt from registry checks in any table.
    pub reserved_variables: Vec<String>,

    /// Upper bound for a single store operation.
    pub operation_timeout: Duration,

    /// Expiry sweeping.
    pub cleanup: CleanupConfig,

    /// Legacy import.
    pub migration: MigrationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: "file://data".to_string(),
            tables: vec!["main".to_string()],
            logging: true,
            reserved_namespace: "cooldown".to_string(),
            reserved_variables: vec!["timeouts".to_string()],
            operation_timeout: Duration::from_secs(10),
            cleanup: CleanupConfig::default(),
            migration: MigrationConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the declared tables.
    #[must_use]
    pub fn tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether startup progress is logged.
    #[must_use]
    pub const fn logging(mut self, value: bool) -> Self {
        self.logging = value;
        self
    }

    /// Sets the reserved namespace.
    #[must_use]
    pub fn reserved_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.reserved_namespace = namespace.into();
        self
    }

    /// Sets the per-operation timeout.
    #[must_use]
    pub const fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Enables or disables the janitor.
    #[must_use]
    pub const fn cleanup_enabled(mut self, value: bool) -> Self {
        self.cleanup.enabled = value;
        self
    }

    /// Sets the sweep interval.
    #[must_use]
    pub const fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup.interval = interval;
        self
    }

    /// Sets the migration settings.
    #[must_use]
    pub fn migration(mut self, migration: MigrationConfig) -> Self {
        self.migration = migration;
        self
    }

    /// Parses a JSON configuration. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] for malformed JSON, wrongly typed
    /// fields or a non-positive interval.
    pub fn from_json_str(text: &str) -> CoreResult<Self> {
        let file: ConfigFile = serde_json::from_str(text)
            .map_err(|e| CoreError::config(format!("cannot parse configuration: {e}")))?;
        file.into_config()
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Io`] if the file cannot be read, otherwise as
    /// [`Config::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Returns the engine options this configuration implies.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            reserved_namespace: self.reserved_namespace.clone(),
            reserved_variables: self.reserved_variables.iter().cloned().collect(),
            operation_timeout: self.operation_timeout,
        }
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] describing the first problem.
    pub fn validate(&self) -> CoreResult<()> {
        if self.tables.is_empty() {
            return Err(CoreError::config("no tables declared"));
        }
        validate_namespace(&self.reserved_namespace)
            .map_err(|e| CoreError::config(format!("reserved namespace: {e}")))?;

        let mut seen = HashSet::new();
        for table in &self.tables {
            if table.is_empty() {
                return Err(CoreError::config("table names must not be empty"));
            }
            validate_namespace(table)
                .map_err(|e| CoreError::config(format!("table {table:?}: {e}")))?;
            if *table == self.reserved_namespace {
                return Err(CoreError::config(format!(
                    "table {table:?} is reserved for cooldowns"
                )));
            }
            if !seen.insert(table.as_str()) {
                return Err(CoreError::config(format!("table {table:?} declared twice")));
            }
        }

        if self.operation_timeout.is_zero() {
            return Err(CoreError::config("operation timeout must be positive"));
        }
        if self.cleanup.enabled && self.cleanup.interval.is_zero() {
            return Err(CoreError::config("cleanup interval must be positive"));
        }
        if self.migration.target_table.as_deref() == Some(self.reserved_namespace.as_str()) {
            return Err(CoreError::config(format!(
                "migration table {:?} is reserved for cooldowns",
                self.reserved_namespace
            )));
        }
        self.migration.validate()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ConfigFile {
    url: Option<String>,
    tables: Option<Vec<String>>,
    logging: Option<bool>,
    reserved_variables: Option<Vec<String>>,
    operation_timeout_ms: Option<u64>,
    cleanup: CleanupFile,
    migration: MigrationFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CleanupFile {
    enabled: Option<bool>,
    duration: Option<f64>,
    collection: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MigrationFile {
    enabled: Option<bool>,
    source: Option<PathBuf>,
    exclude: Option<Vec<String>>,
    table: Option<String>,
    keys_per_second: Option<u32>,
    burst: Option<u32>,
    pause_ms: Option<u64>,
}

impl ConfigFile {
    fn into_config(self) -> CoreResult<Config> {
        let mut config = Config::default();
        if let Some(url) = self.url {
            config.url = url;
        }
        if let Some(tables) = self.tables {
            config.tables = tables;
        }
        if let Some(logging) = self.logging {
            config.logging = logging;
        }
        if let Some(vars) = self.reserved_variables {
            config.reserved_variables = vars;
        }
        if let Some(ms) = self.operation_timeout_ms {
            config.operation_timeout = Duration::from_millis(ms);
        }

        if let Some(enabled) = self.cleanup.enabled {
            config.cleanup.enabled = enabled;
        }
        if let Some(ms) = self.cleanup.duration {
            config.cleanup.interval = Some(ms)
                .filter(|ms| *ms > 0.0)
                .and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
                .filter(|interval| !interval.is_zero())
                .ok_or_else(|| {
                    CoreError::config(format!("cleanup duration must be positive, got {ms}"))
                })?;
        }
        if let Some(collection) = self.cleanup.collection {
            config.reserved_namespace = collection;
        }

        let m = self.migration;
        let migration = &mut config.migration;
        if let Some(enabled) = m.enabled {
            migration.enabled = enabled;
        }
        if let Some(source) = m.source {
            migration.source_dir = source;
        }
        if let Some(exclude) = m.exclude {
            migration.excluded_dirs = exclude;
        }
        migration.target_table = m.table;
        if m.keys_per_second.is_some() {
            migration.keys_per_second = m.keys_per_second;
        }
        if let Some(burst) = m.burst {
            migration.burst = burst;
        }
        if let Some(ms) = m.pause_ms {
            migration.file_pause = Duration::from_millis(ms);
        }
        Ok(config)
    }
}
