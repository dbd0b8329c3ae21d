//! Import of legacy file-based variable dumps.
//!
//! A legacy dump is a directory tree of JSON files. Each file is an object
//! mapping record keys to entries of the form `{"value": ...}`. Every entry
//! becomes one record, stored in the collection named by the variable
//! decoded from its key. The destination table is either configured or the
//! stem of the file name.
//!
//! Writes are upserts, so re-running a migration over the same dump
//! overwrites rather than duplicates. There is no rollback: a cancelled or
//! failed run leaves the records written so far in place.

use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::rate::RateLimiter;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use varstore_codec::{decode_variable, Value};
use varstore_storage::validate_namespace;

/// Migration settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationConfig {
    /// Whether startup runs the migration.
    pub enabled: bool,
    /// Root of the legacy dump.
    pub source_dir: PathBuf,
    /// Directory names skipped during discovery.
    pub excluded_dirs: Vec<String>,
    /// Table every record goes to; the file stem when unset.
    pub target_table: Option<String>,
    /// Write rate; unlimited when unset.
    pub keys_per_second: Option<u32>,
    /// Writes allowed back to back before pacing applies.
    pub burst: u32,
    /// Pause between files.
    pub file_pause: Duration,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source_dir: PathBuf::from("database/main"),
            excluded_dirs: vec!["reference".to_string()],
            target_table: None,
            keys_per_second: Some(50),
            burst: 1,
            file_pause: Duration::from_secs(1),
        }
    }
}

impl MigrationConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the startup migration.
    #[must_use]
    pub const fn enabled(mut self, value: bool) -> Self {
        self.enabled = value;
        self
    }

    /// Sets the dump root.
    #[must_use]
    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    /// Sets the excluded directory names.
    #[must_use]
    pub fn excluded_dirs(mut self, dirs: Vec<String>) -> Self {
        self.excluded_dirs = dirs;
        self
    }

    /// Sends every record to one table.
    #[must_use]
    pub fn target_table(mut self, table: impl Into<String>) -> Self {
        self.target_table = Some(table.into());
        self
    }

    /// Sets the write rate; `None` disables pacing.
    #[must_use]
    pub const fn keys_per_second(mut self, rate: Option<u32>) -> Self {
        self.keys_per_second = rate;
        self
    }

    /// Sets the burst size.
    #[must_use]
    pub const fn burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    /// Sets the pause between files.
    #[must_use]
    pub const fn file_pause(mut self, pause: Duration) -> Self {
        self.file_pause = pause;
        self
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] for a zero rate or burst.
    pub fn validate(&self) -> CoreResult<()> {
        if self.keys_per_second == Some(0) {
            return Err(CoreError::config(
                "migration rate must be positive; leave it unset for unlimited",
            ));
        }
        if self.burst == 0 {
            return Err(CoreError::config("migration burst must be at least 1"));
        }
        if self.target_table.as_deref() == Some("") {
            return Err(CoreError::config("migration target table must not be empty"));
        }
        Ok(())
    }
}

/// One entry of a legacy file.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyEntry {
    /// Legacy record key.
    pub key: String,
    /// Stored value; `None` when the entry carries no data.
    pub value: Option<Value>,
}

/// Parses a legacy file.
///
/// Entries that are not objects or have no `value` field yield `None`.
///
/// # Errors
///
/// Returns an error if the bytes are not a JSON object.
pub fn parse_legacy(bytes: &[u8]) -> CoreResult<Vec<LegacyEntry>> {
    let json: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| CoreError::migration(format!("not valid JSON: {e}")))?;
    let serde_json::Value::Object(entries) = json else {
        return Err(CoreError::migration("legacy file is not a JSON object"));
    };

    Ok(entries
        .into_iter()
        .map(|(key, entry)| {
            let value = match entry {
                serde_json::Value::Object(mut fields) => fields.remove("value").map(Value::from),
                _ => None,
            };
            LegacyEntry { key, value }
        })
        .collect())
}

/// Lists legacy files under `root`, recursively and sorted.
///
/// Directories named in `excluded` and hidden entries are skipped.
///
/// # Errors
///
/// Returns [`CoreError::Migration`] if `root` is not a directory.
pub fn discover_files(root: &Path, excluded: &[String]) -> CoreResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(CoreError::migration(format!(
            "source directory not found: {}",
            root.display()
        )));
    }
    let mut files = Vec::new();
    walk(root, excluded, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(dir: &Path, excluded: &[String], files: &mut Vec<PathBuf>) -> CoreResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if !excluded.iter().any(|x| *x == name) {
                walk(&path, excluded, files)?;
            }
        } else if file_type.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

/// A key that was not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationIssue {
    /// Source file.
    pub file: PathBuf,
    /// Legacy key; empty for whole-file issues.
    pub key: String,
    /// What went wrong.
    pub reason: String,
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Keys found across all parseable files.
    pub total_keys: usize,
    /// Keys written.
    pub migrated: usize,
    /// Keys without data.
    pub skipped: Vec<MigrationIssue>,
    /// Keys whose write failed.
    pub failed: Vec<MigrationIssue>,
    /// Files that could not be read or parsed.
    pub failed_files: Vec<MigrationIssue>,
    /// Wall time of the run.
    pub elapsed: Duration,
    /// The run stopped on cancellation.
    pub cancelled: bool,
}

impl MigrationReport {
    /// Returns true if every key was written and the run completed.
    pub fn is_complete(&self) -> bool {
        !self.cancelled
            && self.failed.is_empty()
            && self.failed_files.is_empty()
            && self.skipped.is_empty()
    }
}

/// A parsed legacy file and the table its records go to.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyFile {
    /// Source file.
    pub path: PathBuf,
    /// Destination table.
    pub table: String,
    /// Parsed entries.
    pub entries: Vec<LegacyEntry>,
}

fn destination_for(config: &MigrationConfig, file: &Path) -> String {
    match &config.target_table {
        Some(table) => table.clone(),
        None => file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

fn check_destination(table: &str, reserved: &str) -> CoreResult<()> {
    if table == reserved {
        return Err(CoreError::migration(format!(
            "destination table {table:?} is the reserved namespace"
        )));
    }
    validate_namespace(table)
        .map_err(|e| CoreError::migration(format!("destination table {table:?}: {e}")))
}

fn plan_dump(
    config: &MigrationConfig,
    reserved: &str,
) -> CoreResult<(Vec<LegacyFile>, MigrationReport)> {
    let files = discover_files(&config.source_dir, &config.excluded_dirs)?;
    let mut report = MigrationReport::default();
    let mut parsed = Vec::with_capacity(files.len());

    for path in files {
        let table = destination_for(config, &path);
        let loaded = check_destination(&table, reserved)
            .and_then(|()| fs::read(&path).map_err(CoreError::from))
            .and_then(|bytes| parse_legacy(&bytes));
        match loaded {
            Ok(entries) => {
                report.total_keys += entries.len();
                parsed.push(LegacyFile {
                    path,
                    table,
                    entries,
                });
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping legacy file");
                report.failed_files.push(MigrationIssue {
                    file: path,
                    key: String::new(),
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok((parsed, report))
}

/// Runs a migration against an engine.
#[derive(Debug)]
pub struct MigrationPipeline {
    engine: Engine,
    config: MigrationConfig,
    limiter: RateLimiter,
}

impl MigrationPipeline {
    /// Creates a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if the settings are invalid, or
    /// [`CoreError::Migration`] if the target table is the reserved namespace.
    pub fn new(engine: Engine, config: MigrationConfig) -> CoreResult<Self> {
        config.validate()?;
        if let Some(table) = &config.target_table {
            check_destination(table, &engine.options().reserved_namespace)?;
        }
        let limiter = RateLimiter::from_rate(config.keys_per_second, config.burst);
        Ok(Self {
            engine,
            config,
            limiter,
        })
    }

    /// Returns the settings.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Returns the table records of `file` are written to.
    pub fn destination_table(&self, file: &Path) -> String {
        destination_for(&self.config, file)
    }

    /// Parses the dump without writing.
    ///
    /// Files are read on the blocking pool. The report has `total_keys`
    /// and `failed_files` filled in; files whose destination is the
    /// reserved namespace or not a valid table are listed as failed.
    pub async fn plan(&self) -> CoreResult<(Vec<LegacyFile>, MigrationReport)> {
        let config = self.config.clone();
        let reserved = self.engine.options().reserved_namespace.clone();
        tokio::task::spawn_blocking(move || plan_dump(&config, &reserved)).await?
    }

    /// Runs the migration.
    ///
    /// Cancellation is checked before every file and every key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Migration`] if the source directory is missing.
    /// Per-file and per-key failures are recorded in the report instead.
    pub async fn run(&self, cancel: &CancellationToken) -> CoreResult<MigrationReport> {
        let started = Instant::now();
        let (files, mut report) = self.plan().await?;
        let total = report.total_keys;

        info!(
            source = %self.config.source_dir.display(),
            files = files.len(),
            keys = total,
            "starting legacy migration"
        );
        if let Some(eta) = self.limiter.estimate(total) {
            info!(estimated_secs = eta.as_secs(), "estimated migration time");
        }

        let mut index = 0;
        'files: for (n, legacy) in files.into_iter().enumerate() {
            let LegacyFile {
                path: file,
                table,
                entries,
            } = legacy;
            if n > 0 && !self.config.file_pause.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.file_pause) => {}
                }
            }
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            debug!(file = %file.display(), table = %table, keys = entries.len(), "migrating file");

            for entry in entries {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'files;
                }
                index += 1;

                let Some(value) = entry.value else {
                    warn!("[{index}/{total}] no data found for {}", entry.key);
                    report.skipped.push(MigrationIssue {
                        file: file.clone(),
                        key: entry.key,
                        reason: "entry has no value".to_string(),
                    });
                    continue;
                };

                tokio::select! {
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        break 'files;
                    }
                    _ = self.limiter.acquire() => {}
                }

                let key_started = Instant::now();
                let variable = decode_variable(&entry.key);
                match self.engine.put_raw(&table, variable, &entry.key, value).await {
                    Ok(()) => {
                        report.migrated += 1;
                        debug!(
                            elapsed_ms = key_started.elapsed().as_millis() as u64,
                            "[{index}/{total}] {}",
                            entry.key
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, "[{index}/{total}] failed to migrate {}", entry.key);
                        report.failed.push(MigrationIssue {
                            file: file.clone(),
                            key: entry.key,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            total = report.total_keys,
            migrated = report.migrated,
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            failed_files = report.failed_files.len(),
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "legacy migration finished"
        );
        Ok(report)
    }
}
