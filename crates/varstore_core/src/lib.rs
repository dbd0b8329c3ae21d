//! # VarStore Core
//!
//! Variable storage engine for VarStore.
//!
//! This crate provides:
//! - The [`Engine`], reading and writing scoped variables on a shared store
//! - The [`Janitor`], sweeping expired cooldowns on an interval
//! - The [`MigrationPipeline`], importing legacy file dumps at a paced rate
//! - [`Cooldowns`], command cooldown bookkeeping
//! - [`Timeouts`], delayed command payloads that fire once due
//! - [`VarStore`], the handle that wires them together at startup
//!
//! Tables map to namespaces, variables to collections and scoped values to
//! records keyed by [`varstore_codec::encode_key`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod cooldown;
mod database;
mod engine;
mod error;
mod janitor;
mod migration;
mod probe;
mod query;
mod rate;
mod registry;
mod timeout;

pub use clock::unix_millis;
pub use config::{CleanupConfig, Config};
pub use cooldown::{CooldownStatus, Cooldowns};
pub use database::VarStore;
pub use engine::{Engine, EngineOptions, DEFAULT_ALL_LIMIT};
pub use error::{CoreError, CoreResult};
pub use janitor::{
    expiry_of, sweep_namespace, Janitor, JanitorHandle, JanitorState, JanitorStatus, SweepReport,
    DEFAULT_SWEEP_INTERVAL,
};
pub use migration::{
    discover_files, parse_legacy, LegacyEntry, LegacyFile, MigrationConfig, MigrationIssue,
    MigrationPipeline, MigrationReport,
};
pub use probe::{probe, round_trip, HealthReport};
pub use query::{Filter, Lookup, Record, SortOrder};
pub use rate::RateLimiter;
pub use registry::{StaticRegistry, VariableRegistry};
pub use timeout::{ScheduledTimeout, Timeouts, TIMEOUTS_COLLECTION};
