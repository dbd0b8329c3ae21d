//! The VarStore handle.

use crate::config::Config;
use crate::cooldown::Cooldowns;
use crate::engine::Engine;
use crate::error::CoreResult;
use crate::janitor::{Janitor, JanitorHandle};
use crate::migration::{MigrationPipeline, MigrationReport};
use crate::registry::VariableRegistry;
use crate::timeout::Timeouts;
use std::ops::Deref;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use varstore_storage::DocumentStore;

/// A running variable store.
///
/// Owns the engine, the janitor task and the cancellation token shared by
/// all background work. Dereferences to [`Engine`] for variable access.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use varstore_core::{Config, Lookup, StaticRegistry, VarStore};
/// use varstore_codec::Value;
/// use varstore_storage::MemoryStore;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> varstore_core::CoreResult<()> {
/// let registry = StaticRegistry::new().with_variable("coins", Value::Integer(0));
/// let store = VarStore::open(
///     Config::new().cleanup_enabled(false),
///     Arc::new(MemoryStore::new()),
///     Arc::new(registry),
/// )
/// .await?;
///
/// store.set("main", "coins", Some("42"), Value::Integer(10)).await?;
/// assert_eq!(
///     store.get("main", "coins", Some("42")).await?,
///     Lookup::Stored(Value::Integer(10))
/// );
///
/// store.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct VarStore {
    config: Config,
    engine: Engine,
    cancel: CancellationToken,
    janitor: Option<JanitorHandle>,
    migration: Option<MigrationReport>,
}

impl VarStore {
    /// Opens a store over an existing document store.
    ///
    /// Startup validates the configuration, pings the store, runs the
    /// legacy migration once when enabled and starts the janitor when
    /// cleanup is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the store is
    /// unreachable or the migration source is missing.
    pub async fn open(
        config: Config,
        store: Arc<dyn DocumentStore>,
        registry: Arc<dyn VariableRegistry>,
    ) -> CoreResult<Self> {
        Self::open_with_cancel(config, store, registry, CancellationToken::new()).await
    }

    /// Opens a store whose background work is tied to `parent`.
    ///
    /// Cancelling `parent` stops a startup migration in progress, in which
    /// case the store still opens and the report is marked cancelled, and
    /// stops the janitor.
    ///
    /// # Errors
    ///
    /// As [`VarStore::open`].
    pub async fn open_with_cancel(
        config: Config,
        store: Arc<dyn DocumentStore>,
        registry: Arc<dyn VariableRegistry>,
        parent: CancellationToken,
    ) -> CoreResult<Self> {
        config.validate()?;

        let engine = Engine::new(store.clone(), registry, config.engine_options());
        let latency = engine.ping().await?;
        if config.logging {
            info!(latency_ms = latency.as_millis() as u64, "connected to store");
        } else {
            debug!(latency_ms = latency.as_millis() as u64, "connected to store");
        }

        let cancel = parent.child_token();

        let migration = if config.migration.enabled {
            let pipeline = MigrationPipeline::new(engine.clone(), config.migration.clone())?;
            Some(pipeline.run(&cancel).await?)
        } else {
            None
        };

        let janitor = if config.cleanup.enabled {
            let janitor = Janitor::new(
                store,
                config.reserved_namespace.clone(),
                config.cleanup.interval,
            )?;
            Some(janitor.spawn(cancel.child_token()))
        } else {
            None
        };

        if config.logging {
            info!(
                tables = ?config.tables,
                cleanup = config.cleanup.enabled,
                "variable store ready"
            );
        }

        Ok(Self {
            config,
            engine,
            cancel,
            janitor,
            migration,
        })
    }

    /// Opens the store named by the configured URL.
    ///
    /// # Errors
    ///
    /// As [`VarStore::open`], plus URL and store opening errors.
    pub async fn connect(config: Config, registry: Arc<dyn VariableRegistry>) -> CoreResult<Self> {
        Self::connect_with_cancel(config, registry, CancellationToken::new()).await
    }

    /// Opens the store named by the configured URL, tied to `parent`.
    ///
    /// # Errors
    ///
    /// As [`VarStore::connect`].
    pub async fn connect_with_cancel(
        config: Config,
        registry: Arc<dyn VariableRegistry>,
        parent: CancellationToken,
    ) -> CoreResult<Self> {
        let store = varstore_storage::connect(&config.url)?;
        Self::open_with_cancel(config, store, registry, parent).await
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns a cooldown tracker over this store.
    pub fn cooldowns(&self) -> Cooldowns {
        Cooldowns::new(self.engine.clone())
    }

    /// Returns a timeout scheduler over this store.
    pub fn timeouts(&self) -> Timeouts {
        Timeouts::new(self.engine.clone())
    }

    /// Returns the janitor handle while cleanup runs.
    pub fn janitor(&self) -> Option<&JanitorHandle> {
        self.janitor.as_ref()
    }

    /// Returns the report of the startup migration, if one ran.
    pub fn migration_report(&self) -> Option<&MigrationReport> {
        self.migration.as_ref()
    }

    /// Returns the token cancelled on shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops background work and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the janitor task panicked.
    pub async fn shutdown(mut self) -> CoreResult<()> {
        self.cancel.cancel();
        if let Some(janitor) = self.janitor.take() {
            janitor.shutdown().await?;
        }
        if self.config.logging {
            info!("variable store shut down");
        }
        Ok(())
    }
}

impl Deref for VarStore {
    type Target = Engine;

    fn deref(&self) -> &Engine {
        &self.engine
    }
}

impl std::fmt::Debug for VarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VarStore")
            .field("tables", &self.config.tables)
            .field("janitor", &self.janitor.as_ref().map(JanitorHandle::state))
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Drop for VarStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
