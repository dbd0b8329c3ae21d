//! CLI command implementations.

pub mod inspect;
pub mod maintenance;
pub mod migrate;

use std::path::Path;
use std::sync::Arc;
use varstore_core::{Config, Engine, StaticRegistry};

/// Result type of every command.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Store access shared by the commands.
pub struct Context {
    /// Effective configuration.
    pub config: Config,
    /// Engine over the configured store.
    pub engine: Engine,
}

impl Context {
    /// Loads the configuration and opens the store.
    ///
    /// `url` overrides the configured URL.
    pub fn open(
        url: Option<&str>,
        config_path: Option<&Path>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = match config_path {
            Some(path) => Config::from_path(path)?,
            None => Config::default(),
        };
        if let Some(url) = url {
            config.url = url.to_string();
        }
        config.validate()?;

        let store = varstore_storage::connect(&config.url)?;
        // Maintenance commands never resolve defaults.
        let engine = Engine::new(store, Arc::new(StaticRegistry::new()), config.engine_options());
        Ok(Self { config, engine })
    }
}
