//! Command execution context
//!
//! Loads configuration once and builds the state synchronizer and the cache
//! proxy from it. Nothing is shared through globals: every command gets its
//! collaborators from here.

use std::sync::Arc;

use url::Url;

use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::proxy::{CacheProxy, CacheStorage, HttpFetcher, SqliteCacheStorage};
use crate::state::StateSync;

/// Context for command execution containing config and runtime options.
pub struct CommandContext {
    /// Loaded and validated configuration
    pub config: Config,
    /// Output format preference
    pub format: OutputFormat,
}

impl CommandContext {
    /// Load configuration from `--config` or the default location.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = Config::load_at(opts.config_ref())?;
        Ok(Self {
            config,
            format: opts.format,
        })
    }

    /// Bind the durable state store. Falls back to memory-only state if the
    /// store cannot be opened.
    pub fn state_sync(&self) -> StateSync {
        StateSync::open(&self.config.state)
    }

    /// Open the cache generation database
    pub fn cache_storage(&self) -> Result<Arc<SqliteCacheStorage>> {
        let dir = self.config.proxy.resolve_cache_dir()?;
        Ok(Arc::new(SqliteCacheStorage::open_at(&dir)?))
    }

    /// Build the cache proxy for the configured version and pick up the
    /// lifecycle state left by earlier runs.
    pub fn proxy(&self) -> Result<CacheProxy> {
        let storage: Arc<dyn CacheStorage> = self.cache_storage()?;
        let origin = self.origin()?;
        let fetcher = Arc::new(HttpFetcher::new(origin)?);

        let mut proxy = CacheProxy::from_config(&self.config.proxy, storage, fetcher)?;
        let state = proxy.resume()?;
        log::debug!("Proxy {} resumed in state {}", proxy.version(), state);
        Ok(proxy)
    }

    /// The configured application origin
    pub fn origin(&self) -> Result<Url> {
        Url::parse(&self.config.proxy.origin).map_err(|e| {
            ConfigError::Invalid(format!("proxy.origin '{}': {}", self.config.proxy.origin, e))
                .into()
        })
    }
}
