//! Cache proxy lifecycle: install, activate, intercept
//!
//! One `CacheProxy` corresponds to one deployed version. Install pre-caches
//! the manifest into the generation named by the version tag (all or
//! nothing), activation garbage-collects every other generation and marks the
//! current one active. Until then the previously active generation keeps
//! answering intercepted fetches.

use futures::future::try_join_all;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::cache::CacheStorage;
use super::fetch::Fetcher;
use super::manifest::AssetManifest;
use super::policy::{CachePolicy, PolicyContext, ResponseSource, Served};
use super::request::Request;
use super::routing::{RequestClass, RoutingRules};
use crate::config::ProxyConfig;
use crate::error::{CacheError, FetchError, Result};

/// Lifecycle state of one proxy instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Waiting,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Result of a successful install
#[derive(Debug, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub cached: Vec<String>,
    pub activation: Option<ActivateReport>,
}

/// Result of activation
#[derive(Debug, Serialize)]
pub struct ActivateReport {
    pub generation: String,
    pub deleted: Vec<String>,
    pub clients_claimed: bool,
}

/// What the proxy did with an intercepted request
pub enum FetchOutcome {
    /// Not intercepted; the caller goes to the network itself
    PassThrough,
    Responded(Served),
}

/// Offline asset cache proxy for one version tag
pub struct CacheProxy {
    version: String,
    skip_waiting: bool,
    navigation_policy: CachePolicy,
    asset_policy: CachePolicy,
    manifest: AssetManifest,
    rules: Arc<RoutingRules>,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: WorkerState,
    clients_claimed: bool,
}

impl CacheProxy {
    pub fn from_config(
        config: &ProxyConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        let rules = RoutingRules::from_config(config)?;
        let manifest = AssetManifest::resolve(rules.origin(), &config.manifest)?;

        Ok(Self {
            version: config.version.clone(),
            skip_waiting: config.skip_waiting,
            navigation_policy: config.navigation_policy,
            asset_policy: config.asset_policy,
            manifest,
            rules: Arc::new(rules),
            storage,
            fetcher,
            state: WorkerState::Parsed,
            clients_claimed: false,
        })
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed
    }

    /// Pick up lifecycle state left by an earlier process: the generation
    /// marked active is activated, any other existing current generation is
    /// installed and waiting.
    pub fn resume(&mut self) -> std::result::Result<WorkerState, CacheError> {
        if self.state != WorkerState::Parsed {
            return Ok(self.state);
        }

        if self.storage.active_generation()?.as_deref() == Some(self.version.as_str()) {
            self.state = WorkerState::Activated;
            self.clients_claimed = true;
        } else if self.storage.generations()?.contains(&self.version) {
            self.state = WorkerState::Waiting;
        }
        Ok(self.state)
    }

    /// Pre-cache the whole manifest into the current generation.
    ///
    /// Any failed or unusable response aborts the install with nothing
    /// written and leaves the proxy redundant. With skip-waiting enabled a
    /// successful install activates immediately.
    pub async fn install(&mut self) -> std::result::Result<InstallReport, CacheError> {
        if !matches!(self.state, WorkerState::Parsed | WorkerState::Redundant) {
            return Err(CacheError::Lifecycle(format!(
                "cannot install from state '{}'",
                self.state
            )));
        }

        self.state = WorkerState::Installing;
        log::info!(
            "Installing generation {} ({} assets)",
            self.version,
            self.manifest.len()
        );

        let fetches = self.manifest.urls().iter().map(|url| {
            let fetcher = Arc::clone(&self.fetcher);
            let request = Request::get(url.clone());
            async move {
                let response = fetcher.fetch(&request).await?;
                if !response.is_cacheable() {
                    return Err(FetchError::BadStatus {
                        status: response.status,
                        url: request.url.to_string(),
                    });
                }
                Ok::<_, FetchError>((request.key(), response))
            }
        });

        let entries = match try_join_all(fetches).await {
            Ok(entries) => entries,
            Err(source) => {
                log::warn!("Install of {} failed: {}", self.version, source);
                self.state = WorkerState::Redundant;
                return Err(CacheError::InstallFailed {
                    generation: self.version.clone(),
                    source,
                });
            }
        };

        if let Err(e) = self.storage.put_all(&self.version, &entries) {
            self.state = WorkerState::Redundant;
            return Err(e);
        }

        self.state = WorkerState::Waiting;
        let cached = entries.iter().map(|(key, _)| key.url.clone()).collect();

        let activation = if self.skip_waiting {
            Some(self.activate()?)
        } else {
            None
        };

        Ok(InstallReport {
            generation: self.version.clone(),
            cached,
            activation,
        })
    }

    /// Delete every generation but the current one and take control of
    /// open clients.
    pub fn activate(&mut self) -> std::result::Result<ActivateReport, CacheError> {
        if self.state != WorkerState::Waiting {
            return Err(CacheError::Lifecycle(format!(
                "cannot activate from state '{}'",
                self.state
            )));
        }

        self.state = WorkerState::Activating;

        let deleted = match self
            .delete_stale_generations()
            .and_then(|deleted| self.storage.set_active(&self.version).map(|()| deleted))
        {
            Ok(deleted) => deleted,
            Err(e) => {
                self.state = WorkerState::Waiting;
                return Err(e);
            }
        };

        self.clients_claimed = true;
        self.state = WorkerState::Activated;
        log::info!("Activated generation {}", self.version);

        Ok(ActivateReport {
            generation: self.version.clone(),
            deleted,
            clients_claimed: self.clients_claimed,
        })
    }

    fn delete_stale_generations(&self) -> std::result::Result<Vec<String>, CacheError> {
        let mut deleted = Vec::new();
        for name in self.storage.generations()? {
            if name == self.version {
                continue;
            }
            if self.storage.delete_generation(&name)? {
                log::info!("Deleted stale cache generation {}", name);
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Generation that answers intercepted fetches: this one once it is
    /// activating, otherwise the one a previous version left active.
    fn serving_generation(&self) -> Option<String> {
        if matches!(
            self.state,
            WorkerState::Activating | WorkerState::Activated
        ) {
            return Some(self.version.clone());
        }

        match self.storage.active_generation() {
            Ok(Some(active)) if active != self.version => Some(active),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to read active cache generation: {}", e);
                None
            }
        }
    }

    fn context(&self, generation: String) -> PolicyContext {
        PolicyContext {
            storage: Arc::clone(&self.storage),
            fetcher: Arc::clone(&self.fetcher),
            rules: Arc::clone(&self.rules),
            generation,
        }
    }

    /// Answer a navigation with the app shell, fetched through the
    /// navigation policy. A failed or non-OK shell fetch falls back to the
    /// cached shell.
    async fn navigate(
        &self,
        ctx: &PolicyContext,
        request: &Request,
    ) -> std::result::Result<Served, FetchError> {
        let shell_request = Request::navigate(self.rules.app_shell().clone());
        let shell_key = shell_request.key();

        let mut served = self.navigation_policy.respond(ctx, &shell_request).await?;

        if served.source == ResponseSource::Network && !served.response.is_ok() {
            log::debug!(
                "App shell fetch returned {}, trying cache",
                served.response.status
            );
            if let Some(cached) = ctx.lookup(&shell_key) {
                served = Served::new(cached, ResponseSource::Cache);
            }
        }

        if served.source == ResponseSource::Cache && request.key() != shell_key {
            served.source = ResponseSource::Fallback;
        }
        Ok(served)
    }

    /// Decide how to answer `request`
    pub async fn handle_fetch(
        &self,
        request: &Request,
    ) -> std::result::Result<FetchOutcome, FetchError> {
        let Some(generation) = self.serving_generation() else {
            return Ok(FetchOutcome::PassThrough);
        };

        match self.rules.classify(request) {
            RequestClass::Bypass => Ok(FetchOutcome::PassThrough),
            RequestClass::Navigation => {
                let ctx = self.context(generation);
                self.navigate(&ctx, request)
                    .await
                    .map(FetchOutcome::Responded)
            }
            RequestClass::Asset => self
                .asset_policy
                .respond(&self.context(generation), request)
                .await
                .map(FetchOutcome::Responded),
        }
    }

    /// Serve `request` as the application would see it: intercepted
    /// requests through their policy, the rest straight from the network.
    pub async fn fetch(&self, request: &Request) -> std::result::Result<Served, FetchError> {
        match self.handle_fetch(request).await? {
            FetchOutcome::Responded(served) => Ok(served),
            FetchOutcome::PassThrough => {
                let response = self.fetcher.fetch(request).await?;
                Ok(Served::new(response, ResponseSource::Passthrough))
            }
        }
    }
}
