//! Caching strategies applied to intercepted requests

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::cache::CacheStorage;
use super::fetch::Fetcher;
use super::request::{Request, RequestKey, Response};
use super::routing::RoutingRules;
use crate::error::FetchError;

/// A caching strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// Serve from cache; go to the network only on a miss
    CacheFirst,
    /// Serve from the network; fall back to cache on failure
    NetworkFirst,
    /// Serve from cache immediately and refresh it in the background
    StaleWhileRevalidate,
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CachePolicy::CacheFirst => "cache-first",
            CachePolicy::NetworkFirst => "network-first",
            CachePolicy::StaleWhileRevalidate => "stale-while-revalidate",
        };
        f.write_str(name)
    }
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    /// A cached stand-in for a different request (the app shell)
    Fallback,
    /// Not intercepted; fetched straight from the network
    Passthrough,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Fallback => "fallback",
            ResponseSource::Passthrough => "passthrough",
        };
        f.write_str(name)
    }
}

/// Background refresh of a cache entry started by stale-while-revalidate.
///
/// Dropping it does not cancel the refresh.
pub struct Revalidation(JoinHandle<bool>);

impl Revalidation {
    /// Wait for the refresh; true if the cache entry was replaced
    pub async fn finished(self) -> bool {
        self.0.await.unwrap_or(false)
    }
}

/// A response produced by a policy
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
    pub revalidation: Option<Revalidation>,
}

impl Served {
    pub(crate) fn new(response: Response, source: ResponseSource) -> Self {
        Self {
            response,
            source,
            revalidation: None,
        }
    }
}

/// Everything a policy needs to serve a request from one generation
#[derive(Clone)]
pub struct PolicyContext {
    pub storage: Arc<dyn CacheStorage>,
    pub fetcher: Arc<dyn Fetcher>,
    pub rules: Arc<RoutingRules>,
    pub generation: String,
}

impl PolicyContext {
    /// Cache lookup; storage errors count as a miss
    pub(crate) fn lookup(&self, key: &RequestKey) -> Option<Response> {
        match self.storage.match_entry(&self.generation, key) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Cache lookup failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Store a network response if it is eligible; returns whether it was stored
    fn store(&self, request: &Request, response: &Response) -> bool {
        if request.method != reqwest::Method::GET
            || !response.is_cacheable()
            || !self.rules.may_store(&request.url)
        {
            return false;
        }
        match self.storage.put(&self.generation, &request.key(), response) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to cache {}: {}", request.url, e);
                false
            }
        }
    }

    async fn network(&self, request: &Request) -> Result<Response, FetchError> {
        let response = self.fetcher.fetch(request).await?;
        self.store(request, &response);
        Ok(response)
    }

    fn spawn_revalidation(&self, request: &Request) -> Revalidation {
        let ctx = self.clone();
        let request = request.clone();
        Revalidation(tokio::spawn(async move {
            match ctx.fetcher.fetch(&request).await {
                Ok(response) => {
                    let stored = ctx.store(&request, &response);
                    log::debug!("Revalidated {} (stored: {})", request.url, stored);
                    stored
                }
                Err(e) => {
                    log::debug!("Revalidation of {} failed: {}", request.url, e);
                    false
                }
            }
        }))
    }

}

impl CachePolicy {
    /// Serve `request` from the context's generation or the network
    pub async fn respond(
        &self,
        ctx: &PolicyContext,
        request: &Request,
    ) -> Result<Served, FetchError> {
        match self {
            CachePolicy::CacheFirst => {
                if let Some(cached) = ctx.lookup(&request.key()) {
                    log::debug!("Cache hit: {}", request.url);
                    return Ok(Served::new(cached, ResponseSource::Cache));
                }
                let response = ctx.network(request).await?;
                Ok(Served::new(response, ResponseSource::Network))
            }
            CachePolicy::NetworkFirst => match ctx.network(request).await {
                Ok(response) => Ok(Served::new(response, ResponseSource::Network)),
                Err(e) => {
                    log::debug!("Network failed for {}, trying cache: {}", request.url, e);
                    ctx.lookup(&request.key())
                        .map(|cached| Served::new(cached, ResponseSource::Cache))
                        .ok_or(e)
                }
            },
            CachePolicy::StaleWhileRevalidate => {
                if let Some(cached) = ctx.lookup(&request.key()) {
                    log::debug!("Cache hit: {} (revalidating)", request.url);
                    return Ok(Served {
                        response: cached,
                        source: ResponseSource::Cache,
                        revalidation: Some(ctx.spawn_revalidation(request)),
                    });
                }
                log::debug!("Cache miss: {}", request.url);
                let response = ctx.network(request).await?;
                Ok(Served::new(response, ResponseSource::Network))
            }
        }
    }
}
