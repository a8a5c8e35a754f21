//! Offline asset cache proxy
//!
//! Sits between the application and the network. Install pre-caches an asset
//! manifest into a versioned cache generation, activation drops older
//! generations, and intercepted requests are answered through a per-class
//! caching policy. Non-GET requests and generative-AI hosts are never
//! intercepted.

pub mod cache;
pub mod fetch;
pub mod manifest;
#[cfg(test)]
pub mod mock;
pub mod policy;
pub mod request;
pub mod routing;
pub mod sqlite;
pub mod worker;

pub use cache::{CacheStats, CacheStorage, CachedEntry, ClearStats};
pub use fetch::{Fetcher, HttpFetcher};
pub use manifest::AssetManifest;
pub use policy::{CachePolicy, ResponseSource, Served};
pub use request::{Request, RequestKey, RequestMode, Response, ResponseType};
pub use routing::{RequestClass, RoutingRules};
pub use sqlite::SqliteCacheStorage;
pub use worker::{ActivateReport, CacheProxy, FetchOutcome, InstallReport, WorkerState};
