//! Network boundary for the cache proxy

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use url::Url;

use super::request::{Request, Response, ResponseType};
use crate::error::FetchError;

/// Network fetch capability.
///
/// An HTTP error status is still a resolved `Response`; only transport
/// failures are `FetchError`s.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// reqwest-backed fetcher. Responses from the app origin are `basic`,
/// everything else `cors`.
pub struct HttpFetcher {
    http: HttpClient,
    origin: Url,
}

impl HttpFetcher {
    pub fn new(origin: Url) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .user_agent(concat!("dashcache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self { http, origin })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        log::debug!("Network fetch: {} {}", request.method, request.url);

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        let response_type = if final_url.origin() == self.origin.origin() {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        };

        Ok(Response {
            url: final_url.as_str().to_string(),
            status,
            headers,
            body,
            response_type,
            fetched_at: chrono::Utc::now(),
        })
    }
}
