//! Request and response snapshots seen by the cache proxy

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Whether a request is a top-level page navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    Navigate,
    Subresource,
}

/// An intercepted request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
}

impl Request {
    pub fn new(method: Method, url: Url, mode: RequestMode) -> Self {
        Self { method, url, mode }
    }

    /// Subresource GET
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url, RequestMode::Subresource)
    }

    /// Top-level page navigation
    pub fn navigate(url: Url) -> Self {
        Self::new(Method::GET, url, RequestMode::Navigate)
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// Cache identity of a request: method plus URL without its fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.as_str().to_string(),
            url: url.into(),
        }
    }

    /// Deterministic SHA-256 digest used as the storage key
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b"|");
        hasher.update(self.url.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// How a response relates to the app origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin
    Basic,
    /// Readable cross-origin
    Cors,
    /// Cross-origin with hidden status and body
    Opaque,
    /// Network-level error placeholder
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::Error => "error",
        }
    }
}

/// Immutable capture of a network response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub response_type: ResponseType,
    pub fetched_at: DateTime<Utc>,
}

impl Response {
    pub fn new(url: &Url, status: u16, body: impl Into<Vec<u8>>, response_type: ResponseType) -> Self {
        Self {
            url: url.as_str().to_string(),
            status,
            headers: Vec::new(),
            body: body.into(),
            response_type,
            fetched_at: Utc::now(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// 2xx status
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Safe to store: successful and fully readable
    pub fn is_cacheable(&self) -> bool {
        self.is_ok() && matches!(self.response_type, ResponseType::Basic | ResponseType::Cors)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_key_digest_deterministic() {
        let a = Request::get(url("http://localhost:3000/index.html")).key();
        let b = Request::get(url("http://localhost:3000/index.html")).key();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_key_distinguishes_method() {
        let u = url("http://localhost:3000/api");
        let get = RequestKey::new(&Method::GET, &u);
        let post = RequestKey::new(&Method::POST, &u);
        assert_ne!(get.digest(), post.digest());
    }

    #[test]
    fn test_key_ignores_fragment() {
        let plain = Request::get(url("http://localhost:3000/a.js")).key();
        let anchored = Request::get(url("http://localhost:3000/a.js#section")).key();
        assert_eq!(plain, anchored);
        assert_eq!(anchored.url, "http://localhost:3000/a.js");
        assert_eq!(plain.digest(), anchored.digest());
    }

    #[test]
    fn test_key_distinguishes_query() {
        let a = Request::get(url("https://fonts.googleapis.com/css2?family=Inter")).key();
        let b = Request::get(url("https://fonts.googleapis.com/css2?family=Mono")).key();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_display() {
        let key = Request::get(url("http://localhost:3000/a.js")).key();
        assert_eq!(key.to_string(), "GET http://localhost:3000/a.js");
    }

    #[test]
    fn test_cacheable_requires_ok_and_readable() {
        let u = url("http://localhost:3000/a.js");
        assert!(Response::new(&u, 200, "x", ResponseType::Basic).is_cacheable());
        assert!(Response::new(&u, 204, "", ResponseType::Cors).is_cacheable());
        assert!(!Response::new(&u, 404, "", ResponseType::Basic).is_cacheable());
        assert!(!Response::new(&u, 200, "", ResponseType::Opaque).is_cacheable());
        assert!(!Response::new(&u, 200, "", ResponseType::Error).is_cacheable());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let u = url("http://localhost:3000/a.js");
        let response = Response::new(&u, 200, "x", ResponseType::Basic)
            .with_header("Content-Type", "text/javascript");
        assert_eq!(response.header("content-type"), Some("text/javascript"));
        assert_eq!(response.header("etag"), None);
    }
}
