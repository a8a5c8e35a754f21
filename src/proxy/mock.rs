//! Scripted fetcher for testing the proxy without a network

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

use super::fetch::Fetcher;
use super::request::{Request, Response, ResponseType};
use crate::error::FetchError;

#[derive(Debug, Clone)]
enum Scripted {
    Respond {
        status: u16,
        body: Vec<u8>,
        response_type: ResponseType,
    },
    Fail,
}

/// Mock fetcher.
///
/// Configure per-URL responses via builder methods; unscripted URLs fail
/// like an offline network.
#[derive(Clone)]
pub struct MockFetcher {
    origin: Url,
    script: Arc<Mutex<HashMap<String, Scripted>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: Url::parse(origin).expect("valid test origin"),
            script: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn resolve(&self, url: &str) -> String {
        self.origin
            .join(url)
            .expect("valid test url")
            .as_str()
            .to_string()
    }

    /// Respond to `url` (relative to the origin, or absolute)
    pub fn with_response(self, url: &str, status: u16, body: &str) -> Self {
        self.respond(url, status, body);
        self
    }

    pub fn with_failure(self, url: &str) -> Self {
        self.fail(url);
        self
    }

    /// Re-script `url` with a new response
    pub fn respond(&self, url: &str, status: u16, body: &str) {
        let full = self.resolve(url);
        let response_type = match Url::parse(&full) {
            Ok(u) if u.origin() == self.origin.origin() => ResponseType::Basic,
            _ => ResponseType::Cors,
        };
        self.script.lock().unwrap().insert(
            full,
            Scripted::Respond {
                status,
                body: body.as_bytes().to_vec(),
                response_type,
            },
        );
    }

    /// Re-script `url` as a network failure
    pub fn fail(&self, url: &str) {
        let full = self.resolve(url);
        self.script.lock().unwrap().insert(full, Scripted::Fail);
    }

    /// Number of fetches issued for `url`
    pub fn calls_to(&self, url: &str) -> usize {
        let full = self.resolve(url);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| **u == full)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = request.url.as_str().to_string();
        self.calls.lock().unwrap().push(url.clone());

        let scripted = self.script.lock().unwrap().get(&url).cloned();
        match scripted {
            Some(Scripted::Respond {
                status,
                body,
                response_type,
            }) => Ok(Response::new(&request.url, status, body, response_type)),
            Some(Scripted::Fail) | None => {
                Err(FetchError::Network(format!("offline: {}", url)))
            }
        }
    }
}
