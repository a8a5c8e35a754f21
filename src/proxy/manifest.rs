//! Assets that must be cached before the proxy can serve offline

use url::Url;

use crate::error::FetchError;

/// Ordered list of absolute asset URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
    urls: Vec<Url>,
}

impl AssetManifest {
    /// Resolve `entries` against `origin`, keeping first occurrences in order
    pub fn resolve(origin: &Url, entries: &[String]) -> Result<Self, FetchError> {
        let mut urls: Vec<Url> = Vec::with_capacity(entries.len());
        for entry in entries {
            let url = origin.join(entry)?;
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Ok(Self { urls })
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
