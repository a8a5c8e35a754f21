//! Request classification and storage eligibility

use regex::RegexSet;
use reqwest::Method;
use url::Url;

use super::request::{Request, RequestMode};
use crate::config::ProxyConfig;
use crate::error::{ConfigError, Result};

/// How the proxy treats a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Top-level page load; served network-first with the app shell as fallback
    Navigation,
    /// Never intercepted: non-GET or generative-AI traffic
    Bypass,
    /// Everything else
    Asset,
}

/// Origin, bypass and allow-list rules for one deployment
#[derive(Debug, Clone)]
pub struct RoutingRules {
    origin: Url,
    app_shell: Url,
    bypass_hosts: Vec<String>,
    cdn_allow: RegexSet,
}

impl RoutingRules {
    pub fn new(
        origin: Url,
        app_shell: &str,
        bypass_hosts: Vec<String>,
        cdn_allow: &[String],
    ) -> Result<Self> {
        let app_shell = origin
            .join(app_shell)
            .map_err(|e| ConfigError::Invalid(format!("app shell '{}': {}", app_shell, e)))?;
        let cdn_allow = RegexSet::new(cdn_allow)
            .map_err(|e| ConfigError::Invalid(format!("CDN allow-list: {}", e)))?;

        Ok(Self {
            origin,
            app_shell,
            bypass_hosts: bypass_hosts
                .into_iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            cdn_allow,
        })
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| ConfigError::Invalid(format!("proxy.origin '{}': {}", config.origin, e)))?;
        Self::new(
            origin,
            &config.app_shell,
            config.bypass_hosts.clone(),
            &config.cdn_allow,
        )
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn app_shell(&self) -> &Url {
        &self.app_shell
    }

    /// Classify a request. Navigation is checked first, but only GET
    /// navigations qualify.
    pub fn classify(&self, request: &Request) -> RequestClass {
        if request.mode == RequestMode::Navigate && request.method == Method::GET {
            return RequestClass::Navigation;
        }
        if request.method != Method::GET || self.is_bypass_host(&request.url) {
            return RequestClass::Bypass;
        }
        RequestClass::Asset
    }

    fn is_bypass_host(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| {
                let host = host.to_ascii_lowercase();
                self.bypass_hosts.iter().any(|b| *b == host)
            })
            .unwrap_or(false)
    }

    /// Same origin as the app, or matched by the CDN allow-list
    pub fn may_store(&self, url: &Url) -> bool {
        if self.is_bypass_host(url) {
            return false;
        }
        url.origin() == self.origin.origin() || self.cdn_allow.is_match(url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RoutingRules {
        RoutingRules::from_config(&ProxyConfig::default()).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_navigation_classified_first() {
        let request = Request::navigate(url("http://localhost:3000/templates/mrr"));
        assert_eq!(rules().classify(&request), RequestClass::Navigation);
    }

    #[test]
    fn test_non_get_navigation_bypasses() {
        let request = Request::new(
            Method::POST,
            url("http://localhost:3000/form"),
            RequestMode::Navigate,
        );
        assert_eq!(rules().classify(&request), RequestClass::Bypass);
    }

    #[test]
    fn test_ai_host_bypasses() {
        let request = Request::get(url(
            "https://generativelanguage.googleapis.com/v1beta/models/gemini:generateContent",
        ));
        assert_eq!(rules().classify(&request), RequestClass::Bypass);
    }

    #[test]
    fn test_post_bypasses() {
        let request = Request::new(
            Method::POST,
            url("http://localhost:3000/index.tsx"),
            RequestMode::Subresource,
        );
        assert_eq!(rules().classify(&request), RequestClass::Bypass);
    }

    #[test]
    fn test_asset_get() {
        let request = Request::get(url("http://localhost:3000/index.tsx"));
        assert_eq!(rules().classify(&request), RequestClass::Asset);
    }

    #[test]
    fn test_may_store_own_origin_and_cdn() {
        let rules = rules();
        assert!(rules.may_store(&url("http://localhost:3000/index.tsx")));
        assert!(rules.may_store(&url("https://esm.sh/react@19")));
        assert!(rules.may_store(&url("https://cdn.jsdelivr.net/npm/chart.js")));
        assert!(rules.may_store(&url("https://fonts.gstatic.com/s/inter.woff2")));
    }

    #[test]
    fn test_may_not_store_unlisted_origins() {
        let rules = rules();
        assert!(!rules.may_store(&url("https://tracker.example/pixel.gif")));
        assert!(!rules.may_store(&url("http://localhost:4000/index.tsx")));
        assert!(!rules.may_store(&url("https://generativelanguage.googleapis.com/v1/models")));
    }

    #[test]
    fn test_bypass_host_matching_ignores_case() {
        let rules = RoutingRules::new(
            url("http://localhost:3000"),
            "/index.html",
            vec!["GenerativeLanguage.example".to_string()],
            &[],
        )
        .unwrap();
        let request = Request::get(url("https://generativelanguage.example/v1/generate"));
        assert_eq!(rules.classify(&request), RequestClass::Bypass);
    }

    #[test]
    fn test_app_shell_resolved_against_origin() {
        assert_eq!(
            rules().app_shell().as_str(),
            "http://localhost:3000/index.html"
        );
    }
}
