//! Configuration management for dashcache

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{ConfigError, Result};
use crate::proxy::CachePolicy;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Durable state store settings
    #[serde(default)]
    pub state: StateConfig,

    /// Offline cache proxy settings
    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// Durable state store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Namespace prepended to every slot key
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// SQLite database path (defaults to the user data directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Maximum bytes of keys plus values the store accepts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<usize>,
}

/// Offline cache proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Version tag naming the current cache generation; bump on deployment
    #[serde(default = "default_version")]
    pub version: String,

    /// The application's own origin
    #[serde(default = "default_origin")]
    pub origin: String,

    /// App shell served to navigations when the network is down
    #[serde(default = "default_app_shell")]
    pub app_shell: String,

    /// Assets pre-cached at install time, in order
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Regular expressions for third-party URLs that may be cached
    #[serde(default = "default_cdn_allow")]
    pub cdn_allow: Vec<String>,

    /// Hosts that are never intercepted (generative-AI API)
    #[serde(default = "default_bypass_hosts")]
    pub bypass_hosts: Vec<String>,

    /// Activate immediately after a successful install
    #[serde(default = "default_skip_waiting")]
    pub skip_waiting: bool,

    /// Policy for top-level navigations
    #[serde(default = "default_navigation_policy")]
    pub navigation_policy: CachePolicy,

    /// Policy for every other interceptable GET
    #[serde(default = "default_asset_policy")]
    pub asset_policy: CachePolicy,

    /// Directory holding the cache database (defaults to the user cache directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

fn default_prefix() -> String {
    "dashlib".to_string()
}

fn default_version() -> String {
    "dashlib-ai-v1".to_string()
}

fn default_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_app_shell() -> String {
    "/index.html".to_string()
}

fn default_manifest() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/index.tsx",
        "/manifest.json",
        "https://cdn.tailwindcss.com",
        "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&display=swap",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_cdn_allow() -> Vec<String> {
    [r"esm\.sh", r"cdn\.jsdelivr\.net", r"fonts\.gstatic\.com"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_bypass_hosts() -> Vec<String> {
    vec!["generativelanguage.googleapis.com".to_string()]
}

fn default_skip_waiting() -> bool {
    true
}

fn default_navigation_policy() -> CachePolicy {
    CachePolicy::NetworkFirst
}

fn default_asset_policy() -> CachePolicy {
    CachePolicy::StaleWhileRevalidate
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            path: None,
            quota_bytes: None,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            origin: default_origin(),
            app_shell: default_app_shell(),
            manifest: default_manifest(),
            cdn_allow: default_cdn_allow(),
            bypass_hosts: default_bypass_hosts(),
            skip_waiting: default_skip_waiting(),
            navigation_policy: default_navigation_policy(),
            asset_policy: default_asset_policy(),
            cache_dir: None,
        }
    }
}

impl StateConfig {
    /// Resolve the state database path
    pub fn resolve_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
            .ok_or_else(|| {
                ConfigError::Invalid("Could not determine data directory".to_string())
            })?;
        Ok(data_dir.join("dashcache").join("state.db"))
    }
}

impl ProxyConfig {
    /// Resolve the cache directory
    pub fn resolve_cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_base = dirs::cache_dir().ok_or_else(|| {
            ConfigError::Invalid("Could not determine cache directory".to_string())
        })?;
        Ok(cache_base.join("dashcache"))
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".dashcache").join("config.yaml"))
    }

    /// Resolve the config path from an optional override
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load configuration from an explicit path or the default location.
    ///
    /// A missing default file yields the built-in defaults; a missing
    /// explicit file is an error.
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(Path::new(p)),
            None => {
                let default = Self::default_path()?;
                if default.exists() {
                    Self::load_from(&default)
                } else {
                    log::debug!("No config at {}, using defaults", default.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to an explicit path or the default location
    pub fn save_at(&self, path: Option<&str>) -> Result<PathBuf> {
        let path = Self::resolve_path(path)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check that the settings can drive the proxy and the state store
    pub fn validate(&self) -> Result<()> {
        if self.state.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("state.prefix must not be empty".to_string()).into());
        }

        let proxy = &self.proxy;
        if proxy.version.trim().is_empty() {
            return Err(ConfigError::Invalid("proxy.version must not be empty".to_string()).into());
        }

        let origin = Url::parse(&proxy.origin)
            .map_err(|e| ConfigError::Invalid(format!("proxy.origin '{}': {}", proxy.origin, e)))?;

        for entry in proxy.manifest.iter().chain(std::iter::once(&proxy.app_shell)) {
            origin
                .join(entry)
                .map_err(|e| ConfigError::Invalid(format!("manifest entry '{}': {}", entry, e)))?;
        }

        for pattern in &proxy.cdn_allow {
            Regex::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("proxy.cdn_allow pattern '{}': {}", pattern, e))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.state.prefix, "dashlib");
        assert_eq!(config.proxy.version, "dashlib-ai-v1");
        assert_eq!(config.proxy.manifest.len(), 6);
        assert_eq!(
            config.proxy.bypass_hosts,
            vec!["generativelanguage.googleapis.com".to_string()]
        );
        assert!(config.proxy.skip_waiting);
        assert_eq!(config.proxy.asset_policy, CachePolicy::StaleWhileRevalidate);
        assert_eq!(config.proxy.navigation_policy, CachePolicy::NetworkFirst);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "proxy:\n  version: dashlib-ai-v7\n  asset_policy: cache-first\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.proxy.version, "dashlib-ai-v7");
        assert_eq!(config.proxy.asset_policy, CachePolicy::CacheFirst);
        assert_eq!(config.proxy.app_shell, "/index.html");
        assert_eq!(config.state.prefix, "dashlib");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.proxy.version = "dashlib-ai-v2".to_string();
        config.state.quota_bytes = Some(1024);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.proxy.version, "dashlib-ai-v2");
        assert_eq!(loaded.state.quota_bytes, Some(1024));
    }

    #[test]
    fn test_missing_explicit_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.yaml");

        let err = Config::load_at(path.to_str()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Config(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let mut config = Config::default();
        config.proxy.cdn_allow.push("esm\\.(sh".to_string());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cdn_allow"));
    }

    #[test]
    fn test_validate_rejects_bad_origin() {
        let mut config = Config::default();
        config.proxy.origin = "localhost without scheme".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_version() {
        let mut config = Config::default();
        config.proxy.version = "  ".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_paths_win() {
        let mut config = Config::default();
        config.state.path = Some(PathBuf::from("/tmp/state.db"));
        config.proxy.cache_dir = Some(PathBuf::from("/tmp/cache"));

        assert_eq!(
            config.state.resolve_path().unwrap(),
            PathBuf::from("/tmp/state.db")
        );
        assert_eq!(
            config.proxy.resolve_cache_dir().unwrap(),
            PathBuf::from("/tmp/cache")
        );
    }
}
