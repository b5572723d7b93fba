//! `AppConfig` struct and TOML read/write.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use crl_api::content::{CacheSettings, Endpoints};
use serde::{Deserialize, Serialize};
use url::Url;

/// Environment variable overriding `api.root`.
pub const API_ROOT_ENV: &str = "CRL_API_ROOT";

/// Top-level application configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Content API settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Content API configuration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
    /// API root URL (e.g. `https://api.example.org/v1/`).
    #[serde(default)]
    pub root: Option<String>,
    /// Timeout for list requests in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Referrer sent when a command does not pass `--referer`.
    #[serde(default)]
    pub referer: Option<String>,
    /// Endpoint fragments appended to the root.
    #[serde(default)]
    pub endpoints: Endpoints,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Response cache configuration.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Whether responses are cached in memory.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Default TTL in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Maximum number of cached responses.
    #[serde(default = "default_cache_max_capacity")]
    pub max_capacity: u64,
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_true() -> bool {
    true
}

const fn default_cache_ttl_secs() -> u64 {
    300
}

const fn default_cache_max_capacity() -> u64 {
    1_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            root: None,
            timeout_secs: default_timeout_secs(),
            referer: None,
            endpoints: Endpoints::default(),
            headers: BTreeMap::new(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ttl_secs: default_cache_ttl_secs(),
            max_capacity: default_cache_max_capacity(),
        }
    }
}

impl ApiConfig {
    /// Resolves the API root, preferring `override_root` over the file value.
    ///
    /// # Errors
    ///
    /// Returns an error if no root is configured or it is not a valid URL.
    pub fn resolve_root(&self, override_root: Option<&str>) -> Result<Url> {
        let raw = override_root
            .or(self.root.as_deref())
            .with_context(|| format!("api.root is not configured (set it or {API_ROOT_ENV})"))?;
        Url::parse(raw).with_context(|| format!("invalid api.root: {raw}"))
    }

    /// Timeout for list requests.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CacheConfig {
    /// Converts to the library's cache settings.
    #[must_use]
    pub const fn settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_secs(self.ttl_secs),
            max_capacity: self.max_capacity,
        }
    }
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Saves config to a TOML file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or file write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config to TOML")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }
}
