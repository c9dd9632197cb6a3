//! Configuration Module
//!
//! Host settings loaded from environment variables, and the cache settings
//! (route rules plus global options) loaded from JSON or taken from the
//! built-in defaults.

use std::collections::{BTreeSet, HashMap};
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::EvictionPolicy;
use crate::error::{CacheError, Result};
use crate::network::OPAQUE_STATUS;

// == Strategy Kind ==
/// Fetch strategy of a route rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    NetworkFirst,
    CacheFirst,
    StaleWhileRevalidate,
}

// == Route Rule ==
/// Maps a request pattern to a strategy and a named store.
///
/// `pattern` is a regular expression matched anywhere in the request URL
/// (anchor it with `^` to match from the start). `method`, when set, limits
/// the rule to that request method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    pub pattern: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(alias = "handler")]
    pub strategy: StrategyKind,
    #[serde(alias = "cacheName")]
    pub store_name: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Falls back to `CacheSettings::default_cacheable_statuses` when absent
    #[serde(default)]
    pub cacheable_statuses: Option<BTreeSet<u16>>,
    #[serde(default)]
    pub max_entries: Option<usize>,
    #[serde(default)]
    pub max_age_seconds: Option<u64>,
    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,
}

fn default_case_insensitive() -> bool {
    true
}

impl RouteRule {
    pub fn new(
        pattern: impl Into<String>,
        strategy: StrategyKind,
        store_name: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            method: None,
            strategy,
            store_name: store_name.into(),
            timeout_ms: None,
            cacheable_statuses: None,
            max_entries: None,
            max_age_seconds: None,
            case_insensitive: true,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_cacheable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.cacheable_statuses = Some(statuses.into_iter().collect());
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn with_max_age_seconds(mut self, max_age_seconds: u64) -> Self {
        self.max_age_seconds = Some(max_age_seconds);
        self
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive = false;
        self
    }

    /// Eviction limits this rule declares for its store.
    pub fn policy(&self) -> EvictionPolicy {
        EvictionPolicy::new(self.max_entries, self.max_age_seconds)
    }
}

// == Cache Settings ==
/// Everything the cache manager is initialized from.
///
/// Rule order is significant: the first matching rule wins, so overlapping
/// patterns must be listed most specific first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    /// Leading part of every store namespace
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Deployment token; changing it invalidates every persisted store
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_cacheable_statuses")]
    pub default_cacheable_statuses: BTreeSet<u16>,
    pub rules: Vec<RouteRule>,
}

fn default_prefix() -> String {
    "runtime".to_string()
}

fn default_version() -> String {
    "v1".to_string()
}

fn default_cacheable_statuses() -> BTreeSet<u16> {
    [OPAQUE_STATUS, 200].into_iter().collect()
}

impl Default for CacheSettings {
    /// The rules of the original deployment: the REST API and a local
    /// development server, both network-first with a 10 second timeout.
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            version: default_version(),
            default_cacheable_statuses: default_cacheable_statuses(),
            rules: vec![
                RouteRule::new(r"^https?://.*/api/.*", StrategyKind::NetworkFirst, "api-cache")
                    .with_timeout_ms(10_000)
                    .with_max_entries(100)
                    .with_max_age_seconds(60 * 60 * 24),
                RouteRule::new(
                    r"^https?://(localhost|127\.0\.0\.1|10\.\d+\.\d+\.\d+|192\.168\.\d+\.\d+|172\.\d+\.\d+\.\d+):3000/.*",
                    StrategyKind::NetworkFirst,
                    "local-api-cache",
                )
                .with_timeout_ms(10_000),
            ],
        }
    }
}

impl CacheSettings {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Parses settings from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CacheError::Configuration(format!("invalid cache settings: {}", e)))
    }

    /// Reads settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            CacheError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Backend namespace for a store: `{prefix}-{store}-{version}`.
    pub fn namespace_for(&self, store_name: &str) -> String {
        format!("{}-{}-{}", self.prefix, store_name, self.version)
    }

    /// Statuses a rule persists, after applying the global default.
    pub fn cacheable_statuses_for(&self, rule: &RouteRule) -> BTreeSet<u16> {
        rule.cacheable_statuses
            .clone()
            .unwrap_or_else(|| self.default_cacheable_statuses.clone())
    }

    // == Validate ==
    /// Static checks on the rule set. Pattern syntax is checked when the
    /// matcher compiles the rules.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(CacheError::Configuration(
                "store prefix cannot be empty".to_string(),
            ));
        }
        if self.prefix.contains('-') {
            return Err(CacheError::Configuration(format!(
                "store prefix '{}' cannot contain '-'",
                self.prefix
            )));
        }

        let mut policies: HashMap<&str, EvictionPolicy> = HashMap::new();
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.store_name.is_empty() {
                return Err(CacheError::Configuration(format!(
                    "rule #{} ({}) has an empty store name",
                    index, rule.pattern
                )));
            }
            if rule.max_entries == Some(0) {
                return Err(CacheError::Configuration(format!(
                    "rule #{} ({}) sets maxEntries to 0",
                    index, rule.pattern
                )));
            }
            match policies.get(rule.store_name.as_str()) {
                Some(existing) if *existing != rule.policy() => {
                    return Err(CacheError::Configuration(format!(
                        "store '{}' is shared by rules with different eviction limits",
                        rule.store_name
                    )));
                }
                Some(_) => {}
                None => {
                    policies.insert(rule.store_name.as_str(), rule.policy());
                }
            }
        }
        Ok(())
    }
}

// == Host Config ==
/// Settings of the caching proxy binary.
///
/// All values can be configured via environment variables with sensible
/// defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Base URL requests are forwarded to
    pub upstream_url: String,
    /// Optional JSON cache settings; built-in defaults when absent
    pub rules_file: Option<PathBuf>,
    /// Directory for the disk backend; memory backend when absent
    pub storage_dir: Option<PathBuf>,
    /// Seconds between expiry sweeps, 0 disables the sweep task
    pub sweep_interval: u64,
    /// Upstream connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `UPSTREAM_URL` - Upstream base URL (default: http://127.0.0.1:8080)
    /// - `CACHE_RULES_FILE` - Cache settings JSON (default: built-in rules)
    /// - `STORAGE_DIR` - Disk backend directory (default: in-memory)
    /// - `SWEEP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    /// - `CONNECT_TIMEOUT_MS` - Upstream connect timeout (default: 5000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            upstream_url: env::var("UPSTREAM_URL")
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.upstream_url),
            rules_file: env::var("CACHE_RULES_FILE")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            storage_dir: env::var("STORAGE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            sweep_interval: env::var("SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_interval),
            connect_timeout_ms: env::var("CONNECT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.connect_timeout_ms),
        }
    }

    /// Loads the cache settings this host runs with.
    pub fn cache_settings(&self) -> Result<CacheSettings> {
        match &self.rules_file {
            Some(path) => CacheSettings::from_json_file(path),
            None => Ok(CacheSettings::default()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            upstream_url: "http://127.0.0.1:8080".to_string(),
            rules_file: None,
            storage_dir: None,
            sweep_interval: 60,
            connect_timeout_ms: 5_000,
        }
    }
}
