//! Configuration management for TripScope

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable prefix for layered overrides
pub const ENV_PREFIX: &str = "TRIPSCOPE";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Search backend connection
    pub elasticsearch: ElasticsearchConfig,

    /// Index names
    pub indices: IndexConfig,

    /// Query defaults and limits
    pub query: QueryConfig,

    /// Result cache
    pub cache: CacheConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Elasticsearch connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    /// Base URL (takes precedence over `cloud_id`)
    pub url: Option<String>,
    /// Elastic Cloud deployment id
    pub cloud_id: Option<String>,
    /// Basic auth user
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
    /// API key (takes precedence over basic auth)
    pub api_key: Option<String>,
    /// Connection-level retries for requests that never reached the server
    pub max_retries: u32,
    /// TCP connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: None,
            cloud_id: None,
            username: None,
            password: None,
            api_key: None,
            max_retries: 3,
            connect_timeout: Duration::from_secs(3),
        }
    }
}

impl ElasticsearchConfig {
    /// Resolve the HTTP endpoint from either `url` or `cloud_id`
    pub fn endpoint(&self) -> Result<String> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.trim_end_matches('/').to_string());
        }

        match self.cloud_id.as_deref() {
            Some(cloud_id) => decode_cloud_id(cloud_id),
            None => Err(Error::config(
                "either elasticsearch.url or elasticsearch.cloud_id must be set",
            )),
        }
    }
}

/// Decode an Elastic Cloud id (`name:base64(host$es_uuid$kibana_uuid)`) into an endpoint
pub fn decode_cloud_id(cloud_id: &str) -> Result<String> {
    let encoded = cloud_id
        .split_once(':')
        .map_or(cloud_id, |(_, encoded)| encoded);

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::config(format!("cloud_id is not valid base64: {e}")))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| Error::config(format!("cloud_id is not valid UTF-8: {e}")))?;

    let mut parts = decoded.split('$');
    let host = parts.next().filter(|h| !h.is_empty());
    let es_uuid = parts.next().filter(|u| !u.is_empty());

    match (host, es_uuid) {
        (Some(host), Some(es_uuid)) => {
            // host may carry an explicit port, e.g. "region.gcp.elastic-cloud.com:443"
            let (host, port) = match host.rsplit_once(':') {
                Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) => (h, p),
                _ => (host, "443"),
            };
            Ok(format!("https://{es_uuid}.{host}:{port}"))
        }
        _ => Err(Error::config("cloud_id does not contain host and cluster id")),
    }
}

/// Index names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Trip documents
    pub trips: String,
    /// Driver location samples
    pub ride_locations: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            trips: "prod_trips".to_string(),
            ride_locations: "prod_ride_location_history".to_string(),
        }
    }
}

/// Query defaults and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Timeout for plain searches
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
    /// Timeout for aggregation-heavy searches
    #[serde(with = "humantime_serde")]
    pub analytics_timeout: Duration,
    /// Default trip page size
    pub default_size: u32,
    /// Default location page size
    pub location_default_size: u32,
    /// Cap on custom trip-search windows
    pub max_custom_range_days: i64,
    /// In-flight lookups during bulk polyline validation
    pub bulk_validation_concurrency: usize,
    /// Maximum ids accepted by bulk polyline validation
    pub max_bulk_ids: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            analytics_timeout: Duration::from_secs(60),
            default_size: 100,
            location_default_size: 500,
            max_custom_range_days: 365,
            bulk_validation_concurrency: 4,
            max_bulk_ids: 100,
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether trip searches are memoized
    pub enabled: bool,
    /// Maximum age of a cached result
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_millis(300_000),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then a TOML file, then `TRIPSCOPE__*` environment overrides.
    ///
    /// When `path` is `None` the per-user config file is used if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file");
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(path) = default_config_path().filter(|p| p.exists()) {
                    debug!(path = %path.display(), "Loading default configuration file");
                    builder = builder.add_source(config::File::from(path).required(false));
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;
        config.apply_legacy_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply the historical `ELASTIC_*` variables on top of the layered config
    pub fn apply_legacy_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(cloud_id) = lookup("ELASTIC_CLOUD_ID").filter(|v| !v.is_empty()) {
            self.elasticsearch.cloud_id = Some(cloud_id);
        }
        if let Some(username) = lookup("ELASTIC_USERNAME").filter(|v| !v.is_empty()) {
            self.elasticsearch.username = Some(username);
        }
        if let Some(password) = lookup("ELASTIC_PASSWORD").filter(|v| !v.is_empty()) {
            self.elasticsearch.password = Some(password);
        }
    }
}

/// Per-user configuration file location
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tripscope")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
