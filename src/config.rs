//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which document store implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Remote search cluster over HTTP
    Elasticsearch,
    /// In-process store, populated from the seed file
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "elasticsearch" | "elastic" => Ok(StoreBackend::Elasticsearch),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service name shown in logs
    pub project_name: String,
    /// HTTP server port
    pub server_port: u16,
    /// Search cluster host
    pub elastic_host: String,
    /// Search cluster port
    pub elastic_port: u16,
    /// Index holding film documents
    pub index_name: String,
    pub store_backend: StoreBackend,
    /// When false every lookup goes to the store
    pub cache_enabled: bool,
    /// Maximum number of entries the cache can hold
    pub cache_max_entries: usize,
    /// Lifetime of cached entities
    pub cache_ttl: Duration,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Bound on each cache call
    pub cache_timeout: Duration,
    /// Bound on each store call
    pub store_timeout: Duration,
    /// Coalesce concurrent misses on the same key
    pub single_flight: bool,
    /// JSON index settings/mappings; an empty body when unset
    pub index_schema_path: Option<PathBuf>,
    /// JSON array of film rows loaded at startup
    pub seed_file: Option<PathBuf>,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `PROJECT_NAME` - Service name (default: movies)
    /// - `SERVER_PORT` - HTTP server port (default: 8000)
    /// - `ELASTIC_HOST` / `ELASTIC_PORT` - Search cluster (default: 127.0.0.1:9200)
    /// - `INDEX_NAME` - Film index (default: movies)
    /// - `STORE_BACKEND` - `elasticsearch` or `memory` (default: elasticsearch)
    /// - `CACHE_ENABLED` - Use the cache at all (default: true)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10000)
    /// - `CACHE_TTL` - Entry lifetime in seconds (default: 300)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `CACHE_TIMEOUT_MS` - Cache call bound (default: 250)
    /// - `STORE_TIMEOUT_MS` - Store call bound (default: 5000)
    /// - `SINGLE_FLIGHT` - Coalesce concurrent misses (default: false)
    /// - `INDEX_SCHEMA_PATH` - Index schema file (optional)
    /// - `SEED_FILE` - Rows to load at startup (optional)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            project_name: env_or("PROJECT_NAME", defaults.project_name),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            elastic_host: env_or("ELASTIC_HOST", defaults.elastic_host),
            elastic_port: env_or("ELASTIC_PORT", defaults.elastic_port),
            index_name: env_or("INDEX_NAME", defaults.index_name),
            store_backend: env_or("STORE_BACKEND", defaults.store_backend),
            cache_enabled: env_or("CACHE_ENABLED", defaults.cache_enabled),
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_ttl: Duration::from_secs(env_or("CACHE_TTL", defaults.cache_ttl.as_secs())),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            cache_timeout: Duration::from_millis(env_or("CACHE_TIMEOUT_MS", 250)),
            store_timeout: Duration::from_millis(env_or("STORE_TIMEOUT_MS", 5000)),
            single_flight: env_or("SINGLE_FLIGHT", defaults.single_flight),
            index_schema_path: env_path("INDEX_SCHEMA_PATH"),
            seed_file: env_path("SEED_FILE"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_name: "movies".to_string(),
            server_port: 8000,
            elastic_host: "127.0.0.1".to_string(),
            elastic_port: 9200,
            index_name: "movies".to_string(),
            store_backend: StoreBackend::Elasticsearch,
            cache_enabled: true,
            cache_max_entries: 10_000,
            cache_ttl: Duration::from_secs(300),
            cleanup_interval: 1,
            cache_timeout: Duration::from_millis(250),
            store_timeout: Duration::from_millis(5000),
            single_flight: false,
            index_schema_path: None,
            seed_file: None,
        }
    }
}
