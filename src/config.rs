//! Store configuration.
//! Loaded from a JSON file when one is given, then overridden by
//! `I18N_STORE_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Cached mappings live for a day unless invalidated first.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 3600;

/// Longest accepted TTL: one year.
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 3600;

/// Rows per transaction during bulk generation.
pub const DEFAULT_BULK_CHUNK_SIZE: usize = 1000;

const ENV_DATABASE: &str = "I18N_STORE_DATABASE";
const ENV_CACHE_PATH: &str = "I18N_STORE_CACHE_PATH";
const ENV_CACHE_TTL: &str = "I18N_STORE_CACHE_TTL_SECS";
const ENV_BULK_CHUNK: &str = "I18N_STORE_BULK_CHUNK_SIZE";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_path: PathBuf,
    pub cache: CacheBackendConfig,
    pub cache_ttl_secs: u64,
    pub bulk_chunk_size: usize,
    pub logging: LoggingConfig,
}

/// Which cache backend serves the read path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CacheBackendConfig {
    /// Per-process expiring map.
    Memory,
    /// SQLite file shared by every process pointing at the same path.
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("i18n-store.sqlite3"),
            cache: CacheBackendConfig::Memory,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            bulk_chunk_size: DEFAULT_BULK_CHUNK_SIZE,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "i18n_store=info".to_string(),
            json: false,
        }
    }
}

impl StoreConfig {
    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: StoreConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `I18N_STORE_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_CACHE_PATH) {
            self.cache = CacheBackendConfig::Sqlite {
                path: PathBuf::from(path),
            };
        }
        if let Some(raw) = lookup(ENV_CACHE_TTL) {
            self.cache_ttl_secs = parse_number(ENV_CACHE_TTL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BULK_CHUNK) {
            self.bulk_chunk_size = parse_number(ENV_BULK_CHUNK, &raw)?;
        }
        self.validate()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_secs == 0 || self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::InvalidValue {
                name: "cache_ttl_secs",
                value: self.cache_ttl_secs.to_string(),
            });
        }
        if self.bulk_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "bulk_chunk_size",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
        })
}
