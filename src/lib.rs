//! i18n-store: localized string catalog with a read-through translation cache.
//! Library root: store wiring, tracing setup.

pub mod bulk;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod invalidation;
pub mod lookup;
pub mod metrics;
pub mod models;
pub mod repository;

use std::sync::Arc;

use tracing::info;

use bulk::BulkGenerator;
use cache::{CacheStore, MemoryCache, SqliteCache};
use config::{CacheBackendConfig, LoggingConfig, StoreConfig};
use db::Database;
use error::StoreError;
use invalidation::Invalidator;
use lookup::TranslationLookup;
use metrics::MetricsRegistry;
use repository::{LocaleRepository, TagRepository, TranslationRepository};

/// One opened store: database, cache backend and every service over them.
pub struct Catalog {
    pub db: Arc<Database>,
    pub cache: Arc<dyn CacheStore>,
    pub metrics: Arc<MetricsRegistry>,
    pub locales: LocaleRepository,
    pub tags: TagRepository,
    pub translations: TranslationRepository,
    pub lookup: TranslationLookup,
    pub bulk: BulkGenerator,
}

impl Catalog {
    /// Open the database and cache backend named by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let db = Arc::new(Database::open(&config.database_path)?);
        let cache: Arc<dyn CacheStore> = match &config.cache {
            CacheBackendConfig::Memory => Arc::new(MemoryCache::new()),
            CacheBackendConfig::Sqlite { path } => Arc::new(SqliteCache::open(path)?),
        };
        info!(
            database = %config.database_path.display(),
            cache = ?config.cache,
            ttl_secs = config.cache_ttl_secs,
            "catalog opened"
        );
        Ok(Self::with_cache(db, cache, config))
    }

    /// Fresh in-memory database with a memory cache and default settings.
    pub fn in_memory() -> Result<Self, StoreError> {
        let db = Arc::new(Database::open_in_memory()?);
        Ok(Self::with_cache(
            db,
            Arc::new(MemoryCache::new()),
            &StoreConfig::default(),
        ))
    }

    pub fn with_cache(db: Arc<Database>, cache: Arc<dyn CacheStore>, config: &StoreConfig) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let invalidator = Invalidator::new(Arc::clone(&cache));

        Self {
            locales: LocaleRepository::new(
                Arc::clone(&db),
                invalidator.clone(),
                Arc::clone(&cache),
                config.cache_ttl(),
            ),
            tags: TagRepository::new(Arc::clone(&db)),
            translations: TranslationRepository::new(
                Arc::clone(&db),
                invalidator.clone(),
                Arc::clone(&metrics),
            ),
            lookup: TranslationLookup::new(
                Arc::clone(&db),
                Arc::clone(&cache),
                config.cache_ttl(),
                Arc::clone(&metrics),
            ),
            bulk: BulkGenerator::new(
                Arc::clone(&db),
                invalidator,
                Arc::clone(&metrics),
                config.bulk_chunk_size,
            ),
            db,
            cache,
            metrics,
        }
    }
}

/// Install the global tracing subscriber. A second call is a no-op.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("i18n_store=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
