//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use i18n_store::cache::{CacheStore, MemoryCache, TranslationMap};
use i18n_store::config::StoreConfig;
use i18n_store::db::Database;
use i18n_store::error::CacheError;
use i18n_store::models::{Locale, NewLocale, NewTranslation, Translation};
use i18n_store::Catalog;

/// In-memory catalog over the given cache backend.
pub fn catalog_with(cache: Arc<dyn CacheStore>) -> Catalog {
    catalog_with_config(cache, &StoreConfig::default())
}

pub fn catalog_with_config(cache: Arc<dyn CacheStore>, config: &StoreConfig) -> Catalog {
    let db = Arc::new(Database::open_in_memory().unwrap());
    Catalog::with_cache(db, cache, config)
}

pub fn locale(catalog: &Catalog, code: &str, is_active: bool) -> Locale {
    catalog
        .locales
        .create(NewLocale {
            code: code.into(),
            name: code.to_uppercase(),
            is_active,
            is_default: false,
        })
        .unwrap()
}

pub fn translation(
    catalog: &Catalog,
    locale: &Locale,
    key: &str,
    value: &str,
    group: Option<&str>,
) -> Translation {
    catalog
        .translations
        .create(NewTranslation {
            locale_id: locale.id,
            key: key.into(),
            value: value.into(),
            group: group.map(str::to_string),
            tags: None,
        })
        .unwrap()
}

pub fn mapping(pairs: &[(&str, &str)]) -> TranslationMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Memory cache that records every `forget` key and counts flushes.
#[derive(Default)]
pub struct RecordingCache {
    inner: MemoryCache,
    forgotten: Mutex<Vec<String>>,
    flushes: AtomicUsize,
}

impl RecordingCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn forgotten(&self) -> Vec<String> {
        self.forgotten.lock().clone()
    }

    pub fn clear_log(&self) {
        self.forgotten.lock().clear();
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.get(key).unwrap().is_some()
    }
}

impl CacheStore for RecordingCache {
    fn get(&self, key: &str) -> Result<Option<TranslationMap>, CacheError> {
        self.inner.get(key)
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: &TranslationMap,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.inner.set_with_ttl(key, value, ttl)
    }

    fn forget(&self, key: &str) -> Result<bool, CacheError> {
        self.forgotten.lock().push(key.to_string());
        self.inner.forget(key)
    }

    fn flush_all(&self) -> Result<(), CacheError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        self.inner.flush_all()
    }
}

/// Backend that is never reachable.
pub struct FailingCache;

impl CacheStore for FailingCache {
    fn get(&self, _key: &str) -> Result<Option<TranslationMap>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    fn set_with_ttl(
        &self,
        _key: &str,
        _value: &TranslationMap,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    fn forget(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    fn flush_all(&self) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}
