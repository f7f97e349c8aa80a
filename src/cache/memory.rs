//! In-process translation cache with per-entry TTL.
//! Unbounded: entries leave only through expiry, `forget` or `flush_all`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{CacheStore, TranslationMap};
use crate::error::CacheError;

struct CacheEntry {
    value: TranslationMap,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<TranslationMap>, CacheError> {
        let mut cache = self.inner.lock();
        if let Some(entry) = cache.get(key) {
            if entry.is_live(Instant::now()) {
                return Ok(Some(entry.value.clone()));
            }
            cache.remove(key);
        }
        Ok(None)
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: &TranslationMap,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut cache = self.inner.lock();
        cache.insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.inner.lock().remove(key).is_some())
    }

    fn flush_all(&self) -> Result<(), CacheError> {
        self.inner.lock().clear();
        Ok(())
    }
}
