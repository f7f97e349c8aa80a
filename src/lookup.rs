//! Read-through lookup of translation mappings.
//!
//! A hit returns the cached mapping untouched. A miss (or an unreachable
//! cache) loads the mapping from the database and stores it for the
//! configured TTL. This path never writes translation rows.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rusqlite::params;
use tracing::{debug, warn};

use crate::cache::key::normalize_group;
use crate::cache::{translation_key, CacheStore, TranslationMap};
use crate::db::Database;
use crate::error::StoreError;
use crate::metrics::{metric_names, MetricsRegistry};

const LOAD_MAPPING_SQL: &str = r#"
    SELECT t.key, t.value
    FROM translations t
    JOIN locales l ON l.id = t.locale_id
    WHERE l.code = ?1
      AND l.is_active = 1
      AND l.deleted_at IS NULL
      AND t.deleted_at IS NULL
      AND (?2 IS NULL OR t."group" = ?2)
    ORDER BY t.id
"#;

pub struct TranslationLookup {
    db: Arc<Database>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
    metrics: Arc<MetricsRegistry>,
}

impl TranslationLookup {
    pub fn new(
        db: Arc<Database>,
        cache: Arc<dyn CacheStore>,
        ttl: Duration,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            db,
            cache,
            ttl,
            metrics,
        }
    }

    /// `key -> value` for every live translation of an active locale,
    /// restricted to `group` when one is given.
    pub fn get_translations_for(
        &self,
        locale_code: &str,
        group: Option<&str>,
    ) -> Result<TranslationMap, StoreError> {
        let start = Instant::now();
        let group = normalize_group(group);
        let key = translation_key(locale_code, group);

        match self.cache.get(&key) {
            Ok(Some(mapping)) => {
                self.metrics.count_hit();
                self.metrics.record(
                    metric_names::LOOKUP_HIT,
                    start.elapsed().as_micros() as f64,
                );
                debug!(key = %key, entries = mapping.len(), "translation cache hit");
                return Ok(mapping);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(key = %key, error = %e, "translation cache read failed, using database");
            }
        }

        self.metrics.count_miss();
        let mapping = self.load(locale_code, group)?;

        if let Err(e) = self.cache.set_with_ttl(&key, &mapping, self.ttl) {
            warn!(key = %key, error = %e, "translation cache store failed");
        }

        self.metrics.record(
            metric_names::LOOKUP_MISS,
            start.elapsed().as_micros() as f64,
        );
        debug!(key = %key, entries = mapping.len(), "translation cache miss, loaded from database");
        Ok(mapping)
    }

    /// Later rows win when two rows share a key (possible across groups).
    fn load(&self, locale_code: &str, group: Option<&str>) -> Result<TranslationMap, StoreError> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare_cached(LOAD_MAPPING_SQL)?;
        let rows = stmt.query_map(params![locale_code, group], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut mapping = TranslationMap::new();
        for row in rows {
            let (key, value) = row?;
            mapping.insert(key, value);
        }
        Ok(mapping)
    }
}
