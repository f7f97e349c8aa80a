//! Translation cache backed by a SQLite file.
//! Several processes pointing at the same file share one cache, so an
//! invalidation in one worker is seen by the next read in any other.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use super::{CacheStore, TranslationMap};
use crate::error::CacheError;

pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open (or create) the cache database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(db_path)?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let cache = Self::init(conn)?;
        info!(path = %db_path.display(), "SQLite translation cache opened");
        Ok(cache)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS translation_cache (
                cache_key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_translation_cache_expires
                ON translation_cache(expires_at);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Remove expired entries. Returns how many rows were deleted.
    pub fn cleanup_expired(&self) -> Result<usize, CacheError> {
        let conn = self.conn.lock();
        let count = conn.execute(
            "DELETE FROM translation_cache WHERE expires_at <= ?1",
            params![now_millis()],
        )?;
        if count > 0 {
            info!(removed = count, "translation cache cleanup");
        }
        Ok(count)
    }
}

impl CacheStore for SqliteCache {
    fn get(&self, key: &str) -> Result<Option<TranslationMap>, CacheError> {
        let conn = self.conn.lock();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM translation_cache
                 WHERE cache_key = ?1 AND expires_at > ?2",
                params![key, now_millis()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str(&payload) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // Unreadable payloads are dropped and treated as a miss
                warn!(key, error = %e, "corrupt translation cache payload");
                conn.execute(
                    "DELETE FROM translation_cache WHERE cache_key = ?1",
                    params![key],
                )?;
                Ok(None)
            }
        }
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: &TranslationMap,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_millis().saturating_add(ttl_ms);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO translation_cache (cache_key, payload, expires_at)
             VALUES (?1, ?2, ?3)",
            params![key, payload, expires_at],
        )?;
        debug!(key, entries = value.len(), "translation cache stored");
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<bool, CacheError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM translation_cache WHERE cache_key = ?1",
            params![key],
        )?;
        Ok(removed > 0)
    }

    fn flush_all(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM translation_cache", [])?;
        Ok(())
    }
}

/// Current time as Unix timestamp (milliseconds).
fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
