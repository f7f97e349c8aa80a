//! Administrative bulk generation.
//!
//! Rows are inserted directly in fixed-size chunks, one transaction per
//! chunk, bypassing the single-row write path and its per-row invalidation.
//! A failed chunk is rolled back, logged and skipped. The whole cache is
//! flushed exactly once when the run ends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::db::{now_unix, Database};
use crate::error::StoreError;
use crate::invalidation::Invalidator;
use crate::metrics::{metric_names, MetricsRegistry};
use crate::models::DEFAULT_GROUP;

/// Locales every generated row is spread across.
pub const SEED_LOCALES: [(&str, &str); 3] =
    [("en", "English"), ("es", "Spanish"), ("fr", "French")];

pub const SEED_TAGS: [&str; 3] = ["web", "mobile", "desktop"];

/// Outcome of one generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkReport {
    pub requested: usize,
    pub inserted: usize,
    /// Zero-based indices of chunks that were rolled back.
    pub failed_chunks: Vec<usize>,
    pub elapsed: Duration,
}

impl BulkReport {
    /// Inserted rows per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.inserted as f64 / secs
        } else {
            0.0
        }
    }
}

pub struct BulkGenerator {
    db: Arc<Database>,
    invalidator: Invalidator,
    metrics: Arc<MetricsRegistry>,
    chunk_size: usize,
}

impl BulkGenerator {
    pub fn new(
        db: Arc<Database>,
        invalidator: Invalidator,
        metrics: Arc<MetricsRegistry>,
        chunk_size: usize,
    ) -> Self {
        Self {
            db,
            invalidator,
            metrics,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Insert `count` rows named `key_N`/`value_N` in the default group.
    ///
    /// Only seeding errors are returned; chunk failures end up in
    /// [`BulkReport::failed_chunks`].
    pub fn generate(&self, count: usize) -> Result<BulkReport, StoreError> {
        let locale_ids = self.seed()?;
        let chunks = count.div_ceil(self.chunk_size);
        info!(count, chunks, chunk_size = self.chunk_size, "bulk generation started");

        let start = Instant::now();
        let mut inserted = 0;
        let mut failed_chunks = Vec::new();

        for chunk in 0..chunks {
            let first = chunk * self.chunk_size;
            let last = (first + self.chunk_size).min(count);

            let span = self.metrics.span(metric_names::BULK_CHUNK);
            match self.insert_chunk(first..last, &locale_ids) {
                Ok(rows) => {
                    span.finish();
                    inserted += rows;
                }
                Err(e) => {
                    warn!(chunk, error = %e, "bulk chunk failed, skipping");
                    failed_chunks.push(chunk);
                }
            }

            if (chunk + 1) % 25 == 0 {
                info!(done = chunk + 1, chunks, inserted, "bulk generation progress");
            }
        }

        // Rows above went in without per-row invalidation.
        self.invalidator.bulk_loaded();

        let report = BulkReport {
            requested: count,
            inserted,
            failed_chunks,
            elapsed: start.elapsed(),
        };
        info!(
            inserted = report.inserted,
            failed = report.failed_chunks.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            rate = report.rate(),
            "bulk generation finished"
        );
        Ok(report)
    }

    fn insert_chunk(
        &self,
        rows: std::ops::Range<usize>,
        locale_ids: &[i64],
    ) -> Result<usize, StoreError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        let now = now_unix();
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                r#"INSERT INTO translations (locale_id, key, value, "group", created_at, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?5)"#,
            )?;
            for n in rows {
                let locale_id = locale_ids[n % locale_ids.len()];
                stmt.execute(params![
                    locale_id,
                    format!("key_{n}"),
                    format!("value_{n}"),
                    DEFAULT_GROUP,
                    now
                ])?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// First-or-create the seed locales and tags. Returns the locale ids in
    /// seed order.
    fn seed(&self) -> Result<Vec<i64>, StoreError> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        let now = now_unix();

        let mut locale_ids = Vec::with_capacity(SEED_LOCALES.len());
        for (code, name) in SEED_LOCALES {
            locale_ids.push(first_or_create_locale(&tx, code, name, now)?);
        }
        for name in SEED_TAGS {
            let exists = tx
                .query_row(
                    "SELECT id FROM tags WHERE name = ?1 AND deleted_at IS NULL",
                    params![name],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?
                .is_some();
            if !exists {
                tx.execute(
                    "INSERT INTO tags (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
                    params![name, now],
                )?;
            }
        }
        tx.commit()?;
        Ok(locale_ids)
    }
}

fn first_or_create_locale(
    conn: &Connection,
    code: &str,
    name: &str,
    now: i64,
) -> Result<i64, StoreError> {
    let existing = conn
        .query_row(
            "SELECT id FROM locales WHERE code = ?1 AND deleted_at IS NULL",
            params![code],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO locales (code, name, is_active, is_default, created_at, updated_at)
         VALUES (?1, ?2, 1, 0, ?3, ?3)",
        params![code, name, now],
    )?;
    Ok(conn.last_insert_rowid())
}
