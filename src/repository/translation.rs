//! Translation write path and read surface.
//!
//! Each mutation and its tag sync commit together in one transaction. After
//! the commit, and only then, the affected cache keys are invalidated once.
//! A failed transaction rolls back on drop and leaves the cache untouched.

use std::collections::BTreeSet;
use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::like_pattern;
use super::locale::live_locale_code;
use super::tag::{tag_exists, tags_by_translation};
use crate::db::{now_unix, Database};
use crate::error::StoreError;
use crate::invalidation::{CacheScope, Invalidator};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::models::{
    NewTranslation, Page, PageRequest, Translation, TranslationFilter, TranslationUpdate,
    DEFAULT_GROUP,
};

const SELECT_TRANSLATION: &str = r#"
    SELECT t.id, t.locale_id, l.code, t.key, t.value, t."group",
           t.created_at, t.updated_at, t.deleted_at
    FROM translations t
    JOIN locales l ON l.id = t.locale_id"#;

pub struct TranslationRepository {
    db: Arc<Database>,
    invalidator: Invalidator,
    metrics: Arc<MetricsRegistry>,
}

impl TranslationRepository {
    pub fn new(db: Arc<Database>, invalidator: Invalidator, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            db,
            invalidator,
            metrics,
        }
    }

    pub fn create(&self, input: NewTranslation) -> Result<Translation, StoreError> {
        let span = self.metrics.span(metric_names::WRITE_COMMIT);
        let created = {
            let mut conn = self.db.lock();
            let tx = conn.transaction()?;
            live_locale_code(&tx, input.locale_id)?;

            let group = input
                .group
                .as_deref()
                .filter(|g| !g.is_empty())
                .unwrap_or(DEFAULT_GROUP);
            let now = now_unix();
            tx.execute(
                r#"INSERT INTO translations (locale_id, key, value, "group", created_at, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?5)"#,
                params![input.locale_id, input.key, input.value, group, now],
            )?;
            let id = tx.last_insert_rowid();
            if let Some(tag_ids) = &input.tags {
                sync_tags(&tx, id, tag_ids, now)?;
            }

            let created = fetch(&tx, id, false)?.ok_or(StoreError::NotFound {
                entity: "translation",
                id,
            })?;
            tx.commit()?;
            created
        };
        span.finish();

        self.invalidator.translation_created(&scope_of(&created));
        info!(
            id = created.id,
            key = %created.key,
            locale = %created.locale_code,
            "translation created"
        );
        Ok(created)
    }

    /// Partial update. `Ok(None)` when no live translation has this id.
    pub fn update(
        &self,
        id: i64,
        input: TranslationUpdate,
    ) -> Result<Option<Translation>, StoreError> {
        let span = self.metrics.span(metric_names::WRITE_COMMIT);
        let (before, after) = {
            let mut conn = self.db.lock();
            let tx = conn.transaction()?;
            let Some(before) = fetch(&tx, id, false)? else {
                return Ok(None);
            };

            let locale_id = input.locale_id.unwrap_or(before.locale_id);
            if locale_id != before.locale_id {
                live_locale_code(&tx, locale_id)?;
            }
            let key = input.key.as_deref().unwrap_or(&before.key);
            let value = input.value.as_deref().unwrap_or(&before.value);
            let group = input
                .group
                .as_deref()
                .filter(|g| !g.is_empty())
                .unwrap_or(&before.group);
            let now = now_unix();

            tx.execute(
                r#"UPDATE translations
                   SET locale_id = ?1, key = ?2, value = ?3, "group" = ?4, updated_at = ?5
                   WHERE id = ?6"#,
                params![locale_id, key, value, group, now, id],
            )?;
            if let Some(tag_ids) = &input.tags {
                sync_tags(&tx, id, tag_ids, now)?;
            }

            let after = fetch(&tx, id, false)?.ok_or(StoreError::NotFound {
                entity: "translation",
                id,
            })?;
            tx.commit()?;
            (before, after)
        };
        span.finish();

        self.invalidator
            .translation_updated(&scope_of(&before), &scope_of(&after));
        debug!(id, key = %after.key, "translation updated");
        Ok(Some(after))
    }

    /// Soft delete. `Ok(false)` when no live translation has this id.
    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let span = self.metrics.span(metric_names::WRITE_COMMIT);
        let deleted = {
            let mut conn = self.db.lock();
            let tx = conn.transaction()?;
            let Some(current) = fetch(&tx, id, false)? else {
                return Ok(false);
            };
            let now = now_unix();
            tx.execute(
                "UPDATE translations SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            tx.commit()?;
            current
        };
        span.finish();

        self.invalidator.translation_deleted(&scope_of(&deleted));
        debug!(id, key = %deleted.key, "translation deleted");
        Ok(true)
    }

    /// Undo a soft delete. `Ok(None)` when no trashed translation has this id.
    pub fn restore(&self, id: i64) -> Result<Option<Translation>, StoreError> {
        let span = self.metrics.span(metric_names::WRITE_COMMIT);
        let restored = {
            let mut conn = self.db.lock();
            let tx = conn.transaction()?;
            if fetch(&tx, id, true)?.is_none() {
                return Ok(None);
            }
            tx.execute(
                "UPDATE translations SET deleted_at = NULL, updated_at = ?1 WHERE id = ?2",
                params![now_unix(), id],
            )?;
            let restored = fetch(&tx, id, false)?.ok_or(StoreError::NotFound {
                entity: "translation",
                id,
            })?;
            tx.commit()?;
            restored
        };
        span.finish();

        self.invalidator.translation_restored(&scope_of(&restored));
        debug!(id, key = %restored.key, "translation restored");
        Ok(Some(restored))
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Translation>, StoreError> {
        fetch(&self.db.lock(), id, false)
    }

    pub fn find_by_locale_id(&self, locale_id: i64) -> Result<Vec<Translation>, StoreError> {
        let conn = self.db.lock();
        query_with_tags(
            &conn,
            &format!(
                "{SELECT_TRANSLATION} WHERE t.locale_id = ? AND t.deleted_at IS NULL ORDER BY t.id"
            ),
            &[Value::Integer(locale_id)],
        )
    }

    pub fn find_by_key(&self, key: &str) -> Result<Vec<Translation>, StoreError> {
        let conn = self.db.lock();
        query_with_tags(
            &conn,
            &format!("{SELECT_TRANSLATION} WHERE t.key = ? AND t.deleted_at IS NULL ORDER BY t.id"),
            &[Value::Text(key.to_string())],
        )
    }

    /// Newest first, filtered by locale, tag names and key/value search.
    pub fn list(
        &self,
        filter: &TranslationFilter,
        page: PageRequest,
    ) -> Result<Page<Translation>, StoreError> {
        let mut clauses = vec!["t.deleted_at IS NULL".to_string()];
        let mut args: Vec<Value> = Vec::new();

        if let Some(locale) = filter.locale.as_deref().filter(|s| !s.is_empty()) {
            clauses.push("(l.code LIKE ? ESCAPE '\\' OR l.name LIKE ? ESCAPE '\\')".into());
            let pattern = like_pattern(locale);
            args.push(Value::Text(pattern.clone()));
            args.push(Value::Text(pattern));
        }

        let tag_names: Vec<&str> = filter
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if !tag_names.is_empty() {
            let any_name = vec!["tg.name LIKE ? ESCAPE '\\'"; tag_names.len()].join(" OR ");
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM tag_translation tt JOIN tags tg ON tg.id = tt.tag_id
                         WHERE tt.translation_id = t.id AND tg.deleted_at IS NULL AND ({any_name}))"
            ));
            args.extend(tag_names.iter().map(|name| Value::Text(like_pattern(name))));
        }

        if let Some(query) = filter.query.as_deref().filter(|s| !s.is_empty()) {
            clauses.push("(t.key LIKE ? ESCAPE '\\' OR t.value LIKE ? ESCAPE '\\')".into());
            let pattern = like_pattern(query);
            args.push(Value::Text(pattern.clone()));
            args.push(Value::Text(pattern));
        }
        let where_clause = clauses.join(" AND ");

        let conn = self.db.lock();
        let total: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM translations t
                 JOIN locales l ON l.id = t.locale_id WHERE {where_clause}"
            ),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        args.push(Value::Integer(page.per_page as i64));
        args.push(Value::Integer(page.offset() as i64));
        let items = query_with_tags(
            &conn,
            &format!(
                "{SELECT_TRANSLATION} WHERE {where_clause}
                 ORDER BY t.created_at DESC, t.id DESC LIMIT ? OFFSET ?"
            ),
            &args,
        )?;
        Ok(Page::new(items, total as usize, page))
    }

    /// Every live translation with its locale code and tags.
    pub fn export_all(&self) -> Result<Vec<Translation>, StoreError> {
        let conn = self.db.lock();
        query_with_tags(
            &conn,
            &format!("{SELECT_TRANSLATION} WHERE t.deleted_at IS NULL ORDER BY t.id"),
            &[],
        )
    }
}

fn scope_of(translation: &Translation) -> CacheScope {
    CacheScope::new(&translation.locale_code, &translation.group)
}

/// Replace the tag set of a translation. Unknown or trashed tags are `NotFound`.
fn sync_tags(
    conn: &Connection,
    translation_id: i64,
    tag_ids: &[i64],
    now: i64,
) -> Result<(), StoreError> {
    let wanted: BTreeSet<i64> = tag_ids.iter().copied().collect();
    for &tag_id in &wanted {
        if !tag_exists(conn, tag_id)? {
            return Err(StoreError::NotFound {
                entity: "tag",
                id: tag_id,
            });
        }
    }

    let keep = serde_json::Value::from(wanted.iter().copied().collect::<Vec<_>>()).to_string();
    conn.execute(
        "DELETE FROM tag_translation
         WHERE translation_id = ?1
           AND tag_id NOT IN (SELECT value FROM json_each(?2))",
        params![translation_id, keep],
    )?;

    let mut insert = conn.prepare_cached(
        "INSERT OR IGNORE INTO tag_translation (tag_id, translation_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)",
    )?;
    for tag_id in wanted {
        insert.execute(params![tag_id, translation_id, now])?;
    }
    Ok(())
}

fn fetch(conn: &Connection, id: i64, deleted: bool) -> Result<Option<Translation>, StoreError> {
    let translation = conn
        .query_row(
            &format!("{SELECT_TRANSLATION} WHERE t.id = ?1 AND (t.deleted_at IS NOT NULL) = ?2"),
            params![id, deleted],
            translation_from_row,
        )
        .optional()?;

    let Some(mut translation) = translation else {
        return Ok(None);
    };
    translation.tags = tags_by_translation(conn, &[id])?
        .remove(&id)
        .unwrap_or_default();
    Ok(Some(translation))
}

fn query_with_tags(
    conn: &Connection,
    sql: &str,
    args: &[Value],
) -> Result<Vec<Translation>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let mut translations = stmt
        .query_map(params_from_iter(args.iter()), translation_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let ids: Vec<i64> = translations.iter().map(|t| t.id).collect();
    let mut tags = tags_by_translation(conn, &ids)?;
    for translation in &mut translations {
        translation.tags = tags.remove(&translation.id).unwrap_or_default();
    }
    Ok(translations)
}

fn translation_from_row(row: &Row<'_>) -> rusqlite::Result<Translation> {
    Ok(Translation {
        id: row.get(0)?,
        locale_id: row.get(1)?,
        locale_code: row.get(2)?,
        key: row.get(3)?,
        value: row.get(4)?,
        group: row.get(5)?,
        tags: Vec::new(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        deleted_at: row.get(8)?,
    })
}
