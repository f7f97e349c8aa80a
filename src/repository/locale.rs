//! Locale CRUD.
//!
//! A locale's code and active flag decide which cached mappings its
//! translations appear in, so changing either invalidates every mapping
//! cached under the old and new code.
//!
//! The active-locale list is cached too, as `code -> locale JSON`, and is
//! dropped on every successful locale write.

use std::sync::Arc;
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use super::like_pattern;
use crate::cache::{active_locales_key, CacheStore, TranslationMap};
use crate::db::{now_unix, Database};
use crate::error::StoreError;
use crate::invalidation::Invalidator;
use crate::models::{
    Locale, LocaleFilter, LocaleUpdate, NewLocale, Page, PageRequest, MAX_LOCALE_CODE_LEN,
};

const SELECT_LOCALE: &str = "SELECT id, code, name, is_active, is_default, \
     created_at, updated_at, deleted_at FROM locales";

pub struct LocaleRepository {
    db: Arc<Database>,
    invalidator: Invalidator,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl LocaleRepository {
    pub fn new(
        db: Arc<Database>,
        invalidator: Invalidator,
        cache: Arc<dyn CacheStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            db,
            invalidator,
            cache,
            ttl,
        }
    }

    pub fn create(&self, input: NewLocale) -> Result<Locale, StoreError> {
        let code = validate_code(&input.code)?;
        let name = validate_name(&input.name)?;
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO locales (code, name, is_active, is_default, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![code, name, input.is_active, input.is_default, now_unix()],
        )?;
        let id = conn.last_insert_rowid();
        let created =
            fetch(&conn, id, false)?.ok_or(StoreError::NotFound { entity: "locale", id })?;
        drop(conn);

        self.invalidator.locales_changed();
        info!(id, code, "locale created");
        Ok(created)
    }

    pub fn update(&self, id: i64, input: LocaleUpdate) -> Result<Option<Locale>, StoreError> {
        let (before, after, groups) = {
            let mut conn = self.db.lock();
            let tx = conn.transaction()?;
            let Some(before) = fetch(&tx, id, false)? else {
                return Ok(None);
            };

            let code = match input.code.as_deref() {
                Some(code) => validate_code(code)?.to_string(),
                None => before.code.clone(),
            };
            let name = match input.name.as_deref() {
                Some(name) => validate_name(name)?.to_string(),
                None => before.name.clone(),
            };
            tx.execute(
                "UPDATE locales
                 SET code = ?1, name = ?2, is_active = ?3, is_default = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    code,
                    name,
                    input.is_active.unwrap_or(before.is_active),
                    input.is_default.unwrap_or(before.is_default),
                    now_unix(),
                    id
                ],
            )?;

            let after =
                fetch(&tx, id, false)?.ok_or(StoreError::NotFound { entity: "locale", id })?;
            let groups = live_groups(&tx, id)?;
            tx.commit()?;
            (before, after, groups)
        };

        if before.code != after.code || before.is_active != after.is_active {
            self.invalidator
                .locale_changed(&[before.code.as_str(), after.code.as_str()], &groups);
        }
        self.invalidator.locales_changed();
        debug!(id, code = %after.code, "locale updated");
        Ok(Some(after))
    }

    /// Soft delete. The default locale and active locales are refused.
    ///
    /// Only inactive locales get here, and lookups already read those as
    /// empty, so no cached mapping changes.
    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.db.lock();
        let Some(locale) = fetch(&conn, id, false)? else {
            return Ok(false);
        };
        if locale.is_default {
            return Err(StoreError::LocaleProtected {
                code: locale.code,
                reason: "the default locale",
            });
        }
        if locale.is_active {
            return Err(StoreError::LocaleProtected {
                code: locale.code,
                reason: "active",
            });
        }

        let now = now_unix();
        conn.execute(
            "UPDATE locales SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        drop(conn);

        self.invalidator.locales_changed();
        info!(id, code = %locale.code, "locale deleted");
        Ok(true)
    }

    pub fn restore(&self, id: i64) -> Result<Option<Locale>, StoreError> {
        let (restored, groups) = {
            let mut conn = self.db.lock();
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE locales SET deleted_at = NULL, updated_at = ?1
                 WHERE id = ?2 AND deleted_at IS NOT NULL",
                params![now_unix(), id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let restored =
                fetch(&tx, id, false)?.ok_or(StoreError::NotFound { entity: "locale", id })?;
            let groups = live_groups(&tx, id)?;
            tx.commit()?;
            (restored, groups)
        };

        if restored.is_active {
            self.invalidator.locale_changed(&[restored.code.as_str()], &groups);
        }
        self.invalidator.locales_changed();
        info!(id, code = %restored.code, "locale restored");
        Ok(Some(restored))
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Locale>, StoreError> {
        fetch(&self.db.lock(), id, false)
    }

    pub fn find_by_code(&self, code: &str) -> Result<Option<Locale>, StoreError> {
        let conn = self.db.lock();
        let locale = conn
            .query_row(
                &format!("{SELECT_LOCALE} WHERE code = ?1 AND deleted_at IS NULL"),
                params![code],
                locale_from_row,
            )
            .optional()?;
        Ok(locale)
    }

    /// Active, live locales ordered by code. Served from the cache when
    /// possible; cache failures fall back to the database.
    pub fn active_locales(&self) -> Result<Vec<Locale>, StoreError> {
        let key = active_locales_key();
        match self.cache.get(key) {
            Ok(Some(entry)) => match decode_locales(&entry) {
                Ok(locales) => {
                    debug!(key, count = locales.len(), "active locale cache hit");
                    return Ok(locales);
                }
                Err(e) => warn!(key, error = %e, "unreadable active locale cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "active locale cache read failed, using database"),
        }

        let locales = self.load_active()?;
        match encode_locales(&locales) {
            Ok(entry) => {
                if let Err(e) = self.cache.set_with_ttl(key, &entry, self.ttl) {
                    warn!(key, error = %e, "active locale cache store failed");
                }
            }
            Err(e) => warn!(key, error = %e, "active locale cache encode failed"),
        }
        Ok(locales)
    }

    fn load_active(&self) -> Result<Vec<Locale>, StoreError> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "{SELECT_LOCALE} WHERE is_active = 1 AND deleted_at IS NULL ORDER BY code"
        ))?;
        let locales = stmt
            .query_map([], locale_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(locales)
    }

    pub fn list(
        &self,
        filter: &LocaleFilter,
        page: PageRequest,
    ) -> Result<Page<Locale>, StoreError> {
        let mut clauses = vec!["deleted_at IS NULL".to_string()];
        let mut args: Vec<Value> = Vec::new();

        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            clauses.push("(name LIKE ? ESCAPE '\\' OR code LIKE ? ESCAPE '\\')".into());
            let pattern = like_pattern(search);
            args.push(Value::Text(pattern.clone()));
            args.push(Value::Text(pattern));
        }
        if let Some(active) = filter.is_active {
            clauses.push("is_active = ?".into());
            args.push(Value::Integer(i64::from(active)));
        }
        let where_clause = clauses.join(" AND ");

        let conn = self.db.lock();
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM locales WHERE {where_clause}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        args.push(Value::Integer(page.per_page as i64));
        args.push(Value::Integer(page.offset() as i64));
        let mut stmt = conn.prepare(&format!(
            "{SELECT_LOCALE} WHERE {where_clause} ORDER BY id LIMIT ? OFFSET ?"
        ))?;
        let items = stmt
            .query_map(params_from_iter(args.iter()), locale_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total as usize, page))
    }
}

/// BTreeMap order by code matches the `ORDER BY code` of the query.
fn encode_locales(locales: &[Locale]) -> Result<TranslationMap, serde_json::Error> {
    locales
        .iter()
        .map(|l| Ok((l.code.clone(), serde_json::to_string(l)?)))
        .collect()
}

fn decode_locales(entry: &TranslationMap) -> Result<Vec<Locale>, serde_json::Error> {
    entry.values().map(String::as_str).map(serde_json::from_str).collect()
}

fn validate_code(code: &str) -> Result<&str, StoreError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(StoreError::Validation("locale code must not be empty".into()));
    }
    if code.chars().count() > MAX_LOCALE_CODE_LEN {
        return Err(StoreError::Validation(format!(
            "locale code must be at most {MAX_LOCALE_CODE_LEN} characters"
        )));
    }
    Ok(code)
}

fn validate_name(name: &str) -> Result<&str, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("locale name must not be empty".into()));
    }
    Ok(name)
}

fn fetch(conn: &Connection, id: i64, deleted: bool) -> Result<Option<Locale>, StoreError> {
    let locale = conn
        .query_row(
            &format!("{SELECT_LOCALE} WHERE id = ?1 AND (deleted_at IS NOT NULL) = ?2"),
            params![id, deleted],
            locale_from_row,
        )
        .optional()?;
    Ok(locale)
}

/// Distinct groups among a locale's live translations.
fn live_groups(conn: &Connection, locale_id: i64) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare_cached(
        r#"SELECT DISTINCT "group" FROM translations
           WHERE locale_id = ?1 AND deleted_at IS NULL ORDER BY "group""#,
    )?;
    let groups = stmt
        .query_map(params![locale_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(groups)
}

pub(crate) fn locale_from_row(row: &Row<'_>) -> rusqlite::Result<Locale> {
    Ok(Locale {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        is_active: row.get(3)?,
        is_default: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        deleted_at: row.get(7)?,
    })
}

/// Code of a live locale, or `NotFound`.
pub(crate) fn live_locale_code(conn: &Connection, id: i64) -> Result<String, StoreError> {
    conn.query_row(
        "SELECT code FROM locales WHERE id = ?1 AND deleted_at IS NULL",
        params![id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: "locale", id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn repo_with_cache() -> (LocaleRepository, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let repo = LocaleRepository::new(
            Arc::new(Database::open_in_memory().unwrap()),
            Invalidator::new(cache.clone()),
            cache.clone(),
            Duration::from_secs(60),
        );
        (repo, cache)
    }

    fn repo() -> LocaleRepository {
        repo_with_cache().0
    }

    fn active_codes(locales: &LocaleRepository) -> Vec<String> {
        locales
            .active_locales()
            .unwrap()
            .into_iter()
            .map(|l| l.code)
            .collect()
    }

    fn new_locale(code: &str, is_active: bool) -> NewLocale {
        NewLocale {
            code: code.into(),
            name: code.to_uppercase(),
            is_active,
            is_default: false,
        }
    }

    #[test]
    fn create_and_find_by_code() {
        let locales = repo();
        let en = locales.create(new_locale("en", true)).unwrap();
        assert_eq!(locales.find_by_code("en").unwrap(), Some(en));
        assert_eq!(locales.find_by_code("fr").unwrap(), None);
    }

    #[test]
    fn code_length_is_validated() {
        let locales = repo();
        assert!(matches!(
            locales.create(new_locale("abcdefghijk", true)),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            locales.create(new_locale(" ", true)),
            Err(StoreError::Validation(_))
        ));
        locales.create(new_locale("abcdefghij", true)).unwrap();
    }

    #[test]
    fn duplicate_code_conflicts() {
        let locales = repo();
        locales.create(new_locale("en", true)).unwrap();
        assert!(matches!(
            locales.create(new_locale("en", false)),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn active_and_default_locales_are_protected() {
        let locales = repo();
        let en = locales.create(new_locale("en", true)).unwrap();
        let fr = locales
            .create(NewLocale {
                is_default: true,
                ..new_locale("fr", false)
            })
            .unwrap();

        assert!(matches!(
            locales.delete(en.id),
            Err(StoreError::LocaleProtected { reason: "active", .. })
        ));
        assert!(matches!(
            locales.delete(fr.id),
            Err(StoreError::LocaleProtected { .. })
        ));
    }

    #[test]
    fn inactive_locale_deletes_and_restores() {
        let locales = repo();
        let de = locales.create(new_locale("de", false)).unwrap();
        assert!(locales.delete(de.id).unwrap());
        assert!(!locales.delete(de.id).unwrap());
        assert_eq!(locales.find_by_id(de.id).unwrap(), None);

        // The code is free again while the old row is trashed
        let replacement = locales.create(new_locale("de", true)).unwrap();
        assert!(matches!(locales.restore(de.id), Err(StoreError::Conflict(_))));

        locales
            .update(replacement.id, LocaleUpdate { is_active: Some(false), ..Default::default() })
            .unwrap();
        assert!(locales.delete(replacement.id).unwrap());
        assert!(locales.restore(de.id).unwrap().is_some());
    }

    #[test]
    fn update_is_partial() {
        let locales = repo();
        let en = locales.create(new_locale("en", true)).unwrap();
        let updated = locales
            .update(
                en.id,
                LocaleUpdate {
                    name: Some("English".into()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.code, "en");
        assert_eq!(updated.name, "English");
        assert!(updated.is_active);
        assert_eq!(locales.update(999, LocaleUpdate::default()).unwrap(), None);
    }

    #[test]
    fn list_filters_by_search_and_active() {
        let locales = repo();
        locales.create(new_locale("en", true)).unwrap();
        locales.create(new_locale("es", false)).unwrap();
        locales.create(new_locale("fr", true)).unwrap();

        let active = locales
            .list(&LocaleFilter { search: None, is_active: Some(true) }, PageRequest::default())
            .unwrap();
        assert_eq!(active.total, 2);

        let filter = LocaleFilter {
            search: Some("e".into()),
            is_active: None,
        };
        let e = locales.list(&filter, PageRequest::default()).unwrap();
        let codes: Vec<_> = e.items.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, ["en", "es"]);

        assert_eq!(locales.active_locales().unwrap().len(), 2);
    }

    #[test]
    fn active_list_is_served_from_cache() {
        let (locales, cache) = repo_with_cache();
        locales.create(new_locale("en", true)).unwrap();
        assert_eq!(active_codes(&locales), ["en"]);
        assert!(cache.get(active_locales_key()).unwrap().is_some());

        // A row written behind the repository stays invisible until a locale write
        locales
            .db
            .lock()
            .execute(
                "INSERT INTO locales (code, name, is_active, is_default, created_at, updated_at)
                 VALUES ('fr', 'French', 1, 0, 0, 0)",
                [],
            )
            .unwrap();
        assert_eq!(active_codes(&locales), ["en"]);

        locales.create(new_locale("de", false)).unwrap();
        assert_eq!(active_codes(&locales), ["en", "fr"]);
    }

    #[test]
    fn every_locale_write_drops_the_active_list() {
        let (locales, cache) = repo_with_cache();
        let en = locales.create(new_locale("en", true)).unwrap();
        let es = locales.create(new_locale("es", true)).unwrap();
        assert_eq!(active_codes(&locales), ["en", "es"]);

        let deactivate = LocaleUpdate {
            is_active: Some(false),
            ..Default::default()
        };
        locales.update(es.id, deactivate).unwrap().unwrap();
        assert!(cache.get(active_locales_key()).unwrap().is_none());
        assert_eq!(active_codes(&locales), ["en"]);

        let rename = LocaleUpdate {
            name: Some("English (US)".into()),
            ..Default::default()
        };
        let renamed = locales.update(en.id, rename).unwrap().unwrap();
        assert_eq!(locales.active_locales().unwrap(), vec![renamed]);

        assert!(locales.delete(es.id).unwrap());
        assert!(cache.get(active_locales_key()).unwrap().is_none());
        active_codes(&locales);
        locales.restore(es.id).unwrap().unwrap();
        assert!(cache.get(active_locales_key()).unwrap().is_none());
    }

    #[test]
    fn unreadable_active_list_is_reloaded() {
        let (locales, cache) = repo_with_cache();
        locales.create(new_locale("en", true)).unwrap();
        let mut garbage = TranslationMap::new();
        garbage.insert("en".into(), "not json".into());
        cache
            .set_with_ttl(active_locales_key(), &garbage, Duration::from_secs(60))
            .unwrap();

        assert_eq!(active_codes(&locales), ["en"]);
        let repaired = cache.get(active_locales_key()).unwrap().unwrap();
        assert!(serde_json::from_str::<Locale>(&repaired["en"]).is_ok());
    }
}
