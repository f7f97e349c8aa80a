//! SQLite persistence: connection ownership and schema.
//! One connection guarded by a mutex; repositories borrow it per call and
//! never hold the lock across cache calls.

use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS locales (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL CHECK (length(code) <= 10),
    name TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_default INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    deleted_at INTEGER
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_locales_code
    ON locales(code) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    deleted_at INTEGER
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_name
    ON tags(name) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS translations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    locale_id INTEGER NOT NULL REFERENCES locales(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    "group" TEXT NOT NULL DEFAULT 'general',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    deleted_at INTEGER
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_translations_locale_key_group
    ON translations(locale_id, key, "group") WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_translations_key_group
    ON translations(key, "group");

CREATE TABLE IF NOT EXISTS tag_translation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    translation_id INTEGER NOT NULL REFERENCES translations(id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (tag_id, translation_id)
);
"#;

/// Owner of the persistence connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file and apply the schema.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;

        // WAL keeps lookups from waiting on a bulk writer in another process
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self::init(conn)?;
        info!(path = %db_path.display(), "translation database opened");
        Ok(db)
    }

    /// Private in-memory database, used by tests and throwaway tooling.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Borrow the connection. Drop the guard before touching the cache.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

/// Current time as Unix timestamp (seconds).
pub(crate) fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.lock().execute_batch(SCHEMA).unwrap();
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .lock()
            .execute(
                r#"INSERT INTO translations (locale_id, key, value, "group", created_at, updated_at)
                   VALUES (42, 'k', 'v', 'general', 0, 0)"#,
                [],
            )
            .unwrap_err();
        assert!(matches!(StoreError::from(err), StoreError::Conflict(_)));
    }

    #[test]
    fn on_disk_database_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite3");
        {
            let db = Database::open(&path).unwrap();
            db.lock()
                .execute(
                    "INSERT INTO locales (code, name, created_at, updated_at)
                     VALUES ('en', 'English', 0, 0)",
                    [],
                )
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .lock()
            .query_row("SELECT COUNT(*) FROM locales", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
