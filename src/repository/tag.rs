//! Tag CRUD. Tags never change a cached mapping, so nothing here invalidates.

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::db::{now_unix, Database};
use crate::error::StoreError;
use crate::models::{NewTag, Page, PageRequest, Tag, TagUpdate};

const SELECT_TAG: &str =
    "SELECT id, name, description, created_at, updated_at, deleted_at FROM tags";

pub struct TagRepository {
    db: Arc<Database>,
}

impl TagRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create(&self, input: NewTag) -> Result<Tag, StoreError> {
        let name = validate_name(&input.name)?;
        let conn = self.db.lock();
        let now = now_unix();
        conn.execute(
            "INSERT INTO tags (name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![name, input.description, now],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, name, "tag created");
        fetch(&conn, id, false)?.ok_or(StoreError::NotFound { entity: "tag", id })
    }

    pub fn update(&self, id: i64, input: TagUpdate) -> Result<Option<Tag>, StoreError> {
        let conn = self.db.lock();
        let Some(current) = fetch(&conn, id, false)? else {
            return Ok(None);
        };

        let name = match input.name.as_deref() {
            Some(name) => validate_name(name)?.to_string(),
            None => current.name,
        };
        let description = input.description.unwrap_or(current.description);

        conn.execute(
            "UPDATE tags SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![name, description, now_unix(), id],
        )?;
        fetch(&conn, id, false)
    }

    /// Soft delete. Returns false when no live tag has this id.
    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.db.lock();
        let now = now_unix();
        let changed = conn.execute(
            "UPDATE tags SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![now, id],
        )?;
        Ok(changed > 0)
    }

    pub fn restore(&self, id: i64) -> Result<Option<Tag>, StoreError> {
        let conn = self.db.lock();
        let changed = conn.execute(
            "UPDATE tags SET deleted_at = NULL, updated_at = ?1
             WHERE id = ?2 AND deleted_at IS NOT NULL",
            params![now_unix(), id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        fetch(&conn, id, false)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Tag>, StoreError> {
        fetch(&self.db.lock(), id, false)
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Tag>, StoreError> {
        let conn = self.db.lock();
        let tag = conn
            .query_row(
                &format!("{SELECT_TAG} WHERE name = ?1 AND deleted_at IS NULL"),
                params![name],
                tag_from_row,
            )
            .optional()?;
        Ok(tag)
    }

    pub fn list(&self, page: PageRequest) -> Result<Page<Tag>, StoreError> {
        let conn = self.db.lock();
        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM tags WHERE deleted_at IS NULL", [], |row| {
                row.get(0)
            })?;
        let mut stmt = conn.prepare_cached(&format!(
            "{SELECT_TAG} WHERE deleted_at IS NULL ORDER BY id LIMIT ?1 OFFSET ?2"
        ))?;
        let items = stmt
            .query_map(
                params![page.per_page as i64, page.offset() as i64],
                tag_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total as usize, page))
    }
}

fn validate_name(name: &str) -> Result<&str, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("tag name must not be empty".into()));
    }
    Ok(name)
}

fn fetch(conn: &Connection, id: i64, deleted: bool) -> Result<Option<Tag>, StoreError> {
    let tag = conn
        .query_row(
            &format!("{SELECT_TAG} WHERE id = ?1 AND (deleted_at IS NOT NULL) = ?2"),
            params![id, deleted],
            tag_from_row,
        )
        .optional()?;
    Ok(tag)
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        deleted_at: row.get(5)?,
    })
}

/// Live tags attached to each of `translation_ids`, ordered by tag id.
pub(crate) fn tags_by_translation(
    conn: &Connection,
    translation_ids: &[i64],
) -> Result<HashMap<i64, Vec<Tag>>, StoreError> {
    let mut out: HashMap<i64, Vec<Tag>> = HashMap::new();
    if translation_ids.is_empty() {
        return Ok(out);
    }

    // Ids travel as one JSON array so the statement has a fixed shape
    let ids = serde_json::Value::from(translation_ids.to_vec()).to_string();
    let mut stmt = conn.prepare_cached(
        "SELECT tt.translation_id, tg.id, tg.name, tg.description,
                tg.created_at, tg.updated_at, tg.deleted_at
         FROM tag_translation tt
         JOIN tags tg ON tg.id = tt.tag_id
         WHERE tg.deleted_at IS NULL
           AND tt.translation_id IN (SELECT value FROM json_each(?1))
         ORDER BY tt.translation_id, tg.id",
    )?;
    let rows = stmt.query_map(params![ids], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            Tag {
                id: row.get(1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
                deleted_at: row.get(6)?,
            },
        ))
    })?;
    for row in rows {
        let (translation_id, tag) = row?;
        out.entry(translation_id).or_default().push(tag);
    }
    Ok(out)
}

/// Whether a live tag exists with this id.
pub(crate) fn tag_exists(conn: &Connection, id: i64) -> Result<bool, StoreError> {
    Ok(fetch(conn, id, false)?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> TagRepository {
        TagRepository::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn new_tag(name: &str) -> NewTag {
        NewTag {
            name: name.into(),
            description: None,
        }
    }

    #[test]
    fn create_and_find() {
        let tags = repo();
        let web = tags.create(new_tag("web")).unwrap();
        assert_eq!(tags.find_by_id(web.id).unwrap(), Some(web.clone()));
        assert_eq!(tags.find_by_name("web").unwrap(), Some(web));
    }

    #[test]
    fn names_are_unique_among_live_tags() {
        let tags = repo();
        let web = tags.create(new_tag("web")).unwrap();
        assert!(matches!(tags.create(new_tag("web")), Err(StoreError::Conflict(_))));

        assert!(tags.delete(web.id).unwrap());
        tags.create(new_tag("web")).unwrap();
        assert!(matches!(tags.restore(web.id), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn update_can_clear_description() {
        let tags = repo();
        let tag = tags
            .create(NewTag {
                name: "mobile".into(),
                description: Some("phones".into()),
            })
            .unwrap();
        let updated = tags
            .update(
                tag.id,
                TagUpdate {
                    name: Some("handheld".into()),
                    description: Some(None),
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "handheld");
        assert_eq!(updated.description, None);
    }

    #[test]
    fn delete_and_restore() {
        let tags = repo();
        let tag = tags.create(new_tag("desktop")).unwrap();
        assert!(tags.delete(tag.id).unwrap());
        assert!(!tags.delete(tag.id).unwrap());
        assert_eq!(tags.find_by_id(tag.id).unwrap(), None);
        assert_eq!(tags.update(tag.id, TagUpdate::default()).unwrap(), None);

        let restored = tags.restore(tag.id).unwrap().unwrap();
        assert_eq!(restored.deleted_at, None);
        assert_eq!(tags.restore(tag.id).unwrap(), None);
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(matches!(repo().create(new_tag("  ")), Err(StoreError::Validation(_))));
    }

    #[test]
    fn list_pages_live_tags() {
        let tags = repo();
        for name in ["a", "b", "c"] {
            tags.create(new_tag(name)).unwrap();
        }
        let page = tags.list(PageRequest::new(2, 2)).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.last_page, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "c");
    }
}
