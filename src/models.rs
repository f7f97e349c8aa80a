//! Row types, write inputs and list filters.
//! Timestamps are Unix seconds.

use serde::{Deserialize, Serialize};

/// Group assigned when a translation is created without one.
pub const DEFAULT_GROUP: &str = "general";

pub const DEFAULT_PER_PAGE: usize = 15;

pub const MAX_LOCALE_CODE_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

/// A translation row together with its locale code and attached tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: i64,
    pub locale_id: i64,
    pub locale_code: String,
    pub key: String,
    pub value: String,
    pub group: String,
    pub tags: Vec<Tag>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLocale {
    pub code: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocaleUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTranslation {
    pub locale_id: i64,
    pub key: String,
    pub value: String,
    pub group: Option<String>,
    /// Tag ids to attach. `None` leaves the translation untagged.
    pub tags: Option<Vec<i64>>,
}

/// Partial update. `tags: Some(ids)` replaces the attached set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslationUpdate {
    pub locale_id: Option<i64>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub group: Option<String>,
    pub tags: Option<Vec<i64>>,
}

/// Substring filters for listing translations. Empty filter matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslationFilter {
    /// Matches locale code or locale name.
    pub locale: Option<String>,
    /// Matches when any attached tag name contains any of these.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Matches key or value.
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocaleFilter {
    /// Matches code or name.
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub(crate) fn offset(&self) -> usize {
        (self.page.max(1) - 1) * self.per_page.max(1)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub last_page: usize,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, total: usize, request: PageRequest) -> Self {
        let per_page = request.per_page.max(1);
        Self {
            items,
            total,
            page: request.page.max(1),
            per_page,
            last_page: total.div_ceil(per_page).max(1),
        }
    }
}

fn default_true() -> bool {
    true
}
