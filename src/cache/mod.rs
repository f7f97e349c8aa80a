//! Cache layer for translation mappings.
//! Backends implement [`CacheStore`]; the read path and the invalidator hold
//! one as `Arc<dyn CacheStore>` and never reach past its four operations.

pub mod key;
pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::CacheError;

pub use key::{active_locales_key, translation_key};
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

/// `key -> value` for one locale (and optionally one group).
pub type TranslationMap = BTreeMap<String, String>;

/// Capability set every cache backend provides.
pub trait CacheStore: Send + Sync {
    /// Cached mapping, or `None` when absent or expired.
    fn get(&self, key: &str) -> Result<Option<TranslationMap>, CacheError>;

    fn set_with_ttl(&self, key: &str, value: &TranslationMap, ttl: Duration)
        -> Result<(), CacheError>;

    /// Remove one exact key. Returns whether an entry was present.
    fn forget(&self, key: &str) -> Result<bool, CacheError>;

    /// Drop every entry. Administrative; not for single-row writes.
    fn flush_all(&self) -> Result<(), CacheError>;
}
