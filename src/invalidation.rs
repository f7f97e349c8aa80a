//! Post-commit cache invalidation.
//!
//! Repositories call into [`Invalidator`] after a successful commit, once
//! per logical operation. Failures are logged and swallowed: the write has
//! already committed, and the TTL bounds how long a missed invalidation can
//! serve stale data.
//!
//! A translation row appears in two cached mappings: its `(code, group)`
//! mapping and the locale-wide `(code, None)` union. Both are dropped.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{active_locales_key, translation_key, CacheStore};

/// The cached mappings a translation row belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CacheScope {
    pub locale_code: String,
    pub group: String,
}

impl CacheScope {
    pub fn new(locale_code: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            locale_code: locale_code.into(),
            group: group.into(),
        }
    }

    /// Keys whose cached mapping includes rows in this scope.
    pub fn keys(&self) -> [String; 2] {
        [
            translation_key(&self.locale_code, Some(self.group.as_str())),
            translation_key(&self.locale_code, None),
        ]
    }
}

#[derive(Clone)]
pub struct Invalidator {
    cache: Arc<dyn CacheStore>,
}

impl Invalidator {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    pub fn translation_created(&self, scope: &CacheScope) {
        self.forget_all(scope.keys(), "created");
    }

    /// Drops both scopes when the update moved the row to another locale or group.
    pub fn translation_updated(&self, before: &CacheScope, after: &CacheScope) {
        let keys: BTreeSet<String> = before.keys().into_iter().chain(after.keys()).collect();
        self.forget_all(keys, "updated");
    }

    pub fn translation_deleted(&self, scope: &CacheScope) {
        self.forget_all(scope.keys(), "deleted");
    }

    pub fn translation_restored(&self, scope: &CacheScope) {
        self.forget_all(scope.keys(), "restored");
    }

    /// A locale's code or active flag changed. Every mapping cached under
    /// any of `codes` is stale, for each of `groups` and locale-wide.
    pub fn locale_changed(&self, codes: &[&str], groups: &[String]) {
        let mut keys = BTreeSet::new();
        for code in codes {
            keys.insert(translation_key(code, None));
            for group in groups {
                keys.insert(translation_key(code, Some(group.as_str())));
            }
        }
        self.forget_all(keys, "locale changed");
    }

    /// Any locale write may change which locales are active.
    pub fn locales_changed(&self) {
        self.forget_all([active_locales_key().to_string()], "locale written");
    }

    /// One full flush after a bulk load that bypassed per-row invalidation.
    pub fn bulk_loaded(&self) {
        match self.cache.flush_all() {
            Ok(()) => debug!("translation cache flushed after bulk load"),
            Err(e) => warn!(error = %e, "translation cache flush failed after bulk load"),
        }
    }

    fn forget_all<I>(&self, keys: I, reason: &'static str)
    where
        I: IntoIterator<Item = String>,
    {
        for key in keys {
            match self.cache.forget(&key) {
                Ok(present) => debug!(key = %key, present, reason, "translation cache invalidated"),
                Err(e) => {
                    warn!(key = %key, reason, error = %e, "translation cache invalidation failed")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, TranslationMap};
    use std::time::Duration;

    fn primed(keys: &[&str]) -> Arc<MemoryCache> {
        let cache = Arc::new(MemoryCache::new());
        for key in keys {
            cache
                .set_with_ttl(key, &TranslationMap::new(), Duration::from_secs(60))
                .unwrap();
        }
        cache
    }

    #[test]
    fn scope_covers_group_and_locale_wide_keys() {
        let scope = CacheScope::new("en", "general");
        assert_eq!(
            scope.keys(),
            ["translations.en.general".to_string(), "translations.en".to_string()]
        );
    }

    #[test]
    fn create_leaves_other_groups_alone() {
        let cache = primed(&[
            "translations.en",
            "translations.en.general",
            "translations.en.auth",
        ]);
        let invalidator = Invalidator::new(cache.clone());

        invalidator.translation_created(&CacheScope::new("en", "general"));

        assert!(cache.get("translations.en").unwrap().is_none());
        assert!(cache.get("translations.en.general").unwrap().is_none());
        assert!(cache.get("translations.en.auth").unwrap().is_some());
    }

    #[test]
    fn moving_update_drops_both_scopes() {
        let cache = primed(&[
            "translations.en",
            "translations.en.general",
            "translations.fr",
            "translations.fr.auth",
            "translations.fr.general",
        ]);
        let invalidator = Invalidator::new(cache.clone());

        invalidator.translation_updated(
            &CacheScope::new("en", "general"),
            &CacheScope::new("fr", "auth"),
        );

        assert_eq!(cache.len(), 1);
        assert!(cache.get("translations.fr.general").unwrap().is_some());
    }

    #[test]
    fn locale_change_covers_every_group() {
        let cache = primed(&[
            "translations.en",
            "translations.en.general",
            "translations.en.auth",
            "translations.en-GB.general",
            "translations.fr",
        ]);
        let invalidator = Invalidator::new(cache.clone());

        invalidator.locale_changed(&["en", "en-GB"], &["general".into(), "auth".into()]);

        assert_eq!(cache.len(), 1);
        assert!(cache.get("translations.fr").unwrap().is_some());
    }

    #[test]
    fn locale_write_drops_only_the_active_list() {
        let cache = primed(&[active_locales_key(), "translations.en"]);
        Invalidator::new(cache.clone()).locales_changed();

        assert!(cache.get(active_locales_key()).unwrap().is_none());
        assert!(cache.get("translations.en").unwrap().is_some());
    }

    #[test]
    fn bulk_load_flushes() {
        let cache = primed(&["translations.en", "translations.fr.auth"]);
        Invalidator::new(cache.clone()).bulk_loaded();
        assert!(cache.is_empty());
    }
}
