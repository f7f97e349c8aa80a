//! Cache key derivation for translation mappings.
//!
//! Keys read `translations.<code>` or `translations.<code>.<group>`. The `.`
//! separator and the `%` escape character are percent-escaped inside each
//! segment, so a locale code containing a dot can never collide with a
//! (code, group) pair. Ordinary codes and groups come out unchanged.
//!
//! The read path and every invalidation go through [`translation_key`].
//! The active-locale list lives under [`active_locales_key`], outside the
//! `translations.` namespace.

const PREFIX: &str = "translations";

/// Key of the cached active-locale list.
pub fn active_locales_key() -> &'static str {
    "locales.active"
}

/// Derive the cache key for a locale code and optional group.
///
/// An empty group is the same as no group: both mean "every group".
pub fn translation_key(locale_code: &str, group: Option<&str>) -> String {
    let mut key = String::with_capacity(PREFIX.len() + locale_code.len() + 16);
    key.push_str(PREFIX);
    key.push('.');
    push_escaped(&mut key, locale_code);
    if let Some(group) = normalize_group(group) {
        key.push('.');
        push_escaped(&mut key, group);
    }
    key
}

/// Treat `Some("")` as no group filter.
pub(crate) fn normalize_group(group: Option<&str>) -> Option<&str> {
    group.filter(|g| !g.is_empty())
}

fn push_escaped(out: &mut String, segment: &str) {
    for c in segment.chars() {
        match c {
            '%' => out.push_str("%25"),
            '.' => out.push_str("%2E"),
            c => out.push(c),
        }
    }
}
