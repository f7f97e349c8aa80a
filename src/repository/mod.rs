//! Repositories over the translation database.
//!
//! Every mutation runs in one transaction. Cache invalidation runs after the
//! commit, and only when the commit succeeded.

pub mod locale;
pub mod tag;
pub mod translation;

pub use locale::LocaleRepository;
pub use tag::TagRepository;
pub use translation::TranslationRepository;

/// `%term%` for a LIKE clause written with `ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("en"), "%en%");
        assert_eq!(like_pattern("100%_x"), "%100\\%\\_x%");
    }
}
