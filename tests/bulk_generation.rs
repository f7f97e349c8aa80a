mod common;

use common::{catalog_with, catalog_with_config, RecordingCache};
use i18n_store::config::StoreConfig;
use i18n_store::models::{NewTranslation, PageRequest, TranslationFilter};
use i18n_store::Catalog;

#[test]
fn bulk_load_flushes_once_and_lookups_recompute() {
    let cache = RecordingCache::new();
    let catalog = catalog_with(cache.clone());

    // Seed the locales and cache an empty mapping for one of them
    catalog.bulk.generate(0).unwrap();
    assert!(catalog.lookup.get_translations_for("en", None).unwrap().is_empty());
    assert!(cache.contains("translations.en"));
    let flushes_before = cache.flushes();

    let report = catalog.bulk.generate(150_000).unwrap();
    assert_eq!(report.requested, 150_000);
    assert_eq!(report.inserted, 150_000);
    assert!(report.failed_chunks.is_empty());
    assert_eq!(cache.flushes(), flushes_before + 1);
    assert!(cache.forgotten().is_empty());

    assert!(!cache.contains("translations.en"));
    let en = catalog.lookup.get_translations_for("en", None).unwrap();
    assert_eq!(en.len(), 50_000);
    assert_eq!(en.get("key_0").map(String::as_str), Some("value_0"));
    assert_eq!(catalog.metrics.cache_misses(), 2);
}

#[test]
fn failed_chunk_is_skipped_and_the_rest_commits() {
    let cache = RecordingCache::new();
    let config = StoreConfig {
        bulk_chunk_size: 1000,
        ..StoreConfig::default()
    };
    let catalog = catalog_with_config(cache.clone(), &config);
    catalog.bulk.generate(0).unwrap();

    // key_1500 is assigned to en (1500 % 3 == 0) inside chunk 1
    let en = catalog.locales.find_by_code("en").unwrap().unwrap();
    catalog
        .translations
        .create(NewTranslation {
            locale_id: en.id,
            key: "key_1500".into(),
            value: "taken".into(),
            group: None,
            tags: None,
        })
        .unwrap();
    let flushes_before = cache.flushes();

    let report = catalog.bulk.generate(3000).unwrap();
    assert_eq!(report.failed_chunks, vec![1]);
    assert_eq!(report.inserted, 2000);
    assert_eq!(cache.flushes(), flushes_before + 1);

    assert!(catalog.translations.find_by_key("key_1000").unwrap().is_empty());
    assert_eq!(catalog.translations.find_by_key("key_2999").unwrap().len(), 1);
    assert_eq!(catalog.translations.export_all().unwrap().len(), 2001);
}

#[test]
fn generated_rows_are_listed_newest_first() {
    let catalog = Catalog::in_memory().unwrap();
    catalog.bulk.generate(40).unwrap();

    let page = catalog
        .translations
        .list(
            &TranslationFilter {
                locale: Some("fr".into()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .unwrap();
    // fr receives every third row starting at key_2
    assert_eq!(page.total, 13);
    assert_eq!(page.per_page, 15);
    assert_eq!(page.last_page, 1);
    assert_eq!(page.items[0].key, "key_38");
    assert!(page.items.iter().all(|t| t.locale_code == "fr"));
}
