use fetchlab_core::cache::{AccessError, CacheLayer, QuerySignature, SecondLevelCache};
use fetchlab_core::config::CacheConfig;
use fetchlab_core::fetch::plan::AUTHORS_BY_LAST_NAME_SQL;
use fetchlab_core::model::{EntityKey, EntityKind};
use fetchlab_core::seed::sample_library;
use fetchlab_core::stats::Statistics;
use fetchlab_core::store::rows::AUTHOR_COLUMNS;
use fetchlab_core::store::{QueryParam, RelationalStore, SqliteStore, StoreResult, StoreRow};
use rusqlite::types::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

fn seeded_store() -> SqliteStore {
    let mut store = SqliteStore::open_in_memory().unwrap();
    store.seed(&sample_library().unwrap()).unwrap();
    store
}

fn hugo_query() -> QuerySignature {
    QuerySignature::new(&AUTHORS_BY_LAST_NAME_SQL, vec![QueryParam::from("Hugo")])
}

#[test]
fn entity_lookup_misses_after_evict_then_hits() {
    let store = seeded_store();
    let cache = SecondLevelCache::default();
    let stats = Statistics::new();
    let layer = CacheLayer::new(&store, &cache, &stats);

    layer.evict_all();
    let first = layer.get_author(1).unwrap();
    let snapshot = stats.snapshot();
    assert_eq!(first.last_name, "Hugo");
    assert_eq!(snapshot.cache_misses, 1);
    assert_eq!(snapshot.cache_hits, 0);
    assert_eq!(snapshot.entity_load_count, 1);
    assert_eq!(snapshot.query_count, 0);

    stats.reset();
    let second = layer.get_author(1).unwrap();
    let snapshot = stats.snapshot();
    assert_eq!(second, first);
    assert_eq!(snapshot.cache_hits, 1);
    assert_eq!(snapshot.entity_load_count, 0);
    assert!((snapshot.hit_ratio - 1.0).abs() < f64::EPSILON);
}

#[test]
fn missing_entity_is_not_found_and_not_cached() {
    let store = seeded_store();
    let cache = SecondLevelCache::default();
    let stats = Statistics::new();
    let layer = CacheLayer::new(&store, &cache, &stats);

    for _ in 0..2 {
        let err = layer.get_book(999).unwrap_err();
        assert!(matches!(
            err,
            AccessError::NotFound {
                kind: EntityKind::Book,
                id: 999
            }
        ));
    }
    assert_eq!(stats.snapshot().cache_misses, 2);
    assert!(!cache.contains_entity(EntityKind::Book, 999));
}

#[test]
fn query_miss_populates_both_regions() {
    let store = seeded_store();
    let cache = SecondLevelCache::default();
    let stats = Statistics::new();
    let layer = CacheLayer::new(&store, &cache, &stats);

    let rows = layer.get_query_result(&hugo_query()).unwrap();
    let snapshot = stats.snapshot();
    assert_eq!(rows.len(), 1);
    assert_eq!(snapshot.query_count, 1);
    assert_eq!(snapshot.query_cache.misses, 1);
    assert_eq!(snapshot.entity_load_count, 1);
    assert_eq!(cache.query_count(), 1);
    assert!(cache.contains_entity(EntityKind::Author, 1));

    stats.reset();
    let cached = layer.get_query_result(&hugo_query()).unwrap();
    let snapshot = stats.snapshot();
    assert_eq!(cached, rows);
    assert_eq!(snapshot.query_count, 0);
    assert_eq!(snapshot.query_cache.hits, 1);
    assert_eq!(snapshot.entity_cache.hits, 1);
    assert_eq!(snapshot.entity_load_count, 0);
}

#[test]
fn whitespace_variants_share_one_query_entry() {
    let store = seeded_store();
    let cache = SecondLevelCache::default();
    let stats = Statistics::new();
    let layer = CacheLayer::new(&store, &cache, &stats);

    let spaced = format!("  {}\n;", AUTHORS_BY_LAST_NAME_SQL.replace(' ', "   "));
    layer.get_query_result(&hugo_query()).unwrap();
    layer
        .get_query_result(&QuerySignature::new(&spaced, vec!["Hugo".into()]))
        .unwrap();

    assert_eq!(cache.query_count(), 1);
    assert_eq!(stats.snapshot().query_cache.hits, 1);
}

#[test]
fn query_hit_reloads_keys_when_entity_region_is_off() {
    let store = seeded_store();
    let cache = SecondLevelCache::new(CacheConfig {
        entity_cache: false,
        query_cache: true,
    });
    let stats = Statistics::new();
    let layer = CacheLayer::new(&store, &cache, &stats);

    layer.get_query_result(&hugo_query()).unwrap();
    stats.reset();
    layer.get_query_result(&hugo_query()).unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.query_cache.hits, 1);
    assert_eq!(snapshot.query_count, 0);
    assert_eq!(snapshot.entity_cache.hits + snapshot.entity_cache.misses, 0);
    assert_eq!(snapshot.entity_load_count, 1);
    assert_eq!(cache.entity_count(), 0);
}

#[test]
fn disabled_regions_record_no_lookups() {
    let store = seeded_store();
    let cache = SecondLevelCache::new(CacheConfig::disabled());
    let stats = Statistics::new();
    let layer = CacheLayer::new(&store, &cache, &stats);

    for _ in 0..3 {
        layer.get_author(2).unwrap();
        layer.get_query_result(&hugo_query()).unwrap();
    }

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.cache_hits, 0);
    assert_eq!(snapshot.cache_misses, 0);
    assert_eq!(snapshot.hit_ratio, 0.0);
    assert_eq!(snapshot.query_count, 3);
    assert_eq!(snapshot.entity_load_count, 6);
}

#[test]
fn cached_key_of_deleted_record_is_an_integrity_error() {
    let store = seeded_store();
    let cache = SecondLevelCache::new(CacheConfig {
        entity_cache: false,
        query_cache: true,
    });
    let stats = Statistics::new();
    let layer = CacheLayer::new(&store, &cache, &stats);

    layer.get_query_result(&hugo_query()).unwrap();
    store
        .connection()
        .execute("DELETE FROM authors WHERE id = 1;", [])
        .unwrap();

    let err = layer.get_query_result(&hugo_query()).unwrap_err();
    match err {
        AccessError::Integrity { target, .. } => {
            assert_eq!(target, EntityKey::new(EntityKind::Author, 1));
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn insert_author(store: &SqliteStore, last_name: &str, email: &str) {
    store
        .connection()
        .execute(
            "INSERT INTO authors (first_name, last_name, email) VALUES ('Ursula', ?1, ?2);",
            [last_name, email],
        )
        .unwrap();
}

#[test]
fn quoted_whitespace_reaches_the_store_unchanged() {
    let store = seeded_store();
    insert_author(&store, "Le  Guin", "ursula.double@example.com");
    insert_author(&store, "Le Guin", "ursula.single@example.com");
    let cache = SecondLevelCache::default();
    let stats = Statistics::new();
    let layer = CacheLayer::new(&store, &cache, &stats);

    let double = format!("SELECT {AUTHOR_COLUMNS} FROM authors a WHERE a.last_name = 'Le  Guin'");
    let single = format!("SELECT {AUTHOR_COLUMNS} FROM authors a WHERE a.last_name = 'Le Guin'");

    let double_rows = layer
        .get_query_result(&QuerySignature::new(&double, vec![]))
        .unwrap();
    let single_rows = layer
        .get_query_result(&QuerySignature::new(&single, vec![]))
        .unwrap();

    assert_eq!(double_rows.len(), 1);
    assert_eq!(double_rows[0].author.as_ref().unwrap().email, "ursula.double@example.com");
    assert_eq!(single_rows.len(), 1);
    assert_eq!(single_rows[0].author.as_ref().unwrap().email, "ursula.single@example.com");
    assert_eq!(cache.query_count(), 2);
    assert_eq!(stats.snapshot().query_cache.misses, 2);
}

#[test]
fn line_comment_does_not_swallow_the_statement() {
    let store = seeded_store();
    let cache = SecondLevelCache::default();
    let stats = Statistics::new();
    let layer = CacheLayer::new(&store, &cache, &stats);

    let commented = format!("SELECT -- every author column\n{AUTHOR_COLUMNS}\nFROM authors a\nORDER BY a.id");
    let plain = format!("SELECT {AUTHOR_COLUMNS} FROM authors a ORDER BY a.id");

    let rows = layer
        .get_query_result(&QuerySignature::new(&commented, vec![]))
        .unwrap();
    assert_eq!(rows.len(), 4);

    layer
        .get_query_result(&QuerySignature::new(&plain, vec![]))
        .unwrap();
    assert_eq!(cache.query_count(), 1);
    assert_eq!(stats.snapshot().query_cache.hits, 1);
}

/// Serves one author for any call, counting calls and holding each one long
/// enough for concurrent lookups to pile up.
struct SlowAuthorStore {
    calls: AtomicU32,
}

impl SlowAuthorStore {
    fn author_row() -> StoreRow {
        StoreRow::new(HashMap::from([
            ("author_id".to_string(), Value::Integer(1)),
            ("author_first_name".to_string(), Value::Text("Victor".into())),
            ("author_last_name".to_string(), Value::Text("Hugo".into())),
            ("author_email".to_string(), Value::Text("victor.hugo@example.com".into())),
        ]))
    }

    fn serve(&self) -> StoreRow {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Self::author_row()
    }
}

impl RelationalStore for SlowAuthorStore {
    fn execute_query(&self, _text: &str, _params: &[QueryParam]) -> StoreResult<Vec<StoreRow>> {
        Ok(vec![self.serve()])
    }

    fn fetch_by_id(&self, _kind: EntityKind, _id: i64) -> StoreResult<Option<StoreRow>> {
        Ok(Some(self.serve()))
    }
}

const LOOKUP_THREADS: u64 = 8;

#[test]
fn concurrent_cold_entity_lookups_reach_the_store_once() {
    let store = SlowAuthorStore {
        calls: AtomicU32::new(0),
    };
    let cache = SecondLevelCache::default();
    let stats = Statistics::new();

    thread::scope(|scope| {
        for _ in 0..LOOKUP_THREADS {
            scope.spawn(|| {
                let layer = CacheLayer::new(&store, &cache, &stats);
                assert_eq!(layer.get_author(1).unwrap().last_name, "Hugo");
            });
        }
    });

    let snapshot = stats.snapshot();
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    assert_eq!(snapshot.entity_cache.misses, 1);
    assert_eq!(snapshot.entity_cache.hits, LOOKUP_THREADS - 1);
    assert_eq!(snapshot.entity_load_count, 1);
}

#[test]
fn concurrent_cold_query_lookups_reach_the_store_once() {
    let store = SlowAuthorStore {
        calls: AtomicU32::new(0),
    };
    let cache = SecondLevelCache::default();
    let stats = Statistics::new();

    thread::scope(|scope| {
        for _ in 0..LOOKUP_THREADS {
            scope.spawn(|| {
                let layer = CacheLayer::new(&store, &cache, &stats);
                let rows = layer.get_query_result(&hugo_query()).unwrap();
                assert_eq!(rows.len(), 1);
            });
        }
    });

    let snapshot = stats.snapshot();
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    assert_eq!(snapshot.query_count, 1);
    assert_eq!(snapshot.query_cache.misses, 1);
    assert_eq!(snapshot.query_cache.hits, LOOKUP_THREADS - 1);
    // Hits re-resolve the cached key against the entity region the miss filled.
    assert_eq!(snapshot.entity_cache.hits, LOOKUP_THREADS - 1);
    assert_eq!(snapshot.entity_cache.misses, 0);
}
