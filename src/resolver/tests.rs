//! Resolver behavior against the in-process store and cache backends.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::*;
use crate::cache::{CacheStats, MemoryCache, NullCache};
use crate::error::{CacheError, StoreError};
use crate::models::{Film, Person, Role};
use crate::query::Filter;
use crate::store::{Document, MemoryDocumentStore, DEFAULT_INDEX};

// == Fixtures ==
/// Cache wrapper whose reads and writes can be made to fail or stall.
struct FlakyCache {
    inner: MemoryCache,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    stall: AtomicBool,
    mget_calls: AtomicUsize,
}

impl FlakyCache {
    fn new() -> Self {
        Self {
            inner: MemoryCache::new(100),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            stall: AtomicBool::new(false),
            mget_calls: AtomicUsize::new(0),
        }
    }

    async fn maybe_stall(&self) {
        if self.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    }
}

#[async_trait]
impl CacheBackend for FlakyCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.maybe_stall().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.maybe_stall().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.inner.set(key, value, ttl).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.maybe_stall().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.inner.keys(pattern).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        self.mget_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_stall().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        self.inner.mget(keys).await
    }

    async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }
}

fn film_source(id: &str, title: &str, rating: f64) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "imdb_rating": rating,
        "actors": [{ "id": "p1", "name": "Ann Actor" }],
        "actors_names": ["Ann Actor"],
        "writers": [{ "id": "p2", "name": "Will Writer" }],
        "writers_names": ["Will Writer"]
    })
}

fn seeded_store() -> Arc<MemoryDocumentStore> {
    let store = Arc::new(MemoryDocumentStore::new());
    store.insert(DEFAULT_INDEX, Document::new("tt1", film_source("tt1", "First", 7.5)));
    store.insert(DEFAULT_INDEX, Document::new("tt2", film_source("tt2", "Second", 6.0)));
    store.insert(DEFAULT_INDEX, Document::new("tt3", film_source("tt3", "Third", 8.1)));
    store
}

fn policy() -> ResolverPolicy {
    ResolverPolicy {
        ttl: Duration::from_secs(300),
        cache_timeout: Duration::from_millis(50),
        store_timeout: Duration::from_millis(200),
        single_flight: false,
    }
}

fn film_resolver(
    cache: Arc<dyn CacheBackend>,
    store: &Arc<MemoryDocumentStore>,
    policy: ResolverPolicy,
) -> Resolver<Film, FilmSource> {
    let source = FilmSource::new(store.clone(), DEFAULT_INDEX);
    Resolver::new(cache, source, policy)
}

fn person_resolver(
    cache: Arc<dyn CacheBackend>,
    store: &Arc<MemoryDocumentStore>,
) -> Resolver<Person, PersonSource> {
    let source = PersonSource::new(store.clone(), DEFAULT_INDEX);
    Resolver::new(cache, source, policy())
}

// == Resolve By Id ==
#[tokio::test]
async fn test_miss_reads_store_and_populates_with_ttl() {
    let store = seeded_store();
    let cache = MemoryCache::new(100);
    let resolver = film_resolver(Arc::new(cache.clone()), &store, policy());

    let film = resolver.resolve_by_id("tt1").await.unwrap().unwrap();
    assert_eq!(film.title, "First");
    assert_eq!(store.get_calls(), 1);

    let cached = cache.get("tt1").await.unwrap().unwrap();
    assert_eq!(cached, codec::encode(&film).unwrap());
    let ttl = cache.ttl("tt1").await.unwrap();
    assert!(ttl > Duration::from_secs(295) && ttl <= Duration::from_secs(300));
}

#[tokio::test]
async fn test_hit_skips_store() {
    let store = seeded_store();
    let resolver = film_resolver(Arc::new(MemoryCache::new(100)), &store, policy());

    let first = resolver.resolve_by_id("tt1").await.unwrap();
    let second = resolver.resolve_by_id("tt1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.get_calls(), 1);
    let stats = resolver.stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.store_lookups, 1);
}

#[tokio::test]
async fn test_corrupted_cache_value_is_replaced() {
    let store = seeded_store();
    let cache = MemoryCache::new(100);
    cache
        .set("tt2", b"\x00not an envelope".to_vec(), Duration::from_secs(60))
        .await
        .unwrap();
    let resolver = film_resolver(Arc::new(cache.clone()), &store, policy());

    let film = resolver.resolve_by_id("tt2").await.unwrap().unwrap();

    assert_eq!(film.title, "Second");
    assert_eq!(store.get_calls(), 1);
    let cached = cache.get("tt2").await.unwrap().unwrap();
    assert_eq!(codec::decode::<Film>(&cached).unwrap(), film);
    assert_eq!(resolver.stats().decode_failures, 1);
}

#[tokio::test]
async fn test_cached_value_of_other_kind_is_a_miss() {
    let store = seeded_store();
    let cache = MemoryCache::new(100);
    let person = Person {
        id: "tt1".to_string(),
        full_name: "Not A Film".to_string(),
        films: Vec::new(),
    };
    cache
        .set("tt1", codec::encode(&person).unwrap(), Duration::from_secs(60))
        .await
        .unwrap();
    let resolver = film_resolver(Arc::new(cache), &store, policy());

    let film = resolver.resolve_by_id("tt1").await.unwrap().unwrap();

    assert_eq!(film.title, "First");
    assert_eq!(resolver.stats().decode_failures, 1);
}

#[tokio::test]
async fn test_absent_everywhere_is_none_and_not_cached() {
    let store = seeded_store();
    let cache = MemoryCache::new(100);
    let resolver = film_resolver(Arc::new(cache.clone()), &store, policy());

    assert!(resolver.resolve_by_id("tt404").await.unwrap().is_none());
    assert!(cache.keys("*").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_store_unavailable_is_an_error() {
    let store = seeded_store();
    store.set_available(false);
    let resolver = film_resolver(Arc::new(MemoryCache::new(100)), &store, policy());

    let result = resolver.resolve_by_id("tt1").await;

    assert!(matches!(
        result,
        Err(ResolveError::Store(StoreError::Unavailable(_)))
    ));
}

#[tokio::test]
async fn test_cache_hit_survives_store_outage() {
    let store = seeded_store();
    let resolver = film_resolver(Arc::new(MemoryCache::new(100)), &store, policy());
    resolver.resolve_by_id("tt1").await.unwrap();

    store.set_available(false);

    let film = resolver.resolve_by_id("tt1").await.unwrap().unwrap();
    assert_eq!(film.id, "tt1");
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let store = seeded_store();
    store.set_latency(Duration::from_secs(2));
    let resolver = film_resolver(Arc::new(MemoryCache::new(100)), &store, policy());

    let result = resolver.resolve_by_id("tt1").await;

    assert!(matches!(result, Err(ResolveError::Timeout)));
}

#[tokio::test]
async fn test_cache_read_failure_falls_back_to_store() {
    let store = seeded_store();
    let cache = Arc::new(FlakyCache::new());
    cache.fail_reads.store(true, Ordering::SeqCst);
    let resolver = film_resolver(cache.clone(), &store, policy());

    let film = resolver.resolve_by_id("tt1").await.unwrap().unwrap();

    assert_eq!(film.title, "First");
    assert_eq!(store.get_calls(), 1);
    // the write-back still happened
    assert_eq!(cache.inner.keys("*").await.unwrap(), vec!["tt1"]);
}

#[tokio::test]
async fn test_cache_write_failure_still_returns_entity() {
    let store = seeded_store();
    let cache = Arc::new(FlakyCache::new());
    cache.fail_writes.store(true, Ordering::SeqCst);
    let resolver = film_resolver(cache.clone(), &store, policy());

    let film = resolver.resolve_by_id("tt1").await.unwrap().unwrap();

    assert_eq!(film.title, "First");
    assert_eq!(resolver.stats().populate_failures, 1);
    assert!(cache.inner.keys("*").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stalled_cache_is_bounded_by_timeout() {
    let store = seeded_store();
    let cache = Arc::new(FlakyCache::new());
    cache.stall.store(true, Ordering::SeqCst);
    let resolver = film_resolver(cache, &store, policy());

    let started = std::time::Instant::now();
    let film = resolver.resolve_by_id("tt1").await.unwrap().unwrap();

    assert_eq!(film.id, "tt1");
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(resolver.stats().populate_failures, 1);
}

#[tokio::test]
async fn test_null_cache_always_reads_store() {
    let store = seeded_store();
    let resolver = film_resolver(Arc::new(NullCache), &store, policy());

    for _ in 0..3 {
        assert!(resolver.resolve_by_id("tt1").await.unwrap().is_some());
    }

    assert_eq!(store.get_calls(), 3);
    assert_eq!(resolver.stats().cache_hits, 0);
}

#[tokio::test]
async fn test_invalid_store_document_is_an_error() {
    let store = seeded_store();
    store.insert(DEFAULT_INDEX, Document::new("bad", json!({ "id": "bad" })));
    let resolver = film_resolver(Arc::new(MemoryCache::new(100)), &store, policy());

    let result = resolver.resolve_by_id("bad").await;

    assert!(matches!(
        result,
        Err(ResolveError::Store(StoreError::InvalidDocument { .. }))
    ));
}

// == Resolve By Query ==
#[tokio::test]
async fn test_query_results_keep_store_order_and_skip_cache() {
    let store = seeded_store();
    let cache = MemoryCache::new(100);
    let resolver = film_resolver(Arc::new(cache.clone()), &store, policy());

    let films = resolver
        .resolve_by_query(&QueryDescriptor::match_all())
        .await
        .unwrap()
        .unwrap();

    let ids: Vec<&str> = films.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["tt1", "tt2", "tt3"]);
    assert!(cache.keys("*").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_query_result_is_none() {
    let store = seeded_store();
    let resolver = film_resolver(Arc::new(MemoryCache::new(100)), &store, policy());

    let result = resolver
        .resolve_by_query(&QueryDescriptor::new(Filter::Range {
            field: "imdb_rating".to_string(),
            gte: Some(json!(9.5)),
            lte: None,
        }))
        .await
        .unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn test_query_on_unavailable_store_is_an_error() {
    let store = seeded_store();
    store.set_available(false);
    let resolver = film_resolver(Arc::new(MemoryCache::new(100)), &store, policy());

    let result = resolver.resolve_by_query(&QueryDescriptor::match_all()).await;

    assert!(matches!(result, Err(ResolveError::Store(_))));
}

// == Resolve Many ==
#[tokio::test]
async fn test_resolve_many_mixes_hits_and_misses_in_order() {
    let store = seeded_store();
    let cache = Arc::new(FlakyCache::new());
    let resolver = film_resolver(cache.clone(), &store, policy());
    resolver.resolve_by_id("tt3").await.unwrap();

    let ids = vec![
        "tt3".to_string(),
        "tt404".to_string(),
        "tt1".to_string(),
    ];
    let films = resolver.resolve_many(&ids).await.unwrap();

    let resolved: Vec<&str> = films.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(resolved, vec!["tt3", "tt1"]);
    assert_eq!(cache.mget_calls.load(Ordering::SeqCst), 1);
    // tt3 at first, then tt404 and tt1 on the miss path
    assert_eq!(store.get_calls(), 3);
}

#[tokio::test]
async fn test_resolve_many_with_failing_cache_uses_store() {
    let store = seeded_store();
    let cache = Arc::new(FlakyCache::new());
    cache.fail_reads.store(true, Ordering::SeqCst);
    let resolver = film_resolver(cache, &store, policy());

    let ids = vec!["tt1".to_string(), "tt2".to_string()];
    let films = resolver.resolve_many(&ids).await.unwrap();

    assert_eq!(films.len(), 2);
    assert_eq!(store.get_calls(), 2);
}

// == Person Resolution ==
#[tokio::test]
async fn test_person_is_assembled_and_cached_under_prefix() {
    let store = seeded_store();
    let cache = MemoryCache::new(100);
    let resolver = person_resolver(Arc::new(cache.clone()), &store);

    let person = resolver.resolve_by_id("p1").await.unwrap().unwrap();

    assert_eq!(person.full_name, "Ann Actor");
    assert_eq!(person.film_ids(), vec!["tt1", "tt2", "tt3"]);
    assert!(person.films.iter().all(|f| f.roles == vec![Role::Actor]));
    assert_eq!(cache.keys("person:*").await.unwrap(), vec!["person:p1"]);

    resolver.resolve_by_id("p1").await.unwrap();
    assert_eq!(store.search_calls(), 1);
}

#[tokio::test]
async fn test_unknown_person_is_none() {
    let store = seeded_store();
    let resolver = person_resolver(Arc::new(MemoryCache::new(100)), &store);

    assert!(resolver.resolve_by_id("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_person_listing_aggregates_from_films() {
    let store = seeded_store();
    let resolver = person_resolver(Arc::new(MemoryCache::new(100)), &store);

    let people = resolver
        .resolve_by_query(&QueryDescriptor::match_all())
        .await
        .unwrap()
        .unwrap();

    let ids: Vec<&str> = people.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
}

// == Single Flight ==
async fn concurrent_lookups(single_flight: bool) -> usize {
    let store = seeded_store();
    store.set_latency(Duration::from_millis(50));
    let policy = ResolverPolicy {
        single_flight,
        ..policy()
    };
    let resolver = Arc::new(film_resolver(Arc::new(MemoryCache::new(100)), &store, policy));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.resolve_by_id("tt1").await })
        })
        .collect();

    for handle in handles {
        let film = handle.await.unwrap().unwrap().unwrap();
        assert_eq!(film.id, "tt1");
    }
    store.get_calls()
}

#[tokio::test]
async fn test_single_flight_coalesces_concurrent_misses() {
    assert_eq!(concurrent_lookups(true).await, 1);
}

#[tokio::test]
async fn test_without_single_flight_each_miss_reads_store() {
    assert!(concurrent_lookups(false).await > 1);
}

async fn concurrent_outcomes(
    store: &Arc<MemoryDocumentStore>,
    id: &str,
) -> Vec<(Result<Option<Film>, ResolveError>, Duration)> {
    let policy = ResolverPolicy {
        single_flight: true,
        ..policy()
    };
    let resolver = Arc::new(film_resolver(Arc::new(MemoryCache::new(100)), store, policy));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            let id = id.to_string();
            tokio::spawn(async move {
                let started = tokio::time::Instant::now();
                let outcome = resolver.resolve_by_id(&id).await;
                (outcome, started.elapsed())
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }
    outcomes
}

#[tokio::test]
async fn test_single_flight_waiters_share_store_timeout() {
    let store = seeded_store();
    store.set_latency(Duration::from_secs(2));

    let outcomes = concurrent_outcomes(&store, "tt1").await;

    for (outcome, elapsed) in outcomes {
        assert!(matches!(outcome, Err(ResolveError::Timeout)));
        assert!(elapsed < Duration::from_millis(500), "took {:?}", elapsed);
    }
    assert_eq!(store.get_calls(), 1);
}

#[tokio::test]
async fn test_single_flight_shares_not_found() {
    let store = seeded_store();
    store.set_latency(Duration::from_millis(100));

    let started = tokio::time::Instant::now();
    let outcomes = concurrent_outcomes(&store, "tt404").await;

    assert!(outcomes.iter().all(|(outcome, _)| matches!(outcome, Ok(None))));
    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(store.get_calls(), 1);
}

#[tokio::test]
async fn test_single_flight_shares_store_failure() {
    let store = seeded_store();
    store.set_latency(Duration::from_millis(50));
    store.set_available(false);

    let outcomes = concurrent_outcomes(&store, "tt1").await;

    for (outcome, _) in outcomes {
        assert!(matches!(
            outcome,
            Err(ResolveError::Store(StoreError::Unavailable(_)))
        ));
    }
    assert_eq!(store.get_calls(), 1);
}

// == Cached Keys ==
#[tokio::test]
async fn test_cached_keys_are_scoped_to_entity_kind() {
    let store = seeded_store();
    let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::new(100));
    let films = film_resolver(cache.clone(), &store, policy());
    let persons = person_resolver(cache, &store);

    films.resolve_by_id("tt1").await.unwrap();
    films.resolve_by_id("tt2").await.unwrap();
    persons.resolve_by_id("p1").await.unwrap();

    assert_eq!(films.cached_keys("*").await, vec!["tt1", "tt2"]);
    assert_eq!(films.cached_keys("tt2").await, vec!["tt2"]);
    assert_eq!(persons.cached_keys("*").await, vec!["person:p1"]);
}

#[tokio::test]
async fn test_cached_keys_on_failing_cache_is_empty() {
    let store = seeded_store();
    let cache = Arc::new(FlakyCache::new());
    cache.stall.store(true, Ordering::SeqCst);
    let resolver = film_resolver(cache, &store, policy());

    assert!(resolver.cached_keys("*").await.is_empty());
}

// == Properties ==
proptest::proptest! {
    #![proptest_config(proptest::prelude::ProptestConfig::with_cases(32))]

    // Whatever the store holds comes back unchanged from the cache.
    #[test]
    fn prop_cached_copy_equals_store_copy(
        title in "[A-Za-z ]{1,30}",
        rating in proptest::option::of(0.0f64..10.0),
        description in proptest::option::of("[a-z ]{0,40}")
    ) {
        tokio_test::block_on(async {
            let store = Arc::new(MemoryDocumentStore::new());
            store.insert(
                DEFAULT_INDEX,
                Document::new(
                    "tt9",
                    json!({ "id": "tt9", "title": title, "imdb_rating": rating, "description": description }),
                ),
            );
            let resolver = film_resolver(Arc::new(MemoryCache::new(10)), &store, policy());

            let from_store = resolver.resolve_by_id("tt9").await.unwrap().unwrap();
            let from_cache = resolver.resolve_by_id("tt9").await.unwrap().unwrap();

            assert_eq!(from_store, from_cache);
            assert_eq!(from_cache.imdb_rating, rating);
            assert_eq!(from_cache.description, description);
            assert_eq!(store.get_calls(), 1);
        });
    }
}
