//! Resolver Module
//!
//! Cache-aside lookups of catalog entities. Reads probe the cache first and
//! fall back to the document store; store hits are written back with the
//! configured TTL.
//!
//! # Failure policy
//! - Cache errors, cache timeouts and undecodable cache values count as misses
//! - Failed cache writes are logged; the caller still gets the store result
//! - Store errors and store timeouts are returned to the caller
//! - An empty query result is reported as `None`

mod flight;
mod source;

#[cfg(test)]
mod tests;

pub use flight::{Flight, FlightGuard, FlightWaiter, InFlightLookups};
pub use source::{
    assemble_person, collect_people, film_from_document, EntitySource, FilmSource, PersonSource,
};

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::cache::CacheBackend;
use crate::codec;
use crate::config::Config;
use crate::error::ResolveError;
use crate::models::Entity;
use crate::query::QueryDescriptor;

// == Resolver Policy ==
/// Time bounds and write-back settings of a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverPolicy {
    /// Lifetime of entries written back to the cache
    pub ttl: Duration,
    /// Bound on each cache call
    pub cache_timeout: Duration,
    /// Bound on each store call
    pub store_timeout: Duration,
    /// Coalesce concurrent misses on the same key
    pub single_flight: bool,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            cache_timeout: Duration::from_millis(250),
            store_timeout: Duration::from_secs(5),
            single_flight: false,
        }
    }
}

impl ResolverPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ttl: config.cache_ttl,
            cache_timeout: config.cache_timeout,
            store_timeout: config.store_timeout,
            single_flight: config.single_flight,
        }
    }
}

// == Resolver Stats ==
/// Snapshot of a resolver's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub decode_failures: u64,
    pub store_lookups: u64,
    pub populate_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    decode_failures: AtomicU64,
    store_lookups: AtomicU64,
    populate_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ResolverStats {
        ResolverStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            store_lookups: self.store_lookups.load(Ordering::Relaxed),
            populate_failures: self.populate_failures.load(Ordering::Relaxed),
        }
    }
}

// == Resolver ==
/// Cache-aside resolver for entities of kind `E` backed by source `S`.
pub struct Resolver<E, S> {
    cache: Arc<dyn CacheBackend>,
    source: S,
    policy: ResolverPolicy,
    flights: Option<InFlightLookups<Result<Option<E>, ResolveError>>>,
    counters: Counters,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S> Resolver<E, S>
where
    E: Entity,
    S: EntitySource<E>,
{
    pub fn new(cache: Arc<dyn CacheBackend>, source: S, policy: ResolverPolicy) -> Self {
        let flights = policy.single_flight.then(InFlightLookups::new);
        Self {
            cache,
            source,
            policy,
            flights,
            counters: Counters::default(),
            _entity: PhantomData,
        }
    }

    pub fn policy(&self) -> &ResolverPolicy {
        &self.policy
    }

    pub fn stats(&self) -> ResolverStats {
        self.counters.snapshot()
    }

    // == Resolve By Id ==
    /// Resolves the entity with `id`, from the cache when possible.
    ///
    /// Returns `Ok(None)` when neither the cache nor the store has it.
    pub async fn resolve_by_id(&self, id: &str) -> Result<Option<E>, ResolveError> {
        let key = E::cache_key(id);
        if let Some(entity) = self.probe(&key).await {
            return Ok(Some(entity));
        }
        self.fill(id, &key).await
    }

    // == Resolve By Query ==
    /// Runs `descriptor` against the store. Query results are not cached.
    pub async fn resolve_by_query(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<Option<Vec<E>>, ResolveError> {
        Counters::bump(&self.counters.store_lookups);

        let entities = timeout(self.policy.store_timeout, self.source.fetch_by_query(descriptor))
            .await
            .map_err(|_| {
                error!("{} query timed out after {:?}", E::KIND, self.policy.store_timeout);
                ResolveError::Timeout
            })??;

        if entities.is_empty() {
            debug!("{} query matched nothing", E::KIND);
            return Ok(None);
        }
        Ok(Some(entities))
    }

    // == Resolve Many ==
    /// Resolves several ids with one cache round trip.
    ///
    /// Order follows `ids`; ids unknown to both cache and store are skipped.
    pub async fn resolve_many(&self, ids: &[String]) -> Result<Vec<E>, ResolveError> {
        let keys: Vec<String> = ids.iter().map(|id| E::cache_key(id)).collect();

        let cached = match timeout(self.policy.cache_timeout, self.cache.mget(&keys)).await {
            Ok(Ok(values)) if values.len() == keys.len() => values,
            Ok(Ok(values)) => {
                warn!(
                    "Cache mget returned {} values for {} keys, ignoring",
                    values.len(),
                    keys.len()
                );
                vec![None; keys.len()]
            }
            Ok(Err(err)) => {
                warn!("Cache mget failed: {}", err);
                vec![None; keys.len()]
            }
            Err(_) => {
                warn!("Cache mget timed out after {:?}", self.policy.cache_timeout);
                vec![None; keys.len()]
            }
        };

        let mut resolved = Vec::with_capacity(ids.len());
        for ((id, key), bytes) in ids.iter().zip(&keys).zip(cached) {
            let entity = match self.decode_cached(key, bytes) {
                Some(entity) => Some(entity),
                None => self.fill(id, key).await?,
            };
            resolved.extend(entity);
        }
        Ok(resolved)
    }

    // == Cached Keys ==
    /// Cache keys of this entity kind matching the glob `pattern`.
    ///
    /// An unreachable cache yields an empty list.
    pub async fn cached_keys(&self, pattern: &str) -> Vec<String> {
        let pattern = format!("{}{}", E::KEY_PREFIX, pattern);
        match timeout(self.policy.cache_timeout, self.cache.keys(&pattern)).await {
            Ok(Ok(keys)) => keys.into_iter().filter(|key| E::owns_key(key)).collect(),
            Ok(Err(err)) => {
                warn!("Cache key scan failed: {}", err);
                Vec::new()
            }
            Err(_) => {
                warn!("Cache key scan timed out after {:?}", self.policy.cache_timeout);
                Vec::new()
            }
        }
    }

    // == Cache Path ==
    async fn probe(&self, key: &str) -> Option<E> {
        let bytes = match timeout(self.policy.cache_timeout, self.cache.get(key)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err)) => {
                warn!("Cache read failed for '{}': {}", key, err);
                None
            }
            Err(_) => {
                warn!(
                    "Cache read for '{}' timed out after {:?}",
                    key, self.policy.cache_timeout
                );
                None
            }
        };
        self.decode_cached(key, bytes)
    }

    fn decode_cached(&self, key: &str, bytes: Option<Vec<u8>>) -> Option<E> {
        let Some(bytes) = bytes else {
            Counters::bump(&self.counters.cache_misses);
            debug!("Cache miss: {}", key);
            return None;
        };

        match codec::decode::<E>(&bytes) {
            Ok(entity) => {
                Counters::bump(&self.counters.cache_hits);
                debug!("Cache hit: {}", key);
                Some(entity)
            }
            Err(err) => {
                Counters::bump(&self.counters.decode_failures);
                Counters::bump(&self.counters.cache_misses);
                warn!("Discarding cached value for '{}': {}", key, err);
                None
            }
        }
    }

    // == Store Path ==
    async fn fill(&self, id: &str, key: &str) -> Result<Option<E>, ResolveError> {
        let Some(flights) = &self.flights else {
            let outcome = self.fetch(id).await;
            if let Ok(Some(entity)) = &outcome {
                self.populate(key, entity).await;
            }
            return outcome;
        };

        match flights.join(key) {
            Flight::Leader(guard) => {
                let outcome = self.fetch(id).await;
                guard.publish(outcome.clone());
                if let Ok(Some(entity)) = &outcome {
                    self.populate(key, entity).await;
                }
                outcome
            }
            Flight::Follower(waiter) => {
                let shared = async {
                    match waiter.outcome().await {
                        Some(outcome) => outcome,
                        None => self.fetch(id).await,
                    }
                };
                timeout(self.policy.store_timeout, shared)
                    .await
                    .map_err(|_| {
                        error!(
                            "{} lookup for '{}' timed out waiting on a concurrent lookup",
                            E::KIND,
                            id
                        );
                        ResolveError::Timeout
                    })?
            }
        }
    }

    async fn fetch(&self, id: &str) -> Result<Option<E>, ResolveError> {
        Counters::bump(&self.counters.store_lookups);
        let fetched = timeout(self.policy.store_timeout, self.source.fetch_by_id(id))
            .await
            .map_err(|_| {
                error!(
                    "{} lookup for '{}' timed out after {:?}",
                    E::KIND,
                    id,
                    self.policy.store_timeout
                );
                ResolveError::Timeout
            })?;

        match fetched {
            Ok(Some(entity)) => Ok(Some(entity)),
            Ok(None) => {
                debug!("{} '{}' not found in store", E::KIND, id);
                Ok(None)
            }
            Err(err) => {
                error!("{} lookup for '{}' failed: {}", E::KIND, id, err);
                Err(err.into())
            }
        }
    }

    async fn populate(&self, key: &str, entity: &E) {
        let bytes = match codec::encode(entity) {
            Ok(bytes) => bytes,
            Err(err) => {
                Counters::bump(&self.counters.populate_failures);
                warn!("Could not encode '{}' for caching: {}", key, err);
                return;
            }
        };

        match timeout(
            self.policy.cache_timeout,
            self.cache.set(key, bytes, self.policy.ttl),
        )
        .await
        {
            Ok(Ok(())) => debug!("Cached '{}' for {:?}", key, self.policy.ttl),
            Ok(Err(err)) => {
                Counters::bump(&self.counters.populate_failures);
                warn!("Cache write failed for '{}': {}", key, err);
            }
            Err(_) => {
                Counters::bump(&self.counters.populate_failures);
                warn!(
                    "Cache write for '{}' timed out after {:?}",
                    key, self.policy.cache_timeout
                );
            }
        }
    }
}
