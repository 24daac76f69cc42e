//! API Handlers
//!
//! HTTP request handlers for the catalog endpoints. Each handler validates its
//! input, calls a resolver and maps the outcome onto a response.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::cache::{CacheBackend, CacheStats};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::{
    Film, FilmDetail, FilmListParams, FilmSummary, HealthResponse, KeysParams, KeysResponse, Page,
    PageParams, Person, StatsResponse,
};
use crate::query::QueryDescriptor;
use crate::resolver::{FilmSource, PersonSource, Resolver, ResolverPolicy};
use crate::store::DocumentStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub films: Arc<Resolver<Film, FilmSource>>,
    pub persons: Arc<Resolver<Person, PersonSource>>,
    pub cache: Arc<dyn CacheBackend>,
}

impl AppState {
    /// Wires both resolvers over one cache and one store index.
    pub fn new(
        cache: Arc<dyn CacheBackend>,
        store: Arc<dyn DocumentStore>,
        index: &str,
        policy: ResolverPolicy,
    ) -> Self {
        let films = Resolver::new(
            Arc::clone(&cache),
            FilmSource::new(Arc::clone(&store), index),
            policy.clone(),
        );
        let persons = Resolver::new(Arc::clone(&cache), PersonSource::new(store, index), policy);
        Self {
            films: Arc::new(films),
            persons: Arc::new(persons),
            cache,
        }
    }

    /// Creates the state from configuration.
    pub fn from_parts(
        config: &Config,
        cache: Arc<dyn CacheBackend>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self::new(
            cache,
            store,
            &config.index_name,
            ResolverPolicy::from_config(config),
        )
    }
}

// == Films ==
/// Handler for GET /api/v1/films/id/:film_id
pub async fn film_handler(
    State(state): State<AppState>,
    Path(film_id): Path<String>,
) -> Result<Json<FilmDetail>> {
    debug!("Fetching film {}", film_id);
    let film = state
        .films
        .resolve_by_id(&film_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("film not found".to_string()))?;

    Ok(Json(film.into()))
}

/// Handler for GET /api/v1/films/rating/:rating
pub async fn films_by_rating_handler(
    State(state): State<AppState>,
    Path(rating): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<FilmSummary>>> {
    let pagination = params.validate().map_err(ApiError::InvalidRequest)?;
    let value: f64 = rating
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| ApiError::InvalidRequest(format!("invalid rating '{}'", rating)))?;

    debug!("Fetching films rated {}", value);
    let films = state
        .films
        .resolve_by_query(&QueryDescriptor::exact("imdb_rating", json!(value)))
        .await?
        .ok_or_else(|| ApiError::NotFound("films not found".to_string()))?;

    Ok(Json(Page::paginate(films, pagination).map(FilmSummary::from)))
}

/// Handler for GET /api/v1/films
pub async fn films_handler(
    State(state): State<AppState>,
    Query(params): Query<FilmListParams>,
) -> Result<Json<Page<FilmDetail>>> {
    let pagination = params.pagination().map_err(ApiError::InvalidRequest)?;
    let descriptor = params.descriptor().map_err(ApiError::InvalidRequest)?;

    let films = state
        .films
        .resolve_by_query(&descriptor)
        .await?
        .ok_or_else(|| ApiError::NotFound("films not found".to_string()))?;
    debug!("Listing {} films", films.len());

    Ok(Json(Page::paginate(films, pagination).map(FilmDetail::from)))
}

// == Persons ==
/// Handler for GET /api/v1/persons/:person_id
pub async fn person_handler(
    State(state): State<AppState>,
    Path(person_id): Path<String>,
) -> Result<Json<Person>> {
    debug!("Fetching person {}", person_id);
    let person = state
        .persons
        .resolve_by_id(&person_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("person not found".to_string()))?;

    Ok(Json(person))
}

/// Handler for GET /api/v1/persons/:person_id/films
pub async fn person_films_handler(
    State(state): State<AppState>,
    Path(person_id): Path<String>,
) -> Result<Json<Vec<FilmSummary>>> {
    let person = state
        .persons
        .resolve_by_id(&person_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("person not found".to_string()))?;

    let films = state.films.resolve_many(&person.film_ids()).await?;

    Ok(Json(films.into_iter().map(FilmSummary::from).collect()))
}

/// Handler for GET /api/v1/persons
pub async fn persons_handler(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Person>>> {
    let pagination = params.validate().map_err(ApiError::InvalidRequest)?;

    let persons = state
        .persons
        .resolve_by_query(&QueryDescriptor::match_all())
        .await?
        .ok_or_else(|| ApiError::NotFound("persons not found".to_string()))?;

    Ok(Json(Page::paginate(persons, pagination)))
}

// == Cache Inspection ==
/// Handler for GET /api/v1/cache/keys
pub async fn keys_handler(
    State(state): State<AppState>,
    Query(params): Query<KeysParams>,
) -> Json<KeysResponse> {
    let pattern = params.pattern();
    let keys = state.films.cached_keys(pattern).await;

    Json(KeysResponse::new(pattern, keys))
}

/// Handler for GET /stats
///
/// Cache counters read as zero when the cache does not answer in time.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let bound = state.films.policy().cache_timeout;
    let cache = match timeout(bound, state.cache.stats()).await {
        Ok(stats) => stats,
        Err(_) => {
            warn!("Cache stats timed out after {:?}", bound);
            CacheStats::default()
        }
    };

    Json(StatsResponse::new(
        cache,
        state.films.stats(),
        state.persons.stats(),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
