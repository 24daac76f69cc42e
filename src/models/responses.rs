//! Response DTOs for the catalog API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::models::requests::Pagination;
use crate::models::{Film, Genre, PersonRef};
use crate::resolver::ResolverStats;

/// Full film detail (`GET /api/v1/films/id/:film_id`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilmDetail {
    pub id: String,
    pub title: String,
    pub imdb_rating: Option<f64>,
    pub description: Option<String>,
    pub creation_date: Option<String>,
    pub genres: Vec<Genre>,
    pub actors: Vec<PersonRef>,
    pub directors: Vec<PersonRef>,
    pub writers: Vec<PersonRef>,
}

impl From<Film> for FilmDetail {
    fn from(film: Film) -> Self {
        Self {
            id: film.id,
            title: film.title,
            imdb_rating: film.imdb_rating,
            description: film.description,
            creation_date: film.creation_date,
            genres: film.genres,
            actors: film.actors,
            directors: film.directors,
            writers: film.writers,
        }
    }
}

/// Title and rating of a film, used by listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilmSummary {
    pub id: String,
    pub title: String,
    pub imdb_rating: Option<f64>,
}

impl From<Film> for FilmSummary {
    fn from(film: Film) -> Self {
        Self {
            id: film.id,
            title: film.title,
            imdb_rating: film.imdb_rating,
        }
    }
}

// == Page ==
/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Items across all pages
    pub total: usize,
    pub page: usize,
    pub size: usize,
    /// Number of pages
    pub pages: usize,
}

impl<T> Page<T> {
    /// Cuts the window described by `pagination` out of `items`.
    pub fn paginate(items: Vec<T>, pagination: Pagination) -> Self {
        let total = items.len();
        let pages = total.div_ceil(pagination.size);
        let items = items
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.size)
            .collect();
        Self {
            items,
            total,
            page: pagination.page,
            size: pagination.size,
            pages,
        }
    }

    /// Converts every item.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
            pages: self.pages,
        }
    }
}

/// Response body for `GET /api/v1/cache/keys`
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub pattern: String,
    pub keys: Vec<String>,
    pub count: usize,
}

impl KeysResponse {
    pub fn new(pattern: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            pattern: pattern.into(),
            count: keys.len(),
            keys,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of evictions
    pub evictions: u64,
    /// Number of expired entries dropped
    pub expirations: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Film resolver counters
    pub films: ResolverStats,
    /// Person resolver counters
    pub persons: ResolverStats,
}

impl StatsResponse {
    pub fn new(cache: CacheStats, films: ResolverStats, persons: ResolverStats) -> Self {
        Self {
            hit_rate: cache.hit_rate(),
            hits: cache.hits,
            misses: cache.misses,
            evictions: cache.evictions,
            expirations: cache.expirations,
            total_entries: cache.total_entries,
            films,
            persons,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
