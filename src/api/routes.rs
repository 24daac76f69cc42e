//! API Routes
//!
//! Configures the Axum router with all catalog endpoints.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    film_handler, films_by_rating_handler, films_handler, health_handler, keys_handler,
    person_films_handler, person_handler, persons_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let v1 = Router::new()
        .route("/films", get(films_handler))
        .route("/films/rating/:rating", get(films_by_rating_handler))
        .route("/films/id/:film_id", get(film_handler))
        .route("/persons", get(persons_handler))
        .route("/persons/:person_id", get(person_handler))
        .route("/persons/:person_id/films", get(person_films_handler))
        .route("/cache/keys", get(keys_handler));

    Router::new()
        .nest("/api/v1", v1)
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use tower::util::ServiceExt;

    use crate::cache::MemoryCache;
    use crate::resolver::ResolverPolicy;
    use crate::store::{Document, MemoryDocumentStore, DEFAULT_INDEX};

    fn create_test_app() -> Router {
        let store = MemoryDocumentStore::new();
        store.insert(
            DEFAULT_INDEX,
            Document::new("tt1", json!({ "id": "tt1", "title": "First", "imdb_rating": 7.5 })),
        );
        let state = AppState::new(
            Arc::new(MemoryCache::new(100)),
            Arc::new(store),
            DEFAULT_INDEX,
            ResolverPolicy::default(),
        );
        create_router(state)
    }

    async fn status_of(uri: &str) -> StatusCode {
        create_test_app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(status_of("/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        assert_eq!(status_of("/stats").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_film_routes() {
        assert_eq!(status_of("/api/v1/films/id/tt1").await, StatusCode::OK);
        assert_eq!(status_of("/api/v1/films/id/nope").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of("/api/v1/films/tt1").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of("/api/v1/films/rating/7.5").await, StatusCode::OK);
        assert_eq!(status_of("/api/v1/films").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_paging_is_bad_request() {
        assert_eq!(
            status_of("/api/v1/films?size=500").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of("/api/v1/films/rating/abc").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_unknown_route_not_found() {
        assert_eq!(status_of("/get/tt1").await, StatusCode::NOT_FOUND);
    }
}
