//! API Module
//!
//! HTTP handlers and routing for the catalog REST API.
//!
//! # Endpoints
//! - `GET /api/v1/films/id/:film_id` - Film detail
//! - `GET /api/v1/films/rating/:rating` - Films with an exact rating
//! - `GET /api/v1/films` - Filtered, sorted film listing
//! - `GET /api/v1/persons/:person_id` - Person detail
//! - `GET /api/v1/persons/:person_id/films` - A person's films
//! - `GET /api/v1/persons` - Person listing
//! - `GET /api/v1/cache/keys` - Cached film keys
//! - `GET /stats` - Cache and resolver statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
