//! Movies API - cache-aside catalog service over a film search index
//!
//! Film and person lookups go through an in-memory TTL/LRU cache and fall
//! back to the document store on a miss.

pub mod api;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod etl;
pub mod models;
pub mod query;
pub mod resolver;
pub mod store;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use resolver::{Resolver, ResolverPolicy};
pub use tasks::spawn_cleanup_task;
