//! Movies API - cache-aside catalog service over a film search index

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use movies_api::cache::{CacheBackend, MemoryCache, NullCache};
use movies_api::config::StoreBackend;
use movies_api::etl::{parse_rows, IndexLoader};
use movies_api::store::{DocumentStore, ElasticsearchClient, MemoryDocumentStore};
use movies_api::{create_router, spawn_cleanup_task, AppState, Config};

/// Main entry point for the catalog service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect the document store and make sure the index exists
/// 4. Load the seed file, if any
/// 5. Create the cache and its background cleanup task
/// 6. Serve HTTP until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movies_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!("Starting {}", config.project_name);
    info!(
        "Configuration loaded: store={:?}, index={}, cache_enabled={}, ttl={:?}, port={}",
        config.store_backend,
        config.index_name,
        config.cache_enabled,
        config.cache_ttl,
        config.server_port
    );

    let store = connect_store(&config)?;
    if !store.ping().await {
        warn!("Document store did not answer ping; lookups will fail until it does");
    }

    let loader = IndexLoader::new(Arc::clone(&store), config.index_name.clone());
    let schema = load_schema(config.index_schema_path.as_deref()).await?;
    if let Err(err) = loader.bootstrap(&schema).await {
        warn!("Index bootstrap failed: {}", err);
    }

    if let Some(path) = &config.seed_file {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading seed file {}", path.display()))?;
        let rows = parse_rows(&raw).context("parsing seed rows")?;
        let summary = loader.load_rows(rows).await.context("loading seed rows")?;
        info!("Seeded {} films ({} failed)", summary.indexed, summary.failed);
    }

    let (cache, cleanup_handle): (Arc<dyn CacheBackend>, Option<JoinHandle<()>>) =
        if config.cache_enabled {
            let cache = MemoryCache::new(config.cache_max_entries);
            let every = Duration::from_secs(config.cleanup_interval.max(1));
            let handle = spawn_cleanup_task(cache.store(), every);
            info!("Cache enabled with {} entries max", config.cache_max_entries);
            (Arc::new(cache), Some(handle))
        } else {
            info!("Cache disabled, every lookup reads the store");
            (Arc::new(NullCache), None)
        };

    let state = AppState::from_parts(&config, cache, store);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("serving HTTP")?;

    info!("Server shutdown complete");
    Ok(())
}

fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.store_backend {
        StoreBackend::Elasticsearch => {
            let client = ElasticsearchClient::new(
                &config.elastic_host,
                config.elastic_port,
                config.store_timeout,
            )
            .context("building search client")?;
            info!("Using search cluster at {}", client.base_url());
            Ok(Arc::new(client))
        }
        StoreBackend::Memory => {
            info!("Using in-memory document store");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
    }
}

/// Index settings and mappings; an empty body when no file is configured.
async fn load_schema(path: Option<&Path>) -> anyhow::Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Object(Default::default()));
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading index schema {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing index schema {}", path.display()))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the cleanup task.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
