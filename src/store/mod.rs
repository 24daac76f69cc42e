//! Document Store Module
//!
//! Client contract for the search index holding denormalized catalog
//! documents, with an HTTP implementation and an in-process one.

mod elastic;
mod memory;

pub use elastic::ElasticsearchClient;
pub use memory::MemoryDocumentStore;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::query::SearchRequest;

/// Default logical index for film documents
pub const DEFAULT_INDEX: &str = "movies";

// == Document ==
/// A stored document: its id plus the raw source body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub source: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}

// == Bulk Summary ==
/// Outcome of a bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub indexed: usize,
    pub failed: usize,
}

// == Document Store Trait ==
/// Operations the catalog needs from the search index.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point lookup; `Ok(None)` when the document does not exist.
    async fn get_by_id(&self, index: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Runs a query; hits come back in store-native order.
    async fn search(&self, index: &str, request: &SearchRequest)
        -> Result<Vec<Document>, StoreError>;

    /// Creates `index` with `schema`; `StoreError::IndexExists` if present.
    async fn create_index(&self, index: &str, schema: &Value) -> Result<(), StoreError>;

    /// Inserts or replaces documents by id.
    async fn bulk_index(&self, index: &str, docs: Vec<Document>)
        -> Result<BulkSummary, StoreError>;

    /// Returns `true` if the store answers.
    async fn ping(&self) -> bool;
}

// == Index Bootstrap ==
/// Makes sure `index` exists. An already existing index is not an error.
pub async fn ensure_index(
    store: &dyn DocumentStore,
    index: &str,
    schema: &Value,
) -> Result<(), StoreError> {
    match store.create_index(index, schema).await {
        Ok(()) => {
            info!("Index '{}' created", index);
            Ok(())
        }
        Err(StoreError::IndexExists(_)) => {
            debug!("Index '{}' already exists", index);
            Ok(())
        }
        Err(err) => Err(err),
    }
}
