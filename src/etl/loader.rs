//! Index Loader
//!
//! Creates the film index and bulk-loads built films into it.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::etl::builder::{FilmDocumentBuilder, FilmWorkRow};
use crate::models::Film;
use crate::store::{ensure_index, BulkSummary, Document, DocumentStore};

/// Documents sent per bulk request
pub const BULK_CHUNK_SIZE: usize = 500;

pub struct IndexLoader {
    store: Arc<dyn DocumentStore>,
    index: String,
}

impl IndexLoader {
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
        }
    }

    /// Creates the index unless it already exists.
    pub async fn bootstrap(&self, schema: &Value) -> Result<(), StoreError> {
        ensure_index(self.store.as_ref(), &self.index, schema).await
    }

    /// Indexes `films` by id, in chunks.
    pub async fn load(&self, films: Vec<Film>) -> Result<BulkSummary, StoreError> {
        let mut summary = BulkSummary::default();
        let mut docs = Vec::with_capacity(films.len().min(BULK_CHUNK_SIZE));

        for film in films {
            let source = serde_json::to_value(&film).map_err(|err| StoreError::InvalidDocument {
                id: film.id.clone(),
                message: err.to_string(),
            })?;
            docs.push(Document::new(film.id, source));

            if docs.len() == BULK_CHUNK_SIZE {
                let chunk = std::mem::take(&mut docs);
                add(&mut summary, self.store.bulk_index(&self.index, chunk).await?);
            }
        }
        if !docs.is_empty() {
            add(&mut summary, self.store.bulk_index(&self.index, docs).await?);
        }

        info!(
            "Loaded {} documents into '{}' ({} failed)",
            summary.indexed, self.index, summary.failed
        );
        Ok(summary)
    }

    /// Builds films from joined rows and loads them. Rejected rows are logged
    /// and skipped.
    pub async fn load_rows(&self, rows: Vec<FilmWorkRow>) -> Result<BulkSummary, StoreError> {
        let mut builder = FilmDocumentBuilder::new();
        for row in rows {
            if let Err(err) = builder.push(row) {
                warn!("Skipping row: {}", err);
            }
        }
        if builder.is_empty() {
            warn!("No films built from the supplied rows");
        }
        self.load(builder.finish()).await
    }
}

fn add(total: &mut BulkSummary, chunk: BulkSummary) {
    total.indexed += chunk.indexed;
    total.failed += chunk.failed;
}
