//! In-Memory Document Store
//!
//! Process-local index that evaluates the query AST directly. Backs local
//! runs (`STORE_BACKEND=memory`) and the test suites, where its call counters
//! and failure switches stand in for a misbehaving remote store.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{BulkSummary, Document, DocumentStore};
use crate::error::StoreError;
use crate::query::{BoolQuery, Query, SearchRequest, SortOrder};

// == Memory Document Store ==
#[derive(Debug)]
pub struct MemoryDocumentStore {
    /// Documents per index, in insertion order
    indexes: RwLock<HashMap<String, Vec<Document>>>,
    available: AtomicBool,
    latency: Mutex<Duration>,
    get_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            latency: Mutex::new(Duration::ZERO),
            get_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
        }
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document, creating the index on demand.
    pub fn insert(&self, index: &str, doc: Document) {
        if let Ok(mut indexes) = self.indexes.write() {
            upsert(indexes.entry(index.to_string()).or_default(), doc);
        }
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indexes
            .read()
            .map(|indexes| indexes.contains_key(index))
            .unwrap_or(false)
    }

    /// Number of documents in `index`.
    pub fn len(&self, index: &str) -> usize {
        self.indexes
            .read()
            .ok()
            .and_then(|indexes| indexes.get(index).map(Vec::len))
            .unwrap_or(0)
    }

    /// Makes every operation fail with `StoreError::Unavailable` while `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    /// Delays every operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    /// Number of point lookups served so far.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of searches served so far.
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(AtomicOrdering::SeqCst)
    }

    async fn simulate_io(&self) -> Result<(), StoreError> {
        let latency = self
            .latency
            .lock()
            .map(|guard| *guard)
            .unwrap_or(Duration::ZERO);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

fn upsert(docs: &mut Vec<Document>, doc: Document) {
    match docs.iter_mut().find(|existing| existing.id == doc.id) {
        Some(existing) => *existing = doc,
        None => docs.push(doc),
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_by_id(&self, index: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.get_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.simulate_io().await?;

        let indexes = self.indexes.read().map_err(|_| poisoned())?;
        Ok(indexes
            .get(index)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<Vec<Document>, StoreError> {
        self.search_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.simulate_io().await?;

        let indexes = self.indexes.read().map_err(|_| poisoned())?;
        let Some(docs) = indexes.get(index) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<Document> = docs
            .iter()
            .filter(|doc| evaluate(&request.query, &doc.source))
            .cloned()
            .collect();

        for clause in request.sort.iter().rev() {
            hits.sort_by(|a, b| {
                compare_for_sort(
                    first_value(&a.source, &clause.field),
                    first_value(&b.source, &clause.field),
                    clause.order,
                )
            });
        }

        hits.truncate(request.size);
        Ok(hits)
    }

    async fn create_index(&self, index: &str, _schema: &Value) -> Result<(), StoreError> {
        self.simulate_io().await?;

        let mut indexes = self.indexes.write().map_err(|_| poisoned())?;
        if indexes.contains_key(index) {
            return Err(StoreError::IndexExists(index.to_string()));
        }
        indexes.insert(index.to_string(), Vec::new());
        Ok(())
    }

    async fn bulk_index(
        &self,
        index: &str,
        docs: Vec<Document>,
    ) -> Result<BulkSummary, StoreError> {
        self.simulate_io().await?;

        let mut indexes = self.indexes.write().map_err(|_| poisoned())?;
        let stored = indexes.entry(index.to_string()).or_default();
        let mut summary = BulkSummary::default();
        for doc in docs {
            if doc.id.is_empty() || !doc.source.is_object() {
                summary.failed += 1;
                continue;
            }
            upsert(stored, doc);
            summary.indexed += 1;
        }
        Ok(summary)
    }

    async fn ping(&self) -> bool {
        self.available.load(AtomicOrdering::SeqCst)
    }
}

// == Query Evaluation ==
fn evaluate(query: &Query, source: &Value) -> bool {
    match query {
        Query::MatchAll => true,
        Query::Match { field, value } => values_at(source, field)
            .into_iter()
            .any(|found| text_matches(found, value)),
        Query::Term { field, value } => values_at(source, field)
            .into_iter()
            .any(|found| values_equal(found, value)),
        Query::Range { field, gte, lte } => {
            values_at(source, field).into_iter().any(|found| {
                let above = gte.as_ref().map_or(true, |bound| {
                    matches!(compare(found, bound), Some(Ordering::Greater | Ordering::Equal))
                });
                let below = lte.as_ref().map_or(true, |bound| {
                    matches!(compare(found, bound), Some(Ordering::Less | Ordering::Equal))
                });
                above && below
            })
        }
        Query::Exists { field } => values_at(source, field)
            .into_iter()
            .any(|found| !found.is_null()),
        Query::Bool(inner) => bool_matches(inner, source),
    }
}

fn bool_matches(query: &BoolQuery, source: &Value) -> bool {
    let required = query
        .must
        .iter()
        .chain(&query.filter)
        .all(|clause| evaluate(clause, source));
    if !required {
        return false;
    }
    if query.must_not.iter().any(|clause| evaluate(clause, source)) {
        return false;
    }

    let minimum = match query.minimum_should_match {
        Some(minimum) => minimum as usize,
        // a bool made of `should` clauses alone needs one of them
        None if query.must.is_empty() && query.filter.is_empty() && !query.should.is_empty() => 1,
        None => 0,
    };
    query
        .should
        .iter()
        .filter(|clause| evaluate(clause, source))
        .count()
        >= minimum
}

/// Collects the values at a dotted path, flattening arrays along the way.
fn values_at<'a>(source: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![source];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            collect_field(value, segment, &mut next);
        }
        current = next;
    }

    let mut flattened = Vec::new();
    for value in current {
        match value {
            Value::Array(items) => flattened.extend(items.iter()),
            other => flattened.push(other),
        }
    }
    flattened
}

fn collect_field<'a>(value: &'a Value, segment: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(segment) {
                out.push(found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_field(item, segment, out);
            }
        }
        _ => {}
    }
}

fn first_value<'a>(source: &'a Value, path: &str) -> Option<&'a Value> {
    values_at(source, path).into_iter().find(|v| !v.is_null())
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn values_equal(found: &Value, expected: &Value) -> bool {
    match (found, expected) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            matches!((as_number(found), as_number(expected)), (Some(a), Some(b)) if a == b)
        }
        _ => found == expected,
    }
}

/// Full-text style match: any query token present in the field's tokens.
fn text_matches(found: &Value, expected: &Value) -> bool {
    match (found, expected) {
        (Value::String(text), Value::String(query)) => {
            let haystack = tokens(text);
            tokens(query).iter().any(|token| haystack.contains(token))
        }
        _ => values_equal(found, expected),
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn compare(found: &Value, bound: &Value) -> Option<Ordering> {
    match (found, bound) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => as_number(found)?.partial_cmp(&as_number(bound)?),
    }
}

/// Missing values sort last in either direction.
fn compare_for_sort(a: Option<&Value>, b: Option<&Value>, order: SortOrder) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ordering = compare(a, b).unwrap_or(Ordering::Equal);
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        }
    }
}
