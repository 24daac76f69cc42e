//! Store Query Language
//!
//! Typed form of the search index's JSON query DSL. Both store backends
//! consume this representation: the HTTP client renders it with
//! [`SearchRequest::body`], the in-memory store evaluates it directly.

use serde_json::{json, Map, Value};

/// A query clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    Match { field: String, value: Value },
    Term { field: String, value: Value },
    Range {
        field: String,
        gte: Option<Value>,
        lte: Option<Value>,
    },
    Exists { field: String },
    Bool(BoolQuery),
}

/// Compound `bool` clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub filter: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
    pub minimum_should_match: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortClause {
    pub field: String,
    pub order: SortOrder,
}

/// A fully translated search: query, ordering and hit cap.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: Query,
    pub sort: Vec<SortClause>,
    pub size: usize,
}

impl Query {
    /// Renders the clause as store DSL JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::Match { field, value } => json!({ "match": { field.as_str(): value } }),
            Query::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            Query::Range { field, gte, lte } => {
                let mut bounds = Map::new();
                if let Some(gte) = gte {
                    bounds.insert("gte".to_string(), gte.clone());
                }
                if let Some(lte) = lte {
                    bounds.insert("lte".to_string(), lte.clone());
                }
                json!({ "range": { field.as_str(): Value::Object(bounds) } })
            }
            Query::Exists { field } => json!({ "exists": { "field": field } }),
            Query::Bool(inner) => json!({ "bool": inner.to_json() }),
        }
    }
}

impl BoolQuery {
    fn to_json(&self) -> Value {
        let mut body = Map::new();
        let clauses = [
            ("must", &self.must),
            ("filter", &self.filter),
            ("should", &self.should),
            ("must_not", &self.must_not),
        ];
        for (name, queries) in clauses {
            if !queries.is_empty() {
                let rendered = queries.iter().map(Query::to_json).collect();
                body.insert(name.to_string(), Value::Array(rendered));
            }
        }
        if let Some(minimum) = self.minimum_should_match {
            body.insert("minimum_should_match".to_string(), json!(minimum));
        }
        Value::Object(body)
    }
}

impl SearchRequest {
    /// Request body for the `_search` endpoint.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.query.to_json());
        body.insert("size".to_string(), json!(self.size));
        if !self.sort.is_empty() {
            let sort = self
                .sort
                .iter()
                .map(|clause| json!({ clause.field.as_str(): { "order": clause.order.as_str() } }))
                .collect();
            body.insert("sort".to_string(), Value::Array(sort));
        }
        Value::Object(body)
    }
}
