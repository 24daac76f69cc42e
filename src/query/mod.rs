//! Query Module
//!
//! Request-level query descriptors and their translation into the document
//! store's query language.
//!
//! # Shapes
//! - Exact value match on a named field
//! - Match-all listing
//! - Range bounds, missing fields, conjunctions and disjunctions of filters
//! - Role membership (films in which a person holds a role)

mod dsl;
mod translate;

pub use dsl::{BoolQuery, Query, SearchRequest, SortClause, SortOrder};
pub use translate::translate;

use serde_json::Value;

use crate::models::Role;

// == Public Constants ==
/// Upper bound on hits returned by a single search
pub const MAX_RESULT_SIZE: usize = 1000;

// == Filter ==
/// Filter part of a query descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document in the index
    MatchAll,
    /// Field equals value (full-text `match` semantics on text fields)
    Exact { field: String, value: Value },
    /// Field within inclusive bounds; a missing bound is open
    Range {
        field: String,
        gte: Option<Value>,
        lte: Option<Value>,
    },
    /// Every inner filter must hold
    All(Vec<Filter>),
    /// At least one inner filter must hold
    Any(Vec<Filter>),
    /// Field absent or null
    Missing { field: String },
    /// Films listing `person_id` under `role`, or under any role when `None`
    RoleMember {
        person_id: String,
        role: Option<Role>,
    },
}

// == Sort ==
/// Requested ordering of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    /// Parses `field` or `-field` (descending).
    pub fn parse(raw: &str) -> Option<Self> {
        let (field, order) = match raw.strip_prefix('-') {
            Some(rest) => (rest, SortOrder::Desc),
            None => (raw, SortOrder::Asc),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            order,
        })
    }
}

// == Query Descriptor ==
/// API-level description of a search, built per request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub filter: Filter,
    pub sort: Option<Sort>,
    /// Caller cap on result size; never raises the limit above `MAX_RESULT_SIZE`
    pub size: Option<usize>,
}

impl QueryDescriptor {
    /// Descriptor for `filter` with no sort and the default size.
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            sort: None,
            size: None,
        }
    }

    /// Listing of every document.
    pub fn match_all() -> Self {
        Self::new(Filter::MatchAll)
    }

    /// Exact match of `field` against `value`.
    pub fn exact(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(Filter::Exact {
            field: field.into(),
            value: value.into(),
        })
    }

    /// Films in which `person_id` holds `role` (any role when `None`).
    pub fn role_member(person_id: impl Into<String>, role: Option<Role>) -> Self {
        Self::new(Filter::RoleMember {
            person_id: person_id.into(),
            role,
        })
    }

    /// Sets the ordering.
    pub fn sorted_by(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Caps the number of hits.
    pub fn limit(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Effective result size after applying the global cap.
    pub fn effective_size(&self) -> usize {
        self.size
            .map_or(MAX_RESULT_SIZE, |size| size.min(MAX_RESULT_SIZE))
    }
}
