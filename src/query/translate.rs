//! Query Translator
//!
//! Maps a [`QueryDescriptor`] onto the store DSL. Translation is pure: the
//! same descriptor always yields the same [`SearchRequest`].

use super::dsl::{BoolQuery, Query, SearchRequest, SortClause};
use super::{Filter, QueryDescriptor};
use crate::models::Role;

/// Translates a descriptor into a search request.
pub fn translate(descriptor: &QueryDescriptor) -> SearchRequest {
    SearchRequest {
        query: translate_filter(&descriptor.filter),
        sort: descriptor
            .sort
            .iter()
            .map(|sort| SortClause {
                field: sort.field.clone(),
                order: sort.order,
            })
            .collect(),
        size: descriptor.effective_size(),
    }
}

fn translate_filter(filter: &Filter) -> Query {
    match filter {
        Filter::MatchAll => Query::MatchAll,
        Filter::Exact { field, value } => Query::Match {
            field: field.clone(),
            value: value.clone(),
        },
        Filter::Range { field, gte, lte } => Query::Range {
            field: field.clone(),
            gte: gte.clone(),
            lte: lte.clone(),
        },
        Filter::All(filters) if filters.is_empty() => Query::MatchAll,
        Filter::All(filters) => Query::Bool(BoolQuery {
            filter: filters.iter().map(translate_filter).collect(),
            ..BoolQuery::default()
        }),
        Filter::Any(filters) => Query::Bool(BoolQuery {
            should: filters.iter().map(translate_filter).collect(),
            minimum_should_match: Some(1),
            ..BoolQuery::default()
        }),
        Filter::Missing { field } => Query::Bool(BoolQuery {
            must_not: vec![Query::Exists {
                field: field.clone(),
            }],
            ..BoolQuery::default()
        }),
        Filter::RoleMember {
            person_id,
            role: Some(role),
        } => role_clause(person_id, *role),
        Filter::RoleMember {
            person_id,
            role: None,
        } => Query::Bool(BoolQuery {
            should: Role::ALL
                .iter()
                .map(|role| role_clause(person_id, *role))
                .collect(),
            minimum_should_match: Some(1),
            ..BoolQuery::default()
        }),
    }
}

/// `<role>s.id == person_id` on documents without a bare `<role>_id` field.
///
/// Relies on the store telling "nested field present with another value" apart
/// from "bare field absent"; film documents never carry the bare field.
fn role_clause(person_id: &str, role: Role) -> Query {
    Query::Bool(BoolQuery {
        must: vec![Query::Term {
            field: format!("{}.id", role.list_field()),
            value: person_id.into(),
        }],
        must_not: vec![Query::Exists {
            field: format!("{}_id", role.as_str()),
        }],
        ..BoolQuery::default()
    })
}
