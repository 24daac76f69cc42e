//! Request DTOs for the catalog API
//!
//! Query-string parameters of the listing endpoints and their validation.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::query::{Filter, QueryDescriptor, Sort};

/// Default page size of listings
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page size a client may ask for
pub const MAX_PAGE_SIZE: usize = 100;

/// Fields the film listing can be sorted by
pub const SORTABLE_FIELDS: [&str; 2] = ["imdb_rating", "creation_date"];

/// Rating the listing filters assume for unrated films
pub const UNRATED_RATING: f64 = 0.0;

/// Creation date the listing filters assume for undated films
pub const UNDATED_CREATION_DATE: &str = "2000-01-01";

// == Pagination ==
/// Validated page window, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub size: usize,
}

impl Pagination {
    /// Validates raw `page`/`size` parameters, applying defaults.
    pub fn from_params(page: Option<usize>, size: Option<usize>) -> Result<Self, String> {
        let page = page.unwrap_or(1);
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page == 0 {
            return Err("page must be at least 1".to_string());
        }
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(format!("size must be between 1 and {}", MAX_PAGE_SIZE));
        }
        Ok(Self { page, size })
    }

    /// Index of the first item on this page.
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.size)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// `?page=&size=` of plain listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub size: Option<usize>,
}

impl PageParams {
    pub fn validate(&self) -> Result<Pagination, String> {
        Pagination::from_params(self.page, self.size)
    }
}

// == Film Listing ==
/// Parameters of `GET /api/v1/films`.
///
/// # Fields
/// - `rating`: minimum IMDb rating
/// - `creation_date`: earliest creation date (`YYYY-MM-DD`)
/// - `sort_by`: `imdb_rating` or `creation_date`, `-` prefix for descending
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilmListParams {
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub size: Option<usize>,
}

impl FilmListParams {
    pub fn pagination(&self) -> Result<Pagination, String> {
        Pagination::from_params(self.page, self.size)
    }

    /// Builds the store query for these parameters.
    pub fn descriptor(&self) -> Result<QueryDescriptor, String> {
        let mut filters = Vec::new();
        if let Some(rating) = self.rating {
            if !rating.is_finite() {
                return Err("rating must be a number".to_string());
            }
            filters.push(at_least("imdb_rating", json!(rating), UNRATED_RATING >= rating));
        }
        if let Some(date) = self.creation_date.as_deref().filter(|d| !d.is_empty()) {
            filters.push(at_least(
                "creation_date",
                json!(date),
                UNDATED_CREATION_DATE >= date,
            ));
        }

        let filter = match filters.len() {
            0 => Filter::MatchAll,
            1 => filters.remove(0),
            _ => Filter::All(filters),
        };
        let mut descriptor = QueryDescriptor::new(filter);

        if let Some(raw) = self.sort_by.as_deref() {
            let sort = Sort::parse(raw)
                .filter(|sort| SORTABLE_FIELDS.contains(&sort.field.as_str()))
                .ok_or_else(|| {
                    format!(
                        "sort_by must be one of {} (optionally prefixed with '-')",
                        SORTABLE_FIELDS.join(", ")
                    )
                })?;
            descriptor = descriptor.sorted_by(sort);
        }
        Ok(descriptor)
    }
}

/// `field >= min`, also admitting documents without the field when `admit_missing`.
fn at_least(field: &str, min: Value, admit_missing: bool) -> Filter {
    let range = Filter::Range {
        field: field.to_string(),
        gte: Some(min),
        lte: None,
    };
    if !admit_missing {
        return range;
    }
    Filter::Any(vec![
        range,
        Filter::Missing {
            field: field.to_string(),
        },
    ])
}

// == Key Listing ==
/// Parameters of `GET /api/v1/cache/keys`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysParams {
    #[serde(default)]
    pub pattern: Option<String>,
}

impl KeysParams {
    /// Glob pattern, `*` when absent.
    pub fn pattern(&self) -> &str {
        self.pattern
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or("*")
    }
}
