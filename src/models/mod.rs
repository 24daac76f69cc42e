//! Domain entities plus the request and response models of the catalog API.

pub mod entity;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use entity::{Entity, Film, Genre, Person, PersonFilm, PersonRef, Role};
pub use requests::{FilmListParams, KeysParams, PageParams, Pagination};
pub use responses::{
    FilmDetail, FilmSummary, HealthResponse, KeysResponse, Page, StatsResponse,
};
