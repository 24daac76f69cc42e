//! ETL Load Side
//!
//! Turns joined relational rows into film documents and loads them into the
//! search index.

pub mod builder;
pub mod loader;

pub use builder::{parse_rows, BuildError, FilmDocumentBuilder, FilmWorkRow};
pub use loader::IndexLoader;
