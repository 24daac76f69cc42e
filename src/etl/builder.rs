//! Film Document Builder
//!
//! Folds the flat rows of the film/person/genre join into one denormalized
//! `Film` per film work.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use crate::models::{Film, Genre, PersonRef, Role};

/// Rows that cannot be folded into a film.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("Row without a film id")]
    EmptyFilmId,

    #[error("Film '{0}' has no title")]
    MissingTitle(String),

    #[error("Film '{film_id}' credits a {role} without a person id")]
    IncompleteCredit { film_id: String, role: &'static str },
}

// == Film Work Row ==
/// One row of the joined film work query.
///
/// Person and genre columns are empty when the film has no such link.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FilmWorkRow {
    pub fw_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default, alias = "id")]
    pub person_id: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default, alias = "g_id")]
    pub genre_id: Option<String>,
    #[serde(default, alias = "name")]
    pub genre_name: Option<String>,
    #[serde(default, alias = "g_description")]
    pub genre_description: Option<String>,
}

/// Parses a JSON array of rows.
pub fn parse_rows(json: &str) -> Result<Vec<FilmWorkRow>, serde_json::Error> {
    serde_json::from_str(json)
}

// == Builder ==
/// Accumulates rows keyed by film id; films come out in first-seen order.
#[derive(Debug, Default)]
pub struct FilmDocumentBuilder {
    films: Vec<Film>,
    positions: HashMap<String, usize>,
}

impl FilmDocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one row in. The first row of a film fixes its scalar fields.
    pub fn push(&mut self, row: FilmWorkRow) -> Result<(), BuildError> {
        if row.fw_id.is_empty() {
            return Err(BuildError::EmptyFilmId);
        }
        if row.role.is_some() && row.person_id.as_deref().map_or(true, str::is_empty) {
            return Err(BuildError::IncompleteCredit {
                film_id: row.fw_id,
                role: row.role.map_or("person", Role::as_str),
            });
        }

        let position = match self.positions.get(&row.fw_id) {
            Some(&position) => position,
            None => {
                if row.title.is_empty() {
                    return Err(BuildError::MissingTitle(row.fw_id));
                }
                self.films.push(Film {
                    id: row.fw_id.clone(),
                    title: row.title.clone(),
                    imdb_rating: row.rating,
                    description: row.description.clone(),
                    creation_date: row.creation_date.clone(),
                    file_path: row.file_path.clone(),
                    genres: Vec::new(),
                    directors_names: Vec::new(),
                    actors_names: Vec::new(),
                    writers_names: Vec::new(),
                    directors: Vec::new(),
                    actors: Vec::new(),
                    writers: Vec::new(),
                });
                self.positions.insert(row.fw_id.clone(), self.films.len() - 1);
                self.films.len() - 1
            }
        };
        let film = &mut self.films[position];

        if let Some(genre_id) = row.genre_id.filter(|id| !id.is_empty()) {
            if !film.genres.iter().any(|g| g.id == genre_id) {
                film.genres.push(Genre {
                    id: genre_id,
                    name: row.genre_name.unwrap_or_default(),
                    description: row.genre_description,
                });
            }
        }

        if let (Some(role), Some(person_id)) = (row.role, row.person_id) {
            let name = row.full_name.unwrap_or_default();
            let (people, names) = match role {
                Role::Actor => (&mut film.actors, &mut film.actors_names),
                Role::Director => (&mut film.directors, &mut film.directors_names),
                Role::Writer => (&mut film.writers, &mut film.writers_names),
            };
            if !people.iter().any(|p| p.id == person_id) {
                names.push(name.clone());
                people.push(PersonRef {
                    id: person_id,
                    name,
                });
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.films.is_empty()
    }

    /// The built films, in first-seen order.
    pub fn finish(self) -> Vec<Film> {
        self.films
    }
}
