//! Entity Sources
//!
//! How the resolver reaches the document store for each entity kind. Films
//! are documents of their own; people only exist inside films' role lists and
//! are assembled from the films that mention them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::StoreError;
use crate::models::{Entity, Film, Person, Role};
use crate::query::{translate, QueryDescriptor};
use crate::store::{Document, DocumentStore};

// == Entity Source Trait ==
/// Store-side lookups for entities of kind `E`.
#[async_trait]
pub trait EntitySource<E: Entity>: Send + Sync {
    /// Fetches one entity; `Ok(None)` when the store has no match.
    async fn fetch_by_id(&self, id: &str) -> Result<Option<E>, StoreError>;

    /// Fetches every entity matching `descriptor`, in store order.
    async fn fetch_by_query(&self, descriptor: &QueryDescriptor) -> Result<Vec<E>, StoreError>;
}

/// Decodes a film document. The id must be present and non-empty.
pub fn film_from_document(doc: Document) -> Result<Film, StoreError> {
    let Document { id, source } = doc;
    let film: Film = serde_json::from_value(source).map_err(|err| StoreError::InvalidDocument {
        id: id.clone(),
        message: err.to_string(),
    })?;
    if film.id.is_empty() {
        return Err(StoreError::InvalidDocument {
            id,
            message: "empty film id".to_string(),
        });
    }
    Ok(film)
}

/// Decodes search hits, skipping documents that do not fit the schema.
fn films_from_hits(hits: Vec<Document>) -> Vec<Film> {
    hits.into_iter()
        .filter_map(|doc| match film_from_document(doc) {
            Ok(film) => Some(film),
            Err(err) => {
                warn!("Skipping search hit: {}", err);
                None
            }
        })
        .collect()
}

async fn search_films(
    store: &dyn DocumentStore,
    index: &str,
    descriptor: &QueryDescriptor,
) -> Result<Vec<Film>, StoreError> {
    let hits = store.search(index, &translate(descriptor)).await?;
    Ok(films_from_hits(hits))
}

// == Film Source ==
pub struct FilmSource {
    store: Arc<dyn DocumentStore>,
    index: String,
}

impl FilmSource {
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
        }
    }
}

#[async_trait]
impl EntitySource<Film> for FilmSource {
    async fn fetch_by_id(&self, id: &str) -> Result<Option<Film>, StoreError> {
        match self.store.get_by_id(&self.index, id).await? {
            Some(doc) => film_from_document(doc).map(Some),
            None => Ok(None),
        }
    }

    async fn fetch_by_query(&self, descriptor: &QueryDescriptor) -> Result<Vec<Film>, StoreError> {
        search_films(self.store.as_ref(), &self.index, descriptor).await
    }
}

// == Person Source ==
pub struct PersonSource {
    store: Arc<dyn DocumentStore>,
    index: String,
}

impl PersonSource {
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
        }
    }
}

#[async_trait]
impl EntitySource<Person> for PersonSource {
    async fn fetch_by_id(&self, id: &str) -> Result<Option<Person>, StoreError> {
        let descriptor = QueryDescriptor::role_member(id, None);
        let films = search_films(self.store.as_ref(), &self.index, &descriptor).await?;
        Ok(assemble_person(id, &films))
    }

    async fn fetch_by_query(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<Vec<Person>, StoreError> {
        let films = search_films(self.store.as_ref(), &self.index, descriptor).await?;
        Ok(collect_people(&films))
    }
}

/// Builds the person `person_id` from the films crediting them.
///
/// The name comes from the first credit seen; films keep hit order.
pub fn assemble_person(person_id: &str, films: &[Film]) -> Option<Person> {
    let mut person: Option<Person> = None;
    for film in films {
        for role in Role::ALL {
            for credited in film.people(role).iter().filter(|p| p.id == person_id) {
                person
                    .get_or_insert_with(|| Person {
                        id: credited.id.clone(),
                        full_name: credited.name.clone(),
                        films: Vec::new(),
                    })
                    .credit(film.id(), role);
            }
        }
    }
    person
}

/// Every distinct person credited in `films`, in first-seen order.
pub fn collect_people(films: &[Film]) -> Vec<Person> {
    let mut people: Vec<Person> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for film in films {
        for role in Role::ALL {
            for credited in film.people(role) {
                if credited.id.is_empty() {
                    continue;
                }
                let position = *positions.entry(credited.id.clone()).or_insert_with(|| {
                    people.push(Person {
                        id: credited.id.clone(),
                        full_name: credited.name.clone(),
                        films: Vec::new(),
                    });
                    people.len() - 1
                });
                people[position].credit(film.id(), role);
            }
        }
    }
    people
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PersonRef;
    use serde_json::json;

    fn film(id: &str, actors: &[(&str, &str)], writers: &[(&str, &str)]) -> Film {
        let refs = |people: &[(&str, &str)]| {
            people
                .iter()
                .map(|(id, name)| PersonRef {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect::<Vec<_>>()
        };
        serde_json::from_value(json!({ "id": id, "title": id })).map(|mut f: Film| {
            f.actors = refs(actors);
            f.writers = refs(writers);
            f
        })
        .unwrap()
    }

    #[test]
    fn test_film_from_document_rejects_bad_shape() {
        let result = film_from_document(Document::new("tt1", json!({ "id": "tt1" })));
        assert!(matches!(result, Err(StoreError::InvalidDocument { .. })));

        let result = film_from_document(Document::new("tt1", json!({ "id": "", "title": "X" })));
        assert!(matches!(result, Err(StoreError::InvalidDocument { .. })));
    }

    #[test]
    fn test_assemble_person_across_films_and_roles() {
        let films = vec![
            film("f1", &[("p1", "John Sayles")], &[("p1", "John Sayles")]),
            film("f2", &[("p2", "Other")], &[]),
            film("f3", &[], &[("p1", "J. Sayles")]),
        ];

        let person = assemble_person("p1", &films).unwrap();
        assert_eq!(person.full_name, "John Sayles");
        assert_eq!(person.film_ids(), vec!["f1", "f3"]);
        assert_eq!(person.films[0].roles, vec![Role::Actor, Role::Writer]);
        assert_eq!(person.films[1].roles, vec![Role::Writer]);

        assert!(assemble_person("nobody", &films).is_none());
    }

    #[test]
    fn test_collect_people_first_seen_order() {
        let films = vec![
            film("f1", &[("p2", "B"), ("p1", "A")], &[]),
            film("f2", &[("p1", "A")], &[("p3", "C")]),
        ];

        let people = collect_people(&films);
        let ids: Vec<&str> = people.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1", "p3"]);
        assert_eq!(people[1].film_ids(), vec!["f1", "f2"]);
    }
}
