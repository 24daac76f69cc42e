//! Domain Entities
//!
//! Denormalized catalog records as they live in the search index and in the cache.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

// == Entity Trait ==
/// A cacheable catalog record with a stable, non-empty identifier.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Kind tag written into the cache envelope
    const KIND: &'static str;

    /// Namespace prepended to the id to form the cache key
    const KEY_PREFIX: &'static str;

    /// Stable identifier of this record
    fn id(&self) -> &str;

    /// Cache key under which the record with `id` is stored.
    fn cache_key(id: &str) -> String {
        format!("{}{}", Self::KEY_PREFIX, id)
    }

    /// Whether `key` names a record of this kind. Ids never contain `:`.
    fn owns_key(key: &str) -> bool {
        key.strip_prefix(Self::KEY_PREFIX)
            .is_some_and(|id| !id.is_empty() && !id.contains(':'))
    }
}

// == Nested References ==
/// Genre attached to a film.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Person reference embedded in a film's role lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: String,
    pub name: String,
}

// == Role ==
/// Part a person plays in a film.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Actor,
    Director,
    Writer,
}

impl Role {
    /// All roles, in the order film documents list them.
    pub const ALL: [Role; 3] = [Role::Actor, Role::Director, Role::Writer];

    /// Singular name (`actor`).
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Actor => "actor",
            Role::Director => "director",
            Role::Writer => "writer",
        }
    }

    /// Name of the nested list on a film document (`actors`).
    pub fn list_field(self) -> &'static str {
        match self {
            Role::Actor => "actors",
            Role::Director => "directors",
            Role::Writer => "writers",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "actor" => Ok(Role::Actor),
            "director" => Ok(Role::Director),
            "writer" => Ok(Role::Writer),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

// == Film ==
/// A film document from the `movies` index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Film {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub imdb_rating: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub directors_names: Vec<String>,
    #[serde(default)]
    pub actors_names: Vec<String>,
    #[serde(default)]
    pub writers_names: Vec<String>,
    #[serde(default)]
    pub directors: Vec<PersonRef>,
    #[serde(default)]
    pub actors: Vec<PersonRef>,
    #[serde(default)]
    pub writers: Vec<PersonRef>,
}

impl Film {
    /// People credited with `role`, in document order.
    pub fn people(&self, role: Role) -> &[PersonRef] {
        match role {
            Role::Actor => &self.actors,
            Role::Director => &self.directors,
            Role::Writer => &self.writers,
        }
    }
}

impl Entity for Film {
    const KIND: &'static str = "film";
    const KEY_PREFIX: &'static str = "";

    fn id(&self) -> &str {
        &self.id
    }
}

// == Person ==
/// A film a person took part in, with every role they held on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonFilm {
    pub id: String,
    pub roles: Vec<Role>,
}

/// A person assembled from the role lists of the films they appear in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub films: Vec<PersonFilm>,
}

impl Person {
    /// Records that this person holds `role` on film `film_id`.
    ///
    /// Films keep first-seen order; a role is listed once per film.
    pub fn credit(&mut self, film_id: &str, role: Role) {
        match self.films.iter_mut().find(|f| f.id == film_id) {
            Some(film) => {
                if !film.roles.contains(&role) {
                    film.roles.push(role);
                }
            }
            None => self.films.push(PersonFilm {
                id: film_id.to_string(),
                roles: vec![role],
            }),
        }
    }

    /// Ids of the films this person appears in.
    pub fn film_ids(&self) -> Vec<String> {
        self.films.iter().map(|f| f.id.clone()).collect()
    }
}

impl Entity for Person {
    const KIND: &'static str = "person";
    const KEY_PREFIX: &'static str = "person:";

    fn id(&self) -> &str {
        &self.id
    }
}
