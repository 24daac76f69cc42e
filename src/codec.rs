//! Entity Codec
//!
//! Serializes entities to and from the bytes stored in the cache.
//!
//! Wire format is a versioned JSON envelope:
//! `{"v": 1, "kind": "film", "data": { ... }}`. Absent optional fields are
//! written as `null` and decode back to `None`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Entity;

/// Current envelope schema version.
pub const SCHEMA_VERSION: u16 = 1;

// == Errors ==
/// Failure to turn cached bytes back into an entity.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed cache payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("payload holds a '{found}', expected a '{expected}'")]
    KindMismatch { found: String, expected: &'static str },

    #[error("decoded entity has an empty id")]
    EmptyId,
}

/// Failure to serialize an entity for the cache.
#[derive(Error, Debug)]
#[error("failed to encode entity: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

// == Envelope ==
#[derive(Serialize)]
struct EnvelopeRef<'a, E> {
    v: u16,
    kind: &'a str,
    data: &'a E,
}

#[derive(Deserialize)]
struct Envelope {
    v: u16,
    kind: String,
    data: serde_json::Value,
}

// == Encode ==
/// Serializes `entity` into its cache representation.
pub fn encode<E: Entity>(entity: &E) -> Result<Vec<u8>, EncodeError> {
    let envelope = EnvelopeRef {
        v: SCHEMA_VERSION,
        kind: E::KIND,
        data: entity,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

// == Decode ==
/// Parses cache bytes back into an entity of kind `E`.
///
/// Version and kind are checked before the payload is interpreted, so schema
/// drift surfaces as a typed error rather than a partially decoded value.
pub fn decode<E: Entity>(bytes: &[u8]) -> Result<E, DecodeError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;

    if envelope.v != SCHEMA_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            found: envelope.v,
            expected: SCHEMA_VERSION,
        });
    }
    if envelope.kind != E::KIND {
        return Err(DecodeError::KindMismatch {
            found: envelope.kind,
            expected: E::KIND,
        });
    }

    let entity: E = serde_json::from_value(envelope.data)?;
    if entity.id().is_empty() {
        return Err(DecodeError::EmptyId);
    }
    Ok(entity)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Film, Genre, Person, PersonFilm, PersonRef, Role};
    use proptest::prelude::*;

    fn bare_film(id: &str) -> Film {
        Film {
            id: id.to_string(),
            title: "X".to_string(),
            imdb_rating: None,
            description: None,
            creation_date: None,
            file_path: None,
            genres: Vec::new(),
            directors_names: Vec::new(),
            actors_names: Vec::new(),
            writers_names: Vec::new(),
            directors: Vec::new(),
            actors: Vec::new(),
            writers: Vec::new(),
        }
    }

    #[test]
    fn test_roundtrip_with_all_optionals_absent() {
        let film = bare_film("tt1");
        let decoded: Film = decode(&encode(&film).unwrap()).unwrap();
        assert_eq!(decoded, film);
        assert!(decoded.imdb_rating.is_none());
        assert!(decoded.description.is_none());
        assert!(decoded.creation_date.is_none());
    }

    #[test]
    fn test_envelope_shape() {
        let bytes = encode(&bare_film("tt1")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["v"], 1);
        assert_eq!(value["kind"], "film");
        assert_eq!(value["data"]["id"], "tt1");
        assert!(value["data"]["imdb_rating"].is_null());
    }

    #[test]
    fn test_decode_garbage_is_malformed() {
        let result = decode::<Film>(b"\x00\x01not json");
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_other_version() {
        let bytes = br#"{"v":2,"kind":"film","data":{"id":"tt1","title":"X"}}"#;
        let result = decode::<Film>(bytes);
        assert!(matches!(
            result,
            Err(DecodeError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_other_kind() {
        let person = Person {
            id: "p1".to_string(),
            full_name: "Ann".to_string(),
            films: Vec::new(),
        };
        let bytes = encode(&person).unwrap();
        let result = decode::<Film>(&bytes);
        assert!(matches!(result, Err(DecodeError::KindMismatch { .. })));
    }

    #[test]
    fn test_decode_rejects_empty_id() {
        let bytes = br#"{"v":1,"kind":"film","data":{"id":"","title":"X"}}"#;
        assert!(matches!(decode::<Film>(bytes), Err(DecodeError::EmptyId)));
    }

    #[test]
    fn test_decode_rejects_schema_drift() {
        // title missing
        let bytes = br#"{"v":1,"kind":"film","data":{"id":"tt1"}}"#;
        assert!(matches!(decode::<Film>(bytes), Err(DecodeError::Malformed(_))));
    }

    // == Property Tests ==
    fn opt_text() -> impl Strategy<Value = Option<String>> {
        prop::option::of("[a-zA-Z0-9 .,'-]{0,40}")
    }

    fn person_ref() -> impl Strategy<Value = PersonRef> {
        ("[a-f0-9-]{1,36}", "[A-Za-z .]{1,30}").prop_map(|(id, name)| PersonRef { id, name })
    }

    fn genre() -> impl Strategy<Value = Genre> {
        ("[a-f0-9-]{1,36}", "[A-Za-z-]{1,20}", opt_text())
            .prop_map(|(id, name, description)| Genre { id, name, description })
    }

    prop_compose! {
        fn film()(
            id in "[a-zA-Z0-9-]{1,36}",
            title in "\\PC{0,60}",
            imdb_rating in prop::option::of(0.0f64..10.0),
            description in opt_text(),
            creation_date in prop::option::of("[0-9]{4}-[0-9]{2}-[0-9]{2}"),
            file_path in opt_text(),
            genres in prop::collection::vec(genre(), 0..4),
            directors in prop::collection::vec(person_ref(), 0..3),
            actors in prop::collection::vec(person_ref(), 0..6),
            writers in prop::collection::vec(person_ref(), 0..3),
        ) -> Film {
            Film {
                id,
                title,
                imdb_rating,
                description,
                creation_date,
                file_path,
                genres,
                directors_names: directors.iter().map(|p| p.name.clone()).collect(),
                actors_names: actors.iter().map(|p| p.name.clone()).collect(),
                writers_names: writers.iter().map(|p| p.name.clone()).collect(),
                directors,
                actors,
                writers,
            }
        }
    }

    prop_compose! {
        fn person()(
            id in "[a-f0-9-]{1,36}",
            full_name in "\\PC{1,40}",
            films in prop::collection::vec(
                ("[a-z0-9]{1,12}", prop::sample::subsequence(Role::ALL.to_vec(), 1..=3)),
                0..5,
            ),
        ) -> Person {
            Person {
                id,
                full_name,
                films: films
                    .into_iter()
                    .map(|(id, roles)| PersonFilm { id, roles })
                    .collect(),
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_film_roundtrip(film in film()) {
            let decoded: Film = decode(&encode(&film).unwrap()).unwrap();
            prop_assert_eq!(decoded, film);
        }

        #[test]
        fn prop_person_roundtrip(person in person()) {
            let decoded: Person = decode(&encode(&person).unwrap()).unwrap();
            prop_assert_eq!(decoded, person);
        }

        #[test]
        fn prop_arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode::<Film>(&bytes);
        }
    }
}
