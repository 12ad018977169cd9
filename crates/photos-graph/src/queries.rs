//! Typed read operations for the photo graph.
//!
//! Every read goes through the guarded executor with explicit field names.

use serde::{Deserialize, Serialize};

use photos_core::{Memory, Person, PersonId, Photo, PhotoId, RelationshipType};

use crate::client::{Fetched, GraphClient};
use crate::error::{GraphError, Result};
use crate::params::BoundParameters;

const PHOTO_FIELDS: &[&str] = &["photo_id", "timestamp", "location_name", "photo_location"];
const PERSON_FIELDS: &[&str] = &["person_id", "name", "photo_location"];
const MEMORY_FIELDS: &[&str] = &[
    "memory_id",
    "user_id",
    "memory_title",
    "memory_description",
    "creation_timestamp",
    "memory_media",
];

/// A person appearing in a photo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonInPhoto {
    pub photo_id: PhotoId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RelatedName {
    person_name: String,
}

/// Criteria for the final photo search of an agent request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoSearch {
    /// People who must appear. Joined into one delimited parameter.
    pub person_names: Vec<String>,
    /// Free-text location; wrapped in `%...%` unless it already has `%`.
    pub location: Option<String>,
    /// Minimum number of the named people co-occurring in a photo.
    pub min_matches: usize,
}

/// Delimiter for the joined `@person_names` parameter.
pub const NAME_DELIMITER: char = ',';

/// Turn a free-text location into a `LIKE` pattern.
pub fn like_pattern(location: &str) -> String {
    let location = location.trim();
    if location.contains('%') {
        location.to_string()
    } else {
        format!("%{location}%")
    }
}

impl GraphClient {
    /// All photos owned by a person, newest first.
    pub async fn photos_by_owner(&self, person_id: &PersonId) -> Result<Fetched<Photo>> {
        let sql = "SELECT p.photo_id, p.timestamp, p.location_name, p.photo_location
             FROM Photo AS p
             JOIN PersonOwnsPhoto AS pop ON p.photo_id = pop.photo_id
             WHERE pop.person_id = @person_id
             ORDER BY p.timestamp DESC";
        let params = BoundParameters::new().with_string("person_id", person_id.as_str());
        self.fetch(sql, &params, PHOTO_FIELDS).await
    }

    /// All memories of a user, newest first.
    pub async fn memories_by_user(&self, user_id: &PersonId) -> Result<Fetched<Memory>> {
        let sql = "SELECT memory_id, user_id, memory_title, memory_description,
                    creation_timestamp, memory_media
             FROM Memories
             WHERE user_id = @user_id
             ORDER BY creation_timestamp DESC";
        let params = BoundParameters::new().with_string("user_id", user_id.as_str());
        self.fetch(sql, &params, MEMORY_FIELDS).await
    }

    pub async fn person_by_id(&self, person_id: &PersonId) -> Result<Fetched<Person>> {
        let sql = "SELECT person_id, name, photo_location FROM Person WHERE person_id = @person_id";
        let params = BoundParameters::new().with_string("person_id", person_id.as_str());
        self.fetch(sql, &params, PERSON_FIELDS).await
    }

    /// Case-insensitive lookup by display name.
    pub async fn person_by_name(&self, name: &str) -> Result<Fetched<Person>> {
        let sql = "SELECT person_id, name, photo_location FROM Person
             WHERE LOWER(name) = LOWER(@person_name)";
        let params = BoundParameters::new().with_string("person_name", name);
        self.fetch(sql, &params, PERSON_FIELDS).await
    }

    /// Names of everyone appearing in any of the given photos.
    pub async fn people_in_photos(&self, photo_ids: &[PhotoId]) -> Result<Fetched<PersonInPhoto>> {
        if photo_ids.is_empty() {
            return Ok(Fetched {
                items: Vec::new(),
                warnings: Vec::new(),
            });
        }
        let sql = "SELECT pa.photo_id, p.name
             FROM PersonAppearsInPhoto AS pa
             JOIN Person AS p ON pa.person_id = p.person_id
             WHERE pa.photo_id IN UNNEST(@photo_ids)";
        let params = BoundParameters::new()
            .with_string_array("photo_ids", photo_ids.iter().map(|id| id.as_str()));
        self.fetch(sql, &params, &["photo_id", "name"]).await
    }

    /// Names of people related to `user_name` by `relationship`, in either
    /// edge direction.
    pub async fn relationship_names(
        &self,
        user_name: &str,
        relationship: RelationshipType,
    ) -> Result<Fetched<String>> {
        let sql = format!(
            "SELECT DISTINCT other.name AS person_name
             FROM GRAPH {graph}
             MATCH (user:Person)-[r:RelationShip]-(other:Person)
             WHERE LOWER(user.name) = LOWER(@user_name)
               AND r.relationship_type = @relationship_type
             ORDER BY person_name",
            graph = self.graph_name()
        );
        let params = BoundParameters::new()
            .with_string("user_name", user_name)
            .with_string("relationship_type", relationship.as_str());

        let fetched: Fetched<RelatedName> = self.fetch(&sql, &params, &["person_name"]).await?;
        Ok(Fetched {
            items: fetched.items.into_iter().map(|r| r.person_name).collect(),
            warnings: fetched.warnings,
        })
    }

    /// One photo search: by people (with a co-occurrence threshold), by
    /// location, or both.
    pub async fn photos_with_people(&self, search: &PhotoSearch) -> Result<Fetched<Photo>> {
        let graph = self.graph_name();
        let location = search.location.as_deref().map(like_pattern);

        let (sql, params) = match (search.person_names.is_empty(), location) {
            (true, None) => {
                return Err(GraphError::InvalidInput(
                    "photo search needs people or a location".to_string(),
                ))
            }
            (true, Some(location)) => (
                format!(
                    "SELECT photo.photo_id, photo.timestamp, photo.location_name, photo.photo_location
                     FROM GRAPH {graph}
                     MATCH (photo:Photo)
                     WHERE photo.location_name LIKE @location
                     ORDER BY photo.timestamp DESC"
                ),
                BoundParameters::new().with_string("location", location),
            ),
            (false, location) => {
                let joined = search
                    .person_names
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(&NAME_DELIMITER.to_string());
                let min_matches = search.min_matches.clamp(1, search.person_names.len());

                let mut params = BoundParameters::new()
                    .with_string("person_names", joined)
                    .with_int64("min_matches", min_matches as i64);
                let location_clause = match location {
                    Some(location) => {
                        params = params.with_string("location", location);
                        "AND photo.location_name LIKE @location"
                    }
                    None => "",
                };

                (
                    format!(
                        "SELECT photo.photo_id, photo.timestamp, photo.location_name, photo.photo_location
                         FROM GRAPH {graph}
                         MATCH (person:Person)-[:AppearsIn]->(photo:Photo)
                         WHERE LOWER(person.name) IN UNNEST(SPLIT(LOWER(@person_names), '{NAME_DELIMITER}'))
                           {location_clause}
                         GROUP BY photo.photo_id, photo.timestamp, photo.location_name, photo.photo_location
                         HAVING COUNT(DISTINCT person.person_id) >= @min_matches
                         ORDER BY photo.timestamp DESC"
                    ),
                    params,
                )
            }
        };

        self.fetch(&sql, &params, PHOTO_FIELDS).await
    }
}
