//! Database schema, property graph definition, and demo seed data.
//!
//! Schema setup runs as two DDL batches: tables and indexes first, then
//! the property graph over them. Both batches are idempotent.

use serde_json::{json, Value};

use photos_core::{ordered_pair, EdgeLabel, PersonId};

use crate::client::GraphClient;
use crate::error::{GraphError, Result};
use crate::store::{StoreError, StoreErrorKind};

/// Base tables and their secondary indexes.
pub fn table_ddl() -> Vec<String> {
    [
        "CREATE TABLE IF NOT EXISTS Person (
            person_id      STRING(36) NOT NULL,
            name           STRING(MAX),
            photo_location STRING(MAX)
        ) PRIMARY KEY (person_id)",
        "CREATE TABLE IF NOT EXISTS Photo (
            photo_id       STRING(36) NOT NULL,
            timestamp      TIMESTAMP,
            location_name  STRING(MAX),
            photo_location STRING(MAX)
        ) PRIMARY KEY (photo_id)",
        "CREATE TABLE IF NOT EXISTS Memories (
            memory_id          STRING(36) NOT NULL,
            user_id            STRING(36) NOT NULL,
            memory_title       STRING(MAX),
            memory_description STRING(MAX),
            creation_timestamp TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp=true),
            memory_media       ARRAY<STRING(MAX)>,
            CONSTRAINT fk_memories_user FOREIGN KEY (user_id) REFERENCES Person (person_id) ON DELETE CASCADE
        ) PRIMARY KEY (memory_id)",
        "CREATE TABLE IF NOT EXISTS PersonOwnsPhoto (
            person_id STRING(36) NOT NULL,
            photo_id  STRING(36) NOT NULL,
            CONSTRAINT fk_owns_person FOREIGN KEY (person_id) REFERENCES Person (person_id) ON DELETE CASCADE,
            CONSTRAINT fk_owns_photo FOREIGN KEY (photo_id) REFERENCES Photo (photo_id) ON DELETE CASCADE
        ) PRIMARY KEY (person_id, photo_id)",
        "CREATE TABLE IF NOT EXISTS PersonAppearsInPhoto (
            person_id STRING(36) NOT NULL,
            photo_id  STRING(36) NOT NULL,
            CONSTRAINT fk_appears_person FOREIGN KEY (person_id) REFERENCES Person (person_id) ON DELETE CASCADE,
            CONSTRAINT fk_appears_photo FOREIGN KEY (photo_id) REFERENCES Photo (photo_id) ON DELETE CASCADE
        ) PRIMARY KEY (person_id, photo_id)",
        "CREATE TABLE IF NOT EXISTS PersonPhotographedWithPerson (
            person1_id STRING(36) NOT NULL,
            person2_id STRING(36) NOT NULL,
            frequency  INT64,
            last_seen  TIMESTAMP,
            CONSTRAINT fk_photographed_person1 FOREIGN KEY (person1_id) REFERENCES Person (person_id) ON DELETE CASCADE,
            CONSTRAINT fk_photographed_person2 FOREIGN KEY (person2_id) REFERENCES Person (person_id) ON DELETE CASCADE,
            CHECK (person1_id < person2_id)
        ) PRIMARY KEY (person1_id, person2_id)",
        "CREATE TABLE IF NOT EXISTS PersonRelationships (
            person1_id        STRING(36) NOT NULL,
            person2_id        STRING(36) NOT NULL,
            relationship_type STRING(MAX) NOT NULL,
            status            STRING(MAX),
            created_at        TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp=true),
            CONSTRAINT fk_relationship_person1 FOREIGN KEY (person1_id) REFERENCES Person (person_id) ON DELETE CASCADE,
            CONSTRAINT fk_relationship_person2 FOREIGN KEY (person2_id) REFERENCES Person (person_id) ON DELETE CASCADE,
            CHECK (person1_id < person2_id)
        ) PRIMARY KEY (person1_id, person2_id)",
        "CREATE INDEX IF NOT EXISTS IDX_Photo_location_name ON Photo(location_name)",
        "CREATE INDEX IF NOT EXISTS IDX_Photo_timestamp ON Photo(timestamp DESC)",
        "CREATE INDEX IF NOT EXISTS IDX_PersonAppearsInPhoto_photo_id ON PersonAppearsInPhoto(photo_id)",
        "CREATE INDEX IF NOT EXISTS IDX_PersonPhotographedWithPerson_person2_id ON PersonPhotographedWithPerson(person2_id)",
        "CREATE INDEX IF NOT EXISTS IDX_PersonRelationships_person2_id_type ON PersonRelationships(person2_id, relationship_type)",
        "CREATE INDEX IF NOT EXISTS IDX_Memories_user_id_timestamp ON Memories(user_id, creation_timestamp DESC)",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// The property graph over the base tables.
pub fn graph_ddl(graph_name: &str) -> String {
    let edge = |label: EdgeLabel, source: &str, destination: &str, target: &str| {
        format!(
            "{table} AS {label:?}
              SOURCE KEY ({source}) REFERENCES Person (person_id)
              DESTINATION KEY ({destination}) REFERENCES {target} ({target_key})",
            table = label.table(),
            target_key = if target == "Photo" { "photo_id" } else { "person_id" },
        )
    };

    let edges = [
        edge(EdgeLabel::Owns, "person_id", "photo_id", "Photo"),
        edge(EdgeLabel::AppearsIn, "person_id", "photo_id", "Photo"),
        edge(EdgeLabel::PhotographedWith, "person1_id", "person2_id", "Person"),
        edge(EdgeLabel::RelationShip, "person1_id", "person2_id", "Person"),
    ];

    format!(
        "CREATE PROPERTY GRAPH IF NOT EXISTS {graph_name}
          NODE TABLES (
            Person KEY (person_id),
            Photo KEY (photo_id)
          )
          EDGE TABLES (
            {}
          )",
        edges.join(",\n            ")
    )
}

/// Rows destined for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRows {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub rows: Vec<Vec<Value>>,
}

/// Demo dataset: eight people, six photos owned by `p01`, their edges and
/// two memories. Tables are ordered so foreign keys resolve.
pub fn seed_data() -> Vec<TableRows> {
    let people = [
        ("p01", "Rohan"),
        ("p02", "Priya"),
        ("p03", "Vikram"),
        ("p04", "Maya"),
        ("p05", "Anjali"),
        ("p06", "Sameer"),
        ("p07", "Bruno"),
        ("p08", "Zara"),
    ];
    let relationships = [
        ("p01", "p02", "FAMILY", "2015-01-10T10:00:00Z"),
        ("p01", "p03", "FAMILY", "2015-01-10T10:00:00Z"),
        ("p01", "p04", "FAMILY", "2015-01-10T10:00:00Z"),
        ("p01", "p05", "FRIEND", "2017-08-21T18:30:00Z"),
        ("p01", "p06", "FRIEND", "2017-09-01T12:00:00Z"),
        ("p01", "p07", "PET", "2020-06-15T11:00:00Z"),
        ("p01", "p08", "FRIEND", "2022-03-05T20:15:00Z"),
        ("p02", "p03", "FAMILY", "1995-12-02T14:00:00Z"),
        ("p05", "p06", "FRIEND", "2017-08-25T13:00:00Z"),
    ];
    let photos = [
        ("ph01", "2023-11-20T13:30:00Z", "Goa, India"),
        ("ph02", "2021-11-04T20:00:00Z", "Home, Delhi"),
        ("ph03", "2025-04-12T09:15:00Z", "City Park"),
        ("ph04", "2018-02-18T16:45:00Z", "College Campus"),
        ("ph05", "2024-07-26T11:50:00Z", "Himalayan Trek"),
        ("ph06", "2025-01-15T19:30:00Z", "Home, Delhi"),
    ];
    let appearances: [(&str, &[&str]); 6] = [
        ("ph01", &["p01", "p05", "p06"]),
        ("ph02", &["p01", "p02", "p03", "p04"]),
        ("ph03", &["p01", "p07"]),
        ("ph04", &["p01", "p05"]),
        ("ph05", &["p01", "p06", "p08"]),
        ("ph06", &["p01", "p02", "p03"]),
    ];
    let memories = [
        (
            "mem01",
            "Unforgettable Goa Trip!",
            "That amazing trip to Goa with Anjali and Sameer back in 2023. The beaches were incredible!",
            "2024-01-15T22:00:00Z",
            &["ph01"][..],
        ),
        (
            "mem02",
            "Diwali 2021",
            "A beautiful Diwali night with the whole family at home. Everyone looks so happy.",
            "2022-05-20T15:30:00Z",
            &["ph02"][..],
        ),
    ];

    let location = |photo_id: &str| format!("gs://my-photos-bucket/{photo_id}.jpg");

    vec![
        TableRows {
            table: "Person",
            columns: &["person_id", "name"],
            rows: people.iter().map(|(id, name)| vec![json!(id), json!(name)]).collect(),
        },
        TableRows {
            table: EdgeLabel::RelationShip.table(),
            columns: &["person1_id", "person2_id", "relationship_type", "status", "created_at"],
            rows: relationships
                .iter()
                .map(|(a, b, kind, at)| {
                    let (a, b) = ordered_pair(PersonId::new(*a), PersonId::new(*b));
                    vec![json!(a), json!(b), json!(kind), json!("CONFIRMED"), json!(at)]
                })
                .collect(),
        },
        TableRows {
            table: "Photo",
            columns: &["photo_id", "timestamp", "location_name", "photo_location"],
            rows: photos
                .iter()
                .map(|(id, at, place)| vec![json!(id), json!(at), json!(place), json!(location(*id))])
                .collect(),
        },
        TableRows {
            table: EdgeLabel::Owns.table(),
            columns: &["person_id", "photo_id"],
            rows: photos.iter().map(|(id, _, _)| vec![json!("p01"), json!(id)]).collect(),
        },
        TableRows {
            table: EdgeLabel::AppearsIn.table(),
            columns: &["person_id", "photo_id"],
            rows: appearances
                .iter()
                .flat_map(|(photo, people)| people.iter().map(move |p| vec![json!(p), json!(photo)]))
                .collect(),
        },
        TableRows {
            table: EdgeLabel::PhotographedWith.table(),
            columns: &["person1_id", "person2_id", "frequency", "last_seen"],
            rows: co_occurrences(&photos, &appearances),
        },
        TableRows {
            table: "Memories",
            columns: &[
                "memory_id",
                "user_id",
                "memory_title",
                "memory_description",
                "creation_timestamp",
                "memory_media",
            ],
            rows: memories
                .iter()
                .map(|(id, title, description, at, media)| {
                    let media: Vec<String> = media.iter().map(|p| location(*p)).collect();
                    vec![json!(id), json!("p01"), json!(title), json!(description), json!(at), json!(media)]
                })
                .collect(),
        },
    ]
}

/// Derive `PhotographedWith` rows (frequency and last seen) from who
/// appears together in which photo.
fn co_occurrences(
    photos: &[(&str, &str, &str)],
    appearances: &[(&str, &[&str])],
) -> Vec<Vec<Value>> {
    use std::collections::BTreeMap;

    let mut pairs: BTreeMap<(PersonId, PersonId), (i64, &str)> = BTreeMap::new();
    for (photo, people) in appearances {
        let taken_at = photos
            .iter()
            .find(|(id, _, _)| id == photo)
            .map(|(_, at, _)| *at)
            .unwrap_or_default();
        for (i, a) in people.iter().enumerate() {
            for b in &people[i + 1..] {
                let key = ordered_pair(PersonId::new(*a), PersonId::new(*b));
                let entry = pairs.entry(key).or_insert((0, taken_at));
                entry.0 += 1;
                // RFC 3339 UTC strings order chronologically.
                if taken_at > entry.1 {
                    entry.1 = taken_at;
                }
            }
        }
    }

    pairs
        .into_iter()
        .map(|((a, b), (frequency, last_seen))| {
            vec![json!(a), json!(b), json!(frequency.to_string()), json!(last_seen)]
        })
        .collect()
}

/// DDL failures that mean the object is already in place.
fn already_applied(e: &StoreError) -> bool {
    matches!(
        e.kind,
        StoreErrorKind::AlreadyExists | StoreErrorKind::FailedPrecondition
    )
}

impl GraphClient {
    /// Create tables, indexes, and the property graph if missing.
    pub async fn apply_schema(&self) -> Result<()> {
        let batches = [
            ("tables and indexes", table_ddl()),
            ("property graph", vec![graph_ddl(self.graph_name())]),
        ];

        for (description, statements) in batches {
            tracing::info!(batch = description, statements = statements.len(), "Applying DDL");
            match self.store().update_ddl(&statements).await {
                Ok(()) => tracing::info!(batch = description, "DDL applied"),
                Err(e) if already_applied(&e) => {
                    tracing::warn!(batch = description, error = %e, "DDL already applied, continuing");
                }
                Err(e) => {
                    tracing::error!(batch = description, error = %e, "DDL failed");
                    return Err(GraphError::Store(e));
                }
            }
        }
        Ok(())
    }

    /// Insert the demo dataset. Returns the number of rows written.
    ///
    /// A table whose rows already exist is skipped with a warning.
    pub async fn seed(&self) -> Result<usize> {
        let mut written = 0;
        for TableRows { table, columns, rows } in seed_data() {
            let count = rows.len();
            match self.store().insert(table, columns, rows).await {
                Ok(()) => {
                    tracing::info!(table, rows = count, "Seeded table");
                    written += count;
                }
                Err(e) if e.kind == StoreErrorKind::AlreadyExists => {
                    tracing::warn!(table, error = %e, "Seed rows already present, skipping table");
                }
                Err(e) => return Err(GraphError::Store(e)),
            }
        }
        Ok(written)
    }
}
