//! Core domain types for the photo property graph.
//!
//! These mirror the node and edge tables behind `PhotosGraph`: people,
//! photos, the edges between them, and user-created memories.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Identifiers ───────────────────────────────────────────────────

/// Stable identifier of a person (e.g. `p01`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PersonId(pub String);

impl PersonId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of a photo (e.g. `ph01`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PhotoId(pub String);

impl PhotoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a memory. Generated client-side as a v4 UUID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MemoryId(pub String);

impl MemoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Nodes ─────────────────────────────────────────────────────────

/// A person node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub person_id: PersonId,
    pub name: String,
    /// Profile image reference (`gs://bucket/key`).
    #[serde(default)]
    pub photo_location: Option<String>,
}

/// A photo node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Photo {
    pub photo_id: PhotoId,
    pub timestamp: Option<DateTime<Utc>>,
    pub location_name: Option<String>,
    /// Storage reference (`gs://bucket/key`).
    pub photo_location: Option<String>,
}

/// A memory: a titled collection of media created by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub memory_id: MemoryId,
    pub user_id: PersonId,
    pub memory_title: String,
    pub memory_description: String,
    /// Assigned by the store at commit time.
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub memory_media: Vec<String>,
}

/// Payload for creating a memory. The store assigns the timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMemory {
    pub user_id: PersonId,
    pub memory_title: String,
    pub memory_description: String,
    #[serde(default)]
    pub memory_media: Vec<String>,
}

impl NewMemory {
    /// Attach a fresh id, producing the record that will be inserted.
    pub fn into_memory(self, memory_id: MemoryId) -> Memory {
        Memory {
            memory_id,
            user_id: self.user_id,
            memory_title: self.memory_title,
            memory_description: self.memory_description,
            creation_timestamp: None,
            memory_media: self.memory_media,
        }
    }
}

/// Stores return `NULL` for empty array columns.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Edges ─────────────────────────────────────────────────────────

/// Graph edge labels as declared in the property graph definition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EdgeLabel {
    Owns,
    AppearsIn,
    PhotographedWith,
    RelationShip,
}

impl EdgeLabel {
    /// The backing table for this edge label.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Owns => "PersonOwnsPhoto",
            Self::AppearsIn => "PersonAppearsInPhoto",
            Self::PhotographedWith => "PersonPhotographedWithPerson",
            Self::RelationShip => "PersonRelationships",
        }
    }
}

/// Co-occurrence of two people in photos. `person1_id < person2_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotographedWith {
    pub person1_id: PersonId,
    pub person2_id: PersonId,
    pub frequency: i64,
    pub last_seen: Option<DateTime<Utc>>,
}

/// A typed relationship between two people. `person1_id < person2_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub person1_id: PersonId,
    pub person2_id: PersonId,
    pub relationship_type: RelationshipType,
    pub status: RelationshipStatus,
    pub created_at: DateTime<Utc>,
}

/// Order two person ids so the first sorts before the second.
///
/// Person→Person edge tables carry a `CHECK (person1_id < person2_id)`
/// constraint; callers building those rows go through this.
pub fn ordered_pair(a: PersonId, b: PersonId) -> (PersonId, PersonId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Family,
    Friend,
    Pet,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Family => "FAMILY",
            Self::Friend => "FRIEND",
            Self::Pet => "PET",
        }
    }

    /// Map a natural-language term ("cousins", "friends", "dog") to a type.
    pub fn from_term(term: &str) -> Option<Self> {
        let term = term.trim().to_lowercase();
        let singular = term.strip_suffix('s').unwrap_or(&term);
        match singular {
            "friend" | "buddy" | "buddie" | "pal" | "mate" => Some(Self::Friend),
            "family" | "familie" | "cousin" | "sibling" | "brother" | "sister" | "parent"
            | "mother" | "father" | "mom" | "dad" | "relative" | "aunt" | "uncle" => {
                Some(Self::Family)
            }
            "pet" | "dog" | "cat" | "puppie" | "puppy" => Some(Self::Pet),
            _ => None,
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FAMILY" => Ok(Self::Family),
            "FRIEND" => Ok(Self::Friend),
            "PET" => Ok(Self::Pet),
            other => Self::from_term(other).ok_or_else(|| format!("unknown relationship type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipStatus {
    Confirmed,
    Pending,
}

impl RelationshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "CONFIRMED",
            Self::Pending => "PENDING",
        }
    }
}
