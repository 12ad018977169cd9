//! photos-core: Shared types, configuration, and error handling for the photo graph services.
//!
//! This crate provides the foundational types used across all components:
//! - Node and edge types of the `PhotosGraph` property graph
//! - Agent event types streamed to API consumers
//! - Layered configuration
//! - Common error types

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::AppConfig;
pub use error::PhotosError;
pub use events::AgentEvent;
pub use types::{
    ordered_pair, EdgeLabel, Memory, MemoryId, NewMemory, Person, PersonId, Photo, PhotoId,
    RelationshipType,
};
