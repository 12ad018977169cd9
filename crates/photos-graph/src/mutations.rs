//! Write operations for the photo graph.
//!
//! Writes bypass the read-only guard and go straight to the store as
//! insert mutations. Only memories are written at request time; bulk node
//! and edge loading lives in [`crate::schema`].

use serde_json::{json, Value};

use photos_core::{Memory, MemoryId, NewMemory};

use crate::client::GraphClient;
use crate::error::{GraphError, Result};

/// Column value Spanner replaces with the commit timestamp.
pub const COMMIT_TIMESTAMP: &str = "spanner.commit_timestamp()";

const MEMORY_COLUMNS: &[&str] = &[
    "memory_id",
    "user_id",
    "memory_title",
    "memory_description",
    "creation_timestamp",
    "memory_media",
];

impl GraphClient {
    /// Insert a memory and return it with its generated id.
    ///
    /// `creation_timestamp` is assigned by the store and left unset on the
    /// returned record.
    pub async fn insert_memory(&self, new: NewMemory) -> Result<Memory> {
        if new.user_id.as_str().trim().is_empty() {
            return Err(GraphError::InvalidInput("user_id is required".to_string()));
        }
        if new.memory_title.trim().is_empty() {
            return Err(GraphError::InvalidInput(
                "memory_title is required".to_string(),
            ));
        }

        let memory = new.into_memory(MemoryId::new());
        let row = memory_row(&memory);

        self.store()
            .insert("Memories", MEMORY_COLUMNS, vec![row])
            .await?;

        tracing::info!(
            memory_id = %memory.memory_id,
            user_id = %memory.user_id,
            media = memory.memory_media.len(),
            "Memory created"
        );
        Ok(memory)
    }
}

fn memory_row(memory: &Memory) -> Vec<Value> {
    vec![
        json!(memory.memory_id.0),
        json!(memory.user_id.as_str()),
        json!(memory.memory_title),
        json!(memory.memory_description),
        json!(COMMIT_TIMESTAMP),
        json!(memory.memory_media),
    ]
}
