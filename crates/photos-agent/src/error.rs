//! Error types for the search agent.

use thiserror::Error;

use photos_blob::BlobError;
use photos_collage::CollageError;
use photos_graph::GraphError;

/// Message shown to end users for any agent failure.
pub const GENERIC_FAILURE: &str = "Sorry, I could not process that request.";

#[derive(Debug, Error)]
pub enum AgentError {
    /// The prompt did not start with the trusted identity statement.
    #[error("Request is missing the logged in user")]
    MissingIdentity,

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Language model error: {0}")]
    Model(String),

    /// The final answer was not a JSON array of strings.
    #[error("Malformed final answer: {0}")]
    MalformedAnswer(String),

    #[error("No final answer after {0} turns")]
    TurnLimit(u32),

    #[error("Invalid tool arguments for {tool}: {message}")]
    ToolArguments { tool: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] BlobError),

    #[error("Collage error: {0}")]
    Collage(#[from] CollageError),

    /// The logged in user has no `Person` node.
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Transcript error: {0}")]
    Transcript(String),
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        AgentError::Model(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
