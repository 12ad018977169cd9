use thiserror::Error;

/// Top-level error type shared by the photo graph services.
#[derive(Error, Debug)]
pub enum PhotosError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for PhotosError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
