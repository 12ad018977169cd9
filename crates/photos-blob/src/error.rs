//! Error types for blob storage.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    /// The reference is not a `gs://bucket/key` URI.
    #[error("Not a storage reference: {0}")]
    InvalidUri(String),

    /// No HMAC key is configured.
    #[error("Signing credentials are not configured")]
    NotConfigured,

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Storage request failed: {0}")]
    Transport(String),

    #[error("Storage returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
}

impl From<reqwest::Error> for BlobError {
    fn from(e: reqwest::Error) -> Self {
        BlobError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BlobError>;
