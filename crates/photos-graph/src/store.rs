//! The external graph store boundary.
//!
//! The store owns isolation, consistency and permissions. This crate only
//! issues statements and receives rows.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::params::BoundParameters;

/// Rows returned by the store, plus its field metadata when available.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names reported by the store, in row order.
    pub fields: Option<Vec<String>>,
    pub rows: Vec<Vec<Value>>,
}

/// Classes of store failure, as reported by the store's status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    PermissionDenied,
    NotFound,
    InvalidArgument,
    Unavailable,
    AlreadyExists,
    FailedPrecondition,
    Internal,
    Transport,
    Decode,
}

impl StoreErrorKind {
    /// Anticipated operational failures. Reads degrade to an empty result
    /// with a warning instead of failing the caller.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::NotFound | Self::InvalidArgument | Self::Unavailable
        )
    }

    /// Map a canonical status name (`PERMISSION_DENIED`, ...) to a kind.
    pub fn from_status(status: &str) -> Self {
        match status {
            "PERMISSION_DENIED" | "UNAUTHENTICATED" => Self::PermissionDenied,
            "NOT_FOUND" => Self::NotFound,
            "INVALID_ARGUMENT" | "OUT_OF_RANGE" => Self::InvalidArgument,
            "UNAVAILABLE" | "DEADLINE_EXCEEDED" | "RESOURCE_EXHAUSTED" => Self::Unavailable,
            "ALREADY_EXISTS" => Self::AlreadyExists,
            "FAILED_PRECONDITION" => Self::FailedPrecondition,
            _ => Self::Internal,
        }
    }

    /// Map a numeric canonical code (as found in long-running operations).
    pub fn from_code(code: i64) -> Self {
        match code {
            3 | 11 => Self::InvalidArgument,
            4 | 8 | 14 => Self::Unavailable,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 | 16 => Self::PermissionDenied,
            9 => Self::FailedPrecondition,
            _ => Self::Internal,
        }
    }

    /// Fallback mapping from the HTTP status when the body has no status.
    pub fn from_http(status: u16) -> Self {
        match status {
            400 => Self::InvalidArgument,
            401 | 403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::AlreadyExists,
            429 | 502 | 503 | 504 => Self::Unavailable,
            _ => Self::Internal,
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "not found",
            Self::InvalidArgument => "invalid argument",
            Self::Unavailable => "unavailable",
            Self::AlreadyExists => "already exists",
            Self::FailedPrecondition => "failed precondition",
            Self::Internal => "internal",
            Self::Transport => "transport",
            Self::Decode => "decode",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A managed graph database.
///
/// One instance is built by the process entry point and shared; every
/// method must be safe to call concurrently.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run a statement in a single-use read-only snapshot.
    async fn snapshot_query(
        &self,
        sql: &str,
        params: &BoundParameters,
    ) -> Result<ResultSet, StoreError>;

    /// Insert rows into a table in a single read-write transaction.
    async fn insert(
        &self,
        table: &str,
        columns: &[&str],
        rows: Vec<Vec<Value>>,
    ) -> Result<(), StoreError>;

    /// Apply schema statements, waiting for completion.
    async fn update_ddl(&self, statements: &[String]) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_kinds() {
        assert!(StoreErrorKind::PermissionDenied.is_soft());
        assert!(StoreErrorKind::NotFound.is_soft());
        assert!(StoreErrorKind::InvalidArgument.is_soft());
        assert!(!StoreErrorKind::Internal.is_soft());
        assert!(!StoreErrorKind::Decode.is_soft());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            StoreErrorKind::from_status("PERMISSION_DENIED"),
            StoreErrorKind::PermissionDenied
        );
        assert_eq!(StoreErrorKind::from_status("ABORTED"), StoreErrorKind::Internal);
        assert_eq!(StoreErrorKind::from_code(6), StoreErrorKind::AlreadyExists);
        assert_eq!(StoreErrorKind::from_http(404), StoreErrorKind::NotFound);
        assert_eq!(StoreErrorKind::from_http(500), StoreErrorKind::Internal);
    }

    #[test]
    fn error_display() {
        let err = StoreError::new(StoreErrorKind::NotFound, "Table Foo not found");
        assert_eq!(err.to_string(), "not found: Table Foo not found");
    }
}
