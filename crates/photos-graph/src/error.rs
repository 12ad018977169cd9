//! Error types for graph query execution.

use thiserror::Error;

use crate::store::StoreError;

/// Errors from guarded graph operations.
///
/// Display strings never include query text or parameter values so they
/// can be surfaced to callers without leaking generated SQL.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The read-only guard refused the statement before any store contact.
    #[error("Query rejected: {reason}")]
    QueryRejected { reason: &'static str },

    /// A declared parameter type is outside the supported tag set.
    #[error("Unknown parameter type {tag:?} for parameter {name:?}")]
    UnknownParamType { name: String, tag: String },

    /// The parameter map could not be bound.
    #[error("Parameter error for {name:?}: {message}")]
    Parameter { name: String, message: String },

    /// No expected field names were supplied and the result set carried no
    /// field metadata.
    #[error("Could not determine field names for query results")]
    UndeterminedSchema,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
