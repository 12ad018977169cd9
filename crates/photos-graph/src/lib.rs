//! photos-graph: guarded query execution against the photo property graph.
//!
//! Every read flows through [`QueryExecutor`], which refuses anything that
//! is not a `SELECT`, binds typed parameters, and shapes rows into
//! field-keyed records. [`GraphClient`] layers the typed reads, memory
//! writes, and schema setup used by the agent and the HTTP API on top.

pub mod client;
pub mod error;
pub mod executor;
pub mod guard;
pub mod mutations;
pub mod params;
pub mod queries;
pub mod schema;
pub mod spanner;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{Fetched, GraphClient};
pub use error::{GraphError, Result};
pub use executor::{QueryExecutor, QueryOutcome, Row};
pub use guard::validate_read_only;
pub use params::{bind, BoundParameters, ParamType};
pub use queries::{PersonInPhoto, PhotoSearch};
pub use spanner::SpannerStore;
pub use store::{GraphStore, ResultSet, StoreError, StoreErrorKind};
