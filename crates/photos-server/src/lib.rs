//! photos-server: HTTP API over the photo graph.
//!
//! Routes serve the logged-in user's profile, photos and memories with
//! signed media URLs, and run the natural-language photo search agent,
//! either as one JSON response or as a server-sent event stream.

pub mod api;
pub mod error;

pub use api::{router, AppState};
pub use error::ApiError;
