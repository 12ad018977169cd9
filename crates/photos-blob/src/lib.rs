//! photos-blob: storage references and time-limited media URLs.
//!
//! Photos and memories store media as `gs://bucket/key` references. Clients
//! never see those; they get V4 signed GET URLs issued here.

pub mod client;
pub mod error;
pub mod signer;
pub mod uri;

pub use client::{BlobClient, DEFAULT_TTL_SECS};
pub use error::{BlobError, Result};
pub use signer::{BlobSigner, SignedMethod};
pub use uri::GcsUri;
