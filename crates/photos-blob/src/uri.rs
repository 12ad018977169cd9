//! `gs://bucket/key` storage references.

use std::fmt;

const SCHEME: &str = "gs://";

/// A parsed storage reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GcsUri {
    pub bucket: String,
    pub key: String,
}

impl GcsUri {
    /// Parse `gs://bucket/key`. Anything else, including a missing bucket
    /// or key, yields `None`.
    pub fn parse(reference: &str) -> Option<Self> {
        let rest = reference.trim().strip_prefix(SCHEME)?;
        let (bucket, key) = rest.split_once('/')?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Final path segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl fmt::Display for GcsUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
    }
}
