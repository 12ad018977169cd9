//! Where collage inputs come from and where the result goes.
//!
//! `gs://bucket/key` references go through signed storage URLs; anything
//! else is a local path.

use std::path::PathBuf;

use image::ImageFormat;

use photos_blob::{BlobClient, GcsUri};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageLocation {
    Local(PathBuf),
    Remote(GcsUri),
}

impl ImageLocation {
    pub fn parse(raw: &str) -> Self {
        match GcsUri::parse(raw) {
            Some(uri) => Self::Remote(uri),
            None => Self::Local(PathBuf::from(raw)),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    pub async fn read(&self, blob: &BlobClient) -> Result<Vec<u8>> {
        match self {
            Self::Local(path) => Ok(tokio::fs::read(path).await?),
            Self::Remote(uri) => Ok(blob.download(uri).await?),
        }
    }

    pub async fn write(&self, blob: &BlobClient, bytes: Vec<u8>, format: ImageFormat) -> Result<()> {
        match self {
            Self::Local(path) => Ok(tokio::fs::write(path, bytes).await?),
            Self::Remote(uri) => Ok(blob.upload(uri, bytes, content_type(format)).await?),
        }
    }
}

impl std::fmt::Display for ImageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(uri) => write!(f, "{uri}"),
        }
    }
}

fn content_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photos_blob::DEFAULT_TTL_SECS;

    #[test]
    fn test_parse() {
        assert!(ImageLocation::parse("gs://my-photos-bucket/ph01.jpg").is_remote());
        assert_eq!(
            ImageLocation::parse("static/goa.jpeg"),
            ImageLocation::Local(PathBuf::from("static/goa.jpeg"))
        );
        // Not a storage reference, so treated as a (nonexistent) path.
        assert!(!ImageLocation::parse("gcs://bucket/x.jpg").is_remote());
    }

    #[tokio::test]
    async fn test_local_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let blob = BlobClient::new(None, DEFAULT_TTL_SECS).unwrap();
        let location = ImageLocation::Local(dir.path().join("out.png"));

        location.write(&blob, vec![1, 2, 3], ImageFormat::Png).await.unwrap();
        assert_eq!(location.read(&blob).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_remote_requires_credentials() {
        let blob = BlobClient::new(None, DEFAULT_TTL_SECS).unwrap();
        let location = ImageLocation::parse("gs://b/in.jpg");
        assert!(location.read(&blob).await.is_err());
    }
}
