//! Storage client: signed URL issuance plus object download and upload.

use std::time::Duration;

use chrono::Utc;

use photos_core::config::StorageConfig;

use crate::error::{BlobError, Result};
use crate::signer::{BlobSigner, SignedMethod};
use crate::uri::GcsUri;

/// Default lifetime of issued URLs: 60 minutes.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Signs and transfers storage objects.
///
/// Without an HMAC key the client still constructs; signing then yields
/// `None` and transfers fail with [`BlobError::NotConfigured`].
#[derive(Clone)]
pub struct BlobClient {
    signer: Option<BlobSigner>,
    http: reqwest::Client,
    ttl_secs: u64,
}

impl BlobClient {
    pub fn new(signer: Option<BlobSigner>, ttl_secs: u64) -> Result<Self> {
        Self::with_timeout(signer, ttl_secs, Duration::from_secs(60))
    }

    fn with_timeout(signer: Option<BlobSigner>, ttl_secs: u64, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            signer,
            http,
            ttl_secs,
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let signer = match BlobSigner::new(
            &config.hmac_access_id,
            &config.hmac_secret,
            &config.region,
            &config.endpoint,
        ) {
            Ok(signer) => Some(signer),
            Err(BlobError::NotConfigured) => {
                tracing::warn!("No storage HMAC key configured, media URLs will be omitted");
                None
            }
            Err(e) => return Err(e),
        };
        Self::with_timeout(
            signer,
            config.signed_url_ttl_secs,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Time-limited GET URL for a `gs://` reference.
    ///
    /// Returns `None` for anything that is not a `gs://bucket/key` reference
    /// and for signing failures, which are logged.
    pub fn signed_url(&self, reference: &str) -> Option<String> {
        let uri = GcsUri::parse(reference)?;
        match self.sign(SignedMethod::Get, &uri) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(bucket = %uri.bucket, error = %e, "Failed to sign storage URL");
                None
            }
        }
    }

    /// Sign each reference, preserving order.
    pub fn sign_all<S: AsRef<str>>(&self, references: &[S]) -> Vec<Option<String>> {
        references
            .iter()
            .map(|reference| self.signed_url(reference.as_ref()))
            .collect()
    }

    /// Fetch an object's bytes.
    pub async fn download(&self, uri: &GcsUri) -> Result<Vec<u8>> {
        let url = self.sign(SignedMethod::Get, uri)?;
        let response = self.http.get(&url).send().await?;
        let response = check(response).await?;
        let bytes = response.bytes().await?;
        tracing::debug!(object = %uri, bytes = bytes.len(), "Downloaded object");
        Ok(bytes.to_vec())
    }

    /// Store `bytes` at `uri`, replacing any existing object.
    pub async fn upload(&self, uri: &GcsUri, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.sign(SignedMethod::Put, uri)?;
        let size = bytes.len();
        let response = self
            .http
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        check(response).await?;
        tracing::info!(object = %uri, bytes = size, "Uploaded object");
        Ok(())
    }

    fn sign(&self, method: SignedMethod, uri: &GcsUri) -> Result<String> {
        let signer = self.signer.as_ref().ok_or(BlobError::NotConfigured)?;
        signer.sign(method, uri, self.ttl_secs, Utc::now())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(BlobError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BlobClient {
        let signer =
            BlobSigner::new("GOOGTESTID", "secret", "auto", "https://storage.googleapis.com")
                .unwrap();
        BlobClient::new(Some(signer), DEFAULT_TTL_SECS).unwrap()
    }

    #[test]
    fn test_signed_url_for_storage_reference() {
        let url = client().signed_url("gs://my-photos-bucket/ph01.jpg").unwrap();
        assert!(url.starts_with("https://storage.googleapis.com/my-photos-bucket/ph01.jpg?"));
        assert!(url.contains("X-Goog-Expires=3600"));
    }

    #[test]
    fn test_non_storage_reference_yields_none() {
        let client = client();
        assert_eq!(client.signed_url("https://example.com/ph01.jpg"), None);
        assert_eq!(client.signed_url("gcs://my-photos-bucket/ph01.jpg"), None);
        assert_eq!(client.signed_url(""), None);
    }

    #[test]
    fn test_unconfigured_client_yields_none() {
        let client = BlobClient::new(None, DEFAULT_TTL_SECS).unwrap();
        assert_eq!(client.signed_url("gs://my-photos-bucket/ph01.jpg"), None);
    }

    #[test]
    fn test_from_config_without_key() {
        let client = BlobClient::from_config(&StorageConfig::default()).unwrap();
        assert_eq!(client.signed_url("gs://b/k.jpg"), None);
    }

    #[test]
    fn test_sign_all_preserves_order() {
        let signed = client().sign_all(&["gs://b/1.jpg", "not-a-uri", "gs://b/2.jpg"]);
        assert_eq!(signed.len(), 3);
        assert!(signed[0].as_deref().unwrap().contains("/b/1.jpg?"));
        assert!(signed[1].is_none());
        assert!(signed[2].as_deref().unwrap().contains("/b/2.jpg?"));
    }

    #[tokio::test]
    async fn test_transfer_requires_credentials() {
        let client = BlobClient::new(None, DEFAULT_TTL_SECS).unwrap();
        let uri = GcsUri::parse("gs://b/k.jpg").unwrap();
        let err = client.download(&uri).await.unwrap_err();
        assert!(matches!(err, BlobError::NotConfigured));
    }
}
