//! V4 signed URLs (`GOOG4-HMAC-SHA256`) for storage objects.
//!
//! Signing uses an HMAC access id and secret. Only the `host` header is
//! signed and the payload is unsigned, so any client can follow the URL.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};

use crate::error::{BlobError, Result};
use crate::uri::GcsUri;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "GOOG4-HMAC-SHA256";
/// Longest lifetime the service accepts for a V4 URL (seven days).
pub const MAX_TTL_SECS: u64 = 604_800;

/// RFC 3986 unreserved characters pass through; everything else is encoded.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// HTTP methods a signed URL may be issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedMethod {
    Get,
    Put,
}

impl SignedMethod {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }
}

/// Issues V4 signed URLs for one HMAC key.
#[derive(Clone)]
pub struct BlobSigner {
    access_id: String,
    secret: String,
    region: String,
    scheme: String,
    host: String,
}

impl std::fmt::Debug for BlobSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobSigner")
            .field("access_id", &self.access_id)
            .field("region", &self.region)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl BlobSigner {
    /// `endpoint` is the storage base URL, e.g. `https://storage.googleapis.com`.
    pub fn new(access_id: &str, secret: &str, region: &str, endpoint: &str) -> Result<Self> {
        if access_id.is_empty() || secret.is_empty() {
            return Err(BlobError::NotConfigured);
        }
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| BlobError::Signing(format!("invalid storage endpoint: {e}")))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(BlobError::Signing(
                    "storage endpoint has no host".to_string(),
                ))
            }
        };

        Ok(Self {
            access_id: access_id.to_string(),
            secret: secret.to_string(),
            region: region.to_string(),
            scheme: url.scheme().to_string(),
            host,
        })
    }

    /// Sign `method` on `uri`, valid for `ttl_secs` from `now`.
    pub fn sign(
        &self,
        method: SignedMethod,
        uri: &GcsUri,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<String> {
        if ttl_secs == 0 || ttl_secs > MAX_TTL_SECS {
            return Err(BlobError::Signing(format!(
                "expiration must be between 1 and {MAX_TTL_SECS} seconds"
            )));
        }

        let date = now.format("%Y%m%d").to_string();
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let scope = format!("{date}/{}/storage/goog4_request", self.region);

        let path = canonical_path(uri);
        // Keys already sorted by name.
        let query = [
            ("X-Goog-Algorithm", ALGORITHM.to_string()),
            ("X-Goog-Credential", format!("{}/{scope}", self.access_id)),
            ("X-Goog-Date", timestamp.clone()),
            ("X-Goog-Expires", ttl_secs.to_string()),
            ("X-Goog-SignedHeaders", "host".to_string()),
        ]
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&");

        let canonical_request = format!(
            "{method}\n{path}\n{query}\nhost:{host}\n\nhost\nUNSIGNED-PAYLOAD",
            method = method.as_str(),
            host = self.host,
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{timestamp}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = self.signing_key(&date)?;
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

        Ok(format!(
            "{}://{}{path}?{query}&X-Goog-Signature={signature}",
            self.scheme, self.host
        ))
    }

    fn signing_key(&self, date: &str) -> Result<Vec<u8>> {
        let k_date = hmac(format!("GOOG4{}", self.secret).as_bytes(), date.as_bytes())?;
        let k_region = hmac(&k_date, self.region.as_bytes())?;
        let k_service = hmac(&k_region, b"storage")?;
        hmac(&k_service, b"goog4_request")
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| BlobError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

/// `/bucket/key` with each key segment encoded and `/` kept.
fn canonical_path(uri: &GcsUri) -> String {
    let key = uri.key.split('/').map(encode).collect::<Vec<_>>().join("/");
    format!("/{}/{key}", encode(&uri.bucket))
}
