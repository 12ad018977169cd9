//! Configuration management for the photo graph services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`PHOTOS__` prefix, `__` separator)
//! 2. Config file (`photos.toml`, or the prefix given on the command line)
//! 3. Defaults

use serde::Deserialize;

use crate::error::PhotosError;

/// Top-level configuration shared by the server and the CLI tools.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub spanner: SpannerConfig,
    pub storage: StorageConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from `{file_prefix}.toml` (optional) and the
    /// environment, falling back to defaults for anything unset.
    pub fn load(file_prefix: &str) -> Result<Self, PhotosError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("PHOTOS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: AppConfig = cfg.try_deserialize()?;
        tracing::debug!(
            project = %app.spanner.project,
            instance = %app.spanner.instance,
            database = %app.spanner.database,
            "Configuration loaded"
        );
        Ok(app)
    }
}

/// Managed graph database (Cloud Spanner) connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpannerConfig {
    /// REST endpoint, overridable for the emulator.
    pub endpoint: String,
    pub project: String,
    pub instance: String,
    pub database: String,
    /// Property graph name used in `FROM GRAPH <name>`.
    pub graph: String,
    /// Static OAuth bearer token. When unset, tokens come from the
    /// metadata server.
    pub access_token: Option<String>,
    pub metadata_token_url: String,
    pub request_timeout_secs: u64,
}

impl Default for SpannerConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://spanner.googleapis.com".to_string(),
            project: String::new(),
            instance: "google-photos-instance".to_string(),
            database: "google-photos".to_string(),
            graph: "PhotosGraph".to_string(),
            access_token: None,
            metadata_token_url: "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl SpannerConfig {
    /// `projects/{p}/instances/{i}/databases/{d}`
    pub fn database_path(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

/// Blob storage settings for signed URL issuance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub endpoint: String,
    /// HMAC key access id used for V4 signing.
    pub hmac_access_id: String,
    pub hmac_secret: String,
    pub region: String,
    pub signed_url_ttl_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://storage.googleapis.com".to_string(),
            hmac_access_id: String::new(),
            hmac_secret: String::new(),
            region: "auto".to_string(),
            signed_url_ttl_secs: 3600,
            request_timeout_secs: 60,
        }
    }
}

/// Language model and agent policy settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub model: String,
    pub api_key: String,
    pub endpoint: String,
    /// Upper bound on model turns per request.
    pub max_turns: u32,
    /// Named groups up to this size require every member in the photo.
    pub small_group_max: usize,
    /// Minimum co-occurrence for larger, collective groups.
    pub large_group_min_matches: usize,
    /// Directory for run transcripts. Disabled when unset.
    pub transcript_dir: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-pro".to_string(),
            api_key: String::new(),
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            max_turns: 8,
            small_group_max: 3,
            large_group_min_matches: 3,
            transcript_dir: None,
            request_timeout_secs: 60,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Person id treated as the logged-in user.
    pub person_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            person_id: "p01".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.spanner.graph, "PhotosGraph");
        assert_eq!(config.storage.signed_url_ttl_secs, 3600);
        assert_eq!(config.agent.small_group_max, 3);
        assert_eq!(config.server.person_id, "p01");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_database_path() {
        let spanner = SpannerConfig {
            project: "demo".to_string(),
            ..Default::default()
        };
        assert_eq!(
            spanner.database_path(),
            "projects/demo/instances/google-photos-instance/databases/google-photos"
        );
    }

    #[test]
    fn test_load_from_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("photos.toml"),
            "[spanner]\nproject = \"demo-project\"\n\n[agent]\nmax_turns = 4\n",
        )
        .unwrap();

        let prefix = dir.path().join("photos");
        let config = AppConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.spanner.project, "demo-project");
        assert_eq!(config.spanner.database, "google-photos");
        assert_eq!(config.agent.max_turns, 4);
        assert_eq!(config.agent.large_group_min_matches, 3);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("missing");
        let config = AppConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.spanner.instance, "google-photos-instance");
    }
}
