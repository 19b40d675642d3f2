//! Repository client configuration.
//!
//! Base URLs for the metadata and target servers plus the verifier program.
//! Defaults point at a local development repository.

use std::time::Duration;

use intuf_core::{MetadataDirectory, TrustRootError};
use url::Url;

use crate::verifier::DEFAULT_VERIFIER;

/// Default metadata server.
pub const DEFAULT_METADATA_URL: &str = "http://127.0.0.1:8080/";

/// Default target server.
pub const DEFAULT_TARGET_URL: &str = "http://127.0.0.1:8000/";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where to fetch metadata and targets from.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Base URL of the trusted metadata.
    pub metadata_url: Url,
    /// Base URL of the target content.
    pub target_url: Url,
    /// Verifier executable.
    pub verifier_program: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl RepositoryConfig {
    /// Configuration for the given servers with default verifier and timeout.
    pub fn new(metadata_url: Url, target_url: Url) -> Self {
        Self {
            metadata_url: directory_url(metadata_url),
            target_url: directory_url(target_url),
            verifier_program: DEFAULT_VERIFIER.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `INTUF_METADATA_URL` (default: `http://127.0.0.1:8080/`)
    /// - `INTUF_TARGET_URL` (default: `http://127.0.0.1:8000/`)
    /// - `INTUF_VERIFIER` (default: `in-toto-verify`)
    /// - `INTUF_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            metadata_url: directory_url(env_url("INTUF_METADATA_URL", DEFAULT_METADATA_URL)?),
            target_url: directory_url(env_url("INTUF_TARGET_URL", DEFAULT_TARGET_URL)?),
            verifier_program: std::env::var("INTUF_VERIFIER")
                .unwrap_or_else(|_| DEFAULT_VERIFIER.to_string()),
            timeout_secs: env_timeout_secs(),
        })
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The metadata directory for this repository under the user data root.
    pub fn metadata_dir(&self) -> Result<MetadataDirectory, TrustRootError> {
        MetadataDirectory::resolve(self.metadata_url.as_str())
    }
}

/// Read `var` as a URL, falling back to `default`.
pub fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// `INTUF_TIMEOUT_SECS`, or the default when unset or unparsable.
pub fn env_timeout_secs() -> u64 {
    std::env::var("INTUF_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// Ensure `url` ends in `/` so relative joins append rather than replace.
pub fn directory_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable holds an unparseable URL: variable, then
    /// parser message.
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}
