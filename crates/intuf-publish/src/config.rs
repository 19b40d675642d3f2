//! Publish API configuration.
//!
//! The write and delete tokens are independent: a deployment that only
//! publishes never needs a delete token, and vice versa.

use intuf_core::{CredentialError, DeleteCredential, WriteCredential};
use url::Url;

use crate::error::PublishError;

/// Default target API endpoint.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:80/api/v1/targets/";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the repository's target API.
///
/// `Debug` output never contains the tokens.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Target API endpoint; publish POSTs and retract DELETEs here.
    pub api_url: Url,
    /// Token scoped to adding targets.
    pub write_token: Option<WriteCredential>,
    /// Token scoped to removing targets.
    pub delete_token: Option<DeleteCredential>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl PublishConfig {
    /// Configuration for `api_url` without tokens.
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            write_token: None,
            delete_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `INTUF_API_URL` (default: `http://127.0.0.1:80/api/v1/targets/`)
    /// - `INTUF_WRITE_TOKEN` (optional)
    /// - `INTUF_DELETE_TOKEN` (optional)
    /// - `INTUF_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("INTUF_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidUrl("INTUF_API_URL".to_string(), e.to_string()))?;

        Ok(Self {
            api_url,
            write_token: env_token("INTUF_WRITE_TOKEN")?,
            delete_token: env_token("INTUF_DELETE_TOKEN")?,
            timeout_secs: std::env::var("INTUF_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Set the write token.
    pub fn with_write_token(mut self, token: WriteCredential) -> Self {
        self.write_token = Some(token);
        self
    }

    /// Set the delete token.
    pub fn with_delete_token(mut self, token: DeleteCredential) -> Self {
        self.delete_token = Some(token);
        self
    }

    /// The write token, or `MissingCredential`.
    pub fn write_credential(&self) -> Result<&WriteCredential, PublishError> {
        self.write_token
            .as_ref()
            .ok_or(PublishError::MissingCredential { scope: "write" })
    }

    /// The delete token, or `MissingCredential`.
    pub fn delete_credential(&self) -> Result<&DeleteCredential, PublishError> {
        self.delete_token
            .as_ref()
            .ok_or(PublishError::MissingCredential { scope: "delete" })
    }
}

fn env_token<S: intuf_core::credential::CredentialScope>(
    var: &str,
) -> Result<Option<intuf_core::BearerToken<S>>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => intuf_core::BearerToken::new(raw)
            .map(Some)
            .map_err(|source| ConfigError::InvalidToken {
                var: var.to_string(),
                source,
            }),
        _ => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable holds an unparseable URL: variable, then
    /// parser message.
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),

    /// A token variable is set but cannot be used as a bearer token.
    #[error("invalid token in {var}: {source}")]
    InvalidToken {
        /// The environment variable.
        var: String,
        /// Why the token was refused.
        source: CredentialError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_tokens() {
        let cfg = PublishConfig::new(Url::parse(DEFAULT_API_URL).unwrap())
            .with_write_token(WriteCredential::new("write-secret-123").unwrap())
            .with_delete_token(DeleteCredential::new("delete-secret-456").unwrap());
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("write-secret-123"));
        assert!(!debug.contains("delete-secret-456"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn missing_tokens_are_reported_per_scope() {
        let cfg = PublishConfig::new(Url::parse(DEFAULT_API_URL).unwrap())
            .with_write_token(WriteCredential::new("w").unwrap());
        assert!(cfg.write_credential().is_ok());
        assert!(matches!(
            cfg.delete_credential(),
            Err(PublishError::MissingCredential { scope: "delete" })
        ));
    }

    #[test]
    fn unset_token_variable_is_none() {
        let token: Option<WriteCredential> = env_token("INTUF_NONEXISTENT_TOKEN_4410").unwrap();
        assert!(token.is_none());
    }

    #[test]
    fn token_with_whitespace_inside_is_rejected() {
        std::env::set_var("INTUF_TEST_BAD_TOKEN", "abc def");
        let result: Result<Option<DeleteCredential>, _> = env_token("INTUF_TEST_BAD_TOKEN");
        std::env::remove_var("INTUF_TEST_BAD_TOKEN");
        assert!(matches!(result, Err(ConfigError::InvalidToken { .. })));
    }
}
