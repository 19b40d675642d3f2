//! Publish client error types.

use intuf_core::{DescriptorError, TargetPath};

use crate::config::ConfigError;

/// Errors from publishing or retracting targets.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The write API answered with a non-2xx status.
    #[error("publish to {endpoint} rejected with {status}: {body}")]
    PublishRejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The delete API answered with a non-2xx status.
    #[error("retract at {endpoint} rejected with {status}: {body}")]
    RetractRejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// A request with no targets.
    #[error("batch contains no targets")]
    EmptyBatch,

    /// The same target path appears twice in one request.
    #[error("target {0} appears more than once in the batch")]
    DuplicatePath(TargetPath),

    /// No token is configured for the operation's scope.
    #[error("no {scope} token configured; set INTUF_{}_TOKEN", .scope.to_ascii_uppercase())]
    MissingCredential { scope: &'static str },

    /// The token cannot be carried in an `Authorization` header.
    #[error("{scope} token is not a valid header value")]
    InvalidCredential { scope: &'static str },

    /// A file could not be described.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PublishError {
    /// HTTP status of a rejected request, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::PublishRejected { status, .. } | Self::RetractRejected { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
