//! Retrieval error types.

use std::path::PathBuf;

use intuf_core::{AttachmentListError, IntegrityError, TargetPath, TrustRootError};

/// Errors raised by a [`MetadataClient`](crate::metadata::MetadataClient).
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// No root metadata has been bootstrapped.
    #[error(transparent)]
    TrustRoot(#[from] TrustRootError),

    /// Refreshing the trusted metadata failed.
    #[error("metadata refresh failed: {0}")]
    Refresh(String),

    /// Repository metadata failed TUF verification: bad signatures, an
    /// untrusted root, a rollback or expiry.
    #[error("metadata verification failed: {0}")]
    Verification(#[source] tuf::Error),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// A target lookup was attempted before a successful refresh.
    #[error("target metadata has not been refreshed")]
    NotRefreshed,

    /// Fetching target content failed.
    #[error("download of {target} failed: {reason}")]
    Download {
        /// The target being fetched.
        target: TargetPath,
        /// Transport or status detail.
        reason: String,
    },

    /// Fetched or cached content does not match its descriptor.
    #[error("{target} failed integrity check: {source}")]
    Integrity {
        /// The target being checked.
        target: TargetPath,
        /// The mismatch.
        source: IntegrityError,
    },

    /// Local filesystem error.
    #[error("io error at {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// A verification plan could not be derived from a target's attachments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// No attachment qualifies as the layout.
    #[error("{0} has no layout attachment")]
    NoLayout(TargetPath),

    /// A layout is attached but no key to check it with.
    #[error("{0} has no layout key attachment")]
    NoKey(TargetPath),
}

/// Errors from resolving, verifying and installing a target.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// No root metadata has been bootstrapped for the repository.
    #[error(transparent)]
    MissingTrustRoot(#[from] TrustRootError),

    /// The metadata refresh failed.
    #[error("failed to refresh trusted metadata: {0}")]
    Refresh(#[source] MetadataError),

    /// The target, or one of its attachments, is not in the index.
    #[error("target {0} not found")]
    TargetNotFound(TargetPath),

    /// The attachment graph loops back onto a target still being resolved.
    #[error("cyclic attachment graph at {path}: {}", format_chain(chain))]
    CyclicAttachmentGraph {
        /// The target that was re-entered.
        path: TargetPath,
        /// Resolution chain from the root to the re-entered target.
        chain: Vec<TargetPath>,
    },

    /// A target's attachment list is not a list of valid target paths.
    #[error("malformed attachment list on {path}: {source}")]
    MalformedAttachments {
        /// The target whose metadata is malformed.
        path: TargetPath,
        /// What is wrong with it.
        source: AttachmentListError,
    },

    /// Looking up, reading or downloading a target failed.
    #[error("failed to fetch {target}: {source}")]
    Network {
        /// The target being fetched.
        target: TargetPath,
        /// Failure reported by the metadata client.
        source: MetadataError,
    },

    /// The target's provenance did not verify.
    #[error("verification of {target} rejected: {reason}")]
    VerificationRejected {
        /// The requested target.
        target: TargetPath,
        /// Why the verifier or plan rejected it.
        reason: String,
    },

    /// The staging directory could not be created or removed.
    #[error("working directory error: {0}")]
    WorkingDirectory(#[source] std::io::Error),

    /// Moving the verified target into the destination failed.
    #[error("failed to install {} into {}: {source}", source_path.display(), destination.display())]
    Install {
        /// The staged file.
        source_path: PathBuf,
        /// The destination directory.
        destination: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

fn format_chain(chain: &[TargetPath]) -> String {
    chain
        .iter()
        .map(TargetPath::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_shows_chain() {
        let a = TargetPath::new("a.whl").unwrap();
        let b = TargetPath::new("b.layout").unwrap();
        let err = FetchError::CyclicAttachmentGraph {
            path: a.clone(),
            chain: vec![a.clone(), b, a],
        };
        assert_eq!(
            err.to_string(),
            "cyclic attachment graph at a.whl: a.whl -> b.layout -> a.whl"
        );
    }

    #[test]
    fn missing_trust_root_is_transparent() {
        let err: FetchError = TrustRootError::MissingTrustRoot {
            path: PathBuf::from("/m/root.json"),
        }
        .into();
        assert!(err.to_string().contains("download root metadata to /m/root.json"));
    }
}
