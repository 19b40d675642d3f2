//! # Error Types
//!
//! Structured errors for the foundational types. All errors use `thiserror`
//! and carry the offending path or value so operators can act on the message
//! without a debugger.

use std::path::PathBuf;

use thiserror::Error;

/// A target name could not be accepted as a relative target path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetPathError {
    /// The target name is empty.
    #[error("target path is empty")]
    Empty,

    /// The target name is absolute.
    #[error("target path {0:?} is absolute")]
    Absolute(String),

    /// The target name contains an empty component (`a//b`, trailing `/`).
    #[error("target path {0:?} contains an empty component")]
    EmptyComponent(String),

    /// The target name contains a `.` or `..` component.
    #[error("target path {0:?} contains a relative component")]
    Traversal(String),

    /// The target name contains a backslash or control character.
    #[error("target path {path:?} contains invalid character {character:?}")]
    InvalidCharacter {
        /// The rejected target name.
        path: String,
        /// The first invalid character found.
        character: char,
    },
}

/// Downloaded or cached bytes do not match their target descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    /// Byte length differs from the descriptor.
    #[error("length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Length recorded in the descriptor.
        expected: u64,
        /// Length of the content that was checked.
        actual: u64,
    },

    /// A digest differs from the descriptor.
    #[error("{algorithm} mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Hash algorithm name as it appears in the descriptor.
        algorithm: String,
        /// Digest recorded in the descriptor.
        expected: String,
        /// Digest of the content that was checked.
        actual: String,
    },

    /// None of the descriptor's hash algorithms is supported.
    #[error("descriptor lists no supported hash algorithm (found: {found})")]
    NoSupportedHash {
        /// Comma-separated algorithm names present in the descriptor.
        found: String,
    },
}

/// The attachment list in a descriptor's custom metadata is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttachmentListError {
    /// The attachment entry is present but is not a JSON array.
    #[error("custom {key:?} entry is not a list")]
    NotAList {
        /// The custom metadata key.
        key: String,
    },

    /// An element of the attachment list is not a string.
    #[error("attachment #{index} is not a string")]
    NotAString {
        /// Zero-based position in the list.
        index: usize,
    },

    /// An element of the attachment list is not a valid target path.
    #[error("attachment #{index}: {source}")]
    InvalidPath {
        /// Zero-based position in the list.
        index: usize,
        /// Why the path was rejected.
        source: TargetPathError,
    },
}

/// A target descriptor could not be built for a local file.
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// The file to describe does not exist.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// The missing file.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file path cannot be used as a target path.
    #[error("{} cannot be published as a target path: {source}", path.display())]
    InvalidPath {
        /// The local file path.
        path: PathBuf,
        /// Why it was rejected.
        source: TargetPathError,
    },

    /// No hash algorithm was configured on the builder.
    #[error("at least one hash algorithm is required")]
    NoHashAlgorithm,
}

/// The trusted-metadata directory is unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustRootError {
    /// No root metadata has been bootstrapped for this repository.
    #[error(
        "trusted root metadata not found; download root metadata to {} out-of-band before refreshing",
        path.display()
    )]
    MissingTrustRoot {
        /// Where `root.json` is expected.
        path: PathBuf,
    },

    /// Neither a user data directory nor a home directory could be found.
    #[error("could not determine a per-user data directory")]
    NoDataDirectory,
}

/// A bearer credential could not be constructed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The token is empty or whitespace.
    #[error("{scope} credential is empty")]
    Empty {
        /// Scope name of the rejected credential.
        scope: &'static str,
    },

    /// The token contains characters that cannot appear in an HTTP header.
    #[error("{scope} credential contains characters not allowed in an Authorization header")]
    InvalidCharacters {
        /// Scope name of the rejected credential.
        scope: &'static str,
    },
}
