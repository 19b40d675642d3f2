//! # intuf-core — Foundational Types for intuf
//!
//! Defines the types every other `intuf-*` crate builds on. It depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Validated target paths.** A `TargetPath` is the only way a target
//!    name from the repository index becomes a filesystem path. Absolute
//!    paths and `..` traversal are rejected at construction.
//!
//! 2. **Descriptors are content commitments.** `TargetDescriptor` is built by
//!    reading the file it describes; its length and hashes always match the
//!    bytes on disk at construction time.
//!
//! 3. **Scope-typed credentials.** `WriteCredential` and `DeleteCredential`
//!    are distinct types. A token scoped for publication cannot be handed to
//!    a retraction call, and the compiler enforces it.
//!
//! 4. **Deterministic metadata directories.** The trusted-metadata store for
//!    a repository is derived from a SHA-256 of its base URL.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `intuf-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod credential;
pub mod descriptor;
pub mod digest;
pub mod error;
pub mod metadata_dir;
pub mod target;

// Re-export primary types for ergonomic imports.
pub use credential::{BearerToken, DeleteCredential, DeleteScope, WriteCredential, WriteScope};
pub use descriptor::{describe, TargetDescriptor, TargetDescriptorBuilder, TargetInfo, ATTACHMENTS_KEY};
pub use digest::{bytes_digest, file_digest, HashAlgorithm};
pub use error::{
    AttachmentListError, CredentialError, DescriptorError, IntegrityError, TargetPathError,
    TrustRootError,
};
pub use metadata_dir::{MetadataDirectory, TRUST_ROOT_FILE};
pub use target::TargetPath;
