//! # Metadata Client Interface
//!
//! The trusted-metadata protocol is an external collaborator. This trait is
//! the whole of what retrieval needs from it:
//!
//! - `refresh` — bring the local trusted metadata up to date.
//! - `get_target_info` — the descriptor for a target name, or `None`.
//! - `find_cached` — a content-verified local copy of a target, if one is
//!   already available, placed in the given directory.
//! - `download` — fetch the target into the given directory, verifying it
//!   against the descriptor.
//!
//! The staging directory is passed per call so one client can serve several
//! concurrent resolutions, each with its own working directory.
//!
//! Implementations must be `Send + Sync` so they can be shared behind an
//! `Arc` across tasks. Timeouts and retry policy belong to the
//! implementation; callers treat every error as terminal.

use std::future::Future;
use std::path::{Path, PathBuf};

use intuf_core::{TargetDescriptor, TargetPath};

use crate::error::MetadataError;

/// Client for a repository's trusted target metadata and content.
pub trait MetadataClient: Send + Sync {
    /// Refresh the trusted metadata from the repository.
    fn refresh(&self) -> impl Future<Output = Result<(), MetadataError>> + Send;

    /// The descriptor for `target`, or `None` if the index has no such target.
    fn get_target_info(
        &self,
        target: &TargetPath,
    ) -> impl Future<Output = Result<Option<TargetDescriptor>, MetadataError>> + Send;

    /// A verified local copy of `target` inside `dir`, if one is available
    /// without network access.
    fn find_cached(
        &self,
        target: &TargetDescriptor,
        dir: &Path,
    ) -> impl Future<Output = Result<Option<PathBuf>, MetadataError>> + Send;

    /// Download `target` into `dir` and return its local path.
    fn download(
        &self,
        target: &TargetDescriptor,
        dir: &Path,
    ) -> impl Future<Output = Result<PathBuf, MetadataError>> + Send;
}
