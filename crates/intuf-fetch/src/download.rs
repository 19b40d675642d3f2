//! # Download Orchestration
//!
//! One download request runs, in order:
//!
//! 1. trust-root check against the metadata directory,
//! 2. metadata refresh,
//! 3. attachment resolution into a fresh working directory,
//! 4. the verification gate, which installs the requested target.
//!
//! The working directory is dropped on every path out of [`Downloader::download`].

use std::path::PathBuf;

use intuf_core::{MetadataDirectory, TargetPath};

use crate::error::FetchError;
use crate::gate::{Admission, VerificationGate, VerificationPlan, VerificationPolicy};
use crate::metadata::MetadataClient;
use crate::resolver::resolve_and_fetch;
use crate::verifier::Verifier;
use crate::workdir::WorkingDirectory;

/// A single download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// The target to install.
    pub target: TargetPath,
    /// Directory the target is installed into.
    pub destination: PathBuf,
    /// Whether verification runs.
    pub policy: VerificationPolicy,
    /// Explicit layout and keys; derived from the attachments when `None`.
    pub plan: Option<VerificationPlan>,
}

impl DownloadRequest {
    /// Verified download of `target` into `destination`.
    pub fn new(target: TargetPath, destination: impl Into<PathBuf>) -> Self {
        Self {
            target,
            destination: destination.into(),
            policy: VerificationPolicy::Required,
            plan: None,
        }
    }

    /// Set the verification policy.
    pub fn policy(mut self, policy: VerificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use an explicit plan.
    pub fn plan(mut self, plan: VerificationPlan) -> Self {
        self.plan = Some(plan);
        self
    }
}

/// What a completed download did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// The installed file.
    pub installed: PathBuf,
    /// Every target resolved, attachments first.
    pub resolved: Vec<TargetPath>,
    /// Targets fetched over the network.
    pub downloads: usize,
    /// Targets reused from the cache.
    pub cache_hits: usize,
    /// Whether the verifier ran and accepted.
    pub verified: bool,
}

/// Resolves, verifies and installs targets from one repository.
#[derive(Debug)]
pub struct Downloader<C, V> {
    client: C,
    gate: VerificationGate<V>,
    metadata_dir: MetadataDirectory,
}

impl<C: MetadataClient, V: Verifier> Downloader<C, V> {
    /// Downloader over `client`, verifying with `verifier`.
    pub fn new(client: C, verifier: V, metadata_dir: MetadataDirectory) -> Self {
        Self {
            client,
            gate: VerificationGate::new(verifier),
            metadata_dir,
        }
    }

    /// The metadata client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The verification gate.
    pub fn gate(&self) -> &VerificationGate<V> {
        &self.gate
    }

    /// Download, verify and install `request.target`.
    pub async fn download(&self, request: DownloadRequest) -> Result<DownloadOutcome, FetchError> {
        let trust_root = self.metadata_dir.require_trust_root()?;
        tracing::debug!(trust_root = %trust_root.display(), "trust root present");

        self.client.refresh().await.map_err(FetchError::Refresh)?;

        let workdir = WorkingDirectory::new()?;
        let resolved = resolve_and_fetch(&self.client, &request.target, workdir.path()).await?;
        tracing::info!(
            target_path = %request.target,
            resolved = resolved.len(),
            downloads = resolved.downloads(),
            cache_hits = resolved.cache_hits(),
            "attachments resolved"
        );

        let installed = self
            .gate
            .admit(Admission {
                root: &request.target,
                resolved: &resolved,
                workdir: workdir.path(),
                destination: &request.destination,
                policy: request.policy,
                plan: request.plan,
            })
            .await?;

        if let Err(e) = workdir.close() {
            tracing::warn!(error = %e, "failed to remove working directory");
        }

        Ok(DownloadOutcome {
            installed: installed.path,
            resolved: resolved.paths(),
            downloads: resolved.downloads(),
            cache_hits: resolved.cache_hits(),
            verified: installed.verified,
        })
    }
}
