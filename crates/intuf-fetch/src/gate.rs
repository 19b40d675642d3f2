//! # Verification Gate
//!
//! Decides whether a resolved target may leave the working directory.
//!
//! Verification is mandatory unless the caller passes
//! [`VerificationPolicy::Skip`], which is logged at `warn`. When the verifier
//! rejects, nothing is relocated and the working directory is left for its
//! owner to discard. When it accepts, exactly the requested target is moved
//! into the destination directory; attachments never are.
//!
//! ## Plan derivation
//!
//! The layout and keys handed to the verifier come from the resolved
//! attachments, visited breadth-first from the requested target:
//!
//! - names ending in `.pub` are layout keys,
//! - names ending in `.link` are attestation links (staged, not passed),
//! - the first remaining attachment is the layout.
//!
//! A graph with no layout or no key cannot be verified and is rejected.
//!
//! Installing never replaces a file already in the destination.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use intuf_core::TargetPath;

use crate::error::{FetchError, PlanError};
use crate::resolver::ResolvedSet;
use crate::verifier::{Verdict, Verifier};

/// Public-key attachment suffix.
pub const KEY_SUFFIX: &str = ".pub";

/// Attestation-link attachment suffix.
pub const LINK_SUFFIX: &str = ".link";

/// Whether a download must pass verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerificationPolicy {
    /// Run the verifier; install only on success.
    #[default]
    Required,
    /// Install without verifying.
    Skip,
}

impl VerificationPolicy {
    /// `Skip` when `skip` is true.
    pub fn from_skip_flag(skip: bool) -> Self {
        if skip {
            Self::Skip
        } else {
            Self::Required
        }
    }
}

/// The layout and keys a verification runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPlan {
    /// The layout attachment.
    pub layout: TargetPath,
    /// Keys that sign the layout.
    pub keys: Vec<TargetPath>,
}

impl VerificationPlan {
    /// An explicit plan.
    pub fn new(layout: TargetPath, keys: Vec<TargetPath>) -> Self {
        Self { layout, keys }
    }

    /// Derive the plan from what was resolved for `root`.
    pub fn from_resolved(root: &TargetPath, resolved: &ResolvedSet) -> Result<Self, PlanError> {
        let mut layout = None;
        let mut keys = Vec::new();

        for path in breadth_first(root, resolved) {
            if path.has_suffix(KEY_SUFFIX) {
                keys.push(path);
            } else if path.has_suffix(LINK_SUFFIX) {
                continue;
            } else if layout.is_none() {
                layout = Some(path);
            }
        }

        let Some(layout) = layout else {
            return Err(PlanError::NoLayout(root.clone()));
        };
        if keys.is_empty() {
            return Err(PlanError::NoKey(root.clone()));
        }
        Ok(Self { layout, keys })
    }
}

/// Attachments of `root` in breadth-first order, each once, `root` excluded.
fn breadth_first(root: &TargetPath, resolved: &ResolvedSet) -> Vec<TargetPath> {
    let mut seen: HashSet<TargetPath> = HashSet::from([root.clone()]);
    let mut queue = VecDeque::from([root.clone()]);
    let mut order = Vec::new();

    while let Some(current) = queue.pop_front() {
        let Some(target) = resolved.get(&current) else {
            continue;
        };
        // Resolution already validated every attachment list.
        let Ok(children) = target.descriptor.attachments() else {
            continue;
        };
        for child in children {
            if seen.insert(child.clone()) {
                order.push(child.clone());
                queue.push_back(child);
            }
        }
    }
    order
}

/// Everything the gate needs to admit one target.
#[derive(Debug)]
pub struct Admission<'a> {
    /// The requested target.
    pub root: &'a TargetPath,
    /// What resolution staged for it.
    pub resolved: &'a ResolvedSet,
    /// The staging directory.
    pub workdir: &'a Path,
    /// Directory the target is installed into.
    pub destination: &'a Path,
    /// Whether to verify.
    pub policy: VerificationPolicy,
    /// Explicit plan; derived from `resolved` when `None`.
    pub plan: Option<VerificationPlan>,
}

/// Result of a successful admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    /// Installed file.
    pub path: PathBuf,
    /// Whether the verifier ran and accepted.
    pub verified: bool,
}

/// Runs the verifier and installs on success.
#[derive(Debug, Clone)]
pub struct VerificationGate<V> {
    verifier: V,
}

impl<V: Verifier> VerificationGate<V> {
    /// Gate backed by `verifier`.
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }

    /// The underlying verifier.
    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Verify the staged supply chain in `workdir`.
    pub async fn verify(&self, workdir: &Path, layout: &TargetPath, keys: &[TargetPath]) -> Verdict {
        self.verifier.verify(workdir, layout, keys).await
    }

    /// Verify per `admission.policy`, then install the requested target.
    pub async fn admit(&self, admission: Admission<'_>) -> Result<Installed, FetchError> {
        let Admission {
            root,
            resolved,
            workdir,
            destination,
            policy,
            plan,
        } = admission;

        let verified = match policy {
            VerificationPolicy::Skip => {
                tracing::warn!(target_path = %root, "in-toto verification skipped");
                false
            }
            VerificationPolicy::Required => {
                let plan = match plan {
                    Some(plan) => plan,
                    None => VerificationPlan::from_resolved(root, resolved).map_err(|e| {
                        tracing::error!(target_path = %root, reason = %e, "no verification plan");
                        FetchError::VerificationRejected {
                            target: root.clone(),
                            reason: e.to_string(),
                        }
                    })?,
                };
                match self.verify(workdir, &plan.layout, &plan.keys).await {
                    Verdict::Verified => {
                        tracing::info!(target_path = %root, layout = %plan.layout, "verification passed");
                        true
                    }
                    Verdict::Rejected(reason) => {
                        tracing::error!(target_path = %root, %reason, "verification rejected");
                        return Err(FetchError::VerificationRejected {
                            target: root.clone(),
                            reason,
                        });
                    }
                }
            }
        };

        let staged = match resolved.get(root) {
            Some(target) => target.local_path.clone(),
            None => root.to_local_path(workdir),
        };
        let path = install(&staged, root, destination).await?;
        tracing::info!(target_path = %root, installed = %path.display(), verified, "target installed");
        Ok(Installed { path, verified })
    }
}

/// Move `staged` to `destination/<file name of root>`.
async fn install(staged: &Path, root: &TargetPath, destination: &Path) -> Result<PathBuf, FetchError> {
    let install_err = |source: std::io::Error| FetchError::Install {
        source_path: staged.to_path_buf(),
        destination: destination.to_path_buf(),
        source,
    };

    tokio::fs::create_dir_all(destination).await.map_err(install_err)?;
    let target = destination.join(root.file_name());
    if tokio::fs::try_exists(&target).await.map_err(install_err)? {
        return Err(install_err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", target.display()),
        )));
    }

    if tokio::fs::rename(staged, &target).await.is_ok() {
        return Ok(target);
    }

    // Rename fails across filesystems.
    if let Err(e) = tokio::fs::copy(staged, &target).await {
        let _ = tokio::fs::remove_file(&target).await;
        return Err(install_err(e));
    }
    tokio::fs::remove_file(staged).await.map_err(install_err)?;
    Ok(target)
}
