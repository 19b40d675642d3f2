//! # Attachment Resolution
//!
//! Turns one requested target into a fully populated working directory: the
//! target itself plus every transitive attachment listed in the targets'
//! custom metadata.
//!
//! ## Algorithm
//!
//! Depth-first over an explicit stack of frames, with a per-session mark for
//! every target seen:
//!
//! 1. A target already marked resolved is skipped.
//! 2. Its descriptor is looked up; a missing target fails the whole
//!    resolution with [`FetchError::TargetNotFound`].
//! 3. The target is marked in progress.
//! 4. Its attachments are visited in listed order.
//! 5. Once all attachments are resolved, the content is taken from the
//!    client's cache or downloaded.
//! 6. The target is marked resolved.
//!
//! Reaching a target that is still in progress means the graph has a cycle;
//! resolution stops with [`FetchError::CyclicAttachmentGraph`]. The first
//! failure anywhere aborts the walk and is returned unchanged; nothing is
//! retried.
//!
//! Marks live in the [`ResolutionSession`], never in process-wide state, so
//! concurrent resolutions against one client do not interfere.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use intuf_core::{TargetDescriptor, TargetPath};

use crate::error::{FetchError, MetadataError};
use crate::metadata::MetadataClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Resolved,
}

/// A target materialized in the working directory.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// The target's descriptor as served by the index.
    pub descriptor: TargetDescriptor,
    /// Where the verified content sits on disk.
    pub local_path: PathBuf,
    /// Whether the content came from the cache rather than a download.
    pub cache_hit: bool,
}

impl ResolvedTarget {
    /// The target name.
    pub fn path(&self) -> &TargetPath {
        &self.descriptor.path
    }
}

/// Every target resolved in one session, attachments before the targets
/// that list them.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSet {
    targets: Vec<ResolvedTarget>,
}

impl ResolvedSet {
    /// Number of resolved targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether nothing has been resolved.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Resolved targets in completion order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedTarget> {
        self.targets.iter()
    }

    /// Look up a resolved target by name.
    pub fn get(&self, path: &TargetPath) -> Option<&ResolvedTarget> {
        self.targets.iter().find(|t| t.path() == path)
    }

    /// Whether `path` was resolved.
    pub fn contains(&self, path: &TargetPath) -> bool {
        self.get(path).is_some()
    }

    /// Target names in completion order.
    pub fn paths(&self) -> Vec<TargetPath> {
        self.targets.iter().map(|t| t.path().clone()).collect()
    }

    /// Number of targets taken from the cache.
    pub fn cache_hits(&self) -> usize {
        self.targets.iter().filter(|t| t.cache_hit).count()
    }

    /// Number of targets downloaded.
    pub fn downloads(&self) -> usize {
        self.len() - self.cache_hits()
    }
}

/// One target on the traversal stack.
struct Frame {
    descriptor: TargetDescriptor,
    attachments: Vec<TargetPath>,
    next: usize,
}

impl Frame {
    fn next_attachment(&mut self) -> Option<TargetPath> {
        let child = self.attachments.get(self.next).cloned();
        if child.is_some() {
            self.next += 1;
        }
        child
    }
}

/// Resolution state for one request.
pub struct ResolutionSession<'a, C> {
    client: &'a C,
    workdir: &'a Path,
    marks: HashMap<TargetPath, Mark>,
    resolved: ResolvedSet,
}

impl<'a, C: MetadataClient> ResolutionSession<'a, C> {
    /// Start a session that stages content in `workdir`.
    pub fn new(client: &'a C, workdir: &'a Path) -> Self {
        Self {
            client,
            workdir,
            marks: HashMap::new(),
            resolved: ResolvedSet::default(),
        }
    }

    /// Whether `path` has been fully resolved in this session.
    pub fn is_resolved(&self, path: &TargetPath) -> bool {
        self.marks.get(path) == Some(&Mark::Resolved)
    }

    /// Resolve `root` and all of its transitive attachments.
    ///
    /// On failure, in-progress marks are cleared so the session can still
    /// be used for other roots; targets already resolved stay resolved.
    pub async fn resolve(&mut self, root: &TargetPath) -> Result<(), FetchError> {
        let result = self.walk(root).await;
        if result.is_err() {
            self.marks.retain(|_, mark| *mark == Mark::Resolved);
        }
        result
    }

    /// Everything resolved so far.
    pub fn resolved(&self) -> &ResolvedSet {
        &self.resolved
    }

    /// Consume the session, returning everything it resolved.
    pub fn into_resolved(self) -> ResolvedSet {
        self.resolved
    }

    async fn walk(&mut self, root: &TargetPath) -> Result<(), FetchError> {
        if self.is_resolved(root) {
            tracing::debug!(target_path = %root, "already resolved in this session");
            return Ok(());
        }

        let mut stack = vec![self.enter(root).await?];
        loop {
            let next = match stack.last_mut() {
                Some(frame) => frame.next_attachment(),
                None => break,
            };
            match next {
                Some(child) => match self.marks.get(&child).copied() {
                    Some(Mark::Resolved) => {
                        tracing::trace!(target_path = %child, "attachment already resolved");
                    }
                    Some(Mark::InProgress) => {
                        let mut chain: Vec<TargetPath> =
                            stack.iter().map(|f| f.descriptor.path.clone()).collect();
                        chain.push(child.clone());
                        tracing::error!(target_path = %child, "cyclic attachment graph");
                        return Err(FetchError::CyclicAttachmentGraph { path: child, chain });
                    }
                    None => {
                        let frame = self.enter(&child).await?;
                        stack.push(frame);
                    }
                },
                None => {
                    if let Some(frame) = stack.pop() {
                        self.materialize(frame.descriptor).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Look up `path`, parse its attachments and mark it in progress.
    async fn enter(&mut self, path: &TargetPath) -> Result<Frame, FetchError> {
        let descriptor = self
            .client
            .get_target_info(path)
            .await
            .map_err(|source| FetchError::Network {
                target: path.clone(),
                source,
            })?
            .ok_or_else(|| {
                tracing::error!(target_path = %path, "target not found in index");
                FetchError::TargetNotFound(path.clone())
            })?;

        let attachments =
            descriptor
                .attachments()
                .map_err(|source| FetchError::MalformedAttachments {
                    path: path.clone(),
                    source,
                })?;

        self.marks.insert(path.clone(), Mark::InProgress);
        tracing::debug!(
            target_path = %path,
            attachments = attachments.len(),
            "resolving target"
        );

        Ok(Frame {
            descriptor,
            attachments,
            next: 0,
        })
    }

    /// Take the target from the cache or download it, then mark it resolved.
    async fn materialize(&mut self, descriptor: TargetDescriptor) -> Result<(), FetchError> {
        let network = |source: MetadataError| FetchError::Network {
            target: descriptor.path.clone(),
            source,
        };

        let cached = self
            .client
            .find_cached(&descriptor, self.workdir)
            .await
            .map_err(network)?;

        let (local_path, cache_hit) = match cached {
            Some(path) => (path, true),
            None => (
                self.client
                    .download(&descriptor, self.workdir)
                    .await
                    .map_err(network)?,
                false,
            ),
        };

        tracing::info!(
            target_path = %descriptor.path,
            local_path = %local_path.display(),
            cache_hit,
            "target available"
        );

        self.marks.insert(descriptor.path.clone(), Mark::Resolved);
        self.resolved.targets.push(ResolvedTarget {
            descriptor,
            local_path,
            cache_hit,
        });
        Ok(())
    }
}

/// Resolve `root` and its attachments into `workdir` in a fresh session.
pub async fn resolve_and_fetch<C: MetadataClient>(
    client: &C,
    root: &TargetPath,
    workdir: &Path,
) -> Result<ResolvedSet, FetchError> {
    let mut session = ResolutionSession::new(client, workdir);
    session.resolve(root).await?;
    Ok(session.into_resolved())
}
