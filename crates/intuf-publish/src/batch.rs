//! # Target Batches
//!
//! A [`TargetBatch`] is the unit of one publish request: an ordered list of
//! descriptors with distinct paths. The bundle types build batches from
//! local files with the attachment wiring a consumer's verifier expects:
//!
//! ```text
//! ArtifactBundle:  target  -> [layout, link...]
//!                  layout  -> [key]
//!                  key, link...
//!
//! LayoutBundle:    layout  -> [key...]
//!                  key...
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use intuf_core::{DescriptorError, TargetDescriptor, TargetDescriptorBuilder, TargetPath};
use serde::Serialize;

use crate::error::PublishError;

/// Descriptors published in one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetBatch {
    targets: Vec<TargetDescriptor>,
}

impl TargetBatch {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// A batch of `primary` followed by `attachments`.
    pub fn with_attachments(primary: TargetDescriptor, attachments: &[TargetDescriptor]) -> Self {
        let mut targets = Vec::with_capacity(attachments.len() + 1);
        targets.push(primary);
        targets.extend_from_slice(attachments);
        Self { targets }
    }

    /// Append a descriptor.
    pub fn push(&mut self, descriptor: TargetDescriptor) {
        self.targets.push(descriptor);
    }

    /// Descriptors in request order.
    pub fn targets(&self) -> &[TargetDescriptor] {
        &self.targets
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Target paths in request order.
    pub fn paths(&self) -> Vec<TargetPath> {
        self.targets.iter().map(|t| t.path.clone()).collect()
    }

    /// Reject empty batches and repeated paths.
    pub fn validate(&self) -> Result<(), PublishError> {
        ensure_distinct(self.targets.iter().map(|t| &t.path))
    }
}

/// Fail on an empty sequence or the first repeated path.
pub(crate) fn ensure_distinct<'a>(
    paths: impl IntoIterator<Item = &'a TargetPath>,
) -> Result<(), PublishError> {
    let mut seen = HashSet::new();
    for path in paths {
        if !seen.insert(path) {
            return Err(PublishError::DuplicatePath(path.clone()));
        }
    }
    if seen.is_empty() {
        return Err(PublishError::EmptyBatch);
    }
    Ok(())
}

fn target_path(file: &Path) -> Result<TargetPath, DescriptorError> {
    TargetPath::from_file_path(file).map_err(|source| DescriptorError::InvalidPath {
        path: file.to_path_buf(),
        source,
    })
}

/// An artifact with its layout, layout key and attestation links.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    /// The artifact.
    pub target: PathBuf,
    /// The in-toto layout.
    pub layout: PathBuf,
    /// The key that signed the layout.
    pub key: PathBuf,
    /// Attestation links for the layout's steps.
    pub links: Vec<PathBuf>,
}

impl ArtifactBundle {
    /// Describe every file, wiring the attachments.
    ///
    /// Each file is published under its path as given.
    pub fn describe(&self, builder: &TargetDescriptorBuilder) -> Result<TargetBatch, PublishError> {
        self.describe_in(Path::new(""), builder)
    }

    /// Like [`describe`](Self::describe), reading files relative to `base`.
    pub fn describe_in(
        &self,
        base: &Path,
        builder: &TargetDescriptorBuilder,
    ) -> Result<TargetBatch, PublishError> {
        let layout = target_path(&self.layout)?;
        let key = target_path(&self.key)?;
        let links = self
            .links
            .iter()
            .map(|l| target_path(l))
            .collect::<Result<Vec<_>, _>>()?;

        let mut target_attachments = Vec::with_capacity(links.len() + 1);
        target_attachments.push(layout.clone());
        target_attachments.extend(links.iter().cloned());

        let target = target_path(&self.target)?;

        let mut batch = TargetBatch::new();
        batch.push(builder.describe_as(
            base.join(&self.target),
            target,
            Some(target_attachments.as_slice()),
        )?);
        batch.push(builder.describe_as(
            base.join(&self.layout),
            layout,
            Some(std::slice::from_ref(&key)),
        )?);
        batch.push(builder.describe_as(base.join(&self.key), key, None)?);
        for (file, link) in self.links.iter().zip(links) {
            batch.push(builder.describe_as(base.join(file), link, None)?);
        }
        batch.validate()?;
        Ok(batch)
    }
}

/// A layout and the keys that sign it.
#[derive(Debug, Clone)]
pub struct LayoutBundle {
    /// The in-toto layout.
    pub layout: PathBuf,
    /// Keys attached to the layout.
    pub keys: Vec<PathBuf>,
}

impl LayoutBundle {
    /// Describe the layout (listing the keys) and each key.
    pub fn describe(&self, builder: &TargetDescriptorBuilder) -> Result<TargetBatch, PublishError> {
        self.describe_in(Path::new(""), builder)
    }

    /// Like [`describe`](Self::describe), reading files relative to `base`.
    pub fn describe_in(
        &self,
        base: &Path,
        builder: &TargetDescriptorBuilder,
    ) -> Result<TargetBatch, PublishError> {
        let layout = target_path(&self.layout)?;
        let keys = self
            .keys
            .iter()
            .map(|k| target_path(k))
            .collect::<Result<Vec<_>, _>>()?;

        let mut batch = TargetBatch::new();
        batch.push(builder.describe_as(base.join(&self.layout), layout, Some(keys.as_slice()))?);
        for (file, key) in self.keys.iter().zip(keys) {
            batch.push(builder.describe_as(base.join(file), key, None)?);
        }
        batch.validate()?;
        Ok(batch)
    }
}
