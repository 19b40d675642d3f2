//! # Target Descriptors
//!
//! A target descriptor commits to the exact content of one artifact: its
//! length and one or more hex digests, plus optional custom metadata. The
//! custom metadata carries the artifact's attachment list under the
//! [`ATTACHMENTS_KEY`] key: the layout, keys and links a consumer must fetch
//! to verify the artifact's provenance.
//!
//! ## Wire Form
//!
//! ```json
//! { "path": "app-1.0.whl",
//!   "info": { "length": 1024,
//!             "hashes": { "sha256": "…" },
//!             "custom": { "in-toto": ["root.layout", "build.link"] } } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::digest::{digest_reader, HashAlgorithm};
use crate::error::{AttachmentListError, DescriptorError, IntegrityError};
use crate::target::TargetPath;

/// Custom metadata key holding a target's attachment list.
pub const ATTACHMENTS_KEY: &str = "in-toto";

/// Length, hashes and custom metadata for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetInfo {
    /// Content length in bytes.
    pub length: u64,
    /// Algorithm name to lowercase hex digest.
    pub hashes: BTreeMap<String, String>,
    /// Free-form custom metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Map<String, Value>>,
}

impl TargetInfo {
    /// The attachment list, or an empty list when the target has none.
    pub fn attachments(&self) -> Result<Vec<TargetPath>, AttachmentListError> {
        let Some(entry) = self.custom.as_ref().and_then(|c| c.get(ATTACHMENTS_KEY)) else {
            return Ok(Vec::new());
        };
        let Value::Array(items) = entry else {
            return Err(AttachmentListError::NotAList {
                key: ATTACHMENTS_KEY.to_string(),
            });
        };
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let name = item
                    .as_str()
                    .ok_or(AttachmentListError::NotAString { index })?;
                TargetPath::new(name)
                    .map_err(|source| AttachmentListError::InvalidPath { index, source })
            })
            .collect()
    }

    /// The hex digest recorded for `algorithm`, if any.
    pub fn hash(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.hashes.get(algorithm.as_str()).map(String::as_str)
    }

    /// Check `data` against the recorded length and every supported hash.
    ///
    /// Hash entries under unknown algorithm names are skipped, but at least
    /// one supported entry must be present.
    pub fn verify_bytes(&self, data: &[u8]) -> Result<(), IntegrityError> {
        let actual_len = data.len() as u64;
        if actual_len != self.length {
            return Err(IntegrityError::LengthMismatch {
                expected: self.length,
                actual: actual_len,
            });
        }
        let mut checked = 0usize;
        for (name, expected) in &self.hashes {
            let Some(algorithm) = HashAlgorithm::from_name(name) else {
                continue;
            };
            let actual = algorithm.digest(data);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(IntegrityError::HashMismatch {
                    algorithm: name.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
            checked += 1;
        }
        if checked == 0 {
            return Err(IntegrityError::NoSupportedHash {
                found: self.hashes.keys().cloned().collect::<Vec<_>>().join(", "),
            });
        }
        Ok(())
    }
}

/// A target path together with its content commitment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Target name in the repository index.
    pub path: TargetPath,
    /// Length, hashes and custom metadata.
    pub info: TargetInfo,
}

impl TargetDescriptor {
    /// The attachment list of this target.
    pub fn attachments(&self) -> Result<Vec<TargetPath>, AttachmentListError> {
        self.info.attachments()
    }
}

/// Builds descriptors for local files.
///
/// Defaults to SHA-256 only. Every configured algorithm is computed from a
/// single read of the file.
#[derive(Debug, Clone)]
pub struct TargetDescriptorBuilder {
    algorithms: Vec<HashAlgorithm>,
}

impl Default for TargetDescriptorBuilder {
    fn default() -> Self {
        Self {
            algorithms: vec![HashAlgorithm::Sha256],
        }
    }
}

impl TargetDescriptorBuilder {
    /// A builder with no algorithms configured.
    pub fn empty() -> Self {
        Self {
            algorithms: Vec::new(),
        }
    }

    /// Add an algorithm. Duplicates are ignored.
    pub fn algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        if !self.algorithms.contains(&algorithm) {
            self.algorithms.push(algorithm);
        }
        self
    }

    /// Describe `file`, publishing it under its own (relative) path.
    pub fn describe(
        &self,
        file: impl AsRef<Path>,
        attachments: Option<&[TargetPath]>,
    ) -> Result<TargetDescriptor, DescriptorError> {
        let file = file.as_ref();
        let target = TargetPath::from_file_path(file).map_err(|source| {
            DescriptorError::InvalidPath {
                path: file.to_path_buf(),
                source,
            }
        })?;
        self.describe_as(file, target, attachments)
    }

    /// Describe `file`, publishing it under `target`.
    pub fn describe_as(
        &self,
        file: impl AsRef<Path>,
        target: TargetPath,
        attachments: Option<&[TargetPath]>,
    ) -> Result<TargetDescriptor, DescriptorError> {
        let file = file.as_ref();
        if self.algorithms.is_empty() {
            return Err(DescriptorError::NoHashAlgorithm);
        }
        let handle = std::fs::File::open(file).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DescriptorError::FileNotFound {
                path: file.to_path_buf(),
            },
            _ => DescriptorError::Io {
                path: file.to_path_buf(),
                source: e,
            },
        })?;
        let (length, digests) =
            digest_reader(handle, &self.algorithms).map_err(|source| DescriptorError::Io {
                path: file.to_path_buf(),
                source,
            })?;

        let hashes = digests
            .into_iter()
            .map(|(alg, hex)| (alg.as_str().to_string(), hex))
            .collect();

        let custom = attachments.map(|list| {
            let mut custom = Map::new();
            custom.insert(
                ATTACHMENTS_KEY.to_string(),
                Value::Array(
                    list.iter()
                        .map(|p| Value::String(p.as_str().to_string()))
                        .collect(),
                ),
            );
            custom
        });

        tracing::debug!(target_path = %target, length, "described target");

        Ok(TargetDescriptor {
            path: target,
            info: TargetInfo {
                length,
                hashes,
                custom,
            },
        })
    }
}

/// Describe `file` with the default builder (SHA-256).
pub fn describe(
    file: impl AsRef<Path>,
    attachments: Option<&[TargetPath]>,
) -> Result<TargetDescriptor, DescriptorError> {
    TargetDescriptorBuilder::default().describe(file, attachments)
}
