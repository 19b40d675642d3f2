//! # In-Memory Metadata Client
//!
//! A [`MetadataClient`] over a fixed set of targets held in memory. Used for
//! embedding fixed repositories and for exercising resolution without a
//! network. Counts lookups and downloads per target so callers can observe
//! deduplication.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use intuf_core::{bytes_digest, TargetDescriptor, TargetInfo, TargetPath, ATTACHMENTS_KEY};
use parking_lot::Mutex;

use crate::error::MetadataError;
use crate::metadata::MetadataClient;

#[derive(Debug, Default)]
struct Counters {
    refreshes: usize,
    lookups: BTreeMap<TargetPath, usize>,
    downloads: BTreeMap<TargetPath, usize>,
}

/// Metadata client serving targets from memory.
#[derive(Debug, Default)]
pub struct InMemoryMetadataClient {
    targets: BTreeMap<TargetPath, (TargetInfo, Vec<u8>)>,
    failing: BTreeSet<TargetPath>,
    refresh_failure: Option<String>,
    counters: Mutex<Counters>,
}

impl InMemoryMetadataClient {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target with the given content and attachment list.
    ///
    /// The descriptor is computed from `content` (SHA-256). An empty
    /// attachment list leaves the custom metadata unset.
    pub fn with_target(mut self, path: TargetPath, content: &[u8], attachments: &[TargetPath]) -> Self {
        let custom = if attachments.is_empty() {
            None
        } else {
            let mut custom = serde_json::Map::new();
            custom.insert(
                ATTACHMENTS_KEY.to_string(),
                serde_json::Value::Array(
                    attachments
                        .iter()
                        .map(|a| serde_json::Value::String(a.to_string()))
                        .collect(),
                ),
            );
            Some(custom)
        };
        let info = TargetInfo {
            length: content.len() as u64,
            hashes: BTreeMap::from([("sha256".to_string(), bytes_digest(content))]),
            custom,
        };
        self.targets.insert(path, (info, content.to_vec()));
        self
    }

    /// Add a target whose served content need not match its descriptor.
    pub fn with_raw_target(mut self, descriptor: TargetDescriptor, content: &[u8]) -> Self {
        self.targets
            .insert(descriptor.path, (descriptor.info, content.to_vec()));
        self
    }

    /// Make every download of `path` fail.
    pub fn with_failing_download(mut self, path: TargetPath) -> Self {
        self.failing.insert(path);
        self
    }

    /// Make `refresh` fail with `reason`.
    pub fn with_refresh_failure(mut self, reason: impl Into<String>) -> Self {
        self.refresh_failure = Some(reason.into());
        self
    }

    /// Number of successful `refresh` calls.
    pub fn refresh_count(&self) -> usize {
        self.counters.lock().refreshes
    }

    /// Number of `get_target_info` calls for `path`.
    pub fn lookup_count(&self, path: &TargetPath) -> usize {
        self.counters.lock().lookups.get(path).copied().unwrap_or(0)
    }

    /// Number of downloads of `path`.
    pub fn download_count(&self, path: &TargetPath) -> usize {
        self.counters.lock().downloads.get(path).copied().unwrap_or(0)
    }

    /// Number of downloads across all targets.
    pub fn total_downloads(&self) -> usize {
        self.counters.lock().downloads.values().sum()
    }
}

impl MetadataClient for InMemoryMetadataClient {
    async fn refresh(&self) -> Result<(), MetadataError> {
        if let Some(reason) = &self.refresh_failure {
            return Err(MetadataError::Refresh(reason.clone()));
        }
        self.counters.lock().refreshes += 1;
        Ok(())
    }

    async fn get_target_info(
        &self,
        target: &TargetPath,
    ) -> Result<Option<TargetDescriptor>, MetadataError> {
        *self
            .counters
            .lock()
            .lookups
            .entry(target.clone())
            .or_default() += 1;
        Ok(self.targets.get(target).map(|(info, _)| TargetDescriptor {
            path: target.clone(),
            info: info.clone(),
        }))
    }

    async fn find_cached(
        &self,
        target: &TargetDescriptor,
        dir: &Path,
    ) -> Result<Option<PathBuf>, MetadataError> {
        let local = target.path.to_local_path(dir);
        match tokio::fs::read(&local).await {
            Ok(bytes) if target.info.verify_bytes(&bytes).is_ok() => Ok(Some(local)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(MetadataError::Io {
                path: local,
                source,
            }),
        }
    }

    async fn download(
        &self,
        target: &TargetDescriptor,
        dir: &Path,
    ) -> Result<PathBuf, MetadataError> {
        if self.failing.contains(&target.path) {
            return Err(MetadataError::Download {
                target: target.path.clone(),
                reason: "connection refused".into(),
            });
        }
        let Some((_, content)) = self.targets.get(&target.path) else {
            return Err(MetadataError::Download {
                target: target.path.clone(),
                reason: "404 Not Found".into(),
            });
        };
        *self
            .counters
            .lock()
            .downloads
            .entry(target.path.clone())
            .or_default() += 1;

        target
            .info
            .verify_bytes(content)
            .map_err(|source| MetadataError::Integrity {
                target: target.path.clone(),
                source,
            })?;

        let local = target.path.to_local_path(dir);
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| MetadataError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&local, content)
            .await
            .map_err(|source| MetadataError::Io {
                path: local.clone(),
                source,
            })?;
        Ok(local)
    }
}
