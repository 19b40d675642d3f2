//! # HTTP Metadata Client
//!
//! A [`MetadataClient`] over a TUF repository served by HTTP:
//!
//! | Method | URL | Use |
//! |--------|-----|-----|
//! | GET | `{metadata_url}/{N}.root.json` | root rotation |
//! | GET | `{metadata_url}/timestamp.json` | freshness |
//! | GET | `{metadata_url}/[{V}.]snapshot.json` | role versions |
//! | GET | `{metadata_url}/[{V}.]targets.json` | target index |
//! | GET | `{metadata_url}/[{V}.]{role}.json` | delegated targets |
//! | GET | `{target_url}/{path}` | target content |
//!
//! Verification is done by a `tuf` [`Database`] seeded from the
//! bootstrapped `root.json`: every role is checked for signature threshold,
//! version and expiry before any descriptor is served, and lookups go
//! through the verified delegation graph. Version prefixes are used when the
//! trusted root enables consistent snapshots.
//!
//! Downloaded content is verified against the descriptor before it touches
//! the working directory, then kept in a content-addressed blob cache at
//! `<metadata dir>/targets/<sha256>` so later requests skip the network.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use intuf_core::{
    HashAlgorithm, MetadataDirectory, TargetDescriptor, TargetInfo, TargetPath, TRUST_ROOT_FILE,
};
use parking_lot::RwLock;
use serde::Deserialize;
use tuf::database::Database;
use tuf::metadata::{
    Metadata as _, MetadataPath, RawSignedMetadata, RawSignedMetadataSetBuilder,
    TargetPath as RoleTargetPath,
};
use tuf::interchange::Json as Pouf1;
use url::Url;

use crate::config::{directory_url, RepositoryConfig};
use crate::error::MetadataError;
use crate::metadata::MetadataClient;

/// Timestamp role file name.
pub const TIMESTAMP_FILE: &str = "timestamp.json";

/// Snapshot role file name, before any version prefix.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Top-level targets role file name, before any version prefix.
pub const TARGETS_FILE: &str = "targets.json";

/// Blob cache directory under the metadata directory.
pub const BLOB_DIR: &str = "targets";

/// Upper bound on root versions walked in one refresh.
pub const MAX_ROOT_ROTATIONS: u32 = 32;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    signed: T,
}

#[derive(Debug, Default, Deserialize)]
struct MetaVersions {
    #[serde(default)]
    meta: BTreeMap<String, MetaEntry>,
}

#[derive(Debug, Deserialize)]
struct MetaEntry {
    version: u32,
}

#[derive(Debug, Default, Deserialize)]
struct TargetsDelegations {
    #[serde(default)]
    delegations: Option<DelegatedRoles>,
}

#[derive(Debug, Deserialize)]
struct DelegatedRoles {
    #[serde(default)]
    roles: Vec<DelegatedRole>,
}

#[derive(Debug, Deserialize)]
struct DelegatedRole {
    name: String,
}

/// Metadata client for a TUF repository served over HTTP.
pub struct HttpMetadataClient {
    http: reqwest::Client,
    metadata_url: Url,
    target_url: Url,
    metadata_dir: MetadataDirectory,
    database: RwLock<Option<Database<Pouf1>>>,
}

impl std::fmt::Debug for HttpMetadataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMetadataClient")
            .field("metadata_url", &self.metadata_url.as_str())
            .field("target_url", &self.target_url.as_str())
            .field("metadata_dir", &self.metadata_dir)
            .field("refreshed", &self.database.read().is_some())
            .finish()
    }
}

impl HttpMetadataClient {
    /// Create a client for the repository in `config`.
    pub fn new(config: &RepositoryConfig, metadata_dir: MetadataDirectory) -> Result<Self, MetadataError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(MetadataError::Client)?;
        Ok(Self {
            http,
            metadata_url: directory_url(config.metadata_url.clone()),
            target_url: directory_url(config.target_url.clone()),
            metadata_dir,
            database: RwLock::new(None),
        })
    }

    /// The local metadata directory.
    pub fn metadata_dir(&self) -> &MetadataDirectory {
        &self.metadata_dir
    }

    /// Path of the cached blob for `info`, if it carries a SHA-256.
    pub fn blob_path(&self, info: &TargetInfo) -> Option<PathBuf> {
        info.hash(HashAlgorithm::Sha256)
            .map(|hex| self.metadata_dir.path().join(BLOB_DIR).join(hex))
    }

    /// GET one metadata file. `Ok(None)` when the server does not have it.
    async fn fetch_metadata(&self, file: &str) -> Result<Option<Vec<u8>>, MetadataError> {
        let url = self
            .metadata_url
            .join(file)
            .map_err(|e| MetadataError::Refresh(format!("invalid metadata URL: {e}")))?;

        tracing::debug!(url = %url, "fetching metadata");
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| MetadataError::Refresh(format!("GET {url}: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MetadataError::Refresh(format!("GET {url} returned {status}")));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| MetadataError::Refresh(format!("GET {url}: {e}")))?;
        Ok(Some(body.to_vec()))
    }

    async fn require_metadata(&self, file: &str) -> Result<Vec<u8>, MetadataError> {
        self.fetch_metadata(file)
            .await?
            .ok_or_else(|| MetadataError::Refresh(format!("{file} not found on metadata server")))
    }

    /// Seed a database from the bootstrapped root.
    ///
    /// Previously verified timestamp and snapshot files are loaded too, so
    /// the server cannot roll them back. If they no longer verify (usually
    /// because they expired) the database starts from the root alone.
    async fn seed_database(&self, root: Vec<u8>) -> Result<Database<Pouf1>, MetadataError> {
        let now = Utc::now();
        let root_only = RawSignedMetadataSetBuilder::<Pouf1>::new()
            .root(RawSignedMetadata::new(root.clone()))
            .build();

        let timestamp = read_optional(&self.metadata_dir.path().join(TIMESTAMP_FILE)).await?;
        let snapshot = read_optional(&self.metadata_dir.path().join(SNAPSHOT_FILE)).await?;
        if timestamp.is_none() && snapshot.is_none() {
            return Database::from_trusted_metadata_with_start_time(&root_only, &now)
                .map_err(MetadataError::Verification);
        }

        let mut builder =
            RawSignedMetadataSetBuilder::<Pouf1>::new().root(RawSignedMetadata::new(root));
        if let Some(bytes) = timestamp {
            builder = builder.timestamp(RawSignedMetadata::new(bytes));
        }
        if let Some(bytes) = snapshot {
            builder = builder.snapshot(RawSignedMetadata::new(bytes));
        }
        match Database::from_trusted_metadata_with_start_time(&builder.build(), &now) {
            Ok(db) => Ok(db),
            Err(e) => {
                tracing::debug!(error = %e, "stored timestamp/snapshot not reusable; seeding from root");
                Database::from_trusted_metadata_with_start_time(&root_only, &now)
                    .map_err(MetadataError::Verification)
            }
        }
    }

    /// Walk `{N+1}.root.json` until the server has no newer root.
    ///
    /// Returns the newest trusted root document.
    async fn rotate_root(
        &self,
        db: &mut Database<Pouf1>,
        mut root: Vec<u8>,
    ) -> Result<Vec<u8>, MetadataError> {
        for _ in 0..MAX_ROOT_ROTATIONS {
            let next = db.trusted_root().version() + 1;
            let Some(bytes) = self.fetch_metadata(&format!("{next}.{TRUST_ROOT_FILE}")).await? else {
                return Ok(root);
            };
            db.update_root(&RawSignedMetadata::new(bytes.clone()))
                .map_err(MetadataError::Verification)?;
            tracing::info!(version = next, "trusted root rotated");
            root = bytes;
        }
        Ok(root)
    }

    /// Verify and load delegated targets roles named by the top-level targets.
    async fn load_delegations(
        &self,
        db: &mut Database<Pouf1>,
        targets: &[u8],
        versions: &MetaVersions,
        consistent: bool,
    ) -> Result<Vec<(String, Vec<u8>)>, MetadataError> {
        let roles = parse_signed::<TargetsDelegations>(targets, TARGETS_FILE)?
            .delegations
            .map(|d| d.roles)
            .unwrap_or_default();

        let now = Utc::now();
        let parent = MetadataPath::targets();
        let mut loaded = Vec::with_capacity(roles.len());
        for role in roles {
            let file = format!("{}.json", role.name);
            let version = versions.meta.get(&file).map(|e| e.version);
            let bytes = self.require_metadata(&versioned(&file, version, consistent)).await?;
            let role_path = MetadataPath::new(role.name.clone()).map_err(MetadataError::Verification)?;
            db.update_delegated_targets(&now, &parent, &role_path, &RawSignedMetadata::new(bytes.clone()))
                .map_err(MetadataError::Verification)?;
            loaded.push((file, bytes));
        }
        Ok(loaded)
    }

    /// Verified content from the blob cache, if present.
    async fn read_blob(&self, target: &TargetDescriptor) -> Result<Option<Vec<u8>>, MetadataError> {
        let Some(blob) = self.blob_path(&target.info) else {
            return Ok(None);
        };
        read_verified(&blob, target).await
    }

    async fn store_blob(&self, target: &TargetDescriptor, content: &[u8]) -> Result<(), MetadataError> {
        let Some(blob) = self.blob_path(&target.info) else {
            return Ok(());
        };
        if tokio::fs::try_exists(&blob).await.unwrap_or(false) {
            return Ok(());
        }
        // Write-then-rename so a reader never sees a partial blob.
        let partial = blob.with_extension("part");
        write_file(&partial, content).await?;
        tokio::fs::rename(&partial, &blob)
            .await
            .map_err(|source| MetadataError::Io { path: blob, source })
    }
}

impl MetadataClient for HttpMetadataClient {
    async fn refresh(&self) -> Result<(), MetadataError> {
        let root_path = self.metadata_dir.require_trust_root()?;
        let root = tokio::fs::read(&root_path)
            .await
            .map_err(|source| MetadataError::Io {
                path: root_path.clone(),
                source,
            })?;

        let mut db = self.seed_database(root.clone()).await?;
        let root = self.rotate_root(&mut db, root).await?;
        let consistent = db.trusted_root().consistent_snapshot();

        let timestamp = self.require_metadata(TIMESTAMP_FILE).await?;
        let snapshot_version = parse_signed::<MetaVersions>(&timestamp, TIMESTAMP_FILE)?
            .meta
            .get(SNAPSHOT_FILE)
            .map(|e| e.version);
        let snapshot = self
            .require_metadata(&versioned(SNAPSHOT_FILE, snapshot_version, consistent))
            .await?;
        let versions = parse_signed::<MetaVersions>(&snapshot, SNAPSHOT_FILE)?;
        let targets_version = versions.meta.get(TARGETS_FILE).map(|e| e.version);
        let targets = self
            .require_metadata(&versioned(TARGETS_FILE, targets_version, consistent))
            .await?;

        let set = RawSignedMetadataSetBuilder::<Pouf1>::new()
            .timestamp(RawSignedMetadata::new(timestamp.clone()))
            .snapshot(RawSignedMetadata::new(snapshot.clone()))
            .targets(RawSignedMetadata::new(targets.clone()))
            .build();
        db.update_metadata_with_start_time(&set, &Utc::now())
            .map_err(MetadataError::Verification)?;

        let delegated = self
            .load_delegations(&mut db, &targets, &versions, consistent)
            .await?;

        let dir = self.metadata_dir.path();
        write_file(&root_path, &root).await?;
        write_file(&dir.join(TIMESTAMP_FILE), &timestamp).await?;
        write_file(&dir.join(SNAPSHOT_FILE), &snapshot).await?;
        write_file(&dir.join(TARGETS_FILE), &targets).await?;
        for (file, bytes) in &delegated {
            write_file(&dir.join(file), bytes).await?;
        }

        tracing::info!(
            root_version = db.trusted_root().version(),
            snapshot_version,
            targets_version,
            delegations = delegated.len(),
            "trusted metadata refreshed"
        );
        *self.database.write() = Some(db);
        Ok(())
    }

    async fn get_target_info(
        &self,
        target: &TargetPath,
    ) -> Result<Option<TargetDescriptor>, MetadataError> {
        let guard = self.database.read();
        let db = guard.as_ref().ok_or(MetadataError::NotRefreshed)?;

        let role_path = RoleTargetPath::new(target.as_str().to_string()).map_err(MetadataError::Verification)?;
        let description = match db.target_description(&role_path) {
            Ok(description) => description,
            Err(e) => {
                tracing::debug!(target_path = %target, error = %e, "no trusted description");
                return Ok(None);
            }
        };

        // The verified description has the descriptor wire shape.
        let info = serde_json::to_value(&description)
            .and_then(serde_json::from_value::<TargetInfo>)
            .map_err(|e| MetadataError::Refresh(format!("unreadable description for {target}: {e}")))?;
        Ok(Some(TargetDescriptor {
            path: target.clone(),
            info,
        }))
    }

    async fn find_cached(
        &self,
        target: &TargetDescriptor,
        dir: &Path,
    ) -> Result<Option<PathBuf>, MetadataError> {
        let local = target.path.to_local_path(dir);
        if read_verified(&local, target).await?.is_some() {
            return Ok(Some(local));
        }

        let Some(content) = self.read_blob(target).await? else {
            return Ok(None);
        };
        write_file(&local, &content).await?;
        tracing::debug!(target_path = %target.path, "served from blob cache");
        Ok(Some(local))
    }

    async fn download(
        &self,
        target: &TargetDescriptor,
        dir: &Path,
    ) -> Result<PathBuf, MetadataError> {
        let download_err = |reason: String| MetadataError::Download {
            target: target.path.clone(),
            reason,
        };

        let url = self
            .target_url
            .join(target.path.as_str())
            .map_err(|e| download_err(format!("invalid target URL: {e}")))?;

        tracing::debug!(target_path = %target.path, url = %url, "downloading target");
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(target_path = %target.path, status = status.as_u16(), "download failed");
            return Err(download_err(format!("GET {url} returned {status}")));
        }

        let content = resp.bytes().await.map_err(|e| download_err(e.to_string()))?;
        target
            .info
            .verify_bytes(&content)
            .map_err(|source| MetadataError::Integrity {
                target: target.path.clone(),
                source,
            })?;

        self.store_blob(target, &content).await?;
        let local = target.path.to_local_path(dir);
        write_file(&local, &content).await?;
        Ok(local)
    }
}

/// Role file name on the server, version-prefixed under consistent snapshots.
fn versioned(file: &str, version: Option<u32>, consistent: bool) -> String {
    match version {
        Some(v) if consistent => format!("{v}.{file}"),
        _ => file.to_string(),
    }
}

fn parse_signed<T: serde::de::DeserializeOwned>(bytes: &[u8], file: &str) -> Result<T, MetadataError> {
    serde_json::from_slice::<Envelope<T>>(bytes)
        .map(|envelope| envelope.signed)
        .map_err(|e| MetadataError::Refresh(format!("malformed {file}: {e}")))
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, MetadataError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(MetadataError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Content of `path` if it exists and matches `target`.
async fn read_verified(path: &Path, target: &TargetDescriptor) -> Result<Option<Vec<u8>>, MetadataError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => match target.info.verify_bytes(&bytes) {
            Ok(()) => Ok(Some(bytes)),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "stale cached copy ignored");
                Ok(None)
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(MetadataError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn write_file(path: &Path, content: &[u8]) -> Result<(), MetadataError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| MetadataError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })
}
