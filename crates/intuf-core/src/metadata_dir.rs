//! # Trusted-Metadata Directory
//!
//! Each repository gets its own local metadata store, named by the first
//! eight hex characters of the SHA-256 of its metadata base URL and placed
//! under the per-user data directory (`~/.local/share/intuf/<name>` on
//! Linux). The same URL always maps to the same directory.
//!
//! Resolution is pure. Whether a trust root has been bootstrapped is a
//! separate check ([`MetadataDirectory::require_trust_root`]); its absence
//! is a hard failure, never a cue to fetch an unauthenticated root.

use std::path::{Path, PathBuf};

use crate::digest::bytes_digest;
use crate::error::TrustRootError;

/// Application directory under the user data directory.
pub const APP_DIR: &str = "intuf";

/// File name of the bootstrapped root metadata.
pub const TRUST_ROOT_FILE: &str = "root.json";

/// Hex characters of the URL digest used for the directory name.
pub const DIR_NAME_HEX_LEN: usize = 8;

/// Directory name for a repository's metadata store.
pub fn metadata_dir_name(base_url: &str) -> String {
    let mut name = bytes_digest(base_url.as_bytes());
    name.truncate(DIR_NAME_HEX_LEN);
    name
}

/// The per-user data root, `<data dir>/intuf`.
pub fn default_data_root() -> Result<PathBuf, TrustRootError> {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .map(|dir| dir.join(APP_DIR))
        .ok_or(TrustRootError::NoDataDirectory)
}

/// Local trusted-metadata store of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDirectory {
    path: PathBuf,
}

impl MetadataDirectory {
    /// Resolve the store for `base_url` under the per-user data root.
    pub fn resolve(base_url: &str) -> Result<Self, TrustRootError> {
        Ok(Self::with_root(default_data_root()?, base_url))
    }

    /// Resolve the store for `base_url` under an explicit data root.
    pub fn with_root(data_root: impl AsRef<Path>, base_url: &str) -> Self {
        Self {
            path: data_root.as_ref().join(metadata_dir_name(base_url)),
        }
    }

    /// Use `path` as the store directly.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the bootstrapped root metadata lives.
    pub fn trust_root(&self) -> PathBuf {
        self.path.join(TRUST_ROOT_FILE)
    }

    /// Fail closed unless root metadata has been bootstrapped.
    pub fn require_trust_root(&self) -> Result<PathBuf, TrustRootError> {
        let root = self.trust_root();
        if root.is_file() {
            Ok(root)
        } else {
            Err(TrustRootError::MissingTrustRoot { path: root })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn name_is_eight_hex_chars() {
        let name = metadata_dir_name("http://127.0.0.1:8080/");
        assert_eq!(name.len(), DIR_NAME_HEX_LEN);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn name_is_sha256_prefix() {
        // sha256("") = e3b0c442...
        assert_eq!(metadata_dir_name(""), "e3b0c442");
    }

    #[test]
    fn distinct_urls_get_distinct_directories() {
        let root = Path::new("/data");
        let a = MetadataDirectory::with_root(root, "https://repo-a.example/");
        let b = MetadataDirectory::with_root(root, "https://repo-b.example/");
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(root));
    }

    #[test]
    fn missing_root_fails_closed_with_remediation() {
        let dir = tempfile::tempdir().unwrap();
        let md = MetadataDirectory::with_root(dir.path(), "http://127.0.0.1:8080/");
        let err = md.require_trust_root().unwrap_err();
        assert_eq!(
            err,
            TrustRootError::MissingTrustRoot {
                path: md.trust_root()
            }
        );
        assert!(err.to_string().contains("download root metadata"));
    }

    #[test]
    fn present_root_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let md = MetadataDirectory::with_root(dir.path(), "http://127.0.0.1:8080/");
        std::fs::create_dir_all(md.path()).unwrap();
        std::fs::write(md.trust_root(), b"{}").unwrap();
        assert_eq!(md.require_trust_root().unwrap(), md.trust_root());
    }

    proptest! {
        #[test]
        fn resolution_is_deterministic(url in "[a-z]{1,12}://[a-z0-9.:/]{1,40}") {
            let a = MetadataDirectory::with_root("/data", &url);
            let b = MetadataDirectory::with_root("/data", &url);
            prop_assert_eq!(a, b);
        }
    }
}
