//! Scoped staging directory for one download.
//!
//! Holds the requested target and its attachments until the verification
//! gate has decided. The directory and everything left in it is removed when
//! the value is dropped, on success and on every failure path alike.

use std::path::Path;

use tempfile::TempDir;

use crate::error::FetchError;

/// Ephemeral directory holding one resolution's content.
#[derive(Debug)]
pub struct WorkingDirectory {
    dir: TempDir,
}

impl WorkingDirectory {
    /// Create a staging directory under the system temp directory.
    pub fn new() -> Result<Self, FetchError> {
        let dir = tempfile::Builder::new()
            .prefix("intuf-")
            .suffix("-in-toto")
            .tempdir()
            .map_err(FetchError::WorkingDirectory)?;
        Ok(Self { dir })
    }

    /// Create a staging directory under `parent`.
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self, FetchError> {
        let dir = tempfile::Builder::new()
            .prefix("intuf-")
            .suffix("-in-toto")
            .tempdir_in(parent)
            .map_err(FetchError::WorkingDirectory)?;
        Ok(Self { dir })
    }

    /// The staging directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, reporting any error.
    pub fn close(self) -> Result<(), FetchError> {
        self.dir.close().map_err(FetchError::WorkingDirectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_directory_is_removed_with_contents() {
        let wd = WorkingDirectory::new().unwrap();
        let path = wd.path().to_path_buf();
        std::fs::write(path.join("unverified.whl"), b"x").unwrap();
        drop(wd);
        assert!(!path.exists());
    }

    #[test]
    fn close_removes_directory() {
        let parent = tempfile::tempdir().unwrap();
        let wd = WorkingDirectory::new_in(parent.path()).unwrap();
        let path = wd.path().to_path_buf();
        assert!(path.starts_with(parent.path()));
        wd.close().unwrap();
        assert!(!path.exists());
    }
}
