//! # Target Paths
//!
//! A `TargetPath` is a relative, `/`-separated name from the repository's
//! target index. It is validated once at construction so that joining it
//! onto a staging or install directory can never escape that directory.
//!
//! Rules:
//! - non-empty, not absolute
//! - no empty, `.` or `..` components
//! - no backslash or control characters

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TargetPathError;

/// A validated relative target name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetPath(String);

impl TargetPath {
    /// Validate and wrap a target name.
    pub fn new(raw: impl Into<String>) -> Result<Self, TargetPathError> {
        let raw = raw.into();
        validate(&raw)?;
        Ok(Self(raw))
    }

    /// Derive a target name from a local file path.
    ///
    /// `./` components are dropped; absolute paths and `..` are rejected.
    pub fn from_file_path(path: &Path) -> Result<Self, TargetPathError> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(TargetPathError::Traversal(path.display().to_string()))
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(TargetPathError::Absolute(path.display().to_string()))
                }
            }
        }
        Self::new(parts.join("/"))
    }

    /// Return the target name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final `/`-separated component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Whether the final component ends with `suffix` (e.g. `".pub"`).
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.file_name().ends_with(suffix)
    }

    /// Location of this target beneath `base`.
    pub fn to_local_path(&self, base: &Path) -> PathBuf {
        self.0.split('/').fold(base.to_path_buf(), |acc, part| acc.join(part))
    }
}

fn validate(raw: &str) -> Result<(), TargetPathError> {
    if raw.is_empty() {
        return Err(TargetPathError::Empty);
    }
    if let Some(character) = raw.chars().find(|c| *c == '\\' || c.is_control()) {
        return Err(TargetPathError::InvalidCharacter {
            path: raw.to_string(),
            character,
        });
    }
    if raw.starts_with('/') {
        return Err(TargetPathError::Absolute(raw.to_string()));
    }
    for part in raw.split('/') {
        match part {
            "" => return Err(TargetPathError::EmptyComponent(raw.to_string())),
            "." | ".." => return Err(TargetPathError::Traversal(raw.to_string())),
            _ => {}
        }
    }
    Ok(())
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TargetPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TargetPath {
    type Err = TargetPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TargetPath {
    type Error = TargetPathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetPath> for String {
    fn from(value: TargetPath) -> Self {
        value.0
    }
}

impl PartialEq<&str> for TargetPath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<str> for TargetPath {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
