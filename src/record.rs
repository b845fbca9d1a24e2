//! Migration file records
//!
//! A record is built once per discovered file and never changes afterwards.
//! File names follow `<order>_<rest>`; the order key is everything before the
//! first underscore and is compared as a string, so `10_x` sorts before `2_y`.

use crate::error::{Result, SlyError};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata for one discovered migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub file_path: PathBuf,
    pub directory_path: PathBuf,
    pub base_name: String,
    pub order_key: String,
    pub content_digest: String,
}

impl MigrationRecord {
    /// Read `path` and build its record
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read(path).map_err(|source| SlyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_content(path, &content)
    }

    /// Build a record from already-loaded file content
    pub fn from_content(path: impl AsRef<Path>, content: &[u8]) -> Result<Self> {
        let path = path.as_ref();
        let invalid = || SlyError::InvalidFileName {
            file: path.to_path_buf(),
        };

        let base_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(invalid)?
            .to_string();
        let order_key = order_key(&base_name).ok_or_else(invalid)?.to_string();

        Ok(Self {
            file_path: path.to_path_buf(),
            directory_path: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            base_name,
            order_key,
            content_digest: content_digest(content),
        })
    }

    /// Extension used to pick the handler, without the leading dot
    pub fn extension(&self) -> Option<&str> {
        self.file_path.extension().and_then(|ext| ext.to_str())
    }
}

/// The text before the first underscore, if it is non-empty
pub fn order_key(base_name: &str) -> Option<&str> {
    match base_name.split_once('_') {
        Some((key, _)) if !key.is_empty() => Some(key),
        _ => None,
    }
}

/// Stable lowercase hex digest of a file's bytes
///
/// Used to identify a migration in hooks and reports, not for change detection.
pub fn content_digest(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
