//! Local download destination.

use bridge_traits::storage::FileSystemAccess;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, TransferError};

/// Directory entries are written into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTarget {
    root: PathBuf,
}

impl LocalTarget {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if needed and check that it is one.
    pub async fn prepare(&self, file_system: &dyn FileSystemAccess) -> Result<()> {
        file_system
            .create_dir_all(&self.root)
            .await
            .map_err(|e| TransferError::filesystem(&self.root, e))?;

        let is_directory = file_system
            .is_directory(&self.root)
            .await
            .map_err(|e| TransferError::filesystem(&self.root, e))?;
        if !is_directory {
            return Err(TransferError::filesystem(&self.root, "not a directory"));
        }

        debug!(path = %self.root.display(), "Destination ready");
        Ok(())
    }

    /// Directory for entries listed under `relative_dir`.
    pub fn dir_for(&self, relative_dir: &Path) -> PathBuf {
        self.root.join(relative_dir)
    }
}
