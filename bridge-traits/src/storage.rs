//! Storage and File System Abstractions
//!
//! Provides platform-agnostic traits for remote storage providers, local file
//! I/O and credential persistence.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWrite;

use crate::error::Result;

/// Metadata of one object stored with a remote provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Provider-assigned identifier
    pub id: String,
    /// Display name (not unique within a folder)
    pub name: String,
    /// Provider MIME type tag
    pub mime_type: String,
    /// Size in bytes; absent for folders and provider-native documents
    pub size: Option<u64>,
    /// Last modification as a Unix timestamp
    pub modified_at: Option<i64>,
    /// Whether this entry is a folder
    pub is_folder: bool,
    /// Parent folder identifiers
    pub parent_ids: Vec<String>,
    /// MD5 checksum of the content, when the provider has one
    pub md5_checksum: Option<String>,
}

/// Remote storage provider trait
///
/// The operations a folder download needs from a cloud storage API. Paging is
/// exposed through opaque cursors so callers can drive it lazily.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StorageProvider;
///
/// async fn first_page(provider: &dyn StorageProvider, folder: &str) -> Result<usize> {
///     let (files, _next) = provider.list_children(folder, 100, None).await?;
///     Ok(files.len())
/// }
/// ```
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Find every folder whose name equals `name`, in provider order.
    async fn find_folders(&self, name: &str) -> Result<Vec<RemoteFile>>;

    /// List one page of at most `page_size` direct children of `folder_id`.
    ///
    /// Returns the page and the cursor of the next page, if any.
    async fn list_children(
        &self,
        folder_id: &str,
        page_size: u32,
        cursor: Option<String>,
    ) -> Result<(Vec<RemoteFile>, Option<String>)>;

    /// Download the raw bytes of a binary object.
    async fn download(&self, file_id: &str) -> Result<Bytes>;

    /// Download a provider-native document converted to `mime_type`.
    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Bytes>;
}

/// File system access trait
///
/// Abstracts the local file operations of a download so they can be pointed at
/// temporary directories in tests.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn save(fs: &dyn FileSystemAccess, dir: &Path, data: &[u8]) -> Result<()> {
///     fs.create_dir_all(dir).await?;
///     fs.write_file(&dir.join("data.bin"), data.to_vec().into()).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Check whether `path` is an existing directory
    async fn is_directory(&self, path: &Path) -> Result<bool>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating or truncating it
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Open a file for streaming writes, creating or truncating it
    ///
    /// The file is closed when the returned writer is dropped.
    async fn open_write_stream(&self, path: &Path) -> Result<Box<dyn AsyncWrite + Send + Unpin>>;
}

/// Secure credential storage trait
///
/// Persists small secrets (OAuth token sets) between runs. Implementations
/// decide where the bytes live: an OS keychain, an encrypted store, or a
/// permission-restricted file.
///
/// # Security Requirements
///
/// Implementations MUST:
/// - Restrict access to the current user
/// - Never log or expose sensitive data
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn store_token(store: &dyn SecureStore, token: &str) -> Result<()> {
///     store.set_secret("oauth_token", token.as_bytes()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_file_roundtrips_through_json() {
        let file = RemoteFile {
            id: "abc".to_string(),
            name: "report.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size: Some(1024),
            modified_at: Some(1_700_000_000),
            is_folder: false,
            parent_ids: vec!["root".to_string()],
            md5_checksum: None,
        };

        let json = serde_json::to_string(&file).unwrap();
        let parsed: RemoteFile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, file);
    }
}
