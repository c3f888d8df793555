//! Credential Storage backed by a local JSON file
//!
//! The file holds a JSON object mapping each key to its base64-encoded value.
//! It is created on the first write and, on Unix, restricted to the owner.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error};

/// File-based secure storage implementation
///
/// Reads are "if present": a missing file behaves like an empty store.
/// Writes replace the whole file through a temporary sibling and a rename.
pub struct FileSecureStore {
    path: PathBuf,
}

impl FileSecureStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(BridgeError::Io(e)),
        };

        serde_json::from_slice(&raw).map_err(|e| {
            error!(path = ?self.path, error = %e, "Credential file is corrupted");
            BridgeError::OperationFailed(format!(
                "Credential file {} is not valid: {}",
                self.path.display(),
                e
            ))
        })
    }

    async fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to encode: {}", e)))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, &json).await?;
        restrict_permissions(&tmp).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[async_trait]
impl SecureStore for FileSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), STANDARD.encode(value));
        self.save(&entries).await?;

        debug!(key = key, "Stored secret in credential file");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.load().await?;

        match entries.get(key) {
            Some(encoded) => {
                let decoded = STANDARD.decode(encoded).map_err(|e| {
                    error!(key = key, error = %e, "Failed to decode secret");
                    BridgeError::OperationFailed(format!("Failed to decode secret: {}", e))
                })?;
                debug!(key = key, "Retrieved secret from credential file");
                Ok(Some(decoded))
            }
            None => {
                debug!(key = key, "Secret not found in credential file");
                Ok(None)
            }
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.save(&entries).await?;
            debug!(key = key, "Deleted secret from credential file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecureStore::new(dir.path().join("token.json"));

        assert_eq!(store.get_secret("oauth").await.unwrap(), None);
        assert!(!store.has_secret("oauth").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecureStore::new(dir.path().join("cache").join("token.json"));

        store.set_secret("oauth", b"{\"a\":1}").await.unwrap();
        store.set_secret("other", &[0, 159, 146, 150]).await.unwrap();

        assert_eq!(
            store.get_secret("oauth").await.unwrap(),
            Some(b"{\"a\":1}".to_vec())
        );
        assert_eq!(
            store.get_secret("other").await.unwrap(),
            Some(vec![0, 159, 146, 150])
        );

        store.delete_secret("oauth").await.unwrap();
        assert_eq!(store.get_secret("oauth").await.unwrap(), None);
        assert!(store.has_secret("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_values_survive_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");

        FileSecureStore::new(&path)
            .set_secret("oauth", b"persisted")
            .await
            .unwrap();

        let reopened = FileSecureStore::new(&path);
        assert_eq!(
            reopened.get_secret("oauth").await.unwrap(),
            Some(b"persisted".to_vec())
        );
    }

    #[tokio::test]
    async fn test_corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let store = FileSecureStore::new(&path);
        assert!(store.get_secret("oauth").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let store = FileSecureStore::new(&path);
        store.set_secret("oauth", b"x").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
