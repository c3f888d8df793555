//! In-memory Drive used by the transfer tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::storage::{RemoteFile, StorageProvider};
use bytes::Bytes;
use core_auth::{AccessTokenProvider, AuthError, AuthMode, Authenticator, StaticToken};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub fn binary(id: &str, name: &str) -> RemoteFile {
    entry(id, name, "application/octet-stream")
}

pub fn document(id: &str, name: &str) -> RemoteFile {
    entry(id, name, "application/vnd.google-apps.document")
}

pub fn folder(id: &str, name: &str) -> RemoteFile {
    entry(id, name, FOLDER_MIME)
}

pub fn entry(id: &str, name: &str, mime_type: &str) -> RemoteFile {
    RemoteFile {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        size: None,
        modified_at: None,
        is_folder: mime_type == FOLDER_MIME,
        parent_ids: vec![],
        md5_checksum: None,
    }
}

#[derive(Default)]
pub struct FakeDrive {
    named_folders: HashMap<String, Vec<RemoteFile>>,
    children: HashMap<String, Vec<RemoteFile>>,
    content: HashMap<String, Bytes>,
    /// Remaining transient failures per file id.
    transient_failures: Mutex<HashMap<String, u32>>,
    permanent_failures: HashMap<String, BridgeError>,
    pub find_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub fetch_calls: Mutex<HashMap<String, u32>>,
    pub exports: Mutex<Vec<(String, String)>>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a folder findable by name.
    pub fn with_named_folder(mut self, id: &str, name: &str) -> Self {
        self.named_folders
            .entry(name.to_string())
            .or_default()
            .push(folder(id, name));
        self.children.entry(id.to_string()).or_default();
        self
    }

    pub fn with_empty_folder(mut self, id: &str) -> Self {
        self.children.entry(id.to_string()).or_default();
        self
    }

    pub fn with_child(mut self, parent: &str, file: RemoteFile, content: &[u8]) -> Self {
        if file.is_folder {
            self.children.entry(file.id.clone()).or_default();
        } else {
            self.content
                .insert(file.id.clone(), Bytes::copy_from_slice(content));
        }
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(file);
        self
    }

    /// Fail the next `count` fetches of `id` with a transient error.
    pub fn with_transient_failures(self, id: &str, count: u32) -> Self {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(id.to_string(), count);
        self
    }

    pub fn with_permanent_failure(mut self, id: &str, error: BridgeError) -> Self {
        self.permanent_failures.insert(id.to_string(), error);
        self
    }

    pub fn fetches_of(&self, id: &str) -> u32 {
        self.fetch_calls
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    fn fetch(&self, file_id: &str) -> BridgeResult<Bytes> {
        *self
            .fetch_calls
            .lock()
            .unwrap()
            .entry(file_id.to_string())
            .or_default() += 1;

        if let Some(error) = self.permanent_failures.get(file_id) {
            return Err(match error {
                BridgeError::NotFound(id) => BridgeError::NotFound(id.clone()),
                other => BridgeError::OperationFailed(other.to_string()),
            });
        }

        let mut failures = self.transient_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(file_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BridgeError::Transient("rate limit exceeded".to_string()));
            }
        }

        self.content
            .get(file_id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(file_id.to_string()))
    }
}

#[async_trait]
impl StorageProvider for FakeDrive {
    async fn find_folders(&self, name: &str) -> BridgeResult<Vec<RemoteFile>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.named_folders.get(name).cloned().unwrap_or_default())
    }

    async fn list_children(
        &self,
        folder_id: &str,
        page_size: u32,
        cursor: Option<String>,
    ) -> BridgeResult<(Vec<RemoteFile>, Option<String>)> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let children = self
            .children
            .get(folder_id)
            .ok_or_else(|| BridgeError::NotFound(folder_id.to_string()))?;

        let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (start + page_size as usize).min(children.len());
        let next = (end < children.len()).then(|| end.to_string());

        Ok((children[start..end].to_vec(), next))
    }

    async fn download(&self, file_id: &str) -> BridgeResult<Bytes> {
        self.fetch(file_id)
    }

    async fn export(&self, file_id: &str, mime_type: &str) -> BridgeResult<Bytes> {
        self.exports
            .lock()
            .unwrap()
            .push((file_id.to_string(), mime_type.to_string()));
        self.fetch(file_id)
    }
}

/// Hands out a fixed token, or fails as if the credential file were missing.
pub struct FakeAuthenticator {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeAuthenticator {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Authenticator for FakeAuthenticator {
    async fn authenticate(
        &self,
        _mode: &AuthMode,
    ) -> core_auth::Result<Arc<dyn AccessTokenProvider>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuthError::CredentialsFileMissing {
                path: "credentials.json".to_string(),
            });
        }
        Ok(Arc::new(StaticToken::new("token")))
    }
}
