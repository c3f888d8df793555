//! Transfer executor
//!
//! Fetches the content of one listed entry, either as raw bytes or as a
//! Workspace export, and writes it under the destination directory.

use bridge_traits::http::RetryPolicy;
use bridge_traits::storage::{FileSystemAccess, RemoteFile, StorageProvider};
use bytes::Bytes;
use core_runtime::events::{EntryOutcome, EventBus, SessionEvent};
use core_runtime::logging::strip_path;
use provider_google_drive::{is_workspace_mime, WorkspaceKind};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, TransferError};
use crate::listing::ListedEntry;
use crate::target::LocalTarget;

/// How an entry's content is retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Stored bytes, downloaded verbatim.
    Binary,
    /// Workspace document, exported to an office format.
    Workspace(WorkspaceKind),
    Folder,
    /// Workspace type with no export format (forms, sites, shortcuts...).
    UnsupportedWorkspace(String),
}

impl EntryKind {
    pub fn classify(file: &RemoteFile) -> Self {
        if file.is_folder {
            return EntryKind::Folder;
        }
        if let Some(kind) = WorkspaceKind::from_mime(&file.mime_type) {
            return EntryKind::Workspace(kind);
        }
        if is_workspace_mime(&file.mime_type) {
            return EntryKind::UnsupportedWorkspace(file.mime_type.clone());
        }
        EntryKind::Binary
    }

    /// Local file name for `file`, including the export extension if any.
    pub fn local_name(&self, file: &RemoteFile) -> String {
        let name = sanitize_file_name(&file.name);
        match self {
            EntryKind::Workspace(kind) => kind.file_name(&name),
            _ => name,
        }
    }
}

/// Make a display name safe to use as a single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Downloads entries one at a time, retrying transient failures.
pub struct TransferExecutor {
    provider: Arc<dyn StorageProvider>,
    file_system: Arc<dyn FileSystemAccess>,
    retry_policy: RetryPolicy,
    events: Option<EventBus>,
}

impl TransferExecutor {
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        file_system: Arc<dyn FileSystemAccess>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            file_system,
            retry_policy,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Transfer one entry into `target`.
    ///
    /// Never fails: every error becomes a `Failed` outcome so the caller can
    /// move on to the next entry. `index` is 1-based.
    #[instrument(skip(self, entry, target), fields(file_id = %entry.file.id))]
    pub async fn transfer(
        &self,
        entry: &ListedEntry,
        target: &LocalTarget,
        index: usize,
        total: usize,
    ) -> EntryOutcome {
        let kind = EntryKind::classify(&entry.file);

        let outcome = match &kind {
            EntryKind::Folder => EntryOutcome::Skipped {
                reason: "folder".to_string(),
            },
            EntryKind::UnsupportedWorkspace(mime_type) => {
                let error = TransferError::UnsupportedType {
                    mime_type: mime_type.clone(),
                };
                warn!("Skipping {}: {}", entry.file.name, error);
                EntryOutcome::Failed {
                    reason: error.to_string(),
                }
            }
            EntryKind::Binary | EntryKind::Workspace(_) => {
                let dir = target.dir_for(&entry.relative_dir);
                let path = dir.join(kind.local_name(&entry.file));
                match self.fetch_and_write(entry, &kind, &dir, &path, index).await {
                    Ok(bytes) => EntryOutcome::Succeeded {
                        path: path.display().to_string(),
                        bytes,
                    },
                    Err(e) => {
                        warn!("Failed to download {}: {}", entry.file.name, e);
                        EntryOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            }
        };

        if outcome.is_success() {
            info!("Downloaded {}", entry.file.name);
        }
        outcome
    }

    async fn fetch_and_write(
        &self,
        entry: &ListedEntry,
        kind: &EntryKind,
        dir: &Path,
        path: &Path,
        index: usize,
    ) -> Result<u64> {
        let content = self.fetch_with_retry(&entry.file, kind, index).await?;

        if !entry.relative_dir.as_os_str().is_empty() {
            self.file_system
                .create_dir_all(dir)
                .await
                .map_err(|e| TransferError::filesystem(dir, e))?;
        }

        self.write(path, &content).await?;
        Ok(content.len() as u64)
    }

    /// Fetch content, retrying transient errors per the retry policy.
    async fn fetch_with_retry(
        &self,
        file: &RemoteFile,
        kind: &EntryKind,
        index: usize,
    ) -> Result<Bytes> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.fetch(file, kind).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        "Download of {} failed (attempt {}/{}): {}",
                        file.name, attempt, max_attempts, e
                    );
                    if let Some(events) = &self.events {
                        let _ = events.emit(SessionEvent::EntryRetrying {
                            index,
                            name: file.name.clone(),
                            attempt,
                            reason: e.to_string(),
                        });
                    }
                    tokio::time::sleep(self.retry_policy.delay_after(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch(&self, file: &RemoteFile, kind: &EntryKind) -> Result<Bytes> {
        let content = match kind {
            EntryKind::Workspace(workspace) => {
                debug!("Exporting {} as {}", file.id, workspace.export_mime());
                self.provider
                    .export(&file.id, workspace.export_mime())
                    .await?
            }
            _ => self.provider.download(&file.id).await?,
        };
        Ok(content)
    }

    async fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        let mut stream = self
            .file_system
            .open_write_stream(path)
            .await
            .map_err(|e| TransferError::filesystem(path, e))?;

        stream
            .write_all(content)
            .await
            .map_err(|e| TransferError::filesystem(path, e))?;
        stream
            .flush()
            .await
            .map_err(|e| TransferError::filesystem(path, e))?;
        stream
            .shutdown()
            .await
            .map_err(|e| TransferError::filesystem(path, e))?;

        debug!(
            "Wrote {} bytes to {}",
            content.len(),
            strip_path(&path.to_string_lossy())
        );
        Ok(())
    }
}
