//! Lazy folder listing
//!
//! Pages through a folder's children on demand. A new page is requested only
//! once the previous one has been consumed, so pagination never leaks to the
//! caller.

use bridge_traits::error::BridgeError;
use bridge_traits::storage::{RemoteFile, StorageProvider};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, TransferError};
use crate::transfer::sanitize_file_name;

/// A listed entry and the directory it belongs in, relative to the
/// download destination. The directory is empty for the top-level folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub file: RemoteFile,
    pub relative_dir: PathBuf,
}

/// Options for a listing pass.
#[derive(Debug, Clone, Copy)]
pub struct ListingOptions {
    pub page_size: u32,
    /// Descend into sub-folders after the parent's own entries.
    pub recursive: bool,
}

struct ListingState {
    provider: Arc<dyn StorageProvider>,
    options: ListingOptions,
    /// Folder being paged and the cursor of its next page.
    current: Option<(String, PathBuf, Option<String>)>,
    /// Sub-folders waiting to be listed.
    pending: VecDeque<(String, PathBuf)>,
    visited: HashSet<String>,
    buffer: VecDeque<ListedEntry>,
}

impl ListingState {
    async fn next_entry(mut self) -> Result<Option<(ListedEntry, Self)>> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Ok(Some((entry, self)));
            }

            let (folder_id, dir, cursor) = match self.current.take() {
                Some(page) => page,
                None => match self.pending.pop_front() {
                    Some((folder_id, dir)) => (folder_id, dir, None),
                    None => return Ok(None),
                },
            };

            let (files, next_cursor) = self
                .provider
                .list_children(&folder_id, self.options.page_size, cursor)
                .await
                .map_err(|e| match e {
                    BridgeError::NotFound(_) => TransferError::FolderNotFound {
                        reference: folder_id.clone(),
                    },
                    other => other.into(),
                })?;
            debug!(folder_id = %folder_id, count = files.len(), "Listed page");

            for file in files {
                if self.options.recursive
                    && file.is_folder
                    && self.visited.insert(file.id.clone())
                {
                    self.pending
                        .push_back((file.id.clone(), dir.join(sanitize_file_name(&file.name))));
                }
                self.buffer.push_back(ListedEntry {
                    file,
                    relative_dir: dir.clone(),
                });
            }

            if let Some(token) = next_cursor {
                self.current = Some((folder_id, dir, Some(token)));
            }
        }
    }
}

/// Stream every entry under `folder_id` in provider order.
///
/// Sub-folders are always yielded (flagged `is_folder`); with
/// `options.recursive` their contents follow once the parent is exhausted.
/// Each call starts from scratch.
pub fn list_entries(
    provider: Arc<dyn StorageProvider>,
    folder_id: impl Into<String>,
    options: ListingOptions,
) -> BoxStream<'static, Result<ListedEntry>> {
    let folder_id = folder_id.into();
    let state = ListingState {
        provider,
        options,
        current: None,
        pending: VecDeque::from([(folder_id.clone(), PathBuf::new())]),
        visited: HashSet::from([folder_id]),
        buffer: VecDeque::new(),
    };

    stream::try_unfold(state, ListingState::next_entry).boxed()
}
