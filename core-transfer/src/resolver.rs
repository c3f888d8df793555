//! Folder resolution
//!
//! Maps the text a user typed to a single Drive folder identifier.

use bridge_traits::storage::StorageProvider;
use core_runtime::config::AmbiguityPolicy;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, TransferError};

/// Shortest string treated as a Drive identifier.
const MIN_ID_LENGTH: usize = 25;

/// A folder as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderReference {
    /// Identifier-shaped; used as is.
    Id(String),
    /// Display name; looked up.
    Name(String),
}

impl FolderReference {
    /// Classify user input. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if Self::is_id_shaped(input) {
            FolderReference::Id(input.to_string())
        } else {
            FolderReference::Name(input.to_string())
        }
    }

    /// Drive identifiers are long runs of `[A-Za-z0-9_-]`.
    pub fn is_id_shaped(input: &str) -> bool {
        input.len() >= MIN_ID_LENGTH
            && input
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }

    pub fn as_str(&self) -> &str {
        match self {
            FolderReference::Id(s) | FolderReference::Name(s) => s,
        }
    }
}

impl fmt::Display for FolderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of several folders sharing a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderCandidate {
    pub id: String,
    pub name: String,
}

pub struct FolderResolver {
    provider: Arc<dyn StorageProvider>,
    policy: AmbiguityPolicy,
}

impl FolderResolver {
    pub fn new(provider: Arc<dyn StorageProvider>, policy: AmbiguityPolicy) -> Self {
        Self { provider, policy }
    }

    /// Resolve `reference` to exactly one folder id.
    ///
    /// Identifiers are returned without contacting the provider, so a
    /// wrong id only surfaces when its children are listed.
    pub async fn resolve(&self, reference: &FolderReference) -> Result<String> {
        let name = match reference {
            FolderReference::Id(id) => {
                debug!(folder_id = %id, "Folder reference is an identifier");
                return Ok(id.clone());
            }
            FolderReference::Name(name) => name,
        };

        let matches = self.provider.find_folders(name).await?;

        match matches.len() {
            0 => Err(TransferError::FolderNotFound {
                reference: name.clone(),
            }),
            1 => {
                info!(folder_id = %matches[0].id, "Resolved folder {:?}", name);
                Ok(matches[0].id.clone())
            }
            n => match self.policy {
                AmbiguityPolicy::FirstMatch => {
                    warn!(
                        "{} folders are named {:?}; using the first one ({})",
                        n, name, matches[0].id
                    );
                    Ok(matches[0].id.clone())
                }
                AmbiguityPolicy::Reject => Err(TransferError::AmbiguousFolder {
                    name: name.clone(),
                    candidates: matches
                        .into_iter()
                        .map(|f| FolderCandidate {
                            id: f.id,
                            name: f.name,
                        })
                        .collect(),
                }),
            },
        }
    }
}
