use crate::resolver::FolderCandidate;
use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Folder not found: {reference}")]
    FolderNotFound { reference: String },

    #[error("Folder name {name:?} matches {} folders", .candidates.len())]
    AmbiguousFolder {
        name: String,
        candidates: Vec<FolderCandidate>,
    },

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Filesystem error at {path}: {message}")]
    Filesystem { path: String, message: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("No export format for {mime_type}")]
    UnsupportedType { mime_type: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl TransferError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransferError::Transient(_))
    }

    pub(crate) fn filesystem(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        TransferError::Filesystem {
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<BridgeError> for TransferError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Transient(msg) => TransferError::Transient(msg),
            other => TransferError::Provider(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
