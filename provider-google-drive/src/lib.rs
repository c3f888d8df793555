//! # Google Drive Provider
//!
//! Implements `StorageProvider` trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Folder lookup by name and paginated child listing
//! - Binary downloads and Google Workspace exports
//! - Error classification that keeps rate limits and server errors retryable
//! - Exponential backoff for metadata requests

pub mod connector;
pub mod error;
pub mod export;
pub mod types;

pub use connector::GoogleDriveConnector;
pub use error::{GoogleDriveError, Result};
pub use export::{is_workspace_mime, WorkspaceKind, FOLDER_MIME_TYPE};
