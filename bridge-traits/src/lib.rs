//! # Host Bridge Traits
//!
//! Platform abstraction traits between the download pipeline and the outside
//! world.
//!
//! ## Overview
//!
//! Each trait represents a capability the core requires but that is supplied
//! by a concrete adapter (see `bridge-desktop`) or by a fake in tests.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry policies
//! - [`StorageProvider`](storage::StorageProvider) - Remote folder listing and content retrieval
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Local file I/O
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Credential persistence
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Report retryable failures as [`BridgeError::Transient`]
//! - Include error context (e.g., file paths, HTTP status)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so implementations can be
//! shared behind `Arc`.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{FileSystemAccess, RemoteFile, SecureStore, StorageProvider};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
