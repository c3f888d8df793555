//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//! - `SecureStore` backed by a single user-only JSON file (the token cache)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileSecureStore, ReqwestHttpClient, TokioFileSystem};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let fs = TokioFileSystem::new();
//!     let token_cache = FileSecureStore::new("token.json");
//! }
//! ```

mod filesystem;
mod http;
mod secure_store;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use secure_store::FileSecureStore;
