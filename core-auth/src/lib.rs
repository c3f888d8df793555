//! # Authentication Module
//!
//! Credential provider for Google Drive.
//!
//! ## Overview
//!
//! This module turns credential files into bearer tokens for API calls. It
//! supports service accounts (signed JWT assertions) and installed
//! applications (browser consent with PKCE and a loopback redirect), caches
//! user tokens on disk and refreshes them transparently.
//!
//! ## Features
//!
//! - OAuth 2.0 authorization code flow with PKCE (S256)
//! - Service account JWT bearer grant
//! - Token cache through the `SecureStore` capability
//! - Automatic refresh 60 seconds before expiry

pub mod client_secrets;
pub mod error;
pub mod loopback;
pub mod manager;
pub mod oauth;
pub mod service_account;
pub mod token_store;
pub mod types;

pub use client_secrets::ClientSecrets;
pub use error::{AuthError, Result};
pub use manager::{
    AccessTokenProvider, Authenticator, ConsentPrompt, Credential, CredentialProvider,
    StaticToken, TokenCacheFactory,
};
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
pub use service_account::{ServiceAccountFlow, ServiceAccountKey};
pub use token_store::TokenStore;
pub use types::{AuthMode, OAuthTokens, DRIVE_READONLY_SCOPE};
