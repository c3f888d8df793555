//! # Download Configuration
//!
//! Provides the explicit configuration handed to the session driver.
//!
//! ## Overview
//!
//! Every answer collected from the user becomes a field of [`DownloadConfig`].
//! The configuration is built with [`DownloadConfigBuilder`], which validates
//! eagerly so the session never starts with settings it cannot honor.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{AuthMode, DownloadConfig};
//!
//! let config = DownloadConfig::builder()
//!     .auth_mode(AuthMode::ServiceAccount {
//!         key_path: "service-account-key.json".into(),
//!     })
//!     .folder("Reports")
//!     .destination("./downloads")
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.page_size, 1000);
//! ```

use crate::error::{Error, Result};
use bridge_traits::http::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Largest page size Drive accepts for `files.list`.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Upper bound on attempts per file.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Default destination directory.
pub const DEFAULT_DESTINATION: &str = "./downloads";

/// Default OAuth token cache file.
pub const DEFAULT_TOKEN_CACHE: &str = "token.json";

/// Default OAuth client secrets file.
pub const DEFAULT_CLIENT_SECRETS: &str = "credentials.json";

/// Default service account key file.
pub const DEFAULT_SERVICE_ACCOUNT_KEY: &str = "service-account-key.json";

/// How the session obtains its credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Non-interactive credential from a service account JSON key.
    ServiceAccount { key_path: PathBuf },
    /// Delegated user consent through the browser, cached on disk.
    InstalledApp {
        client_secrets_path: PathBuf,
        token_cache_path: PathBuf,
    },
}

impl AuthMode {
    /// Installed-app mode with the default token cache location.
    pub fn installed_app(client_secrets_path: impl Into<PathBuf>) -> Self {
        Self::InstalledApp {
            client_secrets_path: client_secrets_path.into(),
            token_cache_path: PathBuf::from(DEFAULT_TOKEN_CACHE),
        }
    }

    pub fn service_account(key_path: impl Into<PathBuf>) -> Self {
        Self::ServiceAccount {
            key_path: key_path.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ServiceAccount { .. } => "service_account",
            Self::InstalledApp { .. } => "installed_app",
        }
    }
}

/// What to do when a folder name matches more than one folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Take the first match in provider order.
    FirstMatch,
    /// Fail and report every candidate.
    #[default]
    Reject,
}

/// HTTP timeouts applied by the desktop client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Per-request timeout for metadata and listing calls.
    pub request: Duration,
    /// Per-request timeout for content downloads and exports.
    pub transfer: Duration,
    /// How long to wait for the browser consent redirect.
    pub consent: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(60),
            transfer: Duration::from_secs(600),
            consent: Duration::from_secs(300),
        }
    }
}

/// Complete settings for one download session.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub auth_mode: AuthMode,
    /// Folder name or identifier exactly as entered.
    pub folder: String,
    pub destination: PathBuf,
    /// Descend into sub-folders.
    pub recursive: bool,
    pub ambiguity_policy: AmbiguityPolicy,
    /// Entries requested per listing page.
    pub page_size: u32,
    /// Retry policy for per-file transfers.
    pub retry_policy: RetryPolicy,
    pub timeouts: TimeoutConfig,
}

impl DownloadConfig {
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The folder reference and destination are not empty
    /// - Page size is within 1..=1000
    /// - Retry attempts are within 1..=10
    pub fn validate(&self) -> Result<()> {
        if self.folder.trim().is_empty() {
            return Err(Error::Config("Folder cannot be empty".to_string()));
        }

        if self.destination.as_os_str().is_empty() {
            return Err(Error::Config("Destination cannot be empty".to_string()));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size must be between 1 and {} (got {})",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.retry_policy.max_attempts == 0 || self.retry_policy.max_attempts > MAX_RETRY_ATTEMPTS
        {
            return Err(Error::Config(format!(
                "Retry attempts must be between 1 and {} (got {})",
                MAX_RETRY_ATTEMPTS, self.retry_policy.max_attempts
            )));
        }

        match &self.auth_mode {
            AuthMode::ServiceAccount { key_path } if key_path.as_os_str().is_empty() => {
                return Err(Error::Config(
                    "Service account key path cannot be empty".to_string(),
                ));
            }
            AuthMode::InstalledApp {
                client_secrets_path,
                token_cache_path,
            } => {
                if client_secrets_path.as_os_str().is_empty() {
                    return Err(Error::Config(
                        "Client secrets path cannot be empty".to_string(),
                    ));
                }
                if token_cache_path.as_os_str().is_empty() {
                    return Err(Error::Config(
                        "Token cache path cannot be empty".to_string(),
                    ));
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// Builder for [`DownloadConfig`].
#[derive(Debug, Default)]
pub struct DownloadConfigBuilder {
    auth_mode: Option<AuthMode>,
    folder: Option<String>,
    destination: Option<PathBuf>,
    recursive: bool,
    ambiguity_policy: AmbiguityPolicy,
    page_size: Option<u32>,
    retry_policy: Option<RetryPolicy>,
    timeouts: Option<TimeoutConfig>,
}

impl DownloadConfigBuilder {
    pub fn auth_mode(mut self, mode: AuthMode) -> Self {
        self.auth_mode = Some(mode);
        self
    }

    /// Folder name or identifier; surrounding whitespace is trimmed.
    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into().trim().to_string());
        self
    }

    pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn ambiguity_policy(mut self, policy: AmbiguityPolicy) -> Self {
        self.ambiguity_policy = policy;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Fixed-delay retry with the given bound.
    pub fn retry(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.retry_policy = Some(RetryPolicy::fixed(max_attempts, delay));
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<DownloadConfig> {
        let auth_mode = self.auth_mode.ok_or_else(|| {
            Error::Config("Auth mode is required. Use .auth_mode() to set it.".to_string())
        })?;

        let folder = self.folder.ok_or_else(|| {
            Error::Config("Folder is required. Use .folder() to set it.".to_string())
        })?;

        let config = DownloadConfig {
            auth_mode,
            folder,
            destination: self
                .destination
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DESTINATION)),
            recursive: self.recursive,
            ambiguity_policy: self.ambiguity_policy,
            page_size: self.page_size.unwrap_or(MAX_PAGE_SIZE),
            retry_policy: self
                .retry_policy
                .unwrap_or_else(|| RetryPolicy::fixed(3, Duration::from_secs(1))),
            timeouts: self.timeouts.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DownloadConfigBuilder {
        DownloadConfig::builder()
            .auth_mode(AuthMode::service_account("key.json"))
            .folder("Reports")
    }

    #[test]
    fn test_defaults() {
        let config = base().build().unwrap();

        assert_eq!(config.destination, PathBuf::from("./downloads"));
        assert_eq!(config.page_size, 1000);
        assert!(!config.recursive);
        assert_eq!(config.ambiguity_policy, AmbiguityPolicy::Reject);
        assert_eq!(config.retry_policy.max_attempts, 3);
        assert_eq!(config.retry_policy.base_delay, Duration::from_secs(1));
        assert!(!config.retry_policy.use_exponential_backoff);
    }

    #[test]
    fn test_folder_is_trimmed() {
        let config = base().folder("  Quarterly  ").build().unwrap();
        assert_eq!(config.folder, "Quarterly");
    }

    #[test]
    fn test_missing_auth_mode() {
        let result = DownloadConfig::builder().folder("x").build();
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("Auth mode")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_folder_rejected() {
        assert!(base().folder("   ").build().is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(base().page_size(0).build().is_err());
        assert!(base().page_size(1001).build().is_err());
        assert_eq!(base().page_size(1).build().unwrap().page_size, 1);
    }

    #[test]
    fn test_retry_bounds() {
        assert!(base().retry(0, Duration::from_millis(1)).build().is_err());
        assert!(base().retry(11, Duration::from_millis(1)).build().is_err());
        let config = base().retry(5, Duration::ZERO).build().unwrap();
        assert_eq!(config.retry_policy.max_attempts, 5);
    }

    #[test]
    fn test_installed_app_default_cache() {
        match AuthMode::installed_app("credentials.json") {
            AuthMode::InstalledApp {
                token_cache_path, ..
            } => assert_eq!(token_cache_path, PathBuf::from("token.json")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_credential_path_rejected() {
        let result = DownloadConfig::builder()
            .auth_mode(AuthMode::service_account(""))
            .folder("x")
            .build();
        assert!(result.is_err());
    }
}
