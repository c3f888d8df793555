//! # Credential Provider
//!
//! Turns an [`AuthMode`] into a [`Credential`] that hands out bearer tokens.
//!
//! ## Overview
//!
//! - **Service account**: the JSON key signs an assertion that is exchanged
//!   for a token. Expired tokens are replaced by signing a new assertion.
//! - **Installed app**: the token cache is read if present. A valid cached
//!   token is used as is, an expired one is refreshed and written back, and
//!   otherwise the user is sent through the browser consent flow with a
//!   loopback redirect.
//!
//! Consumers only see [`AccessTokenProvider`], so refresh is transparent to
//! every API call.
//!
//! ## Usage
//!
//! ```ignore
//! use core_auth::{AuthMode, Authenticator, CredentialProvider};
//!
//! let provider = CredentialProvider::new(http_client, file_system, token_cache_factory, consent);
//! let credential = provider
//!     .authenticate(&AuthMode::service_account("service-account-key.json"))
//!     .await?;
//! let token = credential.access_token().await?;
//! ```

use crate::client_secrets::ClientSecrets;
use crate::error::{AuthError, Result};
use crate::loopback::LoopbackReceiver;
use crate::oauth::{OAuthConfig, OAuthFlowManager};
use crate::service_account::{ServiceAccountFlow, ServiceAccountKey};
use crate::token_store::TokenStore;
use crate::types::{AuthMode, OAuthTokens, DRIVE_READONLY_SCOPE};
use async_trait::async_trait;
use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpClient;
use bridge_traits::storage::{FileSystemAccess, SecureStore};
use bridge_traits::time::{Clock, SystemClock};
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Default time allowed for the user to complete browser consent.
pub const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Redirect used for refresh-only flow managers, where it is never sent.
const UNUSED_REDIRECT_URI: &str = "http://127.0.0.1/";

/// Source of bearer tokens for API calls.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// A token valid for at least the expiry skew, refreshed if needed.
    async fn access_token(&self) -> Result<String>;
}

/// Obtains a credential for an authentication mode.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, mode: &AuthMode) -> Result<Arc<dyn AccessTokenProvider>>;
}

/// Shows the consent URL to the user.
///
/// Implementations typically print the URL and try to open a browser.
pub trait ConsentPrompt: Send + Sync {
    fn present(&self, authorization_url: &str) -> Result<()>;
}

/// Builds the secure store backing the token cache at a given path.
pub type TokenCacheFactory = Arc<dyn Fn(&Path) -> Arc<dyn SecureStore> + Send + Sync>;

enum TokenSource {
    ServiceAccount(ServiceAccountFlow),
    InstalledApp {
        flow: OAuthFlowManager,
        store: TokenStore,
    },
}

/// An authenticated token source, refreshed transparently when expired.
pub struct Credential {
    source: TokenSource,
    tokens: Mutex<OAuthTokens>,
    clock: Arc<dyn Clock>,
}

impl Credential {
    fn new(source: TokenSource, tokens: OAuthTokens, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            tokens: Mutex::new(tokens),
            clock,
        }
    }

    async fn renew(&self, current: &OAuthTokens) -> Result<OAuthTokens> {
        match &self.source {
            TokenSource::ServiceAccount(flow) => {
                debug!(account = %flow.client_email(), "Re-signing service account assertion");
                flow.fetch_token().await
            }
            TokenSource::InstalledApp { flow, store } => {
                let refresh_token = current
                    .refresh_token
                    .as_deref()
                    .filter(|token| !token.is_empty())
                    .ok_or_else(|| {
                        AuthError::TokenRefreshFailed("No refresh token available".to_string())
                    })?;

                let refreshed = flow.refresh_access_token(refresh_token).await?;
                store.store_tokens(&refreshed).await?;
                Ok(refreshed)
            }
        }
    }
}

#[async_trait]
impl AccessTokenProvider for Credential {
    async fn access_token(&self) -> Result<String> {
        // Held across the refresh so only one renewal runs at a time.
        let mut tokens = self.tokens.lock().await;

        if !tokens.is_expired_at(self.clock.now()) {
            return Ok(tokens.access_token.clone());
        }

        info!("Access token expired, renewing");
        let renewed = self.renew(&tokens).await?;
        *tokens = renewed;
        Ok(tokens.access_token.clone())
    }
}

/// A fixed token that never expires.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Builds credentials from files on disk.
pub struct CredentialProvider {
    http_client: Arc<dyn HttpClient>,
    file_system: Arc<dyn FileSystemAccess>,
    token_cache: TokenCacheFactory,
    consent: Arc<dyn ConsentPrompt>,
    clock: Arc<dyn Clock>,
    consent_timeout: Duration,
}

impl CredentialProvider {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        file_system: Arc<dyn FileSystemAccess>,
        token_cache: TokenCacheFactory,
        consent: Arc<dyn ConsentPrompt>,
    ) -> Self {
        Self {
            http_client,
            file_system,
            token_cache,
            consent,
            clock: Arc::new(SystemClock),
            consent_timeout: DEFAULT_CONSENT_TIMEOUT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = timeout;
        self
    }

    async fn read_credentials_file(&self, path: &Path) -> Result<Bytes> {
        match self.file_system.read_file(path).await {
            Ok(data) => Ok(data),
            Err(BridgeError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AuthError::CredentialsFileMissing {
                    path: path.display().to_string(),
                })
            }
            Err(BridgeError::NotFound(_)) => Err(AuthError::CredentialsFileMissing {
                path: path.display().to_string(),
            }),
            Err(e) => Err(AuthError::InvalidCredentials {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn service_account(&self, key_path: &Path) -> Result<Credential> {
        let data = self.read_credentials_file(key_path).await?;
        let key = ServiceAccountKey::from_json(&data, &key_path.display().to_string())?;

        let flow = ServiceAccountFlow::new(key, self.http_client.clone())?
            .with_clock(self.clock.clone());
        let tokens = flow.fetch_token().await?;

        info!(account = %flow.client_email(), "Authenticated with service account");
        Ok(Credential::new(
            TokenSource::ServiceAccount(flow),
            tokens,
            self.clock.clone(),
        ))
    }

    #[instrument(skip(self))]
    async fn installed_app(
        &self,
        client_secrets_path: &Path,
        token_cache_path: &Path,
    ) -> Result<Credential> {
        let data = self.read_credentials_file(client_secrets_path).await?;
        let secrets = ClientSecrets::from_json(&data, &client_secrets_path.display().to_string())?;
        let scopes = vec![DRIVE_READONLY_SCOPE.to_string()];

        let store = TokenStore::new((self.token_cache)(token_cache_path));
        let refresh_flow = OAuthFlowManager::new(
            OAuthConfig::from_client_secrets(&secrets, UNUSED_REDIRECT_URI, scopes.clone()),
            self.http_client.clone(),
        )
        .with_clock(self.clock.clone());

        let tokens = match store.retrieve_tokens().await? {
            Some(cached) if !cached.is_expired_at(self.clock.now()) => {
                info!("Using cached token");
                cached
            }
            Some(cached) if cached.can_refresh() => {
                let refresh_token = cached.refresh_token.clone().unwrap_or_default();
                match refresh_flow.refresh_access_token(&refresh_token).await {
                    Ok(refreshed) => {
                        store.store_tokens(&refreshed).await?;
                        info!("Refreshed cached token");
                        refreshed
                    }
                    Err(AuthError::TokenRefreshFailed(reason)) => {
                        warn!(reason = %reason, "Cached token could not be refreshed, asking for consent");
                        self.run_consent(&secrets, &scopes, &store).await?
                    }
                    Err(e) => return Err(e),
                }
            }
            _ => self.run_consent(&secrets, &scopes, &store).await?,
        };

        Ok(Credential::new(
            TokenSource::InstalledApp {
                flow: refresh_flow,
                store,
            },
            tokens,
            self.clock.clone(),
        ))
    }

    async fn run_consent(
        &self,
        secrets: &ClientSecrets,
        scopes: &[String],
        store: &TokenStore,
    ) -> Result<OAuthTokens> {
        let receiver = LoopbackReceiver::bind().await?;
        let flow = OAuthFlowManager::new(
            OAuthConfig::from_client_secrets(secrets, receiver.redirect_uri(), scopes.to_vec()),
            self.http_client.clone(),
        )
        .with_clock(self.clock.clone());

        let (authorization_url, verifier) = flow.build_auth_url()?;
        self.consent.present(&authorization_url)?;

        let response = receiver.wait_for_code(self.consent_timeout).await?;
        let tokens = flow
            .exchange_code(&response.code, &response.state, &verifier)
            .await?;

        store.store_tokens(&tokens).await?;
        info!("Authorized through browser consent");
        Ok(tokens)
    }
}

#[async_trait]
impl Authenticator for CredentialProvider {
    async fn authenticate(&self, mode: &AuthMode) -> Result<Arc<dyn AccessTokenProvider>> {
        let credential = match mode {
            AuthMode::ServiceAccount { key_path } => self.service_account(key_path).await?,
            AuthMode::InstalledApp {
                client_secrets_path,
                token_cache_path,
            } => {
                self.installed_app(client_secrets_path, token_cache_path)
                    .await?
            }
        };
        Ok(Arc::new(credential))
    }
}
