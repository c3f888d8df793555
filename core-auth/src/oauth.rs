//! OAuth 2.0 Authorization Flow Manager with PKCE Support
//!
//! This module implements RFC 6749 (OAuth 2.0) and RFC 7636 (PKCE) for the
//! installed-application flow against Google's authorization server.
//!
//! # Overview
//!
//! The OAuth flow manager handles:
//! - Building authorization URLs with PKCE challenge
//! - Exchanging authorization codes for tokens
//! - Refreshing access tokens
//! - State verification for CSRF protection
//!
//! # Security
//!
//! - Generates cryptographically secure random state and code verifier
//! - Validates the state parameter to prevent CSRF attacks
//! - Never logs sensitive values (tokens, codes, verifiers)

use crate::client_secrets::ClientSecrets;
use crate::error::{AuthError, Result};
use crate::types::{OAuthTokens, DEFAULT_TOKEN_LIFETIME_SECS};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::time::{Clock, SystemClock};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Attempts made for a refresh grant when the endpoint fails transiently.
const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// OAuth 2.0 client configuration for one authorization server.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret (installed apps receive one, it is not confidential)
    pub client_secret: Option<String>,
    /// Redirect URI for the OAuth callback
    pub redirect_uri: String,
    /// List of OAuth scopes to request
    pub scopes: Vec<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
}

impl OAuthConfig {
    pub fn from_client_secrets(
        secrets: &ClientSecrets,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            redirect_uri: redirect_uri.into(),
            scopes,
            auth_url: secrets.auth_uri.clone(),
            token_url: secrets.token_uri.clone(),
        }
    }
}

/// PKCE (Proof Key for Code Exchange) verifier.
///
/// The verifier stays local; only the derived challenge is sent with the
/// authorization request.
#[derive(Debug, Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Create a new PKCE verifier with cryptographically secure random values.
    ///
    /// Generates a 32-byte code verifier and a 16-byte state, both encoded as
    /// URL-safe base64 without padding.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Compute the code challenge from the verifier.
    ///
    /// Uses S256 method: BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// OAuth 2.0 flow manager.
///
/// Handles the authorization code flow with PKCE and the refresh grant.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL with PKCE challenge.
    ///
    /// Returns the URL the user must visit and the verifier needed to
    /// exchange the resulting code.
    #[instrument(skip(self))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let verifier = PkceVerifier::new();
        let challenge = verifier.challenge();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Other(format!("Invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &self.config.scopes.join(" "));
            query.append_pair("state", verifier.state());
            query.append_pair("code_challenge", &challenge);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("access_type", "offline"); // Request refresh token
        }

        debug!("Built authorization URL");

        Ok((url.to_string(), verifier))
    }

    /// Exchange an authorization code for OAuth tokens.
    ///
    /// `state` is the value echoed on the redirect; it must match the
    /// verifier's state.
    #[instrument(skip(self, code, state, verifier))]
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        verifier: &PkceVerifier,
    ) -> Result<OAuthTokens> {
        if state != verifier.state() {
            warn!("OAuth state mismatch on redirect");
            return Err(AuthError::StateMismatch {
                expected: verifier.state().to_string(),
                actual: state.to_string(),
            });
        }

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", verifier.verifier()),
        ];
        if let Some(ref client_secret) = self.config.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }

        debug!("Exchanging authorization code for tokens");

        let request = form_request(&self.config.token_url, &params)?;
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            let status = response.status;
            let error_body = error_text(&response);

            warn!(
                status = status,
                error = %error_body,
                "Token endpoint rejected the authorization code"
            );

            return Err(AuthError::InvalidAuthCode(format!(
                "Token endpoint returned {}: {}",
                status, error_body
            )));
        }

        let token_response = TokenResponse::parse(&response)?;

        info!(
            expires_in = token_response.expires_in,
            has_refresh_token = token_response.refresh_token.is_some(),
            "Exchanged authorization code for tokens"
        );

        Ok(token_response.into_tokens(None, self.clock.now()))
    }

    /// Refresh an access token using a refresh token.
    ///
    /// Server errors and transient transport failures are retried up to
    /// three times with exponential backoff. A 4xx response means the grant
    /// is revoked or invalid and fails immediately.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(ref client_secret) = self.config.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }

        debug!("Refreshing access token");

        let request = form_request(&self.config.token_url, &params)?;
        let mut attempts = 0;

        loop {
            attempts += 1;

            let last_error = match self.http_client.execute(request.clone()).await {
                Ok(response) if response.is_success() => {
                    let token_response = TokenResponse::parse(&response)?;

                    info!(
                        expires_in = token_response.expires_in,
                        "Refreshed access token"
                    );

                    return Ok(token_response.into_tokens(Some(refresh_token), self.clock.now()));
                }
                Ok(response) if response.is_client_error() => {
                    let error_body = error_text(&response);

                    warn!(
                        status = response.status,
                        error = %error_body,
                        "Token refresh rejected"
                    );

                    return Err(AuthError::TokenRefreshFailed(format!(
                        "Token endpoint returned {}: {}",
                        response.status, error_body
                    )));
                }
                Ok(response) => format!("{} - {}", response.status, error_text(&response)),
                Err(e) if e.is_transient() => e.to_string(),
                Err(e) => return Err(AuthError::NetworkError(e.to_string())),
            };

            if attempts >= MAX_REFRESH_ATTEMPTS {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token refresh failed after {} attempts. Last error: {}",
                    attempts, last_error
                )));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "Token refresh failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Build a form-encoded POST to a token endpoint.
pub(crate) fn form_request(url: &str, params: &[(&str, &str)]) -> Result<HttpRequest> {
    HttpRequest::new(HttpMethod::Post, url)
        .form(params)
        .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))
}

pub(crate) fn error_text(response: &HttpResponse) -> String {
    response
        .text()
        .unwrap_or_else(|_| "Unable to read error response".to_string())
}

/// Token response from the OAuth provider.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub(crate) expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) token_type: Option<String>,
}

impl TokenResponse {
    pub(crate) fn parse(response: &HttpResponse) -> Result<Self> {
        serde_json::from_slice(&response.body).map_err(|e| AuthError::SerializationFailed {
            context: "token response".to_string(),
            source: e,
        })
    }

    /// Convert into a token set. A refresh grant may omit the refresh token,
    /// in which case `previous_refresh` is kept.
    pub(crate) fn into_tokens(
        self,
        previous_refresh: Option<&str>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> OAuthTokens {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string));
        OAuthTokens::issued_at(self.access_token, refresh_token, self.expires_in, now)
    }
}

fn default_expires_in() -> i64 {
    DEFAULT_TOKEN_LIFETIME_SECS
}
