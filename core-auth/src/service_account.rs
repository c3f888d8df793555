//! Service account credentials.
//!
//! A service account authenticates without user interaction: it signs a
//! short-lived RS256 JWT with its private key and trades it for an access
//! token through the `jwt-bearer` grant (RFC 7523).

use crate::error::{AuthError, Result};
use crate::oauth::{error_text, form_request, TokenResponse};
use crate::types::{OAuthTokens, DRIVE_READONLY_SCOPE};
use bridge_traits::http::HttpClient;
use bridge_traits::time::{Clock, SystemClock};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Parsed service account JSON key.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// File the key was read from.
    #[serde(skip)]
    pub origin: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    /// Parse a key file. `origin` names the file in errors.
    pub fn from_json(data: &[u8], origin: &str) -> Result<Self> {
        let mut key: ServiceAccountKey =
            serde_json::from_slice(data).map_err(|e| AuthError::InvalidCredentials {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;

        if key.key_type != "service_account" {
            return Err(AuthError::InvalidCredentials {
                path: origin.to_string(),
                reason: format!("expected type \"service_account\", found \"{}\"", key.key_type),
            });
        }

        key.origin = origin.to_string();
        Ok(key)
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .field("origin", &self.origin)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Obtains access tokens for a service account.
pub struct ServiceAccountFlow {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scopes: Vec<String>,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
}

impl ServiceAccountFlow {
    /// Prepare the flow. Fails if the private key is not a valid RSA PEM.
    pub fn new(key: ServiceAccountKey, http_client: Arc<dyn HttpClient>) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            AuthError::InvalidCredentials {
                path: key.origin.clone(),
                reason: format!("private_key is not a valid RSA key: {}", e),
            }
        })?;

        Ok(Self {
            key,
            encoding_key,
            scopes: vec![DRIVE_READONLY_SCOPE.to_string()],
            http_client,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Sign a fresh assertion valid from now for one hour.
    pub fn sign_assertion(&self) -> Result<String> {
        let now = self.clock.unix_timestamp();
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.key.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::Other(format!("Failed to sign assertion: {}", e)))
    }

    /// Trade a newly signed assertion for an access token.
    #[instrument(skip(self), fields(account = %self.key.client_email))]
    pub async fn fetch_token(&self) -> Result<OAuthTokens> {
        let assertion = self.sign_assertion()?;
        let request = form_request(
            &self.key.token_uri,
            &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
        )?;

        debug!("Requesting service account token");

        let response = self
            .http_client
            .execute_with_retry(request, Default::default())
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            let error_body = error_text(&response);
            warn!(
                status = response.status,
                error = %error_body,
                "Service account token request rejected"
            );
            return Err(AuthError::InvalidCredentials {
                path: self.key.origin.clone(),
                reason: format!("token endpoint returned {}: {}", response.status, error_body),
            });
        }

        let tokens = TokenResponse::parse(&response)?.into_tokens(None, self.clock.now());
        info!(expires_at = %tokens.expires_at, "Obtained service account token");
        Ok(tokens)
    }
}
