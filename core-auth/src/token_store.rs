//! Token Cache
//!
//! Persists the installed-app token set between runs through the
//! `SecureStore` capability. The cache is read if present and rewritten on
//! every refresh or new consent.
//!
//! Token values are never logged.

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use bridge_traits::storage::SecureStore;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key under which the Drive token set is stored.
pub const DRIVE_TOKENS_KEY: &str = "google_drive.oauth_tokens";

#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
    key: String,
}

/// On-disk shape of a token set.
#[derive(Debug, Serialize, Deserialize)]
struct StoredTokens {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    expires_at: i64,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self::with_key(secure_store, DRIVE_TOKENS_KEY)
    }

    pub fn with_key(secure_store: Arc<dyn SecureStore>, key: impl Into<String>) -> Self {
        Self {
            secure_store,
            key: key.into(),
        }
    }

    /// Store tokens, replacing any previous set.
    pub async fn store_tokens(&self, tokens: &OAuthTokens) -> Result<()> {
        let stored = StoredTokens {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at.timestamp(),
        };

        let json = serde_json::to_vec(&stored).map_err(|e| AuthError::SerializationFailed {
            context: "token serialization".to_string(),
            source: e,
        })?;

        self.secure_store
            .set_secret(&self.key, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to write token cache");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(
            has_refresh_token = stored.refresh_token.is_some(),
            "Token cache updated"
        );

        Ok(())
    }

    /// Load the cached tokens.
    ///
    /// Returns `Ok(None)` when nothing is cached. A corrupted entry is
    /// removed and also reported as `None` so a fresh consent can replace it.
    pub async fn retrieve_tokens(&self) -> Result<Option<OAuthTokens>> {
        let data = self.secure_store.get_secret(&self.key).await.map_err(|e| {
            warn!(error = %e, "Failed to read token cache");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        let Some(data) = data else {
            debug!("No cached tokens");
            return Ok(None);
        };

        let stored: StoredTokens = match serde_json::from_slice(&data) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Cached tokens are corrupted, discarding them");
                if let Err(delete_err) = self.secure_store.delete_secret(&self.key).await {
                    warn!(error = %delete_err, "Failed to delete corrupted token cache");
                }
                return Ok(None);
            }
        };

        let Some(expires_at) = Utc.timestamp_opt(stored.expires_at, 0).single() else {
            warn!(expires_at = stored.expires_at, "Cached expiry is out of range, discarding");
            return Ok(None);
        };

        debug!(
            has_refresh_token = stored.refresh_token.is_some(),
            expires_at = stored.expires_at,
            "Loaded cached tokens"
        );

        Ok(Some(OAuthTokens {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            expires_at,
        }))
    }

    /// Remove the cached tokens. Succeeds when nothing is cached.
    pub async fn delete_tokens(&self) -> Result<()> {
        self.secure_store
            .delete_secret(&self.key)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;

        info!("Token cache cleared");
        Ok(())
    }
}
