use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_runtime::config::AuthMode;

/// Read-only access to file content and metadata.
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Tokens are treated as expired this many seconds before their real expiry.
pub const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

/// Lifetime assumed when a token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// OAuth 2.0 token set.
///
/// The `Debug` implementation redacts both tokens.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use core_auth::OAuthTokens;
///
/// let now = Utc::now();
/// let tokens = OAuthTokens::issued_at("ya29.a0".to_string(), None, 3600, now);
///
/// assert!(!tokens.is_expired_at(now));
/// assert!(tokens.is_expired_at(now + Duration::seconds(3550)));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token used for API requests
    pub access_token: String,
    /// The refresh token used to obtain new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC)
    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// Create a token set issued at `now` that lives `expires_in` seconds.
    pub fn issued_at(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: now + Duration::seconds(expires_in),
        }
    }

    /// Whether the access token must be replaced before use at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::seconds(TOKEN_EXPIRY_SKEW_SECS)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
