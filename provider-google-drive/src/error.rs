//! Error types for Google Drive provider

use crate::types::ApiErrorResponse;
use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

/// Error reasons Drive uses for quota exhaustion on a 403.
const RATE_LIMIT_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded"];

/// Error reasons Drive uses when a document cannot be exported.
const EXPORT_REASONS: &[&str] = &["cannotExportFile", "exportSizeLimitExceeded"];

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Authentication failed or token is invalid
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError {
        status_code: u16,
        reason: Option<String>,
        message: String,
    },

    /// Rate limit exceeded (HTTP 429, or 403 with a rate limit reason)
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { message: String },

    /// File not found
    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    /// The document cannot be exported to the requested format
    #[error("File {file_id} cannot be exported as {mime_type}: {message}")]
    ExportUnsupported {
        file_id: String,
        mime_type: String,
        message: String,
    },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl GoogleDriveError {
    /// Classify a non-success response.
    ///
    /// `file_id` is the object the request addressed; it is reported on 404.
    pub fn from_response(status: u16, body: &[u8], file_id: &str) -> Self {
        let parsed = serde_json::from_slice::<ApiErrorResponse>(body).ok();
        let reason = parsed.as_ref().and_then(|r| r.reason().map(str::to_string));
        let message = parsed
            .as_ref()
            .map(|r| r.error.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

        let reason_is = |candidates: &[&str]| {
            reason
                .as_deref()
                .is_some_and(|r| candidates.contains(&r))
        };

        match status {
            401 => Self::AuthenticationFailed(message),
            404 => Self::FileNotFound {
                file_id: file_id.to_string(),
            },
            429 => Self::RateLimitExceeded { message },
            403 if reason_is(RATE_LIMIT_REASONS) => Self::RateLimitExceeded { message },
            _ => Self::ApiError {
                status_code: status,
                reason,
                message,
            },
        }
    }

    /// Reclassify an export failure that Drive reports as a client error.
    pub(crate) fn into_export_error(self, file_id: &str, mime_type: &str) -> Self {
        match self {
            Self::ApiError {
                reason: Some(ref reason),
                ref message,
                ..
            } if EXPORT_REASONS.contains(&reason.as_str()) => Self::ExportUnsupported {
                file_id: file_id.to_string(),
                mime_type: mime_type.to_string(),
                message: message.clone(),
            },
            other => other,
        }
    }

    /// Whether a later attempt of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimitExceeded { .. } | Self::NetworkError(_) => true,
            Self::ApiError { status_code, .. } => (500..600).contains(status_code),
            Self::BridgeError(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<AuthError> for GoogleDriveError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::NetworkError(msg) => GoogleDriveError::NetworkError(msg),
            other => GoogleDriveError::AuthenticationFailed(other.to_string()),
        }
    }
}

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        if let GoogleDriveError::BridgeError(e) = error {
            return e;
        }

        if error.is_transient() {
            return BridgeError::Transient(error.to_string());
        }

        match error {
            GoogleDriveError::FileNotFound { file_id } => BridgeError::NotFound(file_id),
            e @ GoogleDriveError::ExportUnsupported { .. } => BridgeError::Unsupported(e.to_string()),
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
