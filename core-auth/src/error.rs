use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Credentials file not found: {path}")]
    CredentialsFileMissing { path: String },

    #[error("Invalid credentials in {path}: {reason}")]
    InvalidCredentials { path: String, reason: String },

    #[error("Authorization was denied: {0}")]
    AuthorizationDenied(String),

    #[error("OAuth state mismatch (possible CSRF)")]
    StateMismatch { expected: String, actual: String },

    #[error("Authorization code rejected: {0}")]
    InvalidAuthCode(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Serialization failed ({context}): {source}")]
    SerializationFailed {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Timed out waiting for {operation}")]
    Timeout { operation: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
