//! OAuth client secrets as downloaded from the Google Cloud console.
//!
//! The console produces a JSON document with either an `installed` (desktop
//! app) or a `web` section. Both carry the same fields.

use crate::error::{AuthError, Result};
use serde::Deserialize;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientSecrets {
    /// Parse a client secrets document. `origin` names the file in errors.
    pub fn from_json(data: &[u8], origin: &str) -> Result<Self> {
        let file: ClientSecretsFile =
            serde_json::from_slice(data).map_err(|e| AuthError::InvalidCredentials {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;

        let secrets = file
            .installed
            .or(file.web)
            .ok_or_else(|| AuthError::InvalidCredentials {
                path: origin.to_string(),
                reason: "expected an \"installed\" or \"web\" section".to_string(),
            })?;

        if secrets.client_id.trim().is_empty() {
            return Err(AuthError::InvalidCredentials {
                path: origin.to_string(),
                reason: "client_id is empty".to_string(),
            });
        }

        Ok(secrets)
    }
}
