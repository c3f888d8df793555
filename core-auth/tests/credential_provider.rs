//! Credential provider flows against a mock token endpoint.

use bridge_desktop::{FileSecureStore, ReqwestHttpClient, TokioFileSystem};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::storage::SecureStore;
use bridge_traits::time::Clock;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use core_auth::{
    AuthError, AuthMode, Authenticator, ConsentPrompt, CredentialProvider, OAuthTokens,
    TokenCacheFactory, TokenStore,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRIVATE_KEY: &str = include_str!("fixtures/test_rsa_key.pem");

struct ManualClock(AtomicI64);

impl ManualClock {
    fn at(timestamp: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(timestamp)))
    }

    fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.0.load(Ordering::SeqCst), 0).unwrap()
    }
}

/// Follows the consent URL back to the loopback listener, like a browser
/// whose user clicked "Allow" (or "Deny").
struct ScriptedBrowser {
    approve: bool,
    presented: AtomicUsize,
}

impl ScriptedBrowser {
    fn approving() -> Arc<Self> {
        Arc::new(Self {
            approve: true,
            presented: AtomicUsize::new(0),
        })
    }

    fn denying() -> Arc<Self> {
        Arc::new(Self {
            approve: false,
            presented: AtomicUsize::new(0),
        })
    }
}

impl ConsentPrompt for ScriptedBrowser {
    fn present(&self, authorization_url: &str) -> core_auth::Result<()> {
        self.presented.fetch_add(1, Ordering::SeqCst);

        let url = Url::parse(authorization_url).unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["code_challenge_method"], "S256");

        let redirect = if self.approve {
            format!("{}?code=test-code&state={}", params["redirect_uri"], params["state"])
        } else {
            format!("{}?error=access_denied&state={}", params["redirect_uri"], params["state"])
        };

        tokio::spawn(async move {
            let client = ReqwestHttpClient::new().unwrap();
            let _ = client.execute(HttpRequest::new(HttpMethod::Get, redirect)).await;
        });
        Ok(())
    }
}

fn cache_factory() -> TokenCacheFactory {
    Arc::new(|path: &Path| -> Arc<dyn SecureStore> { Arc::new(FileSecureStore::new(path)) })
}

fn provider(consent: Arc<dyn ConsentPrompt>, clock: Arc<dyn Clock>) -> CredentialProvider {
    CredentialProvider::new(
        Arc::new(ReqwestHttpClient::new().unwrap()),
        Arc::new(TokioFileSystem::new()),
        cache_factory(),
        consent,
    )
    .with_clock(clock)
    .with_consent_timeout(Duration::from_secs(10))
}

fn write_client_secrets(dir: &Path, server: &MockServer) -> PathBuf {
    let path = dir.join("credentials.json");
    let json = serde_json::json!({
        "installed": {
            "client_id": "client-123",
            "client_secret": "shh",
            "auth_uri": format!("{}/auth", server.uri()),
            "token_uri": format!("{}/token", server.uri()),
        }
    });
    std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();
    path
}

fn installed(dir: &Path, server: &MockServer) -> AuthMode {
    AuthMode::InstalledApp {
        client_secrets_path: write_client_secrets(dir, server),
        token_cache_path: dir.join("token.json"),
    }
}

async fn cached_tokens(dir: &Path) -> Option<OAuthTokens> {
    TokenStore::new(Arc::new(FileSecureStore::new(dir.join("token.json"))))
        .retrieve_tokens()
        .await
        .unwrap()
}

async fn seed_cache(dir: &Path, tokens: &OAuthTokens) {
    TokenStore::new(Arc::new(FileSecureStore::new(dir.join("token.json"))))
        .store_tokens(tokens)
        .await
        .unwrap();
}

const NOW: i64 = 1_700_000_000;

#[tokio::test]
async fn consent_flow_writes_token_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=test-code"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.consented",
            "refresh_token": "1//fresh",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let browser = ScriptedBrowser::approving();
    let credential = provider(browser.clone(), ManualClock::at(NOW))
        .authenticate(&installed(dir.path(), &server))
        .await
        .unwrap();

    assert_eq!(credential.access_token().await.unwrap(), "ya29.consented");
    assert_eq!(browser.presented.load(Ordering::SeqCst), 1);

    let cached = cached_tokens(dir.path()).await.unwrap();
    assert_eq!(cached.access_token, "ya29.consented");
    assert_eq!(cached.refresh_token.as_deref(), Some("1//fresh"));
}

#[tokio::test]
async fn valid_cached_token_is_reused_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::at(NOW);
    seed_cache(
        dir.path(),
        &OAuthTokens::issued_at("ya29.cached".to_string(), Some("1//r".to_string()), 3600, clock.now()),
    )
    .await;

    let browser = ScriptedBrowser::approving();
    let credential = provider(browser.clone(), clock)
        .authenticate(&installed(dir.path(), &server))
        .await
        .unwrap();

    assert_eq!(credential.access_token().await.unwrap(), "ya29.cached");
    assert_eq!(browser.presented.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn expired_cached_token_is_refreshed_and_rewritten() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=1%2F%2Fold"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.refreshed",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::at(NOW);
    seed_cache(
        dir.path(),
        &OAuthTokens {
            access_token: "ya29.stale".to_string(),
            refresh_token: Some("1//old".to_string()),
            expires_at: clock.now() - ChronoDuration::seconds(10),
        },
    )
    .await;

    let credential = provider(ScriptedBrowser::approving(), clock)
        .authenticate(&installed(dir.path(), &server))
        .await
        .unwrap();

    assert_eq!(credential.access_token().await.unwrap(), "ya29.refreshed");

    let cached = cached_tokens(dir.path()).await.unwrap();
    assert_eq!(cached.access_token, "ya29.refreshed");
    assert_eq!(cached.refresh_token.as_deref(), Some("1//old"));
}

#[tokio::test]
async fn denied_consent_is_an_auth_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let result = provider(ScriptedBrowser::denying(), ManualClock::at(NOW))
        .authenticate(&installed(dir.path(), &server))
        .await;

    assert!(matches!(result, Err(AuthError::AuthorizationDenied(_))));
    assert!(cached_tokens(dir.path()).await.is_none());
}

#[tokio::test]
async fn missing_credentials_file() {
    let dir = tempfile::tempdir().unwrap();
    let mode = AuthMode::service_account(dir.path().join("absent.json"));

    let result = provider(ScriptedBrowser::approving(), ManualClock::at(NOW))
        .authenticate(&mode)
        .await;

    match result {
        Err(AuthError::CredentialsFileMissing { path }) => assert!(path.ends_with("absent.json")),
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("expected an error"),
    }
}

#[tokio::test]
async fn service_account_token_is_renewed_after_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("jwt-bearer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.robot",
            "expires_in": 3600
        })))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("service-account-key.json");
    let key = serde_json::json!({
        "type": "service_account",
        "private_key": PRIVATE_KEY,
        "client_email": "robot@demo.iam.gserviceaccount.com",
        "token_uri": format!("{}/token", server.uri()),
    });
    std::fs::write(&key_path, serde_json::to_vec(&key).unwrap()).unwrap();

    let clock = ManualClock::at(NOW);
    let credential = provider(ScriptedBrowser::approving(), clock.clone())
        .authenticate(&AuthMode::service_account(&key_path))
        .await
        .unwrap();

    // Still valid: no new request.
    clock.advance(3000);
    assert_eq!(credential.access_token().await.unwrap(), "ya29.robot");

    // Inside the 60 s skew: a new assertion is signed and exchanged.
    clock.advance(560);
    assert_eq!(credential.access_token().await.unwrap(), "ya29.robot");
}
