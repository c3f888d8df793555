//! Loopback redirect receiver for the installed-app flow.
//!
//! Serves `127.0.0.1` on an ephemeral port with `tiny_http` and waits for the
//! browser to be redirected back with `code` and `state` (or `error`) query
//! parameters.

use crate::error::{AuthError, Result};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, warn};
use url::Url;

const SUCCESS_PAGE: &str = "<html><body><h3>Authentication complete.</h3>\
    <p>You can close this window and return to the terminal.</p></body></html>";
const DENIED_PAGE: &str = "<html><body><h3>Authorization was not granted.</h3>\
    <p>You can close this window.</p></body></html>";

/// Parameters carried by the authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResponse {
    pub code: String,
    pub state: String,
}

/// What a single request to the server carried.
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Authorized(AuthorizationResponse),
    Denied(String),
    /// Unrelated request, e.g. `/favicon.ico`.
    Ignored,
}

pub struct LoopbackReceiver {
    server: Arc<Server>,
    port: u16,
}

impl LoopbackReceiver {
    pub async fn bind() -> Result<Self> {
        let server = Server::http(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .map_err(|e| AuthError::Other(format!("Failed to start redirect server: {}", e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| AuthError::Other("Redirect server has no TCP address".to_string()))?;

        debug!(port = port, "Redirect server bound");
        Ok(Self {
            server: Arc::new(server),
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Wait for the redirect, answering each request with a small HTML page.
    ///
    /// Fails with `Timeout` if nothing arrives within `timeout` and with
    /// `AuthorizationDenied` when the redirect carries an `error`.
    pub async fn wait_for_code(&self, timeout: Duration) -> Result<AuthorizationResponse> {
        let server = Arc::clone(&self.server);
        let deadline = Instant::now() + timeout;
        let accept = tokio::task::spawn_blocking(move || accept_until_callback(&server, deadline));

        let outcome = tokio::time::timeout(timeout, accept).await;
        // Lets the blocking accept loop return if the timer fired first.
        self.server.unblock();

        let callback = outcome
            .map_err(|_| timed_out())?
            .map_err(|e| AuthError::Other(format!("Redirect server task failed: {}", e)))??;

        match callback {
            Some(Callback::Authorized(response)) => Ok(response),
            Some(Callback::Denied(reason)) => Err(AuthError::AuthorizationDenied(reason)),
            Some(Callback::Ignored) | None => Err(timed_out()),
        }
    }
}

fn timed_out() -> AuthError {
    AuthError::Timeout {
        operation: "browser authorization".to_string(),
    }
}

/// Serve requests until one carries a code or an error. `None` means the
/// deadline passed or the server was unblocked.
fn accept_until_callback(server: &Server, deadline: Instant) -> Result<Option<Callback>> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }

        let request = server
            .recv_timeout(remaining)
            .map_err(|e| AuthError::Other(format!("Redirect server failed: {}", e)))?;
        let Some(request) = request else {
            return Ok(None);
        };
        debug!(url = %request.url(), "Redirect request received");

        match respond(request) {
            Callback::Ignored => continue,
            callback => return Ok(Some(callback)),
        }
    }
}

fn respond(request: Request) -> Callback {
    let callback = if *request.method() == Method::Get {
        parse_target(request.url())
    } else {
        Callback::Ignored
    };

    let (status, body): (u16, &str) = match &callback {
        Callback::Authorized(_) => (200, SUCCESS_PAGE),
        Callback::Denied(_) => (200, DENIED_PAGE),
        Callback::Ignored => (404, ""),
    };

    let mut response = Response::from_string(body).with_status_code(status);
    if let Ok(header) = Header::from_bytes("Content-Type", "text/html; charset=utf-8") {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        warn!(error = %e, "Failed to answer redirect request");
    }

    callback
}

fn parse_target(target: &str) -> Callback {
    let Ok(url) = Url::parse(&format!("http://127.0.0.1{}", target)) else {
        return Callback::Ignored;
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match (error, code) {
        (Some(error), _) => Callback::Denied(error),
        (None, Some(code)) => Callback::Authorized(AuthorizationResponse {
            code,
            state: state.unwrap_or_default(),
        }),
        (None, None) => Callback::Ignored,
    }
}
