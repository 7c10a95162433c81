//! Federated "popup" sign-in for Google.
//!
//! The system browser plays the popup: we open the Google consent page and
//! wait on a loopback listener for the redirect carrying the authorization
//! code, then exchange it (PKCE) for a Google id token. The caller hands that
//! id token to the identity provider.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::{AuthError, codes};
use crate::config::IdentityConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Loopback path the consent page redirects to.
pub const CALLBACK_PATH: &str = "/__/auth/handler";
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

type Launcher = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// PKCE code verifier and challenge
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

/// Generate PKCE code verifier and challenge
pub fn generate_pkce() -> Pkce {
    // Two v4 UUIDs give 32 random bytes.
    let uuid1 = uuid::Uuid::new_v4();
    let uuid2 = uuid::Uuid::new_v4();
    let mut verifier_bytes = [0u8; 32];
    verifier_bytes[..16].copy_from_slice(uuid1.as_bytes());
    verifier_bytes[16..].copy_from_slice(uuid2.as_bytes());
    let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

    Pkce {
        verifier,
        challenge,
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// Google OAuth popup flow.
pub struct GooglePopup {
    http: reqwest::Client,
    client_id: String,
    client_secret: Option<String>,
    port: u16,
    authorize_url: String,
    token_url: String,
    timeout: Duration,
    launcher: Launcher,
    in_flight: AtomicBool,
}

impl fmt::Debug for GooglePopup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GooglePopup")
            .field("client_id", &self.client_id)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl GooglePopup {
    pub fn new(client_id: impl Into<String>, client_secret: Option<String>, port: u16) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret,
            port,
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            timeout: CALLBACK_TIMEOUT,
            launcher: Arc::new(|url: &str| open::that(url)),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Builds the popup from config; `None` when no Google client is configured.
    pub fn from_config(config: &IdentityConfig) -> Option<Self> {
        let client_id = config
            .google_client_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())?;
        Some(Self::new(
            client_id,
            config.google_client_secret.clone(),
            config.callback_port,
        ))
    }

    #[must_use]
    pub fn with_endpoints(mut self, authorize_url: &str, token_url: &str) -> Self {
        self.authorize_url = authorize_url.to_string();
        self.token_url = token_url.to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the browser launcher (the default opens the system browser).
    #[must_use]
    pub fn with_launcher(
        mut self,
        launcher: impl Fn(&str) -> std::io::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    pub fn redirect_uri(port: u16) -> String {
        format!("http://localhost:{port}{CALLBACK_PATH}")
    }

    /// Build the consent URL. `openid` is always requested so an id token comes back.
    pub fn build_auth_url(&self, pkce: &Pkce, state: &str, redirect_uri: &str, scopes: &[String]) -> String {
        let mut scope_list = vec!["openid".to_string()];
        for scope in scopes {
            if !scope_list.contains(scope) {
                scope_list.push(scope.clone());
            }
        }
        let scope = scope_list.join(" ");

        let params = [
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("state", state),
            ("prompt", "select_account"),
        ];

        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();

        format!("{}?{query}", self.authorize_url)
    }

    /// Runs the popup and returns a Google id token.
    pub async fn authorize(&self, scopes: &[String]) -> Result<String, AuthError> {
        let Some(_guard) = PopupGuard::acquire(&self.in_flight) else {
            return Err(AuthError::new(
                codes::CANCELLED_POPUP_REQUEST,
                "Another sign-in popup is already open",
            ));
        };

        let listener = TcpListener::bind(("127.0.0.1", self.port))
            .await
            .map_err(|e| {
                AuthError::new(
                    codes::POPUP_BLOCKED,
                    format!("Cannot listen for the sign-in callback: {e}"),
                )
            })?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::new(codes::INTERNAL_ERROR, e.to_string()))?
            .port();
        let redirect_uri = Self::redirect_uri(port);

        let pkce = generate_pkce();
        let state = uuid::Uuid::new_v4().to_string();
        let url = self.build_auth_url(&pkce, &state, &redirect_uri, scopes);

        (self.launcher)(&url).map_err(|e| {
            AuthError::new(
                codes::POPUP_BLOCKED,
                format!("Failed to open the sign-in page: {e}"),
            )
        })?;
        tracing::debug!(port, "waiting for sign-in callback");

        let code = tokio::time::timeout(self.timeout, wait_for_callback(&listener, &state))
            .await
            .map_err(|_elapsed| {
                AuthError::new(codes::POPUP_CLOSED_BY_USER, "Sign-in popup timed out")
            })??;

        self.exchange_code(&code, &pkce, &redirect_uri).await
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce: &Pkce,
        redirect_uri: &str,
    ) -> Result<String, AuthError> {
        // The serializer is !Send; it must not live across the await below.
        let body = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("grant_type", "authorization_code")
                .append_pair("client_id", &self.client_id)
                .append_pair("code", code)
                .append_pair("code_verifier", &pkce.verifier)
                .append_pair("redirect_uri", redirect_uri);
            if let Some(secret) = self.client_secret.as_deref() {
                form.append_pair("client_secret", secret);
            }
            form.finish()
        };

        let response = self
            .http
            .post(&self.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| AuthError::network(format!("Token exchange request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::new(
                codes::INTERNAL_ERROR,
                format!("Token exchange failed (HTTP {status}): {body}"),
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AuthError::new(codes::INTERNAL_ERROR, format!("Bad token response: {e}"))
        })?;
        token.id_token.ok_or_else(|| {
            AuthError::new(codes::INTERNAL_ERROR, "Token response carried no id_token")
        })
    }
}

/// Clears the in-flight flag on drop.
struct PopupGuard<'a>(&'a AtomicBool);

impl<'a> PopupGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PopupGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CallbackOutcome {
    /// Not the callback path (favicon and friends).
    Ignored,
    Code(String),
    Denied(String),
}

/// Classifies a raw HTTP request hitting the loopback listener.
pub(crate) fn parse_callback(request: &str, expected_state: &str) -> CallbackOutcome {
    let Some(target) = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
    else {
        return CallbackOutcome::Ignored;
    };
    let Ok(url) = url::Url::parse(&format!("http://localhost{target}")) else {
        return CallbackOutcome::Ignored;
    };
    if url.path() != CALLBACK_PATH {
        return CallbackOutcome::Ignored;
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    if let Some(error) = param("error") {
        return CallbackOutcome::Denied(error);
    }
    if param("state").as_deref() != Some(expected_state) {
        return CallbackOutcome::Denied("state mismatch".to_string());
    }
    match param("code") {
        Some(code) if !code.is_empty() => CallbackOutcome::Code(code),
        _ => CallbackOutcome::Denied("missing code".to_string()),
    }
}

async fn wait_for_callback(listener: &TcpListener, expected_state: &str) -> Result<String, AuthError> {
    loop {
        let (mut stream, _) = listener
            .accept()
            .await
            .map_err(|e| AuthError::new(codes::INTERNAL_ERROR, e.to_string()))?;
        let mut buffer = [0u8; 4096];
        let read = stream.read(&mut buffer).await.unwrap_or(0);
        let request = String::from_utf8_lossy(&buffer[..read]);

        match parse_callback(&request, expected_state) {
            CallbackOutcome::Ignored => {
                let _ = stream.write_all(http_response(404, "Not found").as_bytes()).await;
            }
            CallbackOutcome::Code(code) => {
                let _ = stream
                    .write_all(
                        http_response(200, "Signed in. You can close this window.").as_bytes(),
                    )
                    .await;
                return Ok(code);
            }
            CallbackOutcome::Denied(reason) => {
                let _ = stream
                    .write_all(http_response(400, "Sign-in was not completed.").as_bytes())
                    .await;
                return Err(AuthError::new(
                    codes::POPUP_CLOSED_BY_USER,
                    format!("Sign-in popup closed: {reason}"),
                ));
            }
        }
    }
}

fn http_response(status: u16, message: &str) -> String {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Bad Request",
    };
    let body = format!("<html><body><p>{message}</p></body></html>");
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}
