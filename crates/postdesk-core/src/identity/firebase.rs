//! Firebase Identity Toolkit adapter.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::{AuthError, AuthState, FederatedRequest, GooglePopup, Identity, IdentityProvider, codes};
use crate::config::IdentityConfig;
use crate::storage::ClientStore;

/// Store key holding the serialized provider session.
pub const SESSION_KEY: &str = "firebaseSession";
/// Id tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_MS: u64 = 60_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

/// Identity provider backed by the Firebase REST API.
pub struct FirebaseIdentity {
    http: reqwest::Client,
    api_key: String,
    identity_url: String,
    securetoken_url: String,
    store: Arc<ClientStore>,
    state: AuthState,
    popup: Option<GooglePopup>,
}

impl std::fmt::Debug for FirebaseIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseIdentity")
            .field("identity_url", &self.identity_url)
            .field("securetoken_url", &self.securetoken_url)
            .field("popup", &self.popup)
            .finish_non_exhaustive()
    }
}

impl FirebaseIdentity {
    /// Creates the adapter and restores any persisted session.
    ///
    /// Fails when no API key is configured.
    pub fn new(config: &IdentityConfig, store: Arc<ClientStore>) -> Result<Self> {
        let api_key = config.effective_api_key().ok_or_else(|| {
            anyhow!("No Firebase API key. Set POSTDESK_FIREBASE_API_KEY or identity.api_key")
        })?;
        let identity = Self {
            http: reqwest::Client::new(),
            api_key,
            identity_url: config.identity_url.trim_end_matches('/').to_string(),
            securetoken_url: config.securetoken_url.trim_end_matches('/').to_string(),
            store,
            state: AuthState::new(),
            popup: GooglePopup::from_config(config),
        };
        identity.restore();
        Ok(identity)
    }

    #[must_use]
    pub fn with_popup(mut self, popup: GooglePopup) -> Self {
        self.popup = Some(popup);
        self
    }

    fn restore(&self) {
        let restored = self
            .store
            .get_item(SESSION_KEY)
            .and_then(|raw| match serde_json::from_str::<Identity>(&raw) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    tracing::warn!("Discarding unreadable provider session: {e}");
                    None
                }
            });
        if let Some(identity) = &restored {
            tracing::debug!(uid = %identity.uid, "restored provider session");
        }
        self.state.publish(restored);
        self.state.mark_ready();
    }

    fn persist(&self, identity: &Identity) -> Result<(), AuthError> {
        let raw = serde_json::to_string(identity)
            .map_err(|e| AuthError::new(codes::INTERNAL_ERROR, e.to_string()))?;
        self.store
            .set_item(SESSION_KEY, &raw)
            .map_err(|e| AuthError::new(codes::INTERNAL_ERROR, format!("{e:#}")))
    }

    fn endpoint(&self, base: &str, path: &str) -> String {
        format!("{base}/v1/{path}?key={}", self.api_key)
    }

    async fn post_identity<B: Serialize>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<SignInResponse, AuthError> {
        let url = self.endpoint(&self.identity_url, &format!("accounts:{method}"));
        tracing::debug!(method, "identity toolkit request");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::network(e.to_string()))?;
        decode_response(response).await
    }

    /// Turns a sign-in response into the published identity.
    fn establish(&self, response: SignInResponse) -> Result<Identity, AuthError> {
        let identity = Identity::new(
            response.local_id,
            response.email.unwrap_or_default(),
            response.id_token,
            response.refresh_token,
            expiry_from(&response.expires_in),
        );
        self.persist(&identity)?;
        self.state.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn refresh(&self, identity: Identity) -> Result<Identity, AuthError> {
        let url = self.endpoint(&self.securetoken_url, "token");
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", &identity.refresh_token)
            .finish();

        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(form)
            .send()
            .await
            .map_err(|e| AuthError::network(e.to_string()))?;
        let refreshed: RefreshResponse = decode_response(response).await?;

        let previous_refresh = identity.refresh_token.clone();
        let identity = Identity {
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: expiry_from(&refreshed.expires_in),
            ..identity
        };
        // A sign-out that landed while the request was in flight wins.
        let applied = self.state.refresh_silently(identity.clone(), &previous_refresh, |fresh| {
            self.persist(fresh)
        })?;
        if !applied {
            tracing::debug!("session changed during token refresh; discarding result");
            return Err(AuthError::no_current_user());
        }
        Ok(identity)
    }
}

impl IdentityProvider for FirebaseIdentity {
    async fn ready(&self) {
        self.state.wait_ready().await;
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }

    fn current_user(&self) -> Option<Identity> {
        self.state.current()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let response = self
            .post_identity(
                "signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        self.establish(response)
    }

    async fn sign_in_with_popup(&self, request: &FederatedRequest) -> Result<Identity, AuthError> {
        if request.provider_id != FederatedRequest::GOOGLE {
            return Err(AuthError::new(
                codes::OPERATION_NOT_ALLOWED,
                format!("Unsupported provider: {}", request.provider_id),
            ));
        }
        let Some(popup) = &self.popup else {
            return Err(AuthError::new(
                codes::OPERATION_NOT_ALLOWED,
                "Google sign-in is not configured (identity.google_client_id)",
            ));
        };

        let google_token = popup.authorize(&request.scopes).await?;
        let post_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", &google_token)
            .append_pair("providerId", FederatedRequest::GOOGLE)
            .finish();
        let response = self
            .post_identity(
                "signInWithIdp",
                &IdpRequest {
                    post_body,
                    request_uri: "http://localhost",
                    return_secure_token: true,
                    return_idp_credential: true,
                },
            )
            .await?;
        self.establish(response)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.state.publish(None);
        self.store
            .remove_item(SESSION_KEY)
            .map_err(|e| AuthError::new(codes::INTERNAL_ERROR, format!("{e:#}")))
    }

    async fn id_token(&self) -> Result<String, AuthError> {
        let identity = self.state.current().ok_or_else(AuthError::no_current_user)?;
        if identity.expires_at > now_millis().saturating_add(REFRESH_MARGIN_MS) {
            return Ok(identity.id_token);
        }
        tracing::debug!("refreshing id token");
        Ok(self.refresh(identity).await?.id_token)
    }
}

async fn decode_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AuthError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::network(e.to_string()))?;
    if !status.is_success() {
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| format!("HTTP {status}"));
        return Err(map_rest_error(&message));
    }
    serde_json::from_str(&body)
        .map_err(|e| AuthError::new(codes::INTERNAL_ERROR, format!("Bad identity response: {e}")))
}

/// Maps a REST error message (`CODE : detail`) onto an `auth/*` code.
pub(crate) fn map_rest_error(message: &str) -> AuthError {
    let rest_code = message.split(" : ").next().unwrap_or(message).trim();
    let code = match rest_code {
        "EMAIL_NOT_FOUND" => codes::USER_NOT_FOUND,
        "INVALID_PASSWORD" => codes::WRONG_PASSWORD,
        "USER_DISABLED" => codes::USER_DISABLED,
        "INVALID_EMAIL" => codes::INVALID_EMAIL,
        "INVALID_LOGIN_CREDENTIALS" | "INVALID_IDP_RESPONSE" => codes::INVALID_CREDENTIAL,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => codes::TOO_MANY_REQUESTS,
        "OPERATION_NOT_ALLOWED" | "PASSWORD_LOGIN_DISABLED" => codes::OPERATION_NOT_ALLOWED,
        _ => codes::INTERNAL_ERROR,
    };
    AuthError::new(code, message)
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

fn expiry_from(expires_in: &str) -> u64 {
    let secs = expires_in.trim().parse::<u64>().unwrap_or(0);
    now_millis().saturating_add(secs.saturating_mul(1000))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(server: &MockServer) -> IdentityConfig {
        IdentityConfig {
            api_key: Some("test-key".to_string()),
            identity_url: server.uri(),
            securetoken_url: server.uri(),
            ..Default::default()
        }
    }

    fn sign_in_body(expires_in: &str) -> serde_json::Value {
        serde_json::json!({
            "localId": "uid-1",
            "email": "admin@example.com",
            "idToken": "id-1",
            "refreshToken": "refresh-1",
            "expiresIn": expires_in,
        })
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let config = IdentityConfig {
            api_key: None,
            ..Default::default()
        };
        // The env override may be set on a developer machine.
        if std::env::var("POSTDESK_FIREBASE_API_KEY").is_err() {
            assert!(FirebaseIdentity::new(&config, Arc::new(ClientStore::in_memory())).is_err());
        }
    }

    #[test]
    fn test_rest_error_mapping() {
        assert_eq!(map_rest_error("EMAIL_NOT_FOUND").code, codes::USER_NOT_FOUND);
        assert_eq!(map_rest_error("INVALID_PASSWORD").code, codes::WRONG_PASSWORD);
        assert_eq!(
            map_rest_error("TOO_MANY_ATTEMPTS_TRY_LATER : Access disabled").code,
            codes::TOO_MANY_REQUESTS
        );
        assert_eq!(
            map_rest_error("INVALID_LOGIN_CREDENTIALS").code,
            codes::INVALID_CREDENTIAL
        );
        assert_eq!(map_rest_error("SOMETHING_NEW").code, codes::INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn test_password_sign_in_publishes_and_persists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .and(query_param("key", "test-key"))
            .and(body_string_contains("\"returnSecureToken\":true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sign_in_body("3600")))
            .mount(&server)
            .await;

        let store = Arc::new(ClientStore::in_memory());
        let provider = FirebaseIdentity::new(&config(&server), Arc::clone(&store)).unwrap();
        let mut rx = provider.subscribe();
        assert!(rx.borrow_and_update().is_none());

        let identity = provider
            .sign_in_with_password("admin@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(identity.email, "admin@example.com");
        assert!(rx.has_changed().unwrap());
        assert!(store.get_item(SESSION_KEY).is_some());
        assert_eq!(provider.id_token().await.unwrap(), "id-1");
    }

    #[tokio::test]
    async fn test_password_sign_in_maps_rest_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": 400, "message": "INVALID_PASSWORD"}
            })))
            .mount(&server)
            .await;

        let provider =
            FirebaseIdentity::new(&config(&server), Arc::new(ClientStore::in_memory())).unwrap();
        let err = provider
            .sign_in_with_password("admin@example.com", "bad")
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::WRONG_PASSWORD);
        assert!(provider.current_user().is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let config = IdentityConfig {
            api_key: Some("k".to_string()),
            identity_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };
        let provider = FirebaseIdentity::new(&config, Arc::new(ClientStore::in_memory())).unwrap();
        let err = provider.sign_in_with_password("a@b.c", "pw").await.unwrap_err();
        assert_eq!(err.code, codes::NETWORK_REQUEST_FAILED);
    }

    #[tokio::test]
    async fn test_session_restored_from_store_and_ready() {
        let store = Arc::new(ClientStore::in_memory());
        let saved = Identity::new("uid-9", "saved@example.com", "id", "r", u64::MAX);
        store
            .set_item(SESSION_KEY, &serde_json::to_string(&saved).unwrap())
            .unwrap();

        let config = IdentityConfig {
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let provider = FirebaseIdentity::new(&config, store).unwrap();
        provider.ready().await;
        assert_eq!(provider.current_user(), Some(saved));
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed_without_notification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id_token": "fresh-id",
                "refresh_token": "new-refresh",
                "expires_in": "3600",
                "user_id": "uid-1",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(ClientStore::in_memory());
        let stale = Identity::new("uid-1", "a@b.c", "stale-id", "old-refresh", 0);
        store
            .set_item(SESSION_KEY, &serde_json::to_string(&stale).unwrap())
            .unwrap();

        let provider = FirebaseIdentity::new(&config(&server), store).unwrap();
        let mut rx = provider.subscribe();
        rx.borrow_and_update();

        assert_eq!(provider.id_token().await.unwrap(), "fresh-id");
        // Second call uses the cached fresh token.
        assert_eq!(provider.id_token().await.unwrap(), "fresh-id");
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_sign_out_clears_session() {
        let store = Arc::new(ClientStore::in_memory());
        let saved = Identity::new("uid-9", "saved@example.com", "id", "r", u64::MAX);
        store
            .set_item(SESSION_KEY, &serde_json::to_string(&saved).unwrap())
            .unwrap();
        let config = IdentityConfig {
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let provider = FirebaseIdentity::new(&config, Arc::clone(&store)).unwrap();

        provider.sign_out().await.unwrap();
        assert!(provider.current_user().is_none());
        assert!(store.get_item(SESSION_KEY).is_none());
        assert_eq!(
            provider.id_token().await.unwrap_err().code,
            codes::NO_CURRENT_USER
        );
    }

    #[tokio::test]
    async fn test_sign_out_during_refresh_stays_signed_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "id_token": "fresh-id",
                        "refresh_token": "new-refresh",
                        "expires_in": "3600",
                    }))
                    .set_delay(std::time::Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let store = Arc::new(ClientStore::in_memory());
        let stale = Identity::new("uid-1", "a@b.c", "stale-id", "old-refresh", 0);
        store
            .set_item(SESSION_KEY, &serde_json::to_string(&stale).unwrap())
            .unwrap();
        let provider = FirebaseIdentity::new(&config(&server), Arc::clone(&store)).unwrap();

        let (token, signed_out) = tokio::join!(provider.id_token(), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            provider.sign_out().await
        });
        signed_out.unwrap();

        assert_eq!(token.unwrap_err().code, codes::NO_CURRENT_USER);
        assert!(provider.current_user().is_none());
        assert!(store.get_item(SESSION_KEY).is_none());
    }

    #[test]
    fn test_popup_sign_in_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}
        let config = IdentityConfig {
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let provider = FirebaseIdentity::new(&config, Arc::new(ClientStore::in_memory()))
            .unwrap()
            .with_popup(GooglePopup::new("cid", None, 0));
        let request = FederatedRequest::google();
        let future = provider.sign_in_with_popup(&request);
        assert_send(&future);
    }

    #[tokio::test]
    async fn test_popup_without_client_is_not_allowed() {
        let config = IdentityConfig {
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let provider = FirebaseIdentity::new(&config, Arc::new(ClientStore::in_memory())).unwrap();
        let err = provider
            .sign_in_with_popup(&FederatedRequest::google())
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::OPERATION_NOT_ALLOWED);
    }
}
