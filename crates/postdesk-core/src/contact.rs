//! Public contact form gated by the bot-mitigation widget.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::api::{AdminApi, ApiError};
use crate::tasks::{TaskKind, Tasks};

/// Form parameter carrying the widget token.
pub const TURNSTILE_FIELD: &str = "cf-turnstile-response";
/// The only request path that receives the token.
pub const CONTACT_PATH: &str = "/contact";

#[derive(Debug, Default)]
struct GateState {
    token: Option<String>,
    submit_enabled: bool,
}

/// Holds the widget token and the submit-button state.
#[derive(Debug, Default)]
pub struct TurnstileGate {
    state: Mutex<GateState>,
}

impl TurnstileGate {
    /// Submit starts disabled.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Widget callback.
    pub fn on_token(&self, token: &str) {
        let mut state = self.lock();
        state.token = Some(token.to_string());
        state.submit_enabled = true;
    }

    pub fn submit_enabled(&self) -> bool {
        self.lock().submit_enabled
    }

    /// Adds the token to `params` only for `/contact` and only once a token exists.
    pub fn configure_request(&self, path: &str, params: &mut Vec<(String, String)>) {
        if path != CONTACT_PATH {
            return;
        }
        let Some(token) = self.lock().token.clone() else {
            return;
        };
        params.retain(|(k, _)| k != TURNSTILE_FIELD);
        params.push((TURNSTILE_FIELD.to_string(), token));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// Submit is still disabled (no widget token yet).
    NotVerified,
    /// A submission is already running.
    Busy,
    Api(ApiError),
}

impl std::fmt::Display for ContactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactError::NotVerified => f.write_str("Please complete the verification first."),
            ContactError::Busy => f.write_str("A message is already being sent."),
            ContactError::Api(e) => f.write_str(&e.user_message()),
        }
    }
}

impl std::error::Error for ContactError {}

/// Contact form bound to the site backend.
pub struct ContactForm {
    api: AdminApi,
    gate: TurnstileGate,
    tasks: Tasks,
}

impl ContactForm {
    pub fn new(api: AdminApi) -> Self {
        Self {
            api,
            gate: TurnstileGate::new(),
            tasks: Tasks::new(),
        }
    }

    pub fn gate(&self) -> &TurnstileGate {
        &self.gate
    }

    pub async fn submit(&self, message: &ContactMessage) -> Result<(), ContactError> {
        if !self.gate.submit_enabled() {
            return Err(ContactError::NotVerified);
        }
        let Some(_task) = self.tasks.try_start(TaskKind::ContactSubmit) else {
            return Err(ContactError::Busy);
        };

        let mut params = vec![
            ("name".to_string(), message.name.clone()),
            ("email".to_string(), message.email.clone()),
            ("subject".to_string(), message.subject.clone()),
            ("message".to_string(), message.message.clone()),
        ];
        self.gate.configure_request(CONTACT_PATH, &mut params);

        self.api.post_form(CONTACT_PATH, &params).await.map_err(|e| {
            if e.is_network() {
                tracing::error!("Contact submission error: {e}");
            }
            ContactError::Api(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::storage::ClientStore;

    #[test]
    fn test_submit_disabled_until_token() {
        let gate = TurnstileGate::new();
        assert!(!gate.submit_enabled());
        gate.on_token("tok");
        assert!(gate.submit_enabled());
    }

    #[test]
    fn test_token_injected_only_for_contact_path() {
        let gate = TurnstileGate::new();
        let mut params = Vec::new();
        gate.configure_request(CONTACT_PATH, &mut params);
        assert!(params.is_empty());

        gate.on_token("tok");
        gate.configure_request("/contact/extra", &mut params);
        gate.configure_request("/blog/posts", &mut params);
        assert!(params.is_empty());

        gate.configure_request(CONTACT_PATH, &mut params);
        gate.configure_request(CONTACT_PATH, &mut params);
        assert_eq!(params, vec![(TURNSTILE_FIELD.to_string(), "tok".to_string())]);
    }

    #[tokio::test]
    async fn test_submit_posts_form_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contact"))
            .and(body_string_contains("name=Ada"))
            .and(body_string_contains("subject=Hi+there"))
            .and(body_string_contains("cf-turnstile-response=widget-token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let form = ContactForm::new(AdminApi::new(&server.uri(), Arc::new(ClientStore::in_memory())));
        let message = ContactMessage {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            subject: "Hi there".into(),
            message: "Hello".into(),
        };

        assert_eq!(form.submit(&message).await, Err(ContactError::NotVerified));
        form.gate().on_token("widget-token");
        form.submit(&message).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejection_body_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contact"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Verification failed"))
            .mount(&server)
            .await;

        let form = ContactForm::new(AdminApi::new(&server.uri(), Arc::new(ClientStore::in_memory())));
        form.gate().on_token("t");
        let err = form.submit(&ContactMessage::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Verification failed");
    }
}
