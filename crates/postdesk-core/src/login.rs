//! Login controller: email/password and federated sign-in, then the
//! authorization check, then the dashboard redirect.

use std::sync::{Arc, Mutex, PoisonError};

use crate::api::AdminApi;
use crate::identity::{AuthError, FederatedRequest, Identity, IdentityProvider, codes};
use crate::session::{NOT_AUTHORIZED_MESSAGE, check_authorized, clear_admin_token, persist_admin_token};
use crate::storage::ClientStore;
use crate::tasks::{TaskKind, Tasks};
use crate::ui::{LoginView, Route};

pub const EMPTY_FIELDS_MESSAGE: &str = "Please enter both email and password.";
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred during sign-in. Please try again.";

const LABEL_LOADING: &str = "Signing in...";
const LABEL_EMAIL: &str = "Sign In";
const LABEL_FEDERATED: &str = "Sign in with Gmail";

/// Maps a provider error code to the text shown under the form.
pub fn error_message(code: &str) -> &'static str {
    match code {
        codes::INVALID_EMAIL => "Invalid email address.",
        codes::USER_DISABLED => "This account has been disabled.",
        codes::USER_NOT_FOUND => "No account found with this email.",
        codes::WRONG_PASSWORD => "Incorrect password.",
        codes::INVALID_CREDENTIAL => "Invalid email or password.",
        codes::TOO_MANY_REQUESTS => "Too many failed attempts. Please try again later.",
        codes::POPUP_CLOSED_BY_USER => "Sign-in popup was closed. Please try again.",
        codes::POPUP_BLOCKED => "Sign-in popup was blocked. Please allow popups and try again.",
        codes::CANCELLED_POPUP_REQUEST => "Sign-in was cancelled. Please try again.",
        _ => GENERIC_ERROR_MESSAGE,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginTab {
    #[default]
    Email,
    Federated,
}

impl LoginTab {
    pub fn as_str(self) -> &'static str {
        match self {
            LoginTab::Email => "email",
            LoginTab::Federated => "gmail",
        }
    }

    pub fn parse(tab: &str) -> Option<Self> {
        match tab {
            "email" => Some(LoginTab::Email),
            "gmail" => Some(LoginTab::Federated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Authorized and sent to the dashboard.
    Authorized,
    /// Signed in but rejected by the backend; session discarded.
    NotAuthorized,
    /// Form validation blocked the request.
    Invalid,
    /// The provider refused the sign-in.
    Failed,
    /// Another sign-in of the same kind is still running.
    Busy,
}

pub struct LoginController<P, V> {
    provider: Arc<P>,
    api: AdminApi,
    store: Arc<ClientStore>,
    view: Arc<V>,
    tasks: Tasks,
    active_tab: Mutex<LoginTab>,
}

impl<P: IdentityProvider, V: LoginView> LoginController<P, V> {
    pub fn new(provider: Arc<P>, api: AdminApi, store: Arc<ClientStore>, view: Arc<V>) -> Self {
        Self {
            provider,
            api,
            store,
            view,
            tasks: Tasks::new(),
            active_tab: Mutex::new(LoginTab::default()),
        }
    }

    pub fn active_tab(&self) -> LoginTab {
        *self.active_tab.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn switch_tab(&self, tab: LoginTab) {
        *self.active_tab.lock().unwrap_or_else(PoisonError::into_inner) = tab;
        self.view.activate_tab(tab.as_str());
        self.view.clear_error();
    }

    /// Waits for the provider and runs the pre-check on an existing identity.
    ///
    /// Returns `Some(Authorized)` when the visitor was sent straight on. An
    /// unauthorized existing identity is left alone.
    pub async fn initialize(&self) -> Option<LoginOutcome> {
        self.provider.ready().await;
        let identity = self.provider.current_user()?;
        if check_authorized(self.provider.as_ref(), &self.api, &identity.email).await {
            Some(self.redirect_to_dashboard().await)
        } else {
            None
        }
    }

    pub async fn submit_email(&self, email: &str, password: &str) -> LoginOutcome {
        let email = email.trim();
        let password = password.trim();
        if email.is_empty() || password.is_empty() {
            self.view.show_error(EMPTY_FIELDS_MESSAGE);
            return LoginOutcome::Invalid;
        }
        let Some(_task) = self.tasks.try_start(TaskKind::LoginEmail) else {
            return LoginOutcome::Busy;
        };

        self.set_loading(true);
        self.view.clear_error();
        let result = self.provider.sign_in_with_password(email, password).await;
        let outcome = self.finish_sign_in(result, "Email login error").await;
        self.set_loading(false);
        outcome
    }

    pub async fn submit_federated(&self) -> LoginOutcome {
        let Some(_task) = self.tasks.try_start(TaskKind::LoginFederated) else {
            return LoginOutcome::Busy;
        };

        self.set_loading(true);
        self.view.clear_error();
        let request = FederatedRequest::google()
            .with_scope("email")
            .with_scope("profile");
        let result = self.provider.sign_in_with_popup(&request).await;
        let outcome = self.finish_sign_in(result, "Gmail login error").await;
        self.set_loading(false);
        outcome
    }

    async fn finish_sign_in(&self, result: Result<Identity, AuthError>, context: &str) -> LoginOutcome {
        match result {
            Ok(identity) => self.on_signed_in(&identity).await,
            Err(e) => {
                tracing::error!("{context}: {e}");
                self.view.show_error(error_message(&e.code));
                LoginOutcome::Failed
            }
        }
    }

    /// Auth-state handler for a fresh sign-in.
    pub async fn on_signed_in(&self, identity: &Identity) -> LoginOutcome {
        if check_authorized(self.provider.as_ref(), &self.api, &identity.email).await {
            return self.redirect_to_dashboard().await;
        }
        self.view.show_error(NOT_AUTHORIZED_MESSAGE);
        self.discard_session().await;
        LoginOutcome::NotAuthorized
    }

    async fn redirect_to_dashboard(&self) -> LoginOutcome {
        match self.provider.id_token().await {
            Ok(token) => {
                persist_admin_token(&self.store, &token);
                self.view.navigate(Route::Dashboard);
                LoginOutcome::Authorized
            }
            Err(e) => {
                tracing::error!("Failed to get id token: {e}");
                self.view.show_error(GENERIC_ERROR_MESSAGE);
                LoginOutcome::Failed
            }
        }
    }

    /// Sign out without navigating away from the login page.
    async fn discard_session(&self) {
        if let Err(e) = self.provider.sign_out().await {
            tracing::error!("Sign out error: {e}");
        }
        clear_admin_token(&self.store);
    }

    fn set_loading(&self, loading: bool) {
        let (email, federated) = if loading {
            (LABEL_LOADING, LABEL_LOADING)
        } else {
            (LABEL_EMAIL, LABEL_FEDERATED)
        };
        self.view.set_button_label(LoginTab::Email.as_str(), email);
        self.view.set_button_label(LoginTab::Federated.as_str(), federated);
    }
}
