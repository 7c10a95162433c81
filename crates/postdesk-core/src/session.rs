//! Session guard for the admin area.
//!
//! "Signed in" (the provider reports an identity) and "authorized" (the
//! backend accepted the identity's token) are separate, sequential gates.
//! [`SessionContext`] holds both; [`SessionGuard`] drives the transitions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::api::AdminApi;
use crate::identity::{Identity, IdentityProvider};
use crate::storage::{ClientStore, TOKEN_KEY, admin_token_cookie, clear_admin_token_cookie};
use crate::tasks::{TaskKind, Tasks};
use crate::ui::{EmailSlot, Route, SessionView};

pub const NOT_AUTHORIZED_MESSAGE: &str = "You are not authorized to access the admin area.";
pub const LOGOUT_CONFIRM_MESSAGE: &str = "Are you sure you want to logout?";

#[derive(Debug, Default)]
struct SessionInner {
    identity: Option<Identity>,
    token: Option<String>,
    authorized: bool,
}

/// Current session: identity, bearer token and authorization flag.
#[derive(Debug, Default)]
pub struct SessionContext {
    inner: Mutex<SessionInner>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with a previously persisted token.
    pub fn with_token(token: Option<String>) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                token,
                ..SessionInner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    pub fn email(&self) -> Option<String> {
        self.lock().identity.as_ref().map(|i| i.email.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn is_authorized(&self) -> bool {
        self.lock().authorized
    }

    /// Records a signed-in identity. Authorization resets until re-checked.
    pub fn set_signed_in(&self, identity: Identity, token: String) {
        let mut inner = self.lock();
        inner.identity = Some(identity);
        inner.token = Some(token);
        inner.authorized = false;
    }

    /// Sets the authorization flag; refuses without a signed-in identity.
    pub fn mark_authorized(&self) -> bool {
        let mut inner = self.lock();
        if inner.identity.is_none() {
            return false;
        }
        inner.authorized = true;
        true
    }

    pub fn clear(&self) {
        *self.lock() = SessionInner::default();
    }
}

/// Result of handling one auth-state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    SignedOut,
    Authorized,
    Unauthorized,
}

/// Writes the token to the store key and cookie. Failures are logged only.
pub(crate) fn persist_admin_token(store: &ClientStore, token: &str) {
    if let Err(e) = store.set_item(TOKEN_KEY, token) {
        tracing::error!("Failed to persist admin token: {e:#}");
    }
    if let Err(e) = store.set_cookie(&admin_token_cookie(token)) {
        tracing::error!("Failed to write admin token cookie: {e:#}");
    }
}

/// Removes the token from the store key and cookie.
pub(crate) fn clear_admin_token(store: &ClientStore) {
    if let Err(e) = store.remove_item(TOKEN_KEY) {
        tracing::error!("Failed to remove admin token: {e:#}");
    }
    if let Err(e) = store.set_cookie(&clear_admin_token_cookie()) {
        tracing::error!("Failed to clear admin token cookie: {e:#}");
    }
}

/// Runs the backend authorization check for `email`. Fails closed.
pub(crate) async fn check_authorized<P: IdentityProvider>(
    provider: &P,
    api: &AdminApi,
    email: &str,
) -> bool {
    let token = match provider.id_token().await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!("Cannot get token for authorization check: {e}");
            return false;
        }
    };
    match api.verify(&token, email).await {
        Ok(()) => true,
        Err(e) if e.is_network() => {
            tracing::error!("Admin verification error: {e}");
            false
        }
        Err(e) => {
            tracing::warn!("Admin verification rejected: {e}");
            false
        }
    }
}

/// Gatekeeper for the dashboard.
pub struct SessionGuard<P, V> {
    provider: Arc<P>,
    api: AdminApi,
    store: Arc<ClientStore>,
    view: Arc<V>,
    context: Arc<SessionContext>,
    tasks: Tasks,
}

impl<P: IdentityProvider, V: SessionView> SessionGuard<P, V> {
    pub fn new(provider: Arc<P>, api: AdminApi, store: Arc<ClientStore>, view: Arc<V>) -> Self {
        let context = Arc::new(SessionContext::with_token(store.get_item(TOKEN_KEY)));
        Self {
            provider,
            api,
            store,
            view,
            context,
            tasks: Tasks::new(),
        }
    }

    pub fn context(&self) -> Arc<SessionContext> {
        Arc::clone(&self.context)
    }

    /// Waits for the provider, handles the current auth state, then keeps
    /// following changes on a background task.
    ///
    /// Returns the outcome for the current state and the follower task.
    pub async fn initialize(self: &Arc<Self>) -> (AuthOutcome, JoinHandle<()>) {
        self.provider.ready().await;
        let mut rx = self.provider.subscribe();
        let current = rx.borrow_and_update().clone();
        let outcome = self.handle_auth_state(current).await;

        let guard = Arc::clone(self);
        let follower = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                guard.handle_auth_state(state).await;
            }
        });
        (outcome, follower)
    }

    pub async fn handle_auth_state(&self, state: Option<Identity>) -> AuthOutcome {
        match state {
            Some(identity) => self.on_sign_in(identity).await,
            None => {
                self.on_sign_out();
                AuthOutcome::SignedOut
            }
        }
    }

    async fn on_sign_in(&self, identity: Identity) -> AuthOutcome {
        let token = match self.provider.id_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Failed to get id token: {e}");
                self.view.alert(NOT_AUTHORIZED_MESSAGE);
                self.sign_out().await;
                return AuthOutcome::Unauthorized;
            }
        };
        persist_admin_token(&self.store, &token);

        let email = identity.email.clone();
        self.context.set_signed_in(identity, token);
        for slot in EmailSlot::ALL {
            self.view.set_email(slot, &email);
        }

        if self.authorize(&email).await {
            self.context.mark_authorized();
            tracing::debug!("admin session authorized");
            AuthOutcome::Authorized
        } else {
            self.view.alert(NOT_AUTHORIZED_MESSAGE);
            self.sign_out().await;
            AuthOutcome::Unauthorized
        }
    }

    /// Backend authorization check for `email`.
    pub async fn authorize(&self, email: &str) -> bool {
        check_authorized(self.provider.as_ref(), &self.api, email).await
    }

    /// Revokes the provider session and clears local state even if the
    /// provider call fails.
    pub async fn sign_out(&self) {
        if let Err(e) = self.provider.sign_out().await {
            tracing::error!("Sign out error: {e}");
        }
        self.context.clear();
        clear_admin_token(&self.store);
        self.view.navigate(Route::Login);
    }

    fn on_sign_out(&self) {
        self.context.clear();
        if let Err(e) = self.store.remove_item(TOKEN_KEY) {
            tracing::error!("Failed to remove admin token: {e:#}");
        }
        self.view.navigate(Route::Login);
    }

    /// Logout button: confirm, then sign out. Returns whether it happened.
    ///
    /// A second press while one logout is still running is ignored.
    pub async fn logout(&self) -> bool {
        let Some(_task) = self.tasks.try_start(TaskKind::Logout) else {
            tracing::debug!("logout already in progress");
            return false;
        };
        if !self.view.confirm(LOGOUT_CONFIRM_MESSAGE) {
            return false;
        }
        self.sign_out().await;
        true
    }
}
