//! Identity provider capability.
//!
//! Controllers talk to the provider only through [`IdentityProvider`]. The
//! production adapter is [`FirebaseIdentity`]; tests substitute a double.
//!
//! ## Auth-state contract
//!
//! - `ready()` resolves once the provider has restored any persisted session.
//!   It returns immediately if readiness was already signalled.
//! - `subscribe()` yields a `watch` receiver. The value currently held is the
//!   signed-in identity (or `None`); every sign-in/sign-out publishes a new one.
//! - `id_token()` returns a fresh bearer token for the current identity.

pub mod firebase;
pub mod popup;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub use firebase::FirebaseIdentity;
pub use popup::GooglePopup;

/// Provider error codes understood by the login error table.
pub mod codes {
    pub const INVALID_EMAIL: &str = "auth/invalid-email";
    pub const USER_DISABLED: &str = "auth/user-disabled";
    pub const USER_NOT_FOUND: &str = "auth/user-not-found";
    pub const WRONG_PASSWORD: &str = "auth/wrong-password";
    pub const INVALID_CREDENTIAL: &str = "auth/invalid-credential";
    pub const TOO_MANY_REQUESTS: &str = "auth/too-many-requests";
    pub const POPUP_CLOSED_BY_USER: &str = "auth/popup-closed-by-user";
    pub const POPUP_BLOCKED: &str = "auth/popup-blocked";
    pub const CANCELLED_POPUP_REQUEST: &str = "auth/cancelled-popup-request";
    pub const NETWORK_REQUEST_FAILED: &str = "auth/network-request-failed";
    pub const NO_CURRENT_USER: &str = "auth/no-current-user";
    pub const OPERATION_NOT_ALLOWED: &str = "auth/operation-not-allowed";
    pub const INTERNAL_ERROR: &str = "auth/internal-error";
}

/// A signed-in identity as reported by the provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub(crate) id_token: String,
    pub(crate) refresh_token: String,
    /// Expiry of `id_token` in milliseconds since epoch
    pub(crate) expires_at: u64,
}

impl Identity {
    pub fn new(
        uid: impl Into<String>,
        email: impl Into<String>,
        id_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: u64,
    ) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            id_token: id_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }
}

// Tokens stay out of debug output.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Provider failure with a stable `auth/*` code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError {
    pub code: String,
    pub message: String,
}

impl AuthError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(codes::NETWORK_REQUEST_FAILED, message)
    }

    pub fn no_current_user() -> Self {
        Self::new(codes::NO_CURRENT_USER, "No user is signed in")
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for AuthError {}

/// Federated sign-in request (provider id plus OAuth scopes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedRequest {
    pub provider_id: String,
    pub scopes: Vec<String>,
}

impl FederatedRequest {
    pub const GOOGLE: &str = "google.com";

    pub fn google() -> Self {
        Self {
            provider_id: Self::GOOGLE.to_string(),
            scopes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: &str) -> Self {
        if !self.scopes.iter().any(|s| s == scope) {
            self.scopes.push(scope.to_string());
        }
        self
    }
}

/// Capability interface over the identity SDK.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Resolves once the provider is ready.
    fn ready(&self) -> impl Future<Output = ()> + Send;

    /// Subscribes to sign-in/sign-out transitions.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    /// Returns the identity currently signed in, if any.
    fn current_user(&self) -> Option<Identity>;

    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    fn sign_in_with_popup(
        &self,
        request: &FederatedRequest,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    /// Revokes the local provider session and publishes `None`.
    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Returns a fresh id token for the current identity.
    fn id_token(&self) -> impl Future<Output = Result<String, AuthError>> + Send;
}

/// Readiness flag plus the published identity, shared by provider implementations.
#[derive(Debug)]
pub struct AuthState {
    user: watch::Sender<Option<Identity>>,
    ready: watch::Sender<bool>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthState {
    pub fn new() -> Self {
        let (user, _) = watch::channel(None);
        let (ready, _) = watch::channel(false);
        Self { user, ready }
    }

    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.user.subscribe()
    }

    pub fn current(&self) -> Option<Identity> {
        self.user.borrow().clone()
    }

    /// Publishes a new identity (or `None`) to every subscriber.
    pub fn publish(&self, identity: Option<Identity>) {
        self.user.send_replace(identity);
    }

    /// Swaps in refreshed tokens for the same session without notifying subscribers.
    ///
    /// Only applies while the session that held `previous_refresh` is still
    /// current; `commit` runs under the channel lock right before the swap.
    /// Returns `Ok(false)` when the session was signed out or replaced meanwhile.
    pub fn refresh_silently<E>(
        &self,
        identity: Identity,
        previous_refresh: &str,
        commit: impl FnOnce(&Identity) -> Result<(), E>,
    ) -> Result<bool, E> {
        let mut outcome = Ok(false);
        self.user.send_if_modified(|current| {
            let same_session = current
                .as_ref()
                .is_some_and(|c| c.uid == identity.uid && c.refresh_token == previous_refresh);
            if same_session {
                outcome = commit(&identity).map(|()| true);
                if matches!(outcome, Ok(true)) {
                    *current = Some(identity);
                }
            }
            false
        });
        outcome
    }
}
