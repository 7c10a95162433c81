//! CLI command handlers.

pub mod auth;
pub mod carousel;
pub mod config;
pub mod contact;
pub mod posts;

use std::sync::Arc;

use anyhow::{Context, Result};
use postdesk_core::api::AdminApi;
use postdesk_core::config::{Config, paths};
use postdesk_core::identity::FirebaseIdentity;
use postdesk_core::session::{AuthOutcome, SessionGuard};
use postdesk_core::storage::ClientStore;

use crate::views::TerminalSessionView;

/// Everything a command needs: config, persisted store and flags.
pub struct App {
    pub config: Config,
    pub store: Arc<ClientStore>,
    base_url: String,
    pub yes: bool,
}

impl App {
    pub fn new(config: Config, base_url: Option<String>, yes: bool) -> Result<Self> {
        let store_path = paths::store_path();
        let store = ClientStore::open(&store_path)
            .with_context(|| format!("open client store {}", store_path.display()))?;
        let base_url = base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| config.effective_base_url());
        Ok(Self {
            config,
            store: Arc::new(store),
            base_url,
            yes,
        })
    }

    pub fn api(&self) -> AdminApi {
        AdminApi::new(&self.base_url, Arc::clone(&self.store))
    }

    pub fn identity(&self) -> Result<Arc<FirebaseIdentity>> {
        let identity = FirebaseIdentity::new(&self.config.identity, Arc::clone(&self.store))?;
        Ok(Arc::new(identity))
    }

    pub fn session_guard(&self) -> Result<Arc<SessionGuard<FirebaseIdentity, TerminalSessionView>>> {
        Ok(Arc::new(SessionGuard::new(
            self.identity()?,
            self.api(),
            Arc::clone(&self.store),
            Arc::new(TerminalSessionView::new(self.yes)),
        )))
    }

    /// Runs the session guard once and requires an authorized admin.
    pub async fn authorized_guard(
        &self,
    ) -> Result<Arc<SessionGuard<FirebaseIdentity, TerminalSessionView>>> {
        let guard = self.session_guard()?;
        let (outcome, follower) = guard.initialize().await;
        follower.abort();
        match outcome {
            AuthOutcome::Authorized => Ok(guard),
            AuthOutcome::SignedOut => anyhow::bail!("Not signed in. Run `postdesk login` first."),
            AuthOutcome::Unauthorized => anyhow::bail!("Signed-in account is not an admin."),
        }
    }
}
