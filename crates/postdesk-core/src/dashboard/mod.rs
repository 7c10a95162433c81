//! Dashboard controller: tabs, drop zones and post CRUD.
//!
//! Actions read the bearer token from the session context, falling back to
//! the persisted store value, and report failures through the view.

mod posts;
mod tabs;
mod upload;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use posts::NewPostForm;
pub use tabs::DashboardTab;

use crate::api::{AdminApi, ApiError, NETWORK_ERROR_MESSAGE, SelectedFile};
use crate::session::SessionContext;
use crate::storage::{ClientStore, TOKEN_KEY};
use crate::tasks::Tasks;
use crate::ui::{DashboardView, DropZoneId};

pub const NO_POST_ID_MESSAGE: &str = "No post ID found.";
pub const NOT_SIGNED_IN_MESSAGE: &str = "You are not signed in.";

/// What happened to a dashboard action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Done,
    /// The user declined the confirmation prompt.
    Cancelled,
    /// Blocked before any request (validation, missing id or token).
    Rejected,
    /// The backend or network call failed; the view was told.
    Failed,
    /// Same action already in flight.
    Busy,
}

#[derive(Debug)]
struct DashboardState {
    active_tab: DashboardTab,
    edit_visible: bool,
    editing_id: Option<String>,
    files: HashMap<DropZoneId, SelectedFile>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            active_tab: DashboardTab::Posts,
            edit_visible: false,
            editing_id: None,
            files: HashMap::new(),
        }
    }
}

pub struct DashboardController<V> {
    api: AdminApi,
    store: Arc<ClientStore>,
    context: Arc<SessionContext>,
    view: Arc<V>,
    tasks: Tasks,
    state: Mutex<DashboardState>,
}

impl<V: DashboardView> DashboardController<V> {
    pub fn new(
        api: AdminApi,
        store: Arc<ClientStore>,
        context: Arc<SessionContext>,
        view: Arc<V>,
    ) -> Self {
        Self {
            api,
            store,
            context,
            view,
            tasks: Tasks::new(),
            state: Mutex::new(DashboardState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Id of the post being edited, if any.
    pub fn editing_id(&self) -> Option<String> {
        self.state().editing_id.clone()
    }

    fn bearer_token(&self) -> Option<String> {
        self.context
            .token()
            .or_else(|| self.store.get_item(TOKEN_KEY))
            .filter(|token| !token.is_empty())
    }

    /// Token for an action, alerting when there is none.
    fn require_token(&self) -> Option<String> {
        let token = self.bearer_token();
        if token.is_none() {
            self.view.alert(NOT_SIGNED_IN_MESSAGE);
        }
        token
    }

    fn report(&self, action: &str, err: &ApiError) {
        if err.is_network() {
            tracing::error!("{action} error: {err}");
            self.view.show_error(NETWORK_ERROR_MESSAGE);
        } else {
            tracing::warn!("{action} failed: {err}");
            self.view.show_error(&err.user_message());
        }
    }
}
