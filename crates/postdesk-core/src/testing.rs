//! Test doubles: an in-memory identity provider and recording views.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::api::PostSummary;
use crate::identity::{AuthError, AuthState, FederatedRequest, Identity, IdentityProvider, codes};
use crate::ui::{
    DashboardView, DropZoneId, EditFields, EmailSlot, LoginView, Route, SessionView, SlideDeck,
    SlideView,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct FakeIdentity {
    state: AuthState,
    accounts: Mutex<HashMap<String, (String, Identity)>>,
    popup_result: Mutex<Option<Result<Identity, AuthError>>>,
    popup_requests: Mutex<Vec<FederatedRequest>>,
    fail_sign_out: bool,
}

impl Default for FakeIdentity {
    fn default() -> Self {
        let state = AuthState::new();
        state.mark_ready();
        Self {
            state,
            accounts: Mutex::new(HashMap::new()),
            popup_result: Mutex::new(None),
            popup_requests: Mutex::new(Vec::new()),
            fail_sign_out: false,
        }
    }
}

impl FakeIdentity {
    pub fn signed_in(identity: Identity) -> Self {
        let fake = Self::default();
        fake.state.publish(Some(identity));
        fake
    }

    pub fn with_account(self, email: &str, password: &str, identity: Identity) -> Self {
        lock(&self.accounts).insert(email.to_string(), (password.to_string(), identity));
        self
    }

    pub fn with_popup_result(self, result: Result<Identity, AuthError>) -> Self {
        *lock(&self.popup_result) = Some(result);
        self
    }

    pub fn failing_sign_out(mut self) -> Self {
        self.fail_sign_out = true;
        self
    }

    pub fn popup_requests(&self) -> Vec<FederatedRequest> {
        lock(&self.popup_requests).clone()
    }
}

impl IdentityProvider for FakeIdentity {
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
        let account = lock(&self.accounts).get(email).cloned();
        match account {
            Some((expected, identity)) if expected == password => {
                self.state.publish(Some(identity.clone()));
                Ok(identity)
            }
            Some(_) => Err(AuthError::new(codes::WRONG_PASSWORD, "wrong password")),
            None => Err(AuthError::new(codes::USER_NOT_FOUND, "no such user")),
        }
    }

    async fn sign_in_with_popup(&self, request: &FederatedRequest) -> Result<Identity, AuthError> {
        lock(&self.popup_requests).push(request.clone());
        let result = lock(&self.popup_result)
            .clone()
            .unwrap_or_else(|| Err(AuthError::new(codes::POPUP_CLOSED_BY_USER, "no popup")));
        if let Ok(identity) = &result {
            self.state.publish(Some(identity.clone()));
        }
        result
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.fail_sign_out {
            return Err(AuthError::new(codes::INTERNAL_ERROR, "sign out failed"));
        }
        self.state.publish(None);
        Ok(())
    }

    async fn id_token(&self) -> Result<String, AuthError> {
        self.state
            .current()
            .map(|identity| identity.id_token)
            .ok_or_else(AuthError::no_current_user)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Alert(String),
    Navigate(Route),
    Email(EmailSlot, String),
    Confirm(String),
}

pub struct RecordingSessionView {
    events: Mutex<Vec<SessionEvent>>,
    confirm_answer: AtomicBool,
}

impl Default for RecordingSessionView {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            confirm_answer: AtomicBool::new(true),
        }
    }
}

impl RecordingSessionView {
    pub fn set_confirm(&self, answer: bool) {
        self.confirm_answer.store(answer, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        lock(&self.events).clone()
    }

    pub fn navigations(&self) -> Vec<Route> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Navigate(route) => Some(route),
                _ => None,
            })
            .collect()
    }

    pub fn last_navigation(&self) -> Option<Route> {
        self.navigations().last().copied()
    }

    pub fn emails(&self) -> Vec<(EmailSlot, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Email(slot, email) => Some((slot, email)),
                _ => None,
            })
            .collect()
    }
}

impl SessionView for RecordingSessionView {
    fn alert(&self, message: &str) {
        lock(&self.events).push(SessionEvent::Alert(message.to_string()));
    }

    fn navigate(&self, route: Route) {
        lock(&self.events).push(SessionEvent::Navigate(route));
    }

    fn set_email(&self, slot: EmailSlot, email: &str) {
        lock(&self.events).push(SessionEvent::Email(slot, email.to_string()));
    }

    fn confirm(&self, message: &str) -> bool {
        lock(&self.events).push(SessionEvent::Confirm(message.to_string()));
        self.confirm_answer.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginEvent {
    Tab(String),
    Error(String),
    ClearError,
    Label(String, String),
    Navigate(Route),
}

#[derive(Default)]
pub struct RecordingLoginView {
    events: Mutex<Vec<LoginEvent>>,
}

impl RecordingLoginView {
    /// Everything except button label changes.
    pub fn events(&self) -> Vec<LoginEvent> {
        lock(&self.events)
            .iter()
            .filter(|e| !matches!(e, LoginEvent::Label(..)))
            .cloned()
            .collect()
    }

    pub fn labels(&self) -> Vec<(String, String)> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                LoginEvent::Label(tab, label) => Some((tab.clone(), label.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<Route> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                LoginEvent::Navigate(route) => Some(*route),
                _ => None,
            })
            .collect()
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.events).iter().rev().find_map(|e| match e {
            LoginEvent::Error(message) => Some(message.clone()),
            _ => None,
        })
    }
}

impl LoginView for RecordingLoginView {
    fn activate_tab(&self, tab: &str) {
        lock(&self.events).push(LoginEvent::Tab(tab.to_string()));
    }

    fn show_error(&self, message: &str) {
        lock(&self.events).push(LoginEvent::Error(message.to_string()));
    }

    fn clear_error(&self) {
        lock(&self.events).push(LoginEvent::ClearError);
    }

    fn set_button_label(&self, tab: &str, label: &str) {
        lock(&self.events).push(LoginEvent::Label(tab.to_string(), label.to_string()));
    }

    fn navigate(&self, route: Route) {
        lock(&self.events).push(LoginEvent::Navigate(route));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    Tab(String),
    TabVisible(String, bool),
    OpenPicker(DropZoneId),
    Highlight(DropZoneId, bool),
    FileInfo(DropZoneId, String),
    ClearFileInfo(DropZoneId),
    FillEdit(EditFields),
    ClearEdit,
    ResetNew,
    Posts(usize),
    RemoveRow(String),
    Alert(String),
    Confirm(String),
    Error(String),
    Reload,
}

pub struct RecordingDashboardView {
    events: Mutex<Vec<DashboardEvent>>,
    confirm_answer: AtomicBool,
}

impl Default for RecordingDashboardView {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            confirm_answer: AtomicBool::new(true),
        }
    }
}

impl RecordingDashboardView {
    pub fn set_confirm(&self, answer: bool) {
        self.confirm_answer.store(answer, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<DashboardEvent> {
        lock(&self.events).clone()
    }

    pub fn contains(&self, event: &DashboardEvent) -> bool {
        lock(&self.events).contains(event)
    }

    pub fn reloads(&self) -> usize {
        lock(&self.events)
            .iter()
            .filter(|e| matches!(e, DashboardEvent::Reload))
            .count()
    }

    fn push(&self, event: DashboardEvent) {
        lock(&self.events).push(event);
    }
}

impl DashboardView for RecordingDashboardView {
    fn activate_tab(&self, tab: &str) {
        self.push(DashboardEvent::Tab(tab.to_string()));
    }

    fn set_tab_visible(&self, tab: &str, visible: bool) {
        self.push(DashboardEvent::TabVisible(tab.to_string(), visible));
    }

    fn open_file_picker(&self, zone: DropZoneId) {
        self.push(DashboardEvent::OpenPicker(zone));
    }

    fn set_drop_highlight(&self, zone: DropZoneId, highlighted: bool) {
        self.push(DashboardEvent::Highlight(zone, highlighted));
    }

    fn show_file_info(&self, zone: DropZoneId, label: &str) {
        self.push(DashboardEvent::FileInfo(zone, label.to_string()));
    }

    fn clear_file_info(&self, zone: DropZoneId) {
        self.push(DashboardEvent::ClearFileInfo(zone));
    }

    fn fill_edit_form(&self, fields: &EditFields) {
        self.push(DashboardEvent::FillEdit(fields.clone()));
    }

    fn clear_edit_form(&self) {
        self.push(DashboardEvent::ClearEdit);
    }

    fn reset_new_form(&self) {
        self.push(DashboardEvent::ResetNew);
    }

    fn show_posts(&self, posts: &[PostSummary]) {
        self.push(DashboardEvent::Posts(posts.len()));
    }

    fn remove_row(&self, id: &str) {
        self.push(DashboardEvent::RemoveRow(id.to_string()));
    }

    fn alert(&self, message: &str) {
        self.push(DashboardEvent::Alert(message.to_string()));
    }

    fn confirm(&self, message: &str) -> bool {
        self.push(DashboardEvent::Confirm(message.to_string()));
        self.confirm_answer.load(Ordering::SeqCst)
    }

    fn show_error(&self, message: &str) {
        self.push(DashboardEvent::Error(message.to_string()));
    }

    fn reload(&self) {
        self.push(DashboardEvent::Reload);
    }
}

#[derive(Default)]
pub struct RecordingSlideView {
    frames: Mutex<Vec<SlideDeck>>,
}

impl RecordingSlideView {
    pub fn frames(&self) -> Vec<SlideDeck> {
        lock(&self.frames).clone()
    }

    pub fn last(&self) -> Option<SlideDeck> {
        lock(&self.frames).last().cloned()
    }
}

impl SlideView for RecordingSlideView {
    fn render(&self, deck: &SlideDeck) {
        lock(&self.frames).push(deck.clone());
    }
}
