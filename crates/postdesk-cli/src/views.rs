//! Terminal implementations of the core view ports.

use std::io::{self, BufRead, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use comfy_table::{ContentArrangement, Table};
use postdesk_core::api::PostSummary;
use postdesk_core::ui::{
    DashboardView, DropZoneId, EditFields, EmailSlot, LoginView, Route, SessionView, SlideClass,
    SlideDeck, SlideView,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// y/N prompt on stderr. `assume_yes` skips the prompt; EOF means no.
pub fn confirm(assume_yes: bool, message: &str) -> bool {
    if assume_yes {
        return true;
    }
    eprint!("{message} [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(0) | Err(_) => false,
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
    }
}

pub struct TerminalSessionView {
    yes: bool,
}

impl TerminalSessionView {
    pub fn new(yes: bool) -> Self {
        Self { yes }
    }
}

impl SessionView for TerminalSessionView {
    fn alert(&self, message: &str) {
        eprintln!("{message}");
    }

    fn navigate(&self, route: Route) {
        tracing::debug!(%route, "navigate");
    }

    fn set_email(&self, slot: EmailSlot, email: &str) {
        tracing::debug!(?slot, email, "email shown");
    }

    fn confirm(&self, message: &str) -> bool {
        confirm(self.yes, message)
    }
}

pub struct TerminalLoginView;

impl LoginView for TerminalLoginView {
    fn activate_tab(&self, tab: &str) {
        tracing::debug!(tab, "login tab");
    }

    fn show_error(&self, message: &str) {
        eprintln!("{message}");
    }

    fn clear_error(&self) {}

    fn set_button_label(&self, tab: &str, label: &str) {
        tracing::trace!(tab, label, "button label");
    }

    fn navigate(&self, route: Route) {
        tracing::debug!(%route, "navigate");
    }
}

/// Dashboard surface. Errors are kept so the command can fail with them.
pub struct TerminalDashboardView {
    yes: bool,
    edit_fields: Mutex<Option<EditFields>>,
    last_error: Mutex<Option<String>>,
}

impl TerminalDashboardView {
    pub fn new(yes: bool) -> Self {
        Self {
            yes,
            edit_fields: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Values loaded into the edit form.
    pub fn edit_fields(&self) -> Option<EditFields> {
        lock(&self.edit_fields).clone()
    }

    pub fn take_error(&self) -> Option<String> {
        lock(&self.last_error).take()
    }

    fn record_error(&self, message: &str) {
        *lock(&self.last_error) = Some(message.to_string());
    }
}

fn print_posts(posts: &[PostSummary]) {
    if posts.is_empty() {
        println!("No posts.");
        return;
    }
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(["ID", "TITLE", "AUTHOR", "CREATED"]);
    for post in posts {
        table.add_row([
            post.id.to_string(),
            post.title.clone(),
            post.author.clone(),
            post.created_date(),
        ]);
    }
    println!("{table}");
}

impl DashboardView for TerminalDashboardView {
    fn activate_tab(&self, tab: &str) {
        tracing::debug!(tab, "dashboard tab");
    }

    fn set_tab_visible(&self, tab: &str, visible: bool) {
        tracing::trace!(tab, visible, "tab visibility");
    }

    fn open_file_picker(&self, zone: DropZoneId) {
        tracing::debug!(zone = zone.as_str(), "file picker requested");
    }

    fn set_drop_highlight(&self, _zone: DropZoneId, _highlighted: bool) {}

    fn show_file_info(&self, _zone: DropZoneId, label: &str) {
        eprintln!("{label}");
    }

    fn clear_file_info(&self, _zone: DropZoneId) {}

    fn fill_edit_form(&self, fields: &EditFields) {
        *lock(&self.edit_fields) = Some(fields.clone());
    }

    fn clear_edit_form(&self) {
        *lock(&self.edit_fields) = None;
    }

    fn reset_new_form(&self) {}

    fn show_posts(&self, posts: &[PostSummary]) {
        print_posts(posts);
    }

    fn remove_row(&self, id: &str) {
        println!("Deleted post {id}");
    }

    fn alert(&self, message: &str) {
        self.record_error(message);
    }

    fn confirm(&self, message: &str) -> bool {
        confirm(self.yes, message)
    }

    fn show_error(&self, message: &str) {
        self.record_error(message);
    }

    fn reload(&self) {
        tracing::debug!("dashboard reload");
    }
}

/// Prints the dot strip with the active caption whenever the deck is at rest.
pub struct TerminalSlideView {
    captions: Vec<String>,
}

impl TerminalSlideView {
    pub fn new(captions: Vec<String>) -> Self {
        Self { captions }
    }
}

fn at_rest(deck: &SlideDeck) -> bool {
    deck.slides
        .iter()
        .all(|s| !s.has(SlideClass::SlideOutLeft) && !s.has(SlideClass::SlideInRight))
}

impl SlideView for TerminalSlideView {
    fn render(&self, deck: &SlideDeck) {
        if !at_rest(deck) {
            return;
        }
        let Some(active) = deck.active_index() else {
            return;
        };
        let dots: String = (0..deck.len())
            .map(|i| if i == deck.active_dot { '●' } else { '○' })
            .collect();
        let caption = self
            .captions
            .get(active)
            .cloned()
            .unwrap_or_else(|| format!("Slide {}", active + 1));
        println!("{dots}  {caption}");
    }
}
