//! View ports.
//!
//! Controllers never touch a concrete front-end. Each one drives a small
//! trait that the embedding surface implements (the terminal front-end in
//! `postdesk-cli`, recording doubles in tests).

use std::fmt;

use crate::api::PostSummary;

/// Navigation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/admin/login",
            Route::Dashboard => "/admin/dashboard",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Places the signed-in email is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSlot {
    Header,
    Settings,
}

impl EmailSlot {
    pub const ALL: [EmailSlot; 2] = [EmailSlot::Header, EmailSlot::Settings];
}

/// Surface used by the session guard.
pub trait SessionView: Send + Sync + 'static {
    fn alert(&self, message: &str);
    fn navigate(&self, route: Route);
    fn set_email(&self, slot: EmailSlot, email: &str);
    /// Yes/no prompt; `false` means cancelled.
    fn confirm(&self, message: &str) -> bool;
}

/// Surface used by the login controller.
pub trait LoginView: Send + Sync + 'static {
    fn activate_tab(&self, tab: &str);
    fn show_error(&self, message: &str);
    fn clear_error(&self);
    /// Sets the submit button text of `tab`.
    fn set_button_label(&self, tab: &str, label: &str);
    fn navigate(&self, route: Route);
}

/// Upload context a drop zone belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropZoneId {
    New,
    Edit,
}

impl DropZoneId {
    pub fn as_str(self) -> &'static str {
        match self {
            DropZoneId::New => "new",
            DropZoneId::Edit => "edit",
        }
    }
}

/// Edit form field values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditFields {
    pub title: String,
    pub description: String,
}

/// Surface used by the dashboard controller.
pub trait DashboardView: Send + Sync + 'static {
    fn activate_tab(&self, tab: &str);
    fn set_tab_visible(&self, tab: &str, visible: bool);
    fn open_file_picker(&self, zone: DropZoneId);
    fn set_drop_highlight(&self, zone: DropZoneId, highlighted: bool);
    fn show_file_info(&self, zone: DropZoneId, label: &str);
    fn clear_file_info(&self, zone: DropZoneId);
    fn fill_edit_form(&self, fields: &EditFields);
    fn clear_edit_form(&self);
    fn reset_new_form(&self);
    fn show_posts(&self, posts: &[PostSummary]);
    fn remove_row(&self, id: &str);
    fn alert(&self, message: &str);
    fn confirm(&self, message: &str) -> bool;
    fn show_error(&self, message: &str);
    fn reload(&self);
}

/// Surface used by the carousel: one call per visual step.
pub trait SlideView: Send + Sync + 'static {
    fn render(&self, deck: &SlideDeck);
}

/// Animation class a slide can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideClass {
    Active,
    SlideOutLeft,
    SlideInRight,
}

impl SlideClass {
    pub fn as_str(self) -> &'static str {
        match self {
            SlideClass::Active => "active",
            SlideClass::SlideOutLeft => "slide-out-left",
            SlideClass::SlideInRight => "slide-in-right",
        }
    }
}

/// Horizontal resting position of a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offset {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub classes: Vec<SlideClass>,
    pub offset: Offset,
}

impl Slide {
    pub fn has(&self, class: SlideClass) -> bool {
        self.classes.contains(&class)
    }

    fn add(&mut self, class: SlideClass) {
        if !self.has(class) {
            self.classes.push(class);
        }
    }

    fn remove(&mut self, class: SlideClass) {
        self.classes.retain(|c| *c != class);
    }
}

/// Render model of the carousel: slides with classes plus the dot strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideDeck {
    pub slides: Vec<Slide>,
    pub active_dot: usize,
}

impl SlideDeck {
    /// Slide 0 and dot 0 active, the rest parked right.
    pub fn new(count: usize) -> Self {
        let slides = (0..count)
            .map(|i| Slide {
                classes: if i == 0 { vec![SlideClass::Active] } else { Vec::new() },
                offset: if i == 0 { Offset::Center } else { Offset::Right },
            })
            .collect();
        Self {
            slides,
            active_dot: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.slides.iter().position(|s| s.has(SlideClass::Active))
    }

    /// Marks the outgoing and incoming slides; dots follow the target at once.
    pub fn begin(&mut self, current: usize, target: usize, forward: bool) {
        for slide in &mut self.slides {
            slide.remove(SlideClass::SlideOutLeft);
            slide.remove(SlideClass::SlideInRight);
        }
        if forward {
            self.slides[current].add(SlideClass::SlideOutLeft);
            self.slides[target].add(SlideClass::SlideInRight);
            self.slides[target].offset = Offset::Right;
        } else {
            self.slides[current].offset = Offset::Right;
            self.slides[target].offset = Offset::Left;
        }
        self.slides[current].remove(SlideClass::Active);
        self.active_dot = target;
    }

    /// Settle step: the target becomes active.
    pub fn settle(&mut self, target: usize) {
        let slide = &mut self.slides[target];
        slide.remove(SlideClass::SlideInRight);
        slide.add(SlideClass::Active);
        slide.offset = Offset::Center;
    }

    /// Drops animation classes from non-active slides and parks them right.
    pub fn cleanup(&mut self) {
        for slide in self.slides.iter_mut().filter(|s| !s.has(SlideClass::Active)) {
            slide.classes.clear();
            slide.offset = Offset::Right;
        }
    }
}
