//! Client core for the postdesk admin panel (session, login, dashboard, carousel).

pub mod api;
pub mod carousel;
pub mod config;
pub mod contact;
pub mod dashboard;
pub mod identity;
pub mod logging;
pub mod login;
pub mod session;
pub mod storage;
pub mod tasks;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;
