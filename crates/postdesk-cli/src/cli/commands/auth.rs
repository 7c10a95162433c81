//! Login, logout and whoami.

use std::sync::Arc;

use anyhow::{Result, bail};
use postdesk_core::identity::IdentityProvider;
use postdesk_core::login::{LoginController, LoginOutcome, LoginTab};
use postdesk_core::session::AuthOutcome;

use super::App;
use crate::views::TerminalLoginView;

pub async fn login(
    app: &App,
    email: Option<String>,
    password: Option<String>,
    google: bool,
) -> Result<()> {
    let identity = app.identity()?;
    let controller = LoginController::new(
        Arc::clone(&identity),
        app.api(),
        Arc::clone(&app.store),
        Arc::new(TerminalLoginView),
    );

    if controller.initialize().await == Some(LoginOutcome::Authorized) {
        let email = identity.current_user().map(|u| u.email).unwrap_or_default();
        println!("Already signed in as {email}");
        return Ok(());
    }

    let outcome = if google {
        controller.switch_tab(LoginTab::Federated);
        controller.submit_federated().await
    } else {
        let (Some(email), Some(password)) = (email, password) else {
            bail!("Please specify --email and --password, or --google");
        };
        controller.switch_tab(LoginTab::Email);
        controller.submit_email(&email, &password).await
    };

    match outcome {
        LoginOutcome::Authorized => {
            let email = identity.current_user().map(|u| u.email).unwrap_or_default();
            println!("Signed in as {email}");
            Ok(())
        }
        LoginOutcome::NotAuthorized => bail!("Account is not authorized for the admin area"),
        LoginOutcome::Invalid | LoginOutcome::Failed => bail!("Sign-in failed"),
        LoginOutcome::Busy => bail!("A sign-in is already in progress"),
    }
}

pub async fn logout(app: &App) -> Result<()> {
    let guard = app.session_guard()?;
    if guard.logout().await {
        println!("Signed out.");
    } else {
        println!("Cancelled.");
    }
    Ok(())
}

pub async fn whoami(app: &App) -> Result<()> {
    let guard = app.session_guard()?;
    let (outcome, follower) = guard.initialize().await;
    follower.abort();
    match outcome {
        AuthOutcome::Authorized => {
            let email = guard.context().email().unwrap_or_default();
            println!("{email}");
            Ok(())
        }
        AuthOutcome::SignedOut => bail!("Not signed in. Run `postdesk login` first."),
        AuthOutcome::Unauthorized => bail!("Signed-in account is not an admin."),
    }
}
