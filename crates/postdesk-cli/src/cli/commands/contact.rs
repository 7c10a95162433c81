//! Public contact form.

use anyhow::Result;
use postdesk_core::contact::{ContactForm, ContactMessage};

use super::App;

pub async fn send(app: &App, message: &ContactMessage, turnstile_token: Option<&str>) -> Result<()> {
    let form = ContactForm::new(app.api());
    if let Some(token) = turnstile_token {
        form.gate().on_token(token);
    }
    form.submit(message).await?;
    println!("Message sent.");
    Ok(())
}
