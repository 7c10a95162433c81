//! Post management against the admin backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use postdesk_core::api::SelectedFile;
use postdesk_core::dashboard::{ActionOutcome, DashboardController, NewPostForm};
use postdesk_core::ui::{DropZoneId, EditFields};

use super::App;
use crate::views::TerminalDashboardView;

/// Flags for `posts edit`; missing values keep the stored ones.
pub struct EditArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file: Option<PathBuf>,
}

struct Dashboard {
    controller: DashboardController<TerminalDashboardView>,
    view: Arc<TerminalDashboardView>,
}

impl Dashboard {
    fn finish(&self, outcome: ActionOutcome, action: &str) -> Result<()> {
        match outcome {
            ActionOutcome::Done => Ok(()),
            ActionOutcome::Cancelled => {
                println!("Cancelled.");
                Ok(())
            }
            ActionOutcome::Busy => bail!("{action} already in progress"),
            ActionOutcome::Rejected | ActionOutcome::Failed => {
                let message = self
                    .view
                    .take_error()
                    .unwrap_or_else(|| format!("{action} failed"));
                bail!(message)
            }
        }
    }
}

async fn dashboard(app: &App) -> Result<Dashboard> {
    let guard = app.authorized_guard().await?;
    let view = Arc::new(TerminalDashboardView::new(app.yes));
    let controller = DashboardController::new(
        app.api(),
        Arc::clone(&app.store),
        guard.context(),
        Arc::clone(&view),
    );
    Ok(Dashboard { controller, view })
}

async fn read_file(path: &Path) -> Result<SelectedFile> {
    SelectedFile::from_path(path)
        .await
        .with_context(|| format!("read {}", path.display()))
}

pub async fn list(app: &App) -> Result<()> {
    let dashboard = dashboard(app).await?;
    if dashboard.controller.load_posts().await.is_some() {
        return Ok(());
    }
    let message = dashboard
        .view
        .take_error()
        .unwrap_or_else(|| "Listing posts failed".to_string());
    bail!(message)
}

pub async fn create(app: &App, title: String, excerpt: String, file: &Path) -> Result<()> {
    let selected = read_file(file).await?;
    let dashboard = dashboard(app).await?;
    dashboard
        .controller
        .pick_files(DropZoneId::New, vec![selected]);
    let outcome = dashboard
        .controller
        .create_post(&NewPostForm { title, excerpt })
        .await;
    dashboard.finish(outcome, "Upload")?;
    println!("Post created.");
    Ok(())
}

pub async fn show(app: &App, id: &str) -> Result<()> {
    let dashboard = dashboard(app).await?;
    let outcome = dashboard.controller.start_edit(Some(id)).await;
    dashboard.finish(outcome, "Fetch post")?;
    let fields = dashboard.view.edit_fields().unwrap_or_default();
    println!("Title:       {}", fields.title);
    println!("Description: {}", fields.description);
    Ok(())
}

pub async fn edit(app: &App, id: &str, args: EditArgs) -> Result<()> {
    let replacement = match &args.file {
        Some(path) => Some(read_file(path).await?),
        None => None,
    };
    let dashboard = dashboard(app).await?;
    let outcome = dashboard.controller.start_edit(Some(id)).await;
    dashboard.finish(outcome, "Fetch post")?;

    let current = dashboard.view.edit_fields().unwrap_or_default();
    let fields = EditFields {
        title: args.title.unwrap_or(current.title),
        description: args.description.unwrap_or(current.description),
    };
    if let Some(file) = replacement {
        dashboard.controller.pick_files(DropZoneId::Edit, vec![file]);
    }

    let outcome = dashboard.controller.submit_edit(&fields).await;
    dashboard.finish(outcome, "Update")?;
    println!("Post {id} updated.");
    Ok(())
}

pub async fn delete(app: &App, id: &str, title: Option<&str>) -> Result<()> {
    let dashboard = dashboard(app).await?;
    let outcome = dashboard.controller.delete_post(Some(id), title).await;
    dashboard.finish(outcome, "Delete")
}
