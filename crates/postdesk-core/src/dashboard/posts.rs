//! Post listing, create, edit and delete.

use super::{ActionOutcome, DashboardController, DashboardTab, NO_POST_ID_MESSAGE};
use crate::api::{PostSummary, PostUpdate, UploadForm};
use crate::tasks::TaskKind;
use crate::ui::{DashboardView, DropZoneId, EditFields};

pub const MISSING_TITLE_MESSAGE: &str = "Please enter a title.";
pub const MISSING_FILE_MESSAGE: &str = "Please select an HTML file to upload.";

/// New-post form values; the file comes from the `new` drop zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPostForm {
    pub title: String,
    pub excerpt: String,
}

fn delete_prompt(title: Option<&str>) -> String {
    let title = title.map(str::trim).filter(|t| !t.is_empty()).unwrap_or("this post");
    format!("Are you sure you want to delete \"{title}\"? This action cannot be undone.")
}

fn present_id(id: Option<&str>) -> Option<&str> {
    id.map(str::trim).filter(|id| !id.is_empty())
}

impl<V: DashboardView> DashboardController<V> {
    /// Loads the post table.
    pub async fn load_posts(&self) -> Option<Vec<PostSummary>> {
        let token = self.require_token()?;
        let _task = self.tasks.try_start(TaskKind::PostList)?;
        match self.api.list_posts(&token).await {
            Ok(posts) => {
                self.view.show_posts(&posts);
                Some(posts)
            }
            Err(e) => {
                self.report("List posts", &e);
                None
            }
        }
    }

    pub async fn create_post(&self, form: &NewPostForm) -> ActionOutcome {
        if form.title.trim().is_empty() {
            self.view.show_error(MISSING_TITLE_MESSAGE);
            return ActionOutcome::Rejected;
        }
        let Some(file) = self.selected_file(DropZoneId::New) else {
            self.view.show_error(MISSING_FILE_MESSAGE);
            return ActionOutcome::Rejected;
        };
        let Some(token) = self.require_token() else {
            return ActionOutcome::Rejected;
        };
        let Some(_task) = self.tasks.try_start(TaskKind::PostCreate) else {
            return ActionOutcome::Busy;
        };

        let upload = UploadForm {
            title: form.title.clone(),
            excerpt: form.excerpt.clone(),
            file,
            edit_id: None,
        };
        match self.api.upload_post(&token, upload).await {
            Ok(()) => {
                self.view.reset_new_form();
                self.clear_file(DropZoneId::New);
                self.view.reload();
                ActionOutcome::Done
            }
            Err(e) => {
                self.report("Upload", &e);
                ActionOutcome::Failed
            }
        }
    }

    /// Fetches a post, fills the edit form and reveals the edit tab.
    pub async fn start_edit(&self, id: Option<&str>) -> ActionOutcome {
        let Some(id) = present_id(id) else {
            self.view.alert(NO_POST_ID_MESSAGE);
            return ActionOutcome::Rejected;
        };
        let Some(token) = self.require_token() else {
            return ActionOutcome::Rejected;
        };
        let Some(_task) = self.tasks.try_start(TaskKind::PostEditFetch) else {
            return ActionOutcome::Busy;
        };

        match self.api.get_post(&token, id).await {
            Ok(post) => {
                self.view.fill_edit_form(&EditFields {
                    title: post.title,
                    description: post.description,
                });
                self.state().editing_id = Some(id.to_string());
                self.set_edit_tab_visible(true);
                self.switch_tab(DashboardTab::Edit);
                ActionOutcome::Done
            }
            Err(e) => {
                self.report("Fetch post", &e);
                ActionOutcome::Failed
            }
        }
    }

    /// Submits the edit form. A replacement file goes through the upload
    /// endpoint; otherwise only `{title, description}` is PUT.
    pub async fn submit_edit(&self, fields: &EditFields) -> ActionOutcome {
        let Some(id) = self.editing_id() else {
            self.view.alert(NO_POST_ID_MESSAGE);
            return ActionOutcome::Rejected;
        };
        let Some(token) = self.require_token() else {
            return ActionOutcome::Rejected;
        };
        let Some(_task) = self.tasks.try_start(TaskKind::PostEditSubmit) else {
            return ActionOutcome::Busy;
        };

        let replacement = self.selected_file(DropZoneId::Edit);
        let result = match replacement {
            Some(file) => {
                let upload = UploadForm {
                    title: fields.title.clone(),
                    excerpt: fields.description.clone(),
                    file,
                    edit_id: Some(id.clone()),
                };
                self.api.upload_post(&token, upload).await
            }
            None => {
                let update = PostUpdate {
                    title: fields.title.clone(),
                    description: fields.description.clone(),
                };
                self.api.update_post(&token, &id, &update).await
            }
        };

        match result {
            Ok(()) => {
                self.cancel_edit();
                self.view.reload();
                ActionOutcome::Done
            }
            Err(e) => {
                self.report("Update", &e);
                ActionOutcome::Failed
            }
        }
    }

    /// Clears the edit form, hides the edit tab and returns to posts.
    pub fn cancel_edit(&self) {
        self.view.clear_edit_form();
        self.clear_file(DropZoneId::Edit);
        self.state().editing_id = None;
        self.set_edit_tab_visible(false);
        self.switch_tab(DashboardTab::Posts);
    }

    /// Confirms, deletes, and removes the row in place on success.
    pub async fn delete_post(&self, id: Option<&str>, title: Option<&str>) -> ActionOutcome {
        let Some(id) = present_id(id) else {
            self.view.alert(NO_POST_ID_MESSAGE);
            return ActionOutcome::Rejected;
        };
        if !self.view.confirm(&delete_prompt(title)) {
            return ActionOutcome::Cancelled;
        }
        let Some(token) = self.require_token() else {
            return ActionOutcome::Rejected;
        };
        let Some(_task) = self.tasks.try_start(TaskKind::PostDelete) else {
            return ActionOutcome::Busy;
        };

        match self.api.delete_post(&token, id).await {
            Ok(()) => {
                self.view.remove_row(id);
                ActionOutcome::Done
            }
            Err(e) => {
                self.report("Delete", &e);
                ActionOutcome::Failed
            }
        }
    }
}
