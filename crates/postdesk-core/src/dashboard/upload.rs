//! Drop zones for the new-post and edit-post forms.

use super::DashboardController;
use crate::api::SelectedFile;
use crate::ui::{DashboardView, DropZoneId};

impl<V: DashboardView> DashboardController<V> {
    /// Click on the zone opens the native picker.
    pub fn click_drop_zone(&self, zone: DropZoneId) {
        self.view.open_file_picker(zone);
    }

    pub fn drag_over(&self, zone: DropZoneId) {
        self.view.set_drop_highlight(zone, true);
    }

    pub fn drag_leave(&self, zone: DropZoneId) {
        self.view.set_drop_highlight(zone, false);
    }

    /// Drop: clear the highlight and take the first file.
    pub fn drop_files(&self, zone: DropZoneId, files: Vec<SelectedFile>) {
        self.view.set_drop_highlight(zone, false);
        self.pick_files(zone, files);
    }

    /// Picker change event.
    pub fn pick_files(&self, zone: DropZoneId, files: Vec<SelectedFile>) {
        let Some(file) = files.into_iter().next() else {
            return;
        };
        self.view.show_file_info(zone, &file.info_label());
        self.state().files.insert(zone, file);
    }

    pub fn selected_file(&self, zone: DropZoneId) -> Option<SelectedFile> {
        self.state().files.get(&zone).cloned()
    }

    pub(super) fn clear_file(&self, zone: DropZoneId) {
        self.state().files.remove(&zone);
        self.view.clear_file_info(zone);
    }
}
