use std::fmt;

use super::DashboardController;
use crate::ui::DashboardView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardTab {
    Posts,
    Upload,
    Edit,
    Settings,
}

impl DashboardTab {
    pub const ALL: [DashboardTab; 4] = [
        DashboardTab::Posts,
        DashboardTab::Upload,
        DashboardTab::Edit,
        DashboardTab::Settings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DashboardTab::Posts => "posts",
            DashboardTab::Upload => "upload",
            DashboardTab::Edit => "edit",
            DashboardTab::Settings => "settings",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tab| tab.as_str() == name)
    }
}

impl fmt::Display for DashboardTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<V: DashboardView> DashboardController<V> {
    pub fn active_tab(&self) -> DashboardTab {
        self.state().active_tab
    }

    pub fn is_edit_tab_visible(&self) -> bool {
        self.state().edit_visible
    }

    /// Makes `tab` the single active tab. No data is refetched.
    pub fn switch_tab(&self, tab: DashboardTab) {
        self.state().active_tab = tab;
        self.view.activate_tab(tab.as_str());
    }

    pub(super) fn set_edit_tab_visible(&self, visible: bool) {
        self.state().edit_visible = visible;
        self.view.set_tab_visible(DashboardTab::Edit.as_str(), visible);
    }
}
