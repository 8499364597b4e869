//! Open-windows menu.

use serde::{Deserialize, Serialize};

use crate::arrange::pinned_then_title;
use crate::registry::WindowRegistry;
use crate::window::WindowId;

/// One row of the open-windows menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskbarEntry {
    pub id: WindowId,
    pub title: String,
    pub icon: String,
    pub is_minimized: bool,
    pub is_active: bool,
}

/// What clicking a taskbar entry did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskbarAction {
    Restored,
    Focused,
    /// The entry pointed at a window that no longer exists.
    Ignored,
}

/// Builds the open-windows menu from the live registry.
///
/// Holds no copy of the window list: every call to [`Taskbar::entries`]
/// reads the registry as it is at that moment.
#[derive(Debug, Clone, Default)]
pub struct Taskbar {
    pinned: Vec<WindowId>,
}

impl Taskbar {
    pub fn new(pinned: Vec<WindowId>) -> Self {
        Self { pinned }
    }

    pub fn pinned(&self) -> &[WindowId] {
        &self.pinned
    }

    /// All open windows, visible and minimized: pinned ids first, then by title.
    pub fn entries(&self, registry: &WindowRegistry) -> Vec<TaskbarEntry> {
        let mut windows: Vec<_> = registry.iter().collect();
        windows.sort_by(|a, b| pinned_then_title(&self.pinned, a, b));

        let active = registry.active();
        windows
            .into_iter()
            .map(|w| TaskbarEntry {
                id: w.id.clone(),
                title: w.title.clone(),
                icon: w.icon.clone(),
                is_minimized: w.is_minimized,
                is_active: active == Some(w.id.as_str()),
            })
            .collect()
    }

    /// Handle a click on an entry.
    pub fn activate(&self, registry: &mut WindowRegistry, id: &str) -> TaskbarAction {
        match registry.get(id).map(|w| w.is_minimized) {
            Some(true) => {
                registry.restore(id);
                TaskbarAction::Restored
            }
            Some(false) => {
                registry.focus(id);
                TaskbarAction::Focused
            }
            None => TaskbarAction::Ignored,
        }
    }
}
