//! Persisted layout format.
//!
//! Only window chrome is saved. Content is fetched again on restore.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Size};
use crate::window::WindowId;

/// Current on-disk format version.
pub const LAYOUT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedWindow {
    pub id: WindowId,
    pub position: Point,
    pub size: Size,
    #[serde(default)]
    pub is_minimized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedViewport {
    pub pan_offset: Point,
    pub zoom_level: f64,
}

impl Default for PersistedViewport {
    fn default() -> Self {
        Self {
            pan_offset: Point::zero(),
            zoom_level: 1.0,
        }
    }
}

/// Saved layout for one novel.
///
/// Windows are listed back to front so restoring them in order rebuilds
/// the same stacking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedLayoutState {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Unix seconds at save time.
    #[serde(default)]
    pub saved_at: u64,
    #[serde(default)]
    pub windows: Vec<PersistedWindow>,
    #[serde(default)]
    pub viewport: PersistedViewport,
}

fn default_version() -> u32 {
    LAYOUT_FORMAT_VERSION
}

impl Default for PersistedLayoutState {
    fn default() -> Self {
        Self {
            version: LAYOUT_FORMAT_VERSION,
            saved_at: 0,
            windows: Vec::new(),
            viewport: PersistedViewport::default(),
        }
    }
}

impl PersistedLayoutState {
    /// True when there is nothing to restore.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty() && self.viewport == PersistedViewport::default()
    }

    pub fn window(&self, id: &str) -> Option<&PersistedWindow> {
        self.windows.iter().find(|w| w.id == id)
    }
}
