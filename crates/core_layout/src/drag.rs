//! Pointer drag state machine for moving and resizing windows.
//!
//! Raw input handlers only translate events into `pointer_down`,
//! `pointer_move`, `pointer_up` and `cancel` calls. Moves are visual until
//! the drag ends; only the end of a drag produces a [`DragCommit`].

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Size};
use crate::registry::WindowRegistry;
use crate::window::WindowId;

/// Part of a window the pointer went down on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitRegion {
    TitleBar,
    ResizeHandle,
    Body,
    /// A button or other interactive child inside the chrome.
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragMode {
    Move,
    Resize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        window_id: WindowId,
        mode: DragMode,
        /// Pointer position (screen space) at pointer-down.
        start_pointer: Point,
        /// Window geometry (canvas space) at pointer-down.
        start_rect: Rect,
    },
}

impl DragState {
    /// Geometry the dragged window should have with the pointer at `pointer`.
    ///
    /// Screen deltas are divided by the zoom level so a drag covers the same
    /// on-screen distance at every scale.
    pub fn geometry_at(&self, pointer: Point, zoom: f64, min_size: Size) -> Option<(&str, Rect)> {
        let DragState::Dragging {
            window_id,
            mode,
            start_pointer,
            start_rect,
        } = self
        else {
            return None;
        };

        let delta = pointer.delta_from(*start_pointer).scale(1.0 / zoom);
        let rect = match mode {
            DragMode::Move => Rect::from_parts(start_rect.origin().offset(delta), start_rect.size()),
            DragMode::Resize => Rect::from_parts(
                start_rect.origin(),
                Size::new(start_rect.width + delta.x, start_rect.height + delta.y).at_least(min_size),
            ),
        };
        Some((window_id.as_str(), rect))
    }
}

/// Final geometry of a finished drag.
#[derive(Debug, Clone, PartialEq)]
pub struct DragCommit {
    pub window_id: WindowId,
    pub mode: DragMode,
    pub rect: Rect,
}

#[derive(Debug, Clone, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Id of the window being dragged, if any.
    pub fn dragged_window(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging { window_id, .. } => Some(window_id),
            DragState::Idle => None,
        }
    }

    /// Start a drag on a title bar or resize handle.
    ///
    /// Ignored while another drag is active, for interactive controls and
    /// bodies, and for unknown or minimized windows. Focuses the window.
    pub fn pointer_down(
        &mut self,
        registry: &mut WindowRegistry,
        window_id: &str,
        region: HitRegion,
        pointer: Point,
    ) -> bool {
        if self.is_dragging() {
            return false;
        }
        let mode = match region {
            HitRegion::TitleBar => DragMode::Move,
            HitRegion::ResizeHandle => DragMode::Resize,
            HitRegion::Body | HitRegion::Control => return false,
        };
        let Some(window) = registry.get(window_id) else {
            return false;
        };
        if window.is_minimized {
            return false;
        }

        self.state = DragState::Dragging {
            window_id: window.id.clone(),
            mode,
            start_pointer: pointer,
            start_rect: window.rect(),
        };
        registry.focus(window_id);
        true
    }

    /// Apply the live geometry for the current pointer position.
    ///
    /// Returns the new rectangle, or `None` when idle. A window that vanished
    /// mid-drag ends the drag silently.
    pub fn pointer_move(&mut self, registry: &mut WindowRegistry, pointer: Point, zoom: f64) -> Option<Rect> {
        let (window_id, rect) = self.state.geometry_at(pointer, zoom, registry.min_size())?;
        if !registry.set_rect(window_id, rect) {
            self.state = DragState::Idle;
            return None;
        }
        Some(rect)
    }

    /// Finish the drag at `pointer`.
    pub fn pointer_up(&mut self, registry: &mut WindowRegistry, pointer: Point, zoom: f64) -> Option<DragCommit> {
        self.pointer_move(registry, pointer, zoom)?;
        self.finish(registry)
    }

    /// Abort the drag (pointer left the document). The last live geometry stays.
    pub fn cancel(&mut self, registry: &WindowRegistry) -> Option<DragCommit> {
        self.finish(registry)
    }

    fn finish(&mut self, registry: &WindowRegistry) -> Option<DragCommit> {
        let DragState::Dragging { window_id, mode, .. } = std::mem::take(&mut self.state) else {
            return None;
        };
        let window = registry.get(&window_id)?;
        Some(DragCommit {
            window_id,
            mode,
            rect: window.rect(),
        })
    }

    /// Drop the drag if it targets `window_id` (used when a window closes).
    pub fn forget(&mut self, window_id: &str) {
        if self.dragged_window() == Some(window_id) {
            self.state = DragState::Idle;
        }
    }
}
