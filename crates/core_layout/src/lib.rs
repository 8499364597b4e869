//! QuillDesk Core Layout Engine
//!
//! Platform-agnostic window manager for the writing desk canvas.
//!
//! The desk is an unbounded 2D canvas holding floating panels (chapters,
//! codex entries, the outline and the codex index):
//! - Every panel lives at a canvas position and has its own z-order slot
//! - A pan/zoom viewport acts as the camera over the canvas
//! - Layout (geometry, minimize state, viewport) is snapshotted for
//!   persistence; document content never is
//!
//! Nothing here touches the filesystem, the clock or a UI toolkit. Hosts
//! feed pointer and command events in and read geometry back out.

use thiserror::Error;

pub mod arrange;
pub mod drag;
pub mod geometry;
pub mod link;
pub mod manager;
pub mod registry;
pub mod snapshot;
pub mod taskbar;
pub mod viewport;
pub mod window;

pub use arrange::{compute_grid, grid_dimensions, ArrangeSettings, WindowPlacement};
pub use drag::{DragCommit, DragController, DragMode, DragState, HitRegion};
pub use geometry::{Point, Rect, Size};
pub use link::{DropZones, LinkDrag, LinkPayload, LinkRequest, PayloadKind, CODEX_ENTRY_FORMAT};
pub use manager::{ManagerSettings, OpenRequest, OpenResolution, OpenTicket, WindowManager};
pub use registry::{OpenOutcome, WindowRegistry};
pub use snapshot::{PersistedLayoutState, PersistedViewport, PersistedWindow, LAYOUT_FORMAT_VERSION};
pub use taskbar::{Taskbar, TaskbarAction, TaskbarEntry};
pub use viewport::{CanvasViewport, ZoomSettings};
pub use window::{ContentHandle, ContentRef, WindowId, WindowRecord, WindowSpec, CODEX_WINDOW_ID, OUTLINE_WINDOW_ID};

/// Errors that can occur when configuring the layout engine.
#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("Invalid zoom range: min {min} must be positive and not exceed max {max}")]
    InvalidZoomRange { min: f64, max: f64 },

    #[error("Invalid zoom step {0}: must be greater than 1")]
    InvalidZoomStep(f64),

    #[error("Invalid minimum window size {0}x{1}")]
    InvalidMinSize(f64, f64),
}
