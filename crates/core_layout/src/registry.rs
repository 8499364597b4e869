//! Window registry: identity, z-order, focus and minimize state.
//!
//! Every operation that takes a window id tolerates ids that are no longer
//! (or never were) registered. Menus and async callbacks routinely hold ids
//! of windows the user already closed, so unknown ids are silent no-ops.

use crate::geometry::{Point, Rect, Size};
use crate::window::{WindowId, WindowRecord, WindowSpec};

/// How `create_window` satisfied the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A new record was allocated.
    Created,
    /// The id was already open and visible; it was brought to front.
    Focused,
    /// The id was already open but minimized; it was restored and focused.
    Restored,
}

/// Tracks every open window on the canvas.
#[derive(Debug, Clone)]
pub struct WindowRegistry {
    /// Records in creation order.
    windows: Vec<WindowRecord>,
    /// Next z value to hand out. Only ever increases.
    next_z: u64,
    /// The visually active window, if any.
    active: Option<WindowId>,
    /// Smallest size a window may take.
    min_size: Size,
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new(Size::new(240.0, 160.0))
    }
}

impl WindowRegistry {
    /// Create an empty registry with a minimum window size.
    pub fn new(min_size: Size) -> Self {
        Self {
            windows: Vec::new(),
            next_z: 1,
            active: None,
            min_size,
        }
    }

    pub fn min_size(&self) -> Size {
        self.min_size
    }

    pub fn set_min_size(&mut self, min_size: Size) {
        self.min_size = min_size;
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&WindowRecord> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut WindowRecord> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    /// All windows in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &WindowRecord> {
        self.windows.iter()
    }

    /// Non-minimized windows in creation order.
    pub fn visible(&self) -> impl Iterator<Item = &WindowRecord> {
        self.windows.iter().filter(|w| !w.is_minimized)
    }

    /// Id of the visually active window.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The non-minimized window with the highest z-index.
    pub fn topmost(&self) -> Option<&WindowRecord> {
        self.visible().max_by_key(|w| w.z_index)
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.windows.iter().position(|w| w.id == id)
    }

    fn take_next_z(&mut self) -> u64 {
        let z = self.next_z;
        self.next_z += 1;
        z
    }

    /// Open a window, or bring an already open one to the front.
    ///
    /// An existing record keeps its geometry and content; the spec's geometry
    /// and content are only used when a new record is allocated.
    pub fn create_window(&mut self, spec: WindowSpec) -> (OpenOutcome, &WindowRecord) {
        let outcome = match self.index_of(&spec.id) {
            Some(idx) if self.windows[idx].is_minimized => {
                self.restore(&spec.id);
                OpenOutcome::Restored
            }
            Some(_) => {
                self.focus(&spec.id);
                OpenOutcome::Focused
            }
            None => {
                let z_index = self.take_next_z();
                let size = sanitize_size(Size::new(spec.width, spec.height), self.min_size);
                let position = sanitize_point(Point::new(spec.x, spec.y));
                self.active = Some(spec.id.clone());
                self.windows.push(WindowRecord {
                    id: spec.id.clone(),
                    title: spec.title,
                    position,
                    size,
                    z_index,
                    is_minimized: false,
                    closable: spec.closable,
                    icon: spec.icon,
                    content: spec.content,
                });
                OpenOutcome::Created
            }
        };

        let idx = self
            .index_of(&spec.id)
            .unwrap_or(self.windows.len().saturating_sub(1));
        (outcome, &self.windows[idx])
    }

    /// Bring a window to the top of the z-order and mark it active.
    ///
    /// Returns false for unknown or minimized windows.
    pub fn focus(&mut self, id: &str) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        if self.windows[idx].is_minimized {
            return false;
        }

        let already_top = self.active.as_deref() == Some(id)
            && self.windows[idx].z_index + 1 == self.next_z;
        if !already_top {
            let z = self.take_next_z();
            self.windows[idx].z_index = z;
        }
        self.active = Some(self.windows[idx].id.clone());
        true
    }

    /// Hide a window while keeping its record and content alive.
    pub fn minimize(&mut self, id: &str) -> bool {
        let Some(window) = self.get_mut(id) else {
            return false;
        };
        if window.is_minimized {
            return false;
        }
        window.is_minimized = true;

        if self.active.as_deref() == Some(id) {
            self.active = self.topmost().map(|w| w.id.clone());
        }
        true
    }

    /// Make a minimized window visible again and focus it.
    pub fn restore(&mut self, id: &str) -> bool {
        let Some(window) = self.get_mut(id) else {
            return false;
        };
        if !window.is_minimized {
            return false;
        }
        window.is_minimized = false;
        self.focus(id)
    }

    /// Remove a closable window, handing its record back to the caller.
    ///
    /// Non-closable windows are left untouched.
    pub fn close(&mut self, id: &str) -> Option<WindowRecord> {
        let idx = self.index_of(id)?;
        if !self.windows[idx].closable {
            return None;
        }
        let record = self.windows.remove(idx);

        if self.active.as_deref() == Some(id) {
            self.active = self.topmost().map(|w| w.id.clone());
        }
        Some(record)
    }

    /// Move a window's origin.
    pub fn set_position(&mut self, id: &str, position: Point) -> bool {
        match self.get_mut(id) {
            Some(window) => {
                window.position = sanitize_point(position);
                true
            }
            None => false,
        }
    }

    /// Resize a window, never below the minimum size.
    pub fn set_size(&mut self, id: &str, size: Size) -> bool {
        let min_size = self.min_size;
        match self.get_mut(id) {
            Some(window) => {
                window.size = sanitize_size(size, min_size);
                true
            }
            None => false,
        }
    }

    /// Move and resize in one step.
    pub fn set_rect(&mut self, id: &str, rect: Rect) -> bool {
        self.set_position(id, rect.origin()) && self.set_size(id, rect.size())
    }

    /// Set the minimized flag without touching focus.
    ///
    /// Used when rebuilding a saved layout.
    pub(crate) fn set_minimized_silently(&mut self, id: &str, minimized: bool) {
        if let Some(window) = self.get_mut(id) {
            window.is_minimized = minimized;
        }
        if minimized && self.active.as_deref() == Some(id) {
            self.active = self.topmost().map(|w| w.id.clone());
        }
    }

    /// Find the topmost visible window under a canvas point.
    pub fn hit_test(&self, point: Point) -> Option<&WindowRecord> {
        self.visible()
            .filter(|w| w.rect().contains_point(point))
            .max_by_key(|w| w.z_index)
    }

    /// Visible windows ordered back to front.
    pub fn stacking_order(&self) -> Vec<&WindowRecord> {
        let mut windows: Vec<_> = self.visible().collect();
        windows.sort_by_key(|w| w.z_index);
        windows
    }
}

fn sanitize_point(point: Point) -> Point {
    Point::new(
        if point.x.is_finite() { point.x } else { 0.0 },
        if point.y.is_finite() { point.y } else { 0.0 },
    )
}

fn sanitize_size(size: Size, min: Size) -> Size {
    let width = if size.width.is_finite() { size.width } else { min.width };
    let height = if size.height.is_finite() { size.height } else { min.height };
    Size::new(width, height).at_least(min)
}
