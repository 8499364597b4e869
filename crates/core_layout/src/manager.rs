//! The window manager for one editing session.
//!
//! Owns the registry, the viewport, the taskbar, both drag machines and the
//! drop zones. Collaborators get it by reference; nothing lives in globals.
//!
//! Every change that should reach durable storage bumps [`WindowManager::revision`].
//! Focus changes do not: z-order is not persisted.

use std::collections::HashMap;

use crate::arrange::{compute_grid, ArrangeSettings, WindowPlacement};
use crate::drag::{DragCommit, DragController, HitRegion};
use crate::geometry::{Point, Rect, Size};
use crate::link::{DropZones, LinkDrag, LinkPayload, LinkRequest};
use crate::registry::{OpenOutcome, WindowRegistry};
use crate::snapshot::{PersistedLayoutState, PersistedViewport, PersistedWindow, LAYOUT_FORMAT_VERSION};
use crate::taskbar::{Taskbar, TaskbarAction, TaskbarEntry};
use crate::viewport::{CanvasViewport, ZoomSettings};
use crate::window::{ContentRef, WindowId, WindowRecord, WindowSpec};
use crate::LayoutError;

/// Cascade step for windows opened without an explicit position.
const CASCADE_STEP: f64 = 32.0;
/// Cascade wraps after this many windows.
const CASCADE_SLOTS: usize = 8;

/// Tunables for a [`WindowManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerSettings {
    pub zoom: ZoomSettings,
    /// Initial size of the visible area in screen pixels.
    pub screen: Size,
    pub arrange: ArrangeSettings,
    pub min_window_size: Size,
    /// Padding (canvas units) around the windows in `fit_to_view`.
    pub fit_padding: f64,
    /// Padding (canvas units) kept around a window by `scroll_into_view`.
    pub scroll_padding: f64,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            zoom: ZoomSettings::default(),
            screen: Size::new(1920.0, 1080.0),
            arrange: ArrangeSettings::default(),
            min_window_size: Size::new(240.0, 160.0),
            fit_padding: 40.0,
            scroll_padding: 16.0,
        }
    }
}

/// Token for an open that waits on an async content fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTicket {
    pub window_id: WindowId,
    token: u64,
}

/// Result of asking to open a window whose content lives in the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenRequest {
    /// Already open; it was focused or restored. Nothing to fetch.
    AlreadyOpen(OpenOutcome),
    /// Fetch the content, then call [`WindowManager::complete_open`].
    Fetch(OpenTicket),
}

/// What happened to a fetched result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenResolution {
    Created,
    /// The ticket was superseded, cancelled, or the window got opened some
    /// other way in the meantime. The fetched content was dropped.
    Stale,
}

#[derive(Debug, Clone)]
pub struct WindowManager {
    registry: WindowRegistry,
    viewport: CanvasViewport,
    taskbar: Taskbar,
    drag: DragController,
    link_drag: LinkDrag,
    drop_zones: DropZones,
    settings: ManagerSettings,
    /// Outstanding fetch token per window id.
    pending: HashMap<WindowId, u64>,
    next_token: u64,
    revision: u64,
}

impl WindowManager {
    pub fn new(settings: ManagerSettings) -> Result<Self, LayoutError> {
        if settings.min_window_size.is_degenerate() {
            return Err(LayoutError::InvalidMinSize(
                settings.min_window_size.width,
                settings.min_window_size.height,
            ));
        }
        let viewport = CanvasViewport::new(settings.zoom, settings.screen)?;
        Ok(Self {
            registry: WindowRegistry::new(settings.min_window_size),
            viewport,
            taskbar: Taskbar::new(settings.arrange.pinned.clone()),
            drag: DragController::new(),
            link_drag: LinkDrag::new(),
            drop_zones: DropZones::new(),
            settings,
            pending: HashMap::new(),
            next_token: 1,
            revision: 0,
        })
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn viewport(&self) -> &CanvasViewport {
        &self.viewport
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn drop_zones(&self) -> &DropZones {
        &self.drop_zones
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn link_drag(&self) -> &LinkDrag {
        &self.link_drag
    }

    /// Counter bumped by every change that should be persisted.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Swap in new settings (after a config reload). Windows stay where they are.
    pub fn apply_settings(&mut self, settings: ManagerSettings) -> Result<(), LayoutError> {
        if settings.min_window_size.is_degenerate() {
            return Err(LayoutError::InvalidMinSize(
                settings.min_window_size.width,
                settings.min_window_size.height,
            ));
        }
        self.viewport.set_settings(settings.zoom)?;
        self.registry.set_min_size(settings.min_window_size);
        self.taskbar = Taskbar::new(settings.arrange.pinned.clone());
        self.settings = settings;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Open a window or bring the existing one forward.
    pub fn create_window(&mut self, spec: WindowSpec) -> (OpenOutcome, &WindowRecord) {
        match self.registry.get(&spec.id).map(|w| w.is_minimized) {
            None => {
                let (accepts, tags) = match &spec.content {
                    Some(content) => (DropZones::accepted_kinds(&content.source), content.links.clone()),
                    None => (
                        ContentRef::from_window_id(&spec.id)
                            .map(|c| DropZones::accepted_kinds(&c))
                            .unwrap_or_default(),
                        Vec::new(),
                    ),
                };
                self.drop_zones.register(spec.id.clone(), accepts, tags);
                self.pending.remove(&spec.id);
                self.touch();
            }
            Some(true) => self.touch(),
            Some(false) => {}
        }
        self.registry.create_window(spec)
    }

    pub fn focus(&mut self, id: &str) -> bool {
        self.registry.focus(id)
    }

    pub fn minimize(&mut self, id: &str) -> bool {
        self.drag.forget(id);
        let changed = self.registry.minimize(id);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn restore(&mut self, id: &str) -> bool {
        let changed = self.registry.restore(id);
        if changed {
            self.touch();
        }
        changed
    }

    /// Close a closable window, dropping its content, drop zone and any drag.
    pub fn close(&mut self, id: &str) -> Option<WindowRecord> {
        let record = self.registry.close(id)?;
        self.drag.forget(id);
        self.drop_zones.remove(id);
        self.pending.remove(id);
        if self.link_drag.highlighted() == Some(id) {
            self.link_drag.drag_leave(id);
        }
        self.touch();
        Some(record)
    }

    pub fn move_window(&mut self, id: &str, position: Point) -> bool {
        let changed = self.registry.set_position(id, position);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn resize_window(&mut self, id: &str, size: Size) -> bool {
        let changed = self.registry.set_size(id, size);
        if changed {
            self.touch();
        }
        changed
    }

    /// Pan (and zoom out only if needed) so the window is fully on screen.
    pub fn scroll_into_view(&mut self, id: &str) -> bool {
        let Some(rect) = self.registry.get(id).filter(|w| !w.is_minimized).map(|w| w.rect()) else {
            return false;
        };
        let changed = self.viewport.scroll_into_view(rect, self.settings.scroll_padding);
        if changed {
            self.touch();
        }
        changed
    }

    /// Where a new window without a saved position should go: a cascade
    /// starting near the top-left of the visible area.
    pub fn next_cascade_origin(&self) -> Point {
        let visible = self.viewport.visible_canvas_rect();
        let slot = (self.registry.len() % CASCADE_SLOTS) as f64;
        let margin = self.settings.arrange.outer_gap.max(0.0);
        Point::new(
            visible.x + margin + slot * CASCADE_STEP,
            visible.y + margin + slot * CASCADE_STEP,
        )
    }

    // ------------------------------------------------------------------
    // Async opens
    // ------------------------------------------------------------------

    /// Start opening a window whose content must be fetched first.
    ///
    /// If the window is already open it is focused (or restored) and no fetch
    /// is needed. Otherwise a fresh ticket supersedes any earlier one for the
    /// same id.
    pub fn begin_open(&mut self, id: &str) -> OpenRequest {
        if let Some(minimized) = self.registry.get(id).map(|w| w.is_minimized) {
            if minimized {
                self.restore(id);
                return OpenRequest::AlreadyOpen(OpenOutcome::Restored);
            }
            self.focus(id);
            return OpenRequest::AlreadyOpen(OpenOutcome::Focused);
        }

        let token = self.next_token;
        self.next_token += 1;
        self.pending.insert(id.to_string(), token);
        OpenRequest::Fetch(OpenTicket {
            window_id: id.to_string(),
            token,
        })
    }

    /// Whether a ticket is still the current request for its window.
    pub fn is_current(&self, ticket: &OpenTicket) -> bool {
        self.pending.get(&ticket.window_id) == Some(&ticket.token)
            && !self.registry.contains(&ticket.window_id)
    }

    /// Apply fetched content, unless the ticket went stale in the meantime.
    pub fn complete_open(&mut self, ticket: &OpenTicket, spec: WindowSpec) -> OpenResolution {
        if !self.is_current(ticket) || spec.id != ticket.window_id {
            return OpenResolution::Stale;
        }
        self.pending.remove(&ticket.window_id);
        self.create_window(spec);
        OpenResolution::Created
    }

    /// Give up on a ticket (fetch failed). Returns true if it was current.
    pub fn abandon_open(&mut self, ticket: &OpenTicket) -> bool {
        let current = self.is_current(ticket);
        if current {
            self.pending.remove(&ticket.window_id);
        }
        current
    }

    /// Cancel any outstanding fetch for a window id.
    pub fn cancel_open(&mut self, id: &str) -> bool {
        self.pending.remove(id).is_some()
    }

    pub fn pending_opens(&self) -> usize {
        self.pending.len()
    }

    // ------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------

    pub fn set_screen_size(&mut self, screen: Size) {
        self.viewport.set_screen_size(screen);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.touch();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.touch();
    }

    pub fn zoom_to(&mut self, level: f64) {
        self.viewport.zoom_to(level);
        self.touch();
    }

    /// Zoom around a screen-space anchor (scroll-wheel zoom).
    pub fn zoom_at(&mut self, level: f64, anchor: Point) {
        self.viewport.zoom_at(level, anchor);
        self.touch();
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.viewport.pan_by(dx, dy);
        self.touch();
    }

    /// Fit every visible window on screen; reset when there are none.
    pub fn fit_to_view(&mut self) {
        let bounds = Rect::bounding(
            self.registry
                .visible()
                .map(|w| w.rect())
                .collect::<Vec<_>>()
                .iter(),
        );
        self.viewport.fit_to(bounds, self.settings.fit_padding);
        self.touch();
    }

    /// Tile the visible windows over the visible area of the canvas.
    pub fn arrange_windows(&mut self) -> Vec<WindowPlacement> {
        let placements = compute_grid(
            self.registry.visible(),
            self.viewport.visible_canvas_rect(),
            self.registry.min_size(),
            &self.settings.arrange,
        );
        for placement in &placements {
            self.registry.set_rect(&placement.window_id, placement.rect);
        }
        if !placements.is_empty() {
            self.touch();
        }
        placements
    }

    // ------------------------------------------------------------------
    // Pointer drag
    // ------------------------------------------------------------------

    /// Topmost visible window under a screen-space point.
    pub fn window_at_screen(&self, pointer: Point) -> Option<&WindowRecord> {
        self.registry.hit_test(self.viewport.screen_to_canvas(pointer))
    }

    pub fn pointer_down(&mut self, id: &str, region: HitRegion, pointer: Point) -> bool {
        self.drag.pointer_down(&mut self.registry, id, region, pointer)
    }

    /// Live move; visual only, not persisted.
    pub fn pointer_move(&mut self, pointer: Point) -> Option<Rect> {
        let zoom = self.viewport.zoom_level();
        self.drag.pointer_move(&mut self.registry, pointer, zoom)
    }

    pub fn pointer_up(&mut self, pointer: Point) -> Option<DragCommit> {
        let zoom = self.viewport.zoom_level();
        let commit = self.drag.pointer_up(&mut self.registry, pointer, zoom);
        if commit.is_some() {
            self.touch();
        }
        commit
    }

    pub fn cancel_drag(&mut self) -> Option<DragCommit> {
        let commit = self.drag.cancel(&self.registry);
        if commit.is_some() {
            self.touch();
        }
        commit
    }

    // ------------------------------------------------------------------
    // Link drag-and-drop
    // ------------------------------------------------------------------

    pub fn link_drag_start(&mut self, payload: LinkPayload) {
        self.link_drag.drag_start(payload);
    }

    pub fn link_drag_enter(&mut self, target: &str) -> bool {
        self.registry.contains(target) && self.link_drag.drag_enter(&self.drop_zones, target)
    }

    pub fn link_drag_leave(&mut self, target: &str) -> bool {
        self.link_drag.drag_leave(target)
    }

    /// Drop on a window; `None` means the drop is ignored.
    pub fn link_drop(&mut self, target: &str) -> Option<LinkRequest> {
        if !self.registry.contains(target) {
            self.link_drag.drag_end();
            return None;
        }
        self.link_drag.drop_on(&self.drop_zones, target)
    }

    /// Drop at a screen point, resolving the target by z-order.
    pub fn link_drop_at(&mut self, pointer: Point) -> Option<LinkRequest> {
        match self.window_at_screen(pointer).map(|w| w.id.clone()) {
            Some(target) => self.link_drop(&target),
            None => {
                self.link_drag.drag_end();
                None
            }
        }
    }

    pub fn link_drag_end(&mut self) {
        self.link_drag.drag_end();
    }

    /// Record a link the backend accepted. False if the window closed meanwhile.
    pub fn complete_link(&mut self, request: &LinkRequest) -> bool {
        self.registry.contains(&request.target)
            && self
                .drop_zones
                .add_tag(&request.target, &request.payload.entry_id)
    }

    // ------------------------------------------------------------------
    // Taskbar
    // ------------------------------------------------------------------

    pub fn taskbar_entries(&self) -> Vec<TaskbarEntry> {
        self.taskbar.entries(&self.registry)
    }

    pub fn taskbar_activate(&mut self, id: &str) -> TaskbarAction {
        let action = self.taskbar.activate(&mut self.registry, id);
        if action == TaskbarAction::Restored {
            self.touch();
        }
        action
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Layout snapshot; windows listed back to front.
    pub fn snapshot(&self, saved_at: u64) -> PersistedLayoutState {
        let mut windows: Vec<&WindowRecord> = self.registry.iter().collect();
        windows.sort_by_key(|w| w.z_index);
        PersistedLayoutState {
            version: LAYOUT_FORMAT_VERSION,
            saved_at,
            windows: windows
                .into_iter()
                .map(|w| PersistedWindow {
                    id: w.id.clone(),
                    position: w.position,
                    size: w.size,
                    is_minimized: w.is_minimized,
                })
                .collect(),
            viewport: PersistedViewport {
                pan_offset: self.viewport.pan_offset(),
                zoom_level: self.viewport.zoom_level(),
            },
        }
    }

    /// Restore saved pan and zoom (zoom is clamped to the current limits).
    pub fn apply_viewport(&mut self, saved: &PersistedViewport) {
        self.viewport.zoom_to(saved.zoom_level);
        self.viewport.set_pan_offset(saved.pan_offset);
    }

    /// Recreate a saved window with fresh content at its saved geometry.
    pub fn restore_window(&mut self, saved: &PersistedWindow, mut spec: WindowSpec) -> OpenOutcome {
        spec.id = saved.id.clone();
        spec.x = saved.position.x;
        spec.y = saved.position.y;
        spec.width = saved.size.width;
        spec.height = saved.size.height;

        let outcome = self.create_window(spec).0;
        if outcome == OpenOutcome::Created && saved.is_minimized {
            self.registry.set_minimized_silently(&saved.id, true);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::HitRegion;
    use crate::window::ContentHandle;

    fn manager() -> WindowManager {
        WindowManager::new(ManagerSettings {
            screen: Size::new(1600.0, 1000.0),
            ..ManagerSettings::default()
        })
        .unwrap()
    }

    fn spec(id: &str, x: f64, y: f64) -> WindowSpec {
        WindowSpec::new(id, id, Rect::new(x, y, 700.0, 500.0))
    }

    fn chapter_content(id: &str, links: &[&str]) -> ContentHandle {
        ContentHandle {
            source: ContentRef::Chapter {
                chapter_id: id.to_string(),
            },
            title: format!("Chapter {id}"),
            body: "<p>text</p>".to_string(),
            links: links.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_invalid_min_size_rejected() {
        let settings = ManagerSettings {
            min_window_size: Size::new(0.0, 10.0),
            ..ManagerSettings::default()
        };
        assert!(matches!(
            WindowManager::new(settings),
            Err(LayoutError::InvalidMinSize(..))
        ));
    }

    #[test]
    fn test_idempotent_open_scenario() {
        let mut wm = manager();
        wm.create_window(spec("chapter-42", 100.0, 100.0));
        wm.create_window(spec("codex-entry-1", 0.0, 0.0));

        let (outcome, record) = wm.create_window(spec("chapter-42", 300.0, 300.0));
        assert_eq!(outcome, OpenOutcome::Focused);
        assert_eq!(record.position, Point::new(100.0, 100.0));
        assert_eq!(wm.registry().iter().filter(|w| w.id == "chapter-42").count(), 1);
        assert_eq!(wm.registry().topmost().map(|w| w.id.as_str()), Some("chapter-42"));
    }

    #[test]
    fn test_revision_tracks_structural_changes() {
        let mut wm = manager();
        let r0 = wm.revision();
        wm.create_window(spec("a", 0.0, 0.0));
        let r1 = wm.revision();
        assert!(r1 > r0);

        wm.create_window(spec("b", 0.0, 0.0));
        wm.focus("a");
        wm.create_window(spec("a", 0.0, 0.0));
        let r2 = wm.revision();

        wm.focus("b");
        assert_eq!(wm.revision(), r2);

        wm.minimize("b");
        assert!(wm.revision() > r2);
        let r3 = wm.revision();
        wm.minimize("missing");
        wm.close("missing");
        assert_eq!(wm.revision(), r3);
    }

    #[test]
    fn test_stale_open_discarded_after_reopen() {
        let mut wm = manager();
        let OpenRequest::Fetch(first) = wm.begin_open("chapter-1") else {
            panic!("expected fetch");
        };
        let OpenRequest::Fetch(second) = wm.begin_open("chapter-1") else {
            panic!("expected fetch");
        };

        assert_eq!(
            wm.complete_open(&first, spec("chapter-1", 0.0, 0.0)),
            OpenResolution::Stale
        );
        assert_eq!(
            wm.complete_open(&second, spec("chapter-1", 0.0, 0.0)),
            OpenResolution::Created
        );
        assert_eq!(wm.registry().len(), 1);
        assert_eq!(wm.pending_opens(), 0);
    }

    #[test]
    fn test_stale_open_discarded_when_opened_meanwhile() {
        let mut wm = manager();
        let OpenRequest::Fetch(ticket) = wm.begin_open("chapter-1") else {
            panic!("expected fetch");
        };
        wm.create_window(spec("chapter-1", 5.0, 5.0));
        assert_eq!(
            wm.complete_open(&ticket, spec("chapter-1", 99.0, 99.0)),
            OpenResolution::Stale
        );
        assert_eq!(wm.registry().get("chapter-1").unwrap().position, Point::new(5.0, 5.0));
    }

    #[test]
    fn test_cancelled_open_is_stale() {
        let mut wm = manager();
        let OpenRequest::Fetch(ticket) = wm.begin_open("chapter-1") else {
            panic!("expected fetch");
        };
        assert!(wm.cancel_open("chapter-1"));
        assert!(!wm.abandon_open(&ticket));
        assert_eq!(
            wm.complete_open(&ticket, spec("chapter-1", 0.0, 0.0)),
            OpenResolution::Stale
        );
        assert!(wm.registry().is_empty());
    }

    #[test]
    fn test_begin_open_existing_focuses() {
        let mut wm = manager();
        wm.create_window(spec("chapter-1", 0.0, 0.0));
        wm.create_window(spec("chapter-2", 0.0, 0.0));
        assert_eq!(wm.begin_open("chapter-1"), OpenRequest::AlreadyOpen(OpenOutcome::Focused));
        assert_eq!(wm.registry().active(), Some("chapter-1"));

        wm.minimize("chapter-1");
        assert_eq!(wm.begin_open("chapter-1"), OpenRequest::AlreadyOpen(OpenOutcome::Restored));
        assert_eq!(wm.pending_opens(), 0);
    }

    #[test]
    fn test_fit_to_view_without_windows_resets() {
        let mut wm = manager();
        wm.zoom_to(2.0);
        wm.pan_by(100.0, 100.0);
        wm.create_window(spec("a", 0.0, 0.0));
        wm.minimize("a");

        wm.fit_to_view();
        assert_eq!(wm.viewport().zoom_level(), 1.0);
        assert_eq!(wm.viewport().pan_offset(), Point::zero());
    }

    #[test]
    fn test_fit_to_view_contains_all_windows() {
        let mut wm = manager();
        wm.create_window(spec("a", -500.0, 0.0));
        wm.create_window(spec("b", 2000.0, 1500.0));
        wm.fit_to_view();

        let visible = wm.viewport().visible_canvas_rect();
        for w in wm.registry().iter() {
            assert!(visible.contains_rect(&w.rect()));
        }
    }

    #[test]
    fn test_arrange_three_windows_scenario() {
        let mut wm = manager();
        wm.create_window(spec("chapter-1", 0.0, 0.0));
        wm.create_window(spec("chapter-2", 10.0, 10.0));
        wm.create_window(spec("chapter-3", 20.0, 20.0));

        let first = wm.arrange_windows();
        assert_eq!(first.len(), 3);
        let rects: Vec<Rect> = wm.registry().iter().map(|w| w.rect()).collect();
        for (i, a) in rects.iter().enumerate() {
            for b in rects.iter().skip(i + 1) {
                assert!(!a.intersects(b));
            }
        }

        let second = wm.arrange_windows();
        assert_eq!(first, second);
        let rects_again: Vec<Rect> = wm.registry().iter().map(|w| w.rect()).collect();
        assert_eq!(rects, rects_again);
    }

    #[test]
    fn test_arrange_skips_minimized() {
        let mut wm = manager();
        wm.create_window(spec("a", 0.0, 0.0));
        wm.create_window(spec("b", 0.0, 0.0));
        wm.minimize("b");
        let placements = wm.arrange_windows();
        assert_eq!(placements.len(), 1);
        assert_eq!(wm.registry().get("b").unwrap().position, Point::zero());
    }

    #[test]
    fn test_drag_scenario_at_zoom_two() {
        let mut wm = manager();
        wm.create_window(spec("codex-entry-7", 0.0, 0.0));
        wm.zoom_to(2.0);
        let before = wm.revision();

        assert!(wm.pointer_down("codex-entry-7", HitRegion::TitleBar, Point::new(0.0, 0.0)));
        wm.pointer_move(Point::new(20.0, 20.0));
        assert_eq!(wm.revision(), before);

        let commit = wm.pointer_up(Point::new(50.0, 80.0)).unwrap();
        assert_eq!(commit.rect.origin(), Point::new(25.0, 40.0));
        assert!(wm.revision() > before);
    }

    #[test]
    fn test_close_during_drag_abandons() {
        let mut wm = manager();
        wm.create_window(spec("chapter-1", 0.0, 0.0));
        wm.pointer_down("chapter-1", HitRegion::TitleBar, Point::zero());
        wm.close("chapter-1");
        assert!(!wm.drag().is_dragging());
        assert!(wm.pointer_up(Point::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn test_scroll_into_view() {
        let mut wm = manager();
        wm.create_window(spec("far", 5000.0, 0.0));
        assert!(wm.scroll_into_view("far"));
        assert_eq!(wm.viewport().zoom_level(), 1.0);
        let rect = wm.registry().get("far").unwrap().rect();
        assert!(wm.viewport().visible_canvas_rect().contains_rect(&rect));

        assert!(!wm.scroll_into_view("far"));
        assert!(!wm.scroll_into_view("missing"));
    }

    #[test]
    fn test_link_flow() {
        let mut wm = manager();
        let content = chapter_content("1", &["3"]);
        wm.create_window(spec("chapter-1", 0.0, 0.0).with_content(content));
        assert_eq!(wm.drop_zones().tags("chapter-1"), ["3".to_string()]);

        wm.link_drag_start(LinkPayload::codex_entry("9"));
        assert!(wm.link_drag_enter("chapter-1"));
        let request = wm.link_drop("chapter-1").expect("valid drop");
        assert!(wm.complete_link(&request));
        assert_eq!(
            wm.drop_zones().tags("chapter-1"),
            ["3".to_string(), "9".to_string()]
        );

        wm.link_drag_start(LinkPayload::codex_entry("9"));
        assert!(wm.link_drop("chapter-1").is_none());
    }

    #[test]
    fn test_link_drop_at_uses_topmost_window() {
        let mut wm = manager();
        wm.create_window(spec("chapter-1", 0.0, 0.0).with_content(chapter_content("1", &[])));
        wm.create_window(spec("outline-window", 100.0, 100.0).closable(false));

        wm.link_drag_start(LinkPayload::codex_entry("9"));
        // outline sits on top at this point and does not accept entries
        assert!(wm.link_drop_at(Point::new(150.0, 150.0)).is_none());

        wm.focus("chapter-1");
        wm.link_drag_start(LinkPayload::codex_entry("9"));
        let request = wm.link_drop_at(Point::new(150.0, 150.0)).unwrap();
        assert_eq!(request.target, "chapter-1");
    }

    #[test]
    fn test_complete_link_after_close_is_ignored() {
        let mut wm = manager();
        wm.create_window(spec("chapter-1", 0.0, 0.0));
        wm.link_drag_start(LinkPayload::codex_entry("9"));
        let request = wm.link_drop("chapter-1").unwrap();
        wm.close("chapter-1");
        assert!(!wm.complete_link(&request));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut wm = manager();
        wm.create_window(spec("outline-window", 10.0, 20.0).closable(false));
        wm.create_window(spec("chapter-1", 300.0, 40.0));
        wm.create_window(spec("codex-entry-2", -50.0, 600.0));
        wm.minimize("chapter-1");
        wm.zoom_to(1.5);
        wm.pan_by(-120.0, 35.0);

        let saved = wm.snapshot(1234);
        assert_eq!(saved.saved_at, 1234);

        let mut restored = manager();
        restored.apply_viewport(&saved.viewport);
        for entry in &saved.windows {
            restored.restore_window(entry, WindowSpec::new(entry.id.clone(), "t", Rect::default()));
        }

        assert_eq!(restored.viewport().zoom_level(), 1.5);
        assert_eq!(restored.viewport().pan_offset(), wm.viewport().pan_offset());
        for original in wm.registry().iter() {
            let copy = restored.registry().get(&original.id).unwrap();
            assert_eq!(copy.position, original.position);
            assert_eq!(copy.size, original.size);
            assert_eq!(copy.is_minimized, original.is_minimized);
        }
        assert_eq!(restored.snapshot(1234).windows, saved.windows);
    }

    #[test]
    fn test_taskbar_passthrough() {
        let mut wm = manager();
        wm.create_window(spec("chapter-1", 0.0, 0.0));
        wm.minimize("chapter-1");
        let before = wm.revision();
        assert_eq!(wm.taskbar_activate("chapter-1"), TaskbarAction::Restored);
        assert!(wm.revision() > before);
        assert_eq!(wm.taskbar_entries().len(), 1);
    }

    #[test]
    fn test_cascade_origin_moves() {
        let mut wm = manager();
        let first = wm.next_cascade_origin();
        wm.create_window(spec("a", first.x, first.y));
        let second = wm.next_cascade_origin();
        assert!(second.x > first.x && second.y > first.y);
    }
}
