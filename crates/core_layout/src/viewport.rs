//! Pan/zoom camera over the canvas.
//!
//! The rendering transform is `translate(pan_offset) scale(zoom_level)`:
//! a canvas point `c` lands on screen at `pan_offset + c * zoom_level`.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Size};
use crate::LayoutError;

/// Zoom limits and step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomSettings {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Factor applied by one `zoom_in` / `zoom_out`.
    pub zoom_step: f64,
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self {
            min_zoom: 0.25,
            max_zoom: 3.0,
            zoom_step: 1.2,
        }
    }
}

impl ZoomSettings {
    /// Validate the limits. The range must contain 1.0 so a reset view is
    /// always at natural size.
    pub fn validated(self) -> Result<Self, LayoutError> {
        let finite = self.min_zoom.is_finite() && self.max_zoom.is_finite();
        if !finite || self.min_zoom <= 0.0 || self.min_zoom > 1.0 || self.max_zoom < 1.0 {
            return Err(LayoutError::InvalidZoomRange {
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        if !self.zoom_step.is_finite() || self.zoom_step <= 1.0 {
            return Err(LayoutError::InvalidZoomStep(self.zoom_step));
        }
        Ok(self)
    }

    fn clamp(&self, level: f64) -> f64 {
        level.clamp(self.min_zoom, self.max_zoom)
    }
}

/// The visible window into the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasViewport {
    pan_offset: Point,
    zoom_level: f64,
    settings: ZoomSettings,
    /// Size of the visible area in screen pixels.
    screen: Size,
}

impl Default for CanvasViewport {
    fn default() -> Self {
        Self {
            pan_offset: Point::zero(),
            zoom_level: 1.0,
            settings: ZoomSettings::default(),
            screen: Size::new(1920.0, 1080.0),
        }
    }
}

impl CanvasViewport {
    /// Create a viewport at zoom 1 with no pan.
    pub fn new(settings: ZoomSettings, screen: Size) -> Result<Self, LayoutError> {
        let settings = settings.validated()?;
        Ok(Self {
            pan_offset: Point::zero(),
            zoom_level: settings.clamp(1.0),
            settings,
            screen,
        })
    }

    pub fn pan_offset(&self) -> Point {
        self.pan_offset
    }

    pub fn zoom_level(&self) -> f64 {
        self.zoom_level
    }

    pub fn settings(&self) -> ZoomSettings {
        self.settings
    }

    pub fn screen_size(&self) -> Size {
        self.screen
    }

    /// Update the visible area after the host surface was resized.
    pub fn set_screen_size(&mut self, screen: Size) {
        if !screen.is_degenerate() {
            self.screen = screen;
        }
    }

    /// Replace the zoom limits and re-clamp the current level.
    pub fn set_settings(&mut self, settings: ZoomSettings) -> Result<(), LayoutError> {
        self.settings = settings.validated()?;
        self.zoom_level = self.settings.clamp(self.zoom_level);
        Ok(())
    }

    pub fn set_pan_offset(&mut self, pan: Point) {
        if pan.x.is_finite() && pan.y.is_finite() {
            self.pan_offset = pan;
        }
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.set_pan_offset(self.pan_offset.offset(Point::new(dx, dy)));
    }

    pub fn zoom_in(&mut self) {
        self.zoom_to(self.zoom_level * self.settings.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_to(self.zoom_level / self.settings.zoom_step);
    }

    /// Set an absolute zoom level, clamped to the configured range.
    ///
    /// Non-finite levels are ignored.
    pub fn zoom_to(&mut self, level: f64) {
        if level.is_finite() {
            self.zoom_level = self.settings.clamp(level);
        }
    }

    /// Zoom while keeping the canvas point under `anchor` (screen space) fixed.
    pub fn zoom_at(&mut self, level: f64, anchor: Point) {
        let canvas_anchor = self.screen_to_canvas(anchor);
        self.zoom_to(level);
        self.pan_offset = anchor.delta_from(canvas_anchor.scale(self.zoom_level));
    }

    pub fn canvas_to_screen(&self, point: Point) -> Point {
        self.pan_offset.offset(point.scale(self.zoom_level))
    }

    pub fn screen_to_canvas(&self, point: Point) -> Point {
        point.delta_from(self.pan_offset).scale(1.0 / self.zoom_level)
    }

    /// The part of the canvas currently on screen, in canvas coordinates.
    pub fn visible_canvas_rect(&self) -> Rect {
        let origin = self.screen_to_canvas(Point::zero());
        Rect::new(
            origin.x,
            origin.y,
            self.screen.width / self.zoom_level,
            self.screen.height / self.zoom_level,
        )
    }

    /// Return to zoom 1 with no pan.
    pub fn reset(&mut self) {
        self.zoom_level = 1.0;
        self.pan_offset = Point::zero();
    }

    /// Fit `bounds` (grown by `padding` canvas units) to the screen, centered.
    ///
    /// The scale is uniform; `None` resets the viewport.
    pub fn fit_to(&mut self, bounds: Option<Rect>, padding: f64) {
        let Some(bounds) = bounds else {
            self.reset();
            return;
        };

        let padded = bounds.inflate(padding.max(0.0));
        if padded.size().is_degenerate() || self.screen.is_degenerate() {
            self.reset();
            return;
        }

        let scale_x = self.screen.width / padded.width;
        let scale_y = self.screen.height / padded.height;
        self.zoom_level = self.settings.clamp(scale_x.min(scale_y));
        self.center_on(padded.center());
    }

    /// Pan so a canvas point sits in the middle of the screen.
    pub fn center_on(&mut self, canvas_point: Point) {
        self.pan_offset = Point::new(
            self.screen.width / 2.0 - canvas_point.x * self.zoom_level,
            self.screen.height / 2.0 - canvas_point.y * self.zoom_level,
        );
    }

    /// Adjust pan, and zoom only if needed, so `target` is fully visible.
    ///
    /// Leaves the viewport untouched when the target is already on screen.
    /// Returns true if anything changed.
    pub fn scroll_into_view(&mut self, target: Rect, padding: f64) -> bool {
        if self.visible_canvas_rect().contains_rect(&target) {
            return false;
        }

        let padded = target.inflate(padding.max(0.0));
        let needed_zoom = (self.screen.width / padded.width).min(self.screen.height / padded.height);
        if needed_zoom.is_finite() && needed_zoom < self.zoom_level {
            self.zoom_level = self.settings.clamp(needed_zoom);
        }

        let visible = self.visible_canvas_rect();
        let shift_x = axis_shift(visible.x, visible.right(), padded.x, padded.right());
        let shift_y = axis_shift(visible.y, visible.bottom(), padded.y, padded.bottom());

        // A canvas shift of `d` needs a pan change of `-d * zoom`.
        self.pan_offset = Point::new(
            self.pan_offset.x - shift_x * self.zoom_level,
            self.pan_offset.y - shift_y * self.zoom_level,
        );
        true
    }
}

/// Smallest move of the `[lo, hi]` window that covers `[start, end]`.
///
/// When the target is larger than the window its start edge wins.
fn axis_shift(lo: f64, hi: f64, start: f64, end: f64) -> f64 {
    if start < lo || end - start > hi - lo {
        start - lo
    } else if end > hi {
        end - hi
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn viewport() -> CanvasViewport {
        CanvasViewport::new(ZoomSettings::default(), Size::new(1000.0, 800.0)).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let bad_range = ZoomSettings {
            min_zoom: 2.0,
            max_zoom: 1.0,
            zoom_step: 1.2,
        };
        assert!(matches!(
            CanvasViewport::new(bad_range, Size::new(10.0, 10.0)),
            Err(LayoutError::InvalidZoomRange { .. })
        ));

        let above_one = ZoomSettings {
            min_zoom: 1.5,
            max_zoom: 4.0,
            zoom_step: 1.2,
        };
        assert!(matches!(
            above_one.validated(),
            Err(LayoutError::InvalidZoomRange { .. })
        ));
        let below_one = ZoomSettings {
            min_zoom: 0.1,
            max_zoom: 0.5,
            zoom_step: 1.2,
        };
        assert!(below_one.validated().is_err());

        let bad_step = ZoomSettings {
            zoom_step: 1.0,
            ..ZoomSettings::default()
        };
        assert!(matches!(
            bad_step.validated(),
            Err(LayoutError::InvalidZoomStep(_))
        ));
    }

    #[test]
    fn test_zoom_in_out_clamps() {
        let mut vp = viewport();
        vp.zoom_in();
        assert!(approx(vp.zoom_level(), 1.2));
        vp.zoom_out();
        assert!(approx(vp.zoom_level(), 1.0));

        for _ in 0..50 {
            vp.zoom_in();
        }
        assert_eq!(vp.zoom_level(), 3.0);
        for _ in 0..50 {
            vp.zoom_out();
        }
        assert_eq!(vp.zoom_level(), 0.25);
    }

    #[test]
    fn test_zoom_to_ignores_nan() {
        let mut vp = viewport();
        vp.zoom_to(2.0);
        vp.zoom_to(f64::NAN);
        assert_eq!(vp.zoom_level(), 2.0);
        vp.zoom_to(100.0);
        assert_eq!(vp.zoom_level(), 3.0);
    }

    #[test]
    fn test_coordinate_transform() {
        let mut vp = viewport();
        vp.set_pan_offset(Point::new(100.0, 50.0));
        vp.zoom_to(2.0);

        let screen = vp.canvas_to_screen(Point::new(10.0, 10.0));
        assert_eq!(screen, Point::new(120.0, 70.0));
        assert_eq!(vp.screen_to_canvas(screen), Point::new(10.0, 10.0));
    }

    #[test]
    fn test_zoom_at_keeps_anchor() {
        let mut vp = viewport();
        let anchor = Point::new(300.0, 200.0);
        let before = vp.screen_to_canvas(anchor);
        vp.zoom_at(2.0, anchor);
        let after = vp.screen_to_canvas(anchor);
        assert!(approx(before.x, after.x));
        assert!(approx(before.y, after.y));
    }

    #[test]
    fn test_fit_to_none_resets() {
        let mut vp = viewport();
        vp.zoom_to(2.5);
        vp.pan_by(40.0, -30.0);
        vp.fit_to(None, 20.0);
        assert_eq!(vp.zoom_level(), 1.0);
        assert_eq!(vp.pan_offset(), Point::zero());
    }

    #[test]
    fn test_fit_to_uniform_and_centered() {
        let mut vp = viewport();
        // 2000x800 content (with padding 0) on a 1000x800 screen: width limits.
        vp.fit_to(Some(Rect::new(0.0, 0.0, 2000.0, 800.0)), 0.0);
        assert!(approx(vp.zoom_level(), 0.5));

        let visible = vp.visible_canvas_rect();
        assert!(visible.contains_rect(&Rect::new(0.0, 0.0, 2000.0, 800.0)));
        assert!(approx(visible.center().x, 1000.0));
        assert!(approx(visible.center().y, 400.0));
    }

    #[test]
    fn test_fit_to_respects_padding() {
        let mut vp = viewport();
        vp.fit_to(Some(Rect::new(0.0, 0.0, 460.0, 360.0)), 20.0);
        // padded box is 500x400 → scale 2.0 on both axes
        assert!(approx(vp.zoom_level(), 2.0));
        assert_eq!(vp.canvas_to_screen(Point::new(-20.0, -20.0)), Point::new(0.0, 0.0));
    }

    #[test]
    fn test_scroll_into_view_noop_when_visible() {
        let mut vp = viewport();
        assert!(!vp.scroll_into_view(Rect::new(10.0, 10.0, 100.0, 100.0), 10.0));
        assert_eq!(vp.pan_offset(), Point::zero());
        assert_eq!(vp.zoom_level(), 1.0);
    }

    #[test]
    fn test_scroll_into_view_pans_without_zoom() {
        let mut vp = viewport();
        let target = Rect::new(1500.0, 100.0, 200.0, 200.0);
        assert!(vp.scroll_into_view(target, 10.0));
        assert_eq!(vp.zoom_level(), 1.0);
        assert!(vp.visible_canvas_rect().contains_rect(&target));
        // Minimal move: right edge of the padded target lines up with the screen edge.
        assert!(approx(vp.visible_canvas_rect().right(), 1710.0));
    }

    #[test]
    fn test_scroll_into_view_zooms_out_when_too_large() {
        let mut vp = viewport();
        vp.zoom_to(2.0);
        let target = Rect::new(0.0, 0.0, 800.0, 300.0);
        assert!(vp.scroll_into_view(target, 0.0));
        assert_eq!(vp.zoom_level(), 1.25);
        assert!(vp.visible_canvas_rect().contains_rect(&target));
    }

    proptest! {
        #[test]
        fn prop_zoom_stays_in_bounds(ops in prop::collection::vec((0u8..3, -10.0f64..10.0), 0..80)) {
            let mut vp = viewport();
            for (op, level) in ops {
                match op {
                    0 => vp.zoom_in(),
                    1 => vp.zoom_out(),
                    _ => vp.zoom_to(level),
                }
                prop_assert!(vp.zoom_level() >= 0.25 && vp.zoom_level() <= 3.0);
            }
        }
    }
}
