//! Deterministic grid tiling for visible windows.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, Size};
use crate::window::{WindowId, WindowRecord, CODEX_WINDOW_ID, OUTLINE_WINDOW_ID};

/// Spacing and ordering used when tiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrangeSettings {
    /// Gap between cells.
    pub gap: f64,
    /// Margin between the tiled area and the grid.
    pub outer_gap: f64,
    /// Ids that always sort first, in this order.
    pub pinned: Vec<WindowId>,
}

impl Default for ArrangeSettings {
    fn default() -> Self {
        Self {
            gap: 16.0,
            outer_gap: 24.0,
            pinned: vec![OUTLINE_WINDOW_ID.to_string(), CODEX_WINDOW_ID.to_string()],
        }
    }
}

/// Computed target geometry for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPlacement {
    pub window_id: WindowId,
    pub rect: Rect,
    pub row: usize,
    pub column: usize,
}

/// Compare two windows: pinned ids first (in pinned order), then by title
/// ignoring case, then by id.
pub fn pinned_then_title(pinned: &[WindowId], a: &WindowRecord, b: &WindowRecord) -> Ordering {
    let rank = |w: &WindowRecord| {
        pinned
            .iter()
            .position(|p| *p == w.id)
            .unwrap_or(usize::MAX)
    };
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Columns and rows for `count` cells: the near-square grid with the fewest
/// empty cells, wider than tall when it cannot be square.
pub fn grid_dimensions(count: usize) -> (usize, usize) {
    if count == 0 {
        return (0, 0);
    }
    let mut columns = 1;
    while columns * columns < count {
        columns += 1;
    }
    let rows = count.div_ceil(columns);
    (columns, rows)
}

/// Lay out windows row-major inside `area`.
///
/// Windows are ordered with [`pinned_then_title`]; each one gets a full cell,
/// never smaller than `min_size`. Cells are separated by `gap`, so placements
/// never overlap.
pub fn compute_grid<'a>(
    windows: impl IntoIterator<Item = &'a WindowRecord>,
    area: Rect,
    min_size: Size,
    settings: &ArrangeSettings,
) -> Vec<WindowPlacement> {
    let mut ordered: Vec<&WindowRecord> = windows.into_iter().collect();
    ordered.sort_by(|a, b| pinned_then_title(&settings.pinned, a, b));

    let (columns, rows) = grid_dimensions(ordered.len());
    if columns == 0 {
        return Vec::new();
    }

    let gap = settings.gap.max(0.0);
    let outer_gap = settings.outer_gap.max(0.0);
    let usable_width = area.width - outer_gap * 2.0 - gap * (columns - 1) as f64;
    let usable_height = area.height - outer_gap * 2.0 - gap * (rows - 1) as f64;
    let cell = Size::new(usable_width / columns as f64, usable_height / rows as f64).at_least(min_size);

    ordered
        .into_iter()
        .enumerate()
        .map(|(idx, window)| {
            let row = idx / columns;
            let column = idx % columns;
            let x = area.x + outer_gap + column as f64 * (cell.width + gap);
            let y = area.y + outer_gap + row as f64 * (cell.height + gap);
            WindowPlacement {
                window_id: window.id.clone(),
                rect: Rect::new(x, y, cell.width, cell.height),
                row,
                column,
            }
        })
        .collect()
}
