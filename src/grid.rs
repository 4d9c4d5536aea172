//! Grid geometry: cell coordinates, pixel conversion, and overlap queries.
//!
//! Everything here is a pure function over integer grid rectangles. Both the
//! placement resolver and the board controller build on these helpers, and
//! the layout module uses the pixel conversions to produce render boxes.

#[cfg(test)]
#[path = "grid_test.rs"]
mod grid_test;

use serde::{Deserialize, Serialize};

use crate::consts::{CELL_SIZE_PX, GUTTER_PX};

/// A top-left grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
}

impl Cell {
    #[must_use]
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// An axis-aligned rectangle in cell units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub row: u32,
    pub col: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub fn new(row: u32, col: u32, width: u32, height: u32) -> Self {
        Self { row, col, width, height }
    }

    /// Build a rectangle of the given span anchored at `cell`.
    #[must_use]
    pub fn at(cell: Cell, width: u32, height: u32) -> Self {
        Self { row: cell.row, col: cell.col, width, height }
    }

    #[must_use]
    pub fn origin(&self) -> Cell {
        Cell { row: self.row, col: self.col }
    }

    /// Two rectangles overlap iff both their row intervals and their column
    /// intervals intersect. Touching edges do not count.
    #[must_use]
    pub fn overlaps(&self, other: &Rect) -> bool {
        let rows = u64::from(self.row) < u64::from(other.row) + u64::from(other.height)
            && u64::from(other.row) < u64::from(self.row) + u64::from(self.height);
        let cols = u64::from(self.col) < u64::from(other.col) + u64::from(other.width)
            && u64::from(other.col) < u64::from(self.col) + u64::from(self.width);
        rows && cols
    }
}

/// True if `rect` overlaps any rectangle in `occupied`.
#[must_use]
pub fn overlaps_any(rect: &Rect, occupied: &[Rect]) -> bool {
    occupied.iter().any(|other| rect.overlaps(other))
}

/// Convert a pixel distance to a whole number of cells, rounding to the
/// nearest cell. Used for drag deltas.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn px_to_cells(px: f64) -> i64 {
    (px / CELL_SIZE_PX).round() as i64
}

/// Cell index containing the pixel offset `px` (floor division).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn px_to_index(px: f64) -> u32 {
    if px <= 0.0 {
        return 0;
    }
    (px / CELL_SIZE_PX).floor() as u32
}

/// Pixel offset of the top-left corner of a cell index.
#[must_use]
pub fn index_to_px(index: u32) -> f64 {
    f64::from(index) * CELL_SIZE_PX
}

/// Rendered pixel extent of a span of `cells`, with the gutter taken off.
#[must_use]
pub fn span_to_px(cells: u32) -> f64 {
    (f64::from(cells) * CELL_SIZE_PX - GUTTER_PX).max(0.0)
}

/// Apply a signed cell offset to an unsigned coordinate. Returns `None`
/// when the result would be negative or out of range.
#[must_use]
pub fn offset(base: u32, delta: i64) -> Option<u32> {
    let target = i64::from(base).checked_add(delta)?;
    u32::try_from(target).ok()
}
