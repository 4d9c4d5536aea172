//! Placement resolver: first free slot in row-major order.
//!
//! DESIGN
//! ======
//! The scan walks rows from 0 upward and, within a row, columns from 0 to
//! `max_cols - width`. The first candidate whose rectangle overlaps nothing
//! in the occupancy set wins. The search is a pure function of its inputs,
//! so two passes over the same occupancy always agree; callers that place
//! several notes in a row append each result to their occupancy before the
//! next call.
//!
//! The row scan is capped at [`MAX_SCAN_ROWS`]. Running past the cap is a
//! reported `BoardFull` condition, never a loop or a panic.

#[cfg(test)]
#[path = "placement_test.rs"]
mod placement_test;

use crate::consts::MAX_SCAN_ROWS;
use crate::grid::{Cell, Rect, overlaps_any};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("no free {width}x{height} slot within {max_cols} columns")]
    BoardFull { width: u32, height: u32, max_cols: u32 },
}

impl crate::ErrorCode for PlacementError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BoardFull { .. } => "E_BOARD_FULL",
        }
    }
}

/// Find the first free `(row, col)` for a `width` x `height` note.
///
/// Zero spans are treated as 1 and `max_cols` is at least 1.
///
/// # Errors
///
/// Returns `BoardFull` when the note is wider than the board or no slot is
/// free within the first [`MAX_SCAN_ROWS`] rows.
pub fn find_free_slot(width: u32, height: u32, occupied: &[Rect], max_cols: u32) -> Result<Cell, PlacementError> {
    find_free_slot_within(width, height, occupied, max_cols, MAX_SCAN_ROWS)
}

/// Same as [`find_free_slot`] with an explicit row cap.
///
/// # Errors
///
/// Returns `BoardFull` when no slot is free within `row_cap` rows.
pub fn find_free_slot_within(
    width: u32,
    height: u32,
    occupied: &[Rect],
    max_cols: u32,
    row_cap: u32,
) -> Result<Cell, PlacementError> {
    let width = width.max(1);
    let height = height.max(1);
    let max_cols = max_cols.max(1);
    let full = PlacementError::BoardFull { width, height, max_cols };

    // EDGE: no column can ever hold a note wider than the board.
    let Some(last_col) = max_cols.checked_sub(width) else {
        return Err(full);
    };

    for row in 0..row_cap {
        for col in 0..=last_col {
            let candidate = Rect::new(row, col, width, height);
            if !overlaps_any(&candidate, occupied) {
                return Ok(candidate.origin());
            }
        }
    }

    Err(full)
}
