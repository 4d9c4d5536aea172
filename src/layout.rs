//! Responsive layout: column count, grid vs stacked mode, render boxes.
//!
//! DESIGN
//! ======
//! The column count is derived from the board container width. One column,
//! or a viewport narrower than [`STACK_BREAKPOINT_PX`], switches to stacked
//! mode: notes are ordered by `(row, col)` and laid out top to bottom in a
//! single column with no gaps, and dragging is disabled.
//!
//! Stacked positions are a projection computed here at render time. They
//! are never written back to the notes or the store.

#[cfg(test)]
#[path = "layout_test.rs"]
mod layout_test;

use serde::Serialize;

use crate::consts::{CELL_SIZE_PX, STACK_BREAKPOINT_PX};
use crate::grid::{index_to_px, span_to_px};
use crate::note::{Note, NoteKey};
use crate::theme::Theme;

/// How notes are positioned on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Notes render at their stored `(row, col)`; drag enabled.
    #[default]
    Grid,
    /// Single column, ordered by `(row, col)`; drag disabled.
    Stacked,
}

/// Observed widths of the board container and the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub container_width: f64,
    pub viewport_width: f64,
}

impl Viewport {
    #[must_use]
    pub fn new(container_width: f64, viewport_width: f64) -> Self {
        Self { container_width, viewport_width }
    }

    /// `max(1, floor(container_width / cell_size))`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn max_cols(&self) -> u32 {
        let cols = (self.container_width / CELL_SIZE_PX).floor();
        if cols.is_finite() && cols >= 1.0 { cols.min(f64::from(u32::MAX)) as u32 } else { 1 }
    }

    #[must_use]
    pub fn mode(&self) -> LayoutMode {
        if self.max_cols() <= 1 || self.viewport_width < STACK_BREAKPOINT_PX {
            LayoutMode::Stacked
        } else {
            LayoutMode::Grid
        }
    }
}

impl Default for Viewport {
    /// A desktop-sized board: four columns, grid mode.
    fn default() -> Self {
        Self { container_width: CELL_SIZE_PX * 4.0, viewport_width: 1280.0 }
    }
}

/// One note as it should be drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedNote {
    pub key: NoteKey,
    pub content: String,
    pub fill: &'static str,
    /// Display row/col in cells. Equal to the stored position in grid mode.
    pub row: u32,
    pub col: u32,
    pub width: u32,
    pub height: u32,
    pub left_px: f64,
    pub top_px: f64,
    pub width_px: f64,
    pub height_px: f64,
    pub draggable: bool,
    /// Whether the viewer may edit content and size.
    pub editable: bool,
}

/// Render-ready projection of the whole board.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BoardView {
    pub mode: LayoutMode,
    pub max_cols: u32,
    pub notes: Vec<RenderedNote>,
}

/// Project `notes` for display under `viewport`.
#[must_use]
pub fn project(notes: &[Note], viewport: &Viewport, theme: Theme, user_id: &str) -> BoardView {
    let mode = viewport.mode();
    let max_cols = viewport.max_cols();

    let rendered = match mode {
        LayoutMode::Grid => notes
            .iter()
            .map(|note| render(note, note.row, note.col, note.width, true, theme, user_id))
            .collect(),
        LayoutMode::Stacked => {
            let mut next_row = 0u32;
            stacked_order(notes)
                .into_iter()
                .map(|note| {
                    let row = next_row;
                    next_row = next_row.saturating_add(note.height);
                    render(note, row, 0, 1, false, theme, user_id)
                })
                .collect()
        }
    };

    BoardView { mode, max_cols, notes: rendered }
}

/// Notes sorted by ascending `(row, col)`, ties broken by identity.
#[must_use]
pub fn stacked_order(notes: &[Note]) -> Vec<&Note> {
    let mut ordered: Vec<&Note> = notes.iter().collect();
    ordered.sort_by_key(|note| (note.row, note.col, note.key()));
    ordered
}

fn render(note: &Note, row: u32, col: u32, width: u32, draggable: bool, theme: Theme, user_id: &str) -> RenderedNote {
    RenderedNote {
        key: note.key(),
        content: note.content.clone(),
        fill: note.color.hex(theme),
        row,
        col,
        width,
        height: note.height,
        left_px: index_to_px(col),
        top_px: index_to_px(row),
        width_px: span_to_px(width),
        height_px: span_to_px(note.height),
        draggable,
        editable: note.can_edit(user_id),
    }
}
