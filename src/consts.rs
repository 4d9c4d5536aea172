//! Shared numeric constants for grid geometry and responsive layout.

// ── Grid ────────────────────────────────────────────────────────

/// Grid pitch in CSS pixels. One cell is this wide and this tall.
pub const CELL_SIZE_PX: f64 = 200.0;

/// Gap between neighbouring notes. Subtracted from the rendered note size,
/// never from the grid pitch.
pub const GUTTER_PX: f64 = 16.0;

// ── Placement ───────────────────────────────────────────────────

/// Row-scan cap for the placement resolver. A board with no free slot in
/// the first `MAX_SCAN_ROWS` rows is reported as full.
pub const MAX_SCAN_ROWS: u32 = 1000;

// ── Layout ──────────────────────────────────────────────────────

/// Viewport width below which the board collapses to the stacked layout
/// regardless of how many columns the container could hold.
pub const STACK_BREAKPOINT_PX: f64 = 640.0;

/// Default note size in cells.
pub const DEFAULT_NOTE_SPAN: u32 = 1;
