//! Board controller: the authoritative in-memory note list.
//!
//! DESIGN
//! ======
//! Every mutation runs in two phases: apply to the local model, then hand a
//! [`WriteOp`] to the write queue without awaiting it. The store echoes the
//! write back through the snapshot feed, and [`BoardController::apply_snapshot`]
//! folds that batch in through the merge engine.
//!
//! Shared-note positions live in a [`PlacementTable`] rebuilt from every
//! shared batch. After each merge the auto-placement pass gives every shared
//! note without an entry for the current user a free slot, placing them one
//! at a time against an occupancy set that grows with each placement. The
//! pass runs again whenever the viewport's column count changes. A shared
//! note still waiting for a slot is not rendered and occupies nothing.
//!
//! Two users placing different unplaced shared notes at the same moment can
//! pick the same cell; each pass only sees its own merged occupancy.
//!
//! ERROR HANDLING
//! ==============
//! Refused operations return a [`BoardError`] and log it. A refusal never
//! leaves a partial local change or an enqueued write behind.

#[cfg(test)]
#[path = "board_test.rs"]
mod board_test;

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::grid::{Cell, Rect, offset, px_to_cells};
use crate::layout::{BoardView, LayoutMode, Viewport, project};
use crate::merge::{dedupe_by_id, merge, parse_batch};
use crate::note::{Note, NoteColor, NoteId, NoteKey, NoteRecord, NoteSource, PlacementTable, RecordPatch, UserId};
use crate::persistence::{WriteOp, WriteQueue};
use crate::placement::{PlacementError, find_free_slot};
use crate::store::{CollectionPath, StoreError};
use crate::theme::Theme;

// =============================================================================
// TYPES
// =============================================================================

/// Why a drag was not committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DragRejection {
    #[error("target ({row}, {col}) is off the board")]
    Negative { row: i64, col: i64 },
    #[error("target overlaps {other}")]
    Overlap { other: NoteKey },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("note not found: {0}")]
    NotFound(NoteKey),
    #[error(transparent)]
    BoardFull(#[from] PlacementError),
    #[error("{action} on {key} refused: only the creator may do that")]
    Unauthorized { key: NoteKey, action: &'static str },
    #[error("drag rejected: {0}")]
    DragRejected(DragRejection),
    #[error("dragging is disabled in stacked mode")]
    DragDisabled,
    #[error("deletion not confirmed")]
    Declined,
}

impl crate::ErrorCode for BoardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_NOTE_NOT_FOUND",
            Self::BoardFull(e) => crate::ErrorCode::error_code(e),
            Self::Unauthorized { .. } => "E_UNAUTHORIZED",
            Self::DragRejected(_) => "E_DRAG_REJECTED",
            Self::DragDisabled => "E_DRAG_DISABLED",
            Self::Declined => "E_DECLINED",
        }
    }
}

/// Interactive confirmation for destructive operations.
pub trait ConfirmPrompt {
    fn confirm(&self, note: &Note) -> bool;
}

impl<F> ConfirmPrompt for F
where
    F: Fn(&Note) -> bool,
{
    fn confirm(&self, note: &Note) -> bool {
        self(note)
    }
}

/// What a confirmed delete did to the backing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The record was deleted for everyone.
    Deleted,
    /// Only the acting user's placement was removed; others still hold one.
    PlacementRemoved,
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct BoardController {
    user_id: UserId,
    personal: CollectionPath,
    shared: CollectionPath,
    notes: Vec<Note>,
    placements: PlacementTable,
    viewport: Viewport,
    writes: WriteQueue,
    last_id: NoteId,
}

impl BoardController {
    /// # Errors
    ///
    /// Returns `InvalidCollection` when `user_id` cannot name a collection.
    pub fn new(user_id: &str, viewport: Viewport, writes: WriteQueue) -> Result<Self, StoreError> {
        Ok(Self {
            user_id: user_id.to_owned(),
            personal: CollectionPath::personal(user_id)?,
            shared: CollectionPath::shared(),
            notes: Vec::new(),
            placements: PlacementTable::new(),
            viewport,
            writes,
            last_id: 0,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[must_use]
    pub fn note(&self, key: NoteKey) -> Option<&Note> {
        self.notes.iter().find(|n| n.key() == key)
    }

    #[must_use]
    pub fn placements(&self) -> &PlacementTable {
        &self.placements
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn mode(&self) -> LayoutMode {
        self.viewport.mode()
    }

    /// Container or window width changed. Stored positions are never moved;
    /// a new column count retries placement of shared notes still lacking
    /// one. Returns the notes placed.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Vec<(NoteKey, Cell)> {
        if self.viewport.mode() != viewport.mode() {
            debug!(from = ?self.viewport.mode(), to = ?viewport.mode(), "layout mode changed");
        }
        let cols_changed = self.viewport.max_cols() != viewport.max_cols();
        self.viewport = viewport;
        if cols_changed {
            self.auto_place()
        } else {
            Vec::new()
        }
    }

    /// Render the placed notes. Shared notes waiting for a slot stay hidden.
    #[must_use]
    pub fn view(&self, theme: Theme) -> BoardView {
        let visible: Vec<Note> = self.notes.iter().filter(|n| !self.is_unplaced(n)).cloned().collect();
        project(&visible, &self.viewport, theme, &self.user_id)
    }

    #[must_use]
    pub fn collection_for(&self, source: NoteSource) -> &CollectionPath {
        match source {
            NoteSource::Personal => &self.personal,
            NoteSource::Shared => &self.shared,
        }
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Fold one feed delivery into the list, then place any shared notes the
    /// current user has no position for. Returns the notes placed.
    pub fn apply_snapshot(&mut self, source: NoteSource, batch: &[Value]) -> Vec<(NoteKey, Cell)> {
        let records = dedupe_by_id(parse_batch(batch, source));
        if source == NoteSource::Shared {
            self.placements = PlacementTable::from_records(&records);
        }
        let count = records.len();
        self.notes = merge(&self.notes, records, source, &self.user_id);
        debug!(%source, count, total = self.notes.len(), "snapshot merged");
        self.auto_place()
    }

    /// Place every shared note lacking a placement for the current user.
    ///
    /// Occupancy starts from the placed notes and grows with each placement.
    /// A note with no free slot is skipped with a warning and stays unplaced.
    pub fn auto_place(&mut self) -> Vec<(NoteKey, Cell)> {
        let max_cols = self.viewport.max_cols();
        let mut occupied = self.occupied();
        let mut placed = Vec::new();

        for idx in 0..self.notes.len() {
            let note = &self.notes[idx];
            if !self.is_unplaced(note) {
                continue;
            }
            let key = note.key();
            match find_free_slot(note.width, note.height, &occupied, max_cols) {
                Ok(cell) => {
                    let note = &mut self.notes[idx];
                    note.row = cell.row;
                    note.col = cell.col;
                    occupied.push(note.rect());
                    self.placements.insert(key.id, &self.user_id, cell);
                    self.writes.enqueue(WriteOp::Update {
                        collection: self.shared.clone(),
                        id: key.id,
                        patch: RecordPatch::placement(&self.user_id, cell),
                    });
                    info!(note = %key, row = cell.row, col = cell.col, "shared note placed");
                    placed.push((key, cell));
                }
                Err(e) => warn!(note = %key, error = %e, "shared note left unplaced"),
            }
        }
        placed
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Create a 1x1 personal note in the first free slot.
    ///
    /// # Errors
    ///
    /// Returns `BoardFull` when no slot is free; nothing is added.
    pub fn add_note(&mut self) -> Result<NoteKey, BoardError> {
        self.create(NoteSource::Personal)
    }

    /// Create a 1x1 shared note authored by the current user.
    ///
    /// # Errors
    ///
    /// Returns `BoardFull` when no slot is free; nothing is added.
    pub fn add_shared_note(&mut self) -> Result<NoteKey, BoardError> {
        self.create(NoteSource::Shared)
    }

    fn create(&mut self, source: NoteSource) -> Result<NoteKey, BoardError> {
        let mut note = Note::new(self.next_id(source), source);
        let cell = find_free_slot(note.width, note.height, &self.occupied(), self.viewport.max_cols())
            .map_err(|e| self.refuse(note.key(), BoardError::from(e)))?;
        note.row = cell.row;
        note.col = cell.col;

        let record = match source {
            NoteSource::Personal => NoteRecord::personal(&note),
            NoteSource::Shared => {
                note.created_by = Some(self.user_id.clone());
                self.placements.insert(note.id, &self.user_id, cell);
                NoteRecord::shared(&note, &self.user_id)
            }
        };
        let key = note.key();
        self.last_id = note.id;
        self.notes.push(note);
        self.writes.enqueue(WriteOp::Create { collection: self.collection_for(source).clone(), record });
        info!(note = %key, row = cell.row, col = cell.col, "note added");
        Ok(key)
    }

    /// Delete a note after `prompt` confirms it.
    ///
    /// A shared note deleted by a non-creator only loses the acting user's
    /// placement; the record goes once no placement is left.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown key and `Declined` when the prompt
    /// refuses.
    pub fn delete_note(&mut self, key: NoteKey, prompt: &dyn ConfirmPrompt) -> Result<DeleteOutcome, BoardError> {
        let idx = self.index_of(key)?;
        if !prompt.confirm(&self.notes[idx]) {
            debug!(note = %key, "delete declined");
            return Err(BoardError::Declined);
        }
        let note = self.notes.remove(idx);
        let collection = self.collection_for(key.source).clone();

        let outcome = match key.source {
            NoteSource::Personal => DeleteOutcome::Deleted,
            NoteSource::Shared if note.can_edit(&self.user_id) => {
                self.placements.remove_note(key.id);
                DeleteOutcome::Deleted
            }
            NoteSource::Shared => {
                self.placements.remove(key.id, &self.user_id);
                if self.placements.count_for(key.id) == 0 {
                    DeleteOutcome::Deleted
                } else {
                    DeleteOutcome::PlacementRemoved
                }
            }
        };

        let op = match outcome {
            DeleteOutcome::Deleted => WriteOp::Delete { collection, id: key.id },
            DeleteOutcome::PlacementRemoved => {
                WriteOp::Update { collection, id: key.id, patch: RecordPatch::dismiss(&self.user_id) }
            }
        };
        self.writes.enqueue(op);
        info!(note = %key, ?outcome, "note deleted");
        Ok(outcome)
    }

    /// Advance the note to the next palette color.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown key.
    pub fn recolor(&mut self, key: NoteKey) -> Result<NoteColor, BoardError> {
        let idx = self.index_of(key)?;
        let color = self.notes[idx].color.next();
        self.notes[idx].color = color;
        self.persist(key, RecordPatch::color(color));
        Ok(color)
    }

    /// Replace the note's text.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown key and `Unauthorized` for a shared
    /// note the user did not create.
    pub fn edit_content(&mut self, key: NoteKey, text: &str) -> Result<(), BoardError> {
        let idx = self.authorized(key, "edit")?;
        text.clone_into(&mut self.notes[idx].content);
        self.persist(key, RecordPatch::content(text));
        Ok(())
    }

    /// Set the note's span, clamped to at least 1x1. Overlaps the new size
    /// creates are accepted.
    ///
    /// # Errors
    ///
    /// Same as [`Self::edit_content`].
    pub fn resize(&mut self, key: NoteKey, width: i64, height: i64) -> Result<(u32, u32), BoardError> {
        let idx = self.authorized(key, "resize")?;
        let width = clamp_span(width);
        let height = clamp_span(height);
        let note = &mut self.notes[idx];
        note.width = width;
        note.height = height;
        self.persist(key, RecordPatch::size(width, height));
        Ok((width, height))
    }

    /// Commit a drag gesture that moved the note by `(dx_px, dy_px)`.
    ///
    /// # Errors
    ///
    /// Returns `DragDisabled` in stacked mode and `DragRejected` when the
    /// target is negative or overlaps another rendered note. A rejected drag
    /// leaves every position unchanged.
    pub fn drag_end(&mut self, key: NoteKey, dx_px: f64, dy_px: f64) -> Result<Cell, BoardError> {
        let idx = self.index_of(key)?;
        if self.mode() == LayoutMode::Stacked {
            return Err(self.refuse(key, BoardError::DragDisabled));
        }

        let note = &self.notes[idx];
        let d_row = px_to_cells(dy_px);
        let d_col = px_to_cells(dx_px);
        let (Some(row), Some(col)) = (offset(note.row, d_row), offset(note.col, d_col)) else {
            let rejection = DragRejection::Negative {
                row: i64::from(note.row) + d_row,
                col: i64::from(note.col) + d_col,
            };
            return Err(self.refuse(key, BoardError::DragRejected(rejection)));
        };

        let target = Rect::new(row, col, note.width, note.height);
        // Only rendered notes block the target.
        if let Some(other) = self
            .notes
            .iter()
            .filter(|n| n.key() != key && !self.is_unplaced(n))
            .find(|n| target.overlaps(&n.rect()))
        {
            let rejection = DragRejection::Overlap { other: other.key() };
            return Err(self.refuse(key, BoardError::DragRejected(rejection)));
        }

        let cell = target.origin();
        let note = &mut self.notes[idx];
        note.row = cell.row;
        note.col = cell.col;
        let patch = match key.source {
            NoteSource::Personal => RecordPatch::position(cell),
            NoteSource::Shared => {
                self.placements.insert(key.id, &self.user_id, cell);
                RecordPatch::placement(&self.user_id, cell)
            }
        };
        self.persist(key, patch);
        Ok(cell)
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn index_of(&self, key: NoteKey) -> Result<usize, BoardError> {
        self.notes
            .iter()
            .position(|n| n.key() == key)
            .ok_or_else(|| self.refuse(key, BoardError::NotFound(key)))
    }

    fn authorized(&self, key: NoteKey, action: &'static str) -> Result<usize, BoardError> {
        let idx = self.index_of(key)?;
        if self.notes[idx].can_edit(&self.user_id) {
            Ok(idx)
        } else {
            Err(self.refuse(key, BoardError::Unauthorized { key, action }))
        }
    }

    fn refuse(&self, key: NoteKey, err: BoardError) -> BoardError {
        warn!(note = %key, user = %self.user_id, error = %err, code = crate::ErrorCode::error_code(&err), "board operation refused");
        err
    }

    fn persist(&self, key: NoteKey, patch: RecordPatch) {
        self.writes.enqueue(WriteOp::Update { collection: self.collection_for(key.source).clone(), id: key.id, patch });
    }

    /// Shared notes with no placement for the current user are neither
    /// rendered nor counted as occupying cells.
    fn is_unplaced(&self, note: &Note) -> bool {
        note.source == NoteSource::Shared && !self.placements.contains(note.id, &self.user_id)
    }

    fn occupied(&self) -> Vec<Rect> {
        self.notes
            .iter()
            .filter(|n| !self.is_unplaced(n))
            .map(Note::rect)
            .collect()
    }

    /// Creation-time id, bumped past every id already used in `source`.
    fn next_id(&self, source: NoteSource) -> NoteId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or_default();
        let floor = self
            .notes
            .iter()
            .filter(|n| n.source == source)
            .map(|n| n.id)
            .chain(std::iter::once(self.last_id))
            .max()
            .unwrap_or_default()
            .saturating_add(1);
        now.max(floor)
    }
}

fn clamp_span(requested: i64) -> u32 {
    u32::try_from(requested.max(1)).unwrap_or(u32::MAX)
}

