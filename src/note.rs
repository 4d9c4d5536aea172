//! Note model: domain notes, wire records, partial patches, and placements.
//!
//! A [`Note`] is the render-ready domain value the board controller owns.
//! A [`NoteRecord`] is the document shape stored in and streamed from the
//! backing store. A [`RecordPatch`] is a partial update: only present fields
//! are written, and per-user placement entries merge key by key with `None`
//! deleting the entry.
//!
//! Per-user positions of shared notes are held in a [`PlacementTable`], a
//! relation `(note id, user id) -> cell`, so "no placements left" is a count
//! over that relation.

#[cfg(test)]
#[path = "note_test.rs"]
mod note_test;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::consts::DEFAULT_NOTE_SPAN;
use crate::grid::{Cell, Rect};
use crate::theme::Theme;

/// Identifier of a note, unique within its source collection.
pub type NoteId = i64;

/// Identifier of a board user.
pub type UserId = String;

// =============================================================================
// SOURCE / KEY
// =============================================================================

/// Ownership class of a note. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteSource {
    Personal,
    Shared,
}

impl NoteSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Shared => "shared",
        }
    }
}

impl std::fmt::Display for NoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a note across both sources. Ids are only unique per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteKey {
    pub source: NoteSource,
    pub id: NoteId,
}

impl NoteKey {
    #[must_use]
    pub fn personal(id: NoteId) -> Self {
        Self { source: NoteSource::Personal, id }
    }

    #[must_use]
    pub fn shared(id: NoteId) -> Self {
        Self { source: NoteSource::Shared, id }
    }
}

impl std::fmt::Display for NoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

// =============================================================================
// COLOR
// =============================================================================

/// Note color. Recoloring cycles through [`NoteColor::PALETTE`] in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteColor {
    #[default]
    Yellow,
    Pink,
    Blue,
    Green,
    Purple,
}

impl NoteColor {
    pub const PALETTE: [NoteColor; 5] = [Self::Yellow, Self::Pink, Self::Blue, Self::Green, Self::Purple];

    /// The next color in palette order, wrapping at the end.
    #[must_use]
    pub fn next(self) -> Self {
        let idx = Self::PALETTE.iter().position(|c| *c == self).unwrap_or(0);
        Self::PALETTE[(idx + 1) % Self::PALETTE.len()]
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yellow => "yellow",
            Self::Pink => "pink",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Purple => "purple",
        }
    }

    /// Read a stored color name. Unknown names fall back to the first
    /// palette entry.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        Self::PALETTE
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(raw.trim()))
            .unwrap_or_default()
    }

    /// CSS fill for this color under `theme`.
    #[must_use]
    pub fn hex(self, theme: Theme) -> &'static str {
        match (self, theme) {
            (Self::Yellow, Theme::Light) => "#FFF59D",
            (Self::Yellow, Theme::Dark) => "#8D7B1F",
            (Self::Pink, Theme::Light) => "#F8BBD0",
            (Self::Pink, Theme::Dark) => "#8E3B5A",
            (Self::Blue, Theme::Light) => "#BBDEFB",
            (Self::Blue, Theme::Dark) => "#2F5B85",
            (Self::Green, Theme::Light) => "#C8E6C9",
            (Self::Green, Theme::Dark) => "#3B6E3F",
            (Self::Purple, Theme::Light) => "#E1BEE7",
            (Self::Purple, Theme::Dark) => "#5E3A6E",
        }
    }
}

// =============================================================================
// NOTE
// =============================================================================

/// A render-ready note as held by the board controller.
///
/// For shared notes `row`/`col` mirror the current user's placement; they are
/// never written back as the shared record's own position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: NoteId,
    pub content: String,
    pub color: NoteColor,
    pub width: u32,
    pub height: u32,
    pub row: u32,
    pub col: u32,
    pub source: NoteSource,
    /// Author of a shared note. Always `None` for personal notes.
    pub created_by: Option<UserId>,
}

impl Note {
    /// A fresh 1x1 note at the origin.
    #[must_use]
    pub fn new(id: NoteId, source: NoteSource) -> Self {
        Self {
            id,
            content: String::new(),
            color: NoteColor::default(),
            width: DEFAULT_NOTE_SPAN,
            height: DEFAULT_NOTE_SPAN,
            row: 0,
            col: 0,
            source,
            created_by: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> NoteKey {
        NoteKey { source: self.source, id: self.id }
    }

    #[must_use]
    pub fn cell(&self) -> Cell {
        Cell { row: self.row, col: self.col }
    }

    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.row, self.col, self.width, self.height)
    }

    /// Content and size edits: personal notes always, shared notes only by
    /// their creator.
    #[must_use]
    pub fn can_edit(&self, user_id: &str) -> bool {
        match self.source {
            NoteSource::Personal => true,
            NoteSource::Shared => self.created_by.as_deref() == Some(user_id),
        }
    }

    /// Build the domain note for `record`, resolving the shared placement for
    /// `user_id`. Unplaced shared notes get a provisional `(0, 0)`.
    #[must_use]
    pub fn from_record(record: &NoteRecord, source: NoteSource, user_id: &str) -> Self {
        let cell = match source {
            NoteSource::Personal => Cell::new(record.row.unwrap_or(0), record.col.unwrap_or(0)),
            NoteSource::Shared => record.placement_for(user_id).unwrap_or_default(),
        };
        Self {
            id: record.id,
            content: record.content.clone(),
            color: NoteColor::from_wire(&record.color),
            width: record.width.unwrap_or(DEFAULT_NOTE_SPAN).max(1),
            height: record.height.unwrap_or(DEFAULT_NOTE_SPAN).max(1),
            row: cell.row,
            col: cell.col,
            source,
            created_by: match source {
                NoteSource::Personal => None,
                NoteSource::Shared => record.created_by.clone(),
            },
        }
    }
}

// =============================================================================
// WIRE RECORD
// =============================================================================

/// A note document as stored in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: NoteId,
    pub content: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placements: Option<BTreeMap<UserId, Cell>>,
    /// Users who removed this shared note from their own board.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissed_by: Option<Vec<UserId>>,
}

impl NoteRecord {
    /// Parse one snapshot entry.
    ///
    /// # Errors
    ///
    /// Returns the serde error when required fields are missing or mistyped.
    pub fn parse(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Record for a personal note: position stored on the record itself.
    #[must_use]
    pub fn personal(note: &Note) -> Self {
        Self {
            id: note.id,
            content: note.content.clone(),
            color: note.color.as_str().to_owned(),
            width: Some(note.width),
            height: Some(note.height),
            row: Some(note.row),
            col: Some(note.col),
            created_by: None,
            placements: None,
            dismissed_by: None,
        }
    }

    /// Record for a new shared note: the creator's position goes into
    /// `placements`, the record carries no position of its own.
    #[must_use]
    pub fn shared(note: &Note, creator: &str) -> Self {
        Self {
            id: note.id,
            content: note.content.clone(),
            color: note.color.as_str().to_owned(),
            width: Some(note.width),
            height: Some(note.height),
            row: None,
            col: None,
            created_by: Some(creator.to_owned()),
            placements: Some(BTreeMap::from([(creator.to_owned(), note.cell())])),
            dismissed_by: None,
        }
    }

    #[must_use]
    pub fn placement_for(&self, user_id: &str) -> Option<Cell> {
        self.placements.as_ref().and_then(|p| p.get(user_id).copied())
    }

    #[must_use]
    pub fn is_dismissed_by(&self, user_id: &str) -> bool {
        self.dismissed_by
            .as_ref()
            .is_some_and(|users| users.iter().any(|u| u == user_id))
    }
}

// =============================================================================
// PARTIAL UPDATE
// =============================================================================

/// Partial update for a stored note. Only present fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
    /// Per-user placement entries to set (`Some`) or delete (`None`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub placements: BTreeMap<UserId, Option<Cell>>,
    /// Users to add to the record's dismissal set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dismissed_by: Vec<UserId>,
}

impl RecordPatch {
    #[must_use]
    pub fn content(text: impl Into<String>) -> Self {
        Self { content: Some(text.into()), ..Self::default() }
    }

    #[must_use]
    pub fn color(color: NoteColor) -> Self {
        Self { color: Some(color.as_str().to_owned()), ..Self::default() }
    }

    #[must_use]
    pub fn size(width: u32, height: u32) -> Self {
        Self { width: Some(width), height: Some(height), ..Self::default() }
    }

    #[must_use]
    pub fn position(cell: Cell) -> Self {
        Self { row: Some(cell.row), col: Some(cell.col), ..Self::default() }
    }

    /// Set one user's placement, leaving other users' entries untouched.
    #[must_use]
    pub fn placement(user_id: &str, cell: Cell) -> Self {
        Self { placements: BTreeMap::from([(user_id.to_owned(), Some(cell))]), ..Self::default() }
    }

    /// Delete one user's placement and record that the user dismissed the note.
    #[must_use]
    pub fn dismiss(user_id: &str) -> Self {
        Self {
            placements: BTreeMap::from([(user_id.to_owned(), None)]),
            dismissed_by: vec![user_id.to_owned()],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge this patch into a stored JSON document. Returns `false` if the
    /// document is not a JSON object.
    pub fn apply_to(&self, doc: &mut Value) -> bool {
        let Some(fields) = doc.as_object_mut() else {
            return false;
        };

        if let Some(content) = &self.content {
            fields.insert("content".into(), json!(content));
        }
        if let Some(color) = &self.color {
            fields.insert("color".into(), json!(color));
        }
        if let Some(width) = self.width {
            fields.insert("width".into(), json!(width));
        }
        if let Some(height) = self.height {
            fields.insert("height".into(), json!(height));
        }
        if let Some(row) = self.row {
            fields.insert("row".into(), json!(row));
        }
        if let Some(col) = self.col {
            fields.insert("col".into(), json!(col));
        }

        if !self.placements.is_empty() {
            let entry = fields
                .entry("placements")
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Some(existing) = entry.as_object_mut() {
                for (user, cell) in &self.placements {
                    match cell {
                        Some(cell) => {
                            existing.insert(user.clone(), json!({ "row": cell.row, "col": cell.col }));
                        }
                        None => {
                            existing.remove(user);
                        }
                    }
                }
            }
        }

        if !self.dismissed_by.is_empty() {
            let entry = fields
                .entry("dismissedBy")
                .or_insert_with(|| Value::Array(Vec::new()));
            if !entry.is_array() {
                *entry = Value::Array(Vec::new());
            }
            if let Some(existing) = entry.as_array_mut() {
                for user in &self.dismissed_by {
                    let value = json!(user);
                    if !existing.contains(&value) {
                        existing.push(value);
                    }
                }
            }
        }

        true
    }
}

// =============================================================================
// PLACEMENT TABLE
// =============================================================================

/// Relation `(note id, user id) -> cell` for shared notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementTable {
    rows: BTreeMap<(NoteId, UserId), Cell>,
}

impl PlacementTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the relation from a shared snapshot batch.
    #[must_use]
    pub fn from_records(records: &[NoteRecord]) -> Self {
        let mut table = Self::new();
        for record in records {
            for (user, cell) in record.placements.iter().flatten() {
                table.insert(record.id, user, *cell);
            }
        }
        table
    }

    #[must_use]
    pub fn get(&self, note_id: NoteId, user_id: &str) -> Option<Cell> {
        self.rows.get(&(note_id, user_id.to_owned())).copied()
    }

    #[must_use]
    pub fn contains(&self, note_id: NoteId, user_id: &str) -> bool {
        self.get(note_id, user_id).is_some()
    }

    pub fn insert(&mut self, note_id: NoteId, user_id: &str, cell: Cell) {
        self.rows.insert((note_id, user_id.to_owned()), cell);
    }

    pub fn remove(&mut self, note_id: NoteId, user_id: &str) -> Option<Cell> {
        self.rows.remove(&(note_id, user_id.to_owned()))
    }

    /// Drop every placement of `note_id`.
    pub fn remove_note(&mut self, note_id: NoteId) {
        self.rows.retain(|(id, _), _| *id != note_id);
    }

    /// Number of users that currently hold a placement for `note_id`.
    #[must_use]
    pub fn count_for(&self, note_id: NoteId) -> usize {
        self.rows.keys().filter(|(id, _)| *id == note_id).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
