//! Merge engine: fold one source's snapshot batch into the rendered list.
//!
//! DESIGN
//! ======
//! Every delivery from a feed is authoritative for its source. The merge
//! drops every entry of that source from the previous list and splices in
//! the incoming batch, so a stale note of one source can never survive next
//! to a fresh batch. Entries of the other source are kept as they are.
//! Because each call only touches its own slice, interleaving personal and
//! shared deliveries in any order converges to the union of the latest batch
//! of each.
//!
//! ERROR HANDLING
//! ==============
//! Malformed snapshot entries are filtered out in [`parse_batch`] with a
//! warning; they never reach the merge.

#[cfg(test)]
#[path = "merge_test.rs"]
mod merge_test;

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::note::{Note, NoteId, NoteRecord, NoteSource};

/// Parse raw snapshot entries, dropping any that are malformed.
#[must_use]
pub fn parse_batch(values: &[Value], source: NoteSource) -> Vec<NoteRecord> {
    values
        .iter()
        .filter_map(|value| match NoteRecord::parse(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(%source, error = %e, "dropping malformed note record");
                None
            }
        })
        .collect()
}

/// Deduplicate a batch by id. The last record for an id wins and takes the
/// position of that id's first occurrence.
#[must_use]
pub fn dedupe_by_id(records: Vec<NoteRecord>) -> Vec<NoteRecord> {
    let mut slots: HashMap<NoteId, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<NoteRecord> = Vec::with_capacity(records.len());
    for record in records {
        if let Some(&idx) = slots.get(&record.id) {
            out[idx] = record;
        } else {
            slots.insert(record.id, out.len());
            out.push(record);
        }
    }
    out
}

/// Replace `source`'s slice of `previous` with `incoming`.
///
/// Shared notes take their position from `user_id`'s placement entry, or a
/// provisional `(0, 0)` when the user has none yet. Shared notes the user
/// dismissed are left out.
#[must_use]
pub fn merge(previous: &[Note], incoming: Vec<NoteRecord>, source: NoteSource, user_id: &str) -> Vec<Note> {
    let batch = dedupe_by_id(incoming);

    let mut merged: Vec<Note> = previous
        .iter()
        .filter(|note| note.source != source)
        .cloned()
        .collect();
    merged.reserve(batch.len());

    merged.extend(
        batch
            .iter()
            .filter(|record| !(source == NoteSource::Shared && record.is_dismissed_by(user_id)))
            .map(|record| Note::from_record(record, source, user_id)),
    );
    merged
}
