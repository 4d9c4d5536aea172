use std::collections::BTreeSet;

use serde_json::json;

use super::*;
use crate::grid::Cell;
use crate::note::NoteKey;

fn record(id: NoteId, content: &str) -> NoteRecord {
    NoteRecord::parse(&json!({"id": id, "content": content, "color": "yellow", "row": 0, "col": id}))
        .unwrap()
}

fn shared(id: NoteId, placements: serde_json::Value) -> NoteRecord {
    NoteRecord::parse(&json!({
        "id": id, "content": "s", "color": "blue", "createdBy": "alice", "placements": placements
    }))
    .unwrap()
}

fn keys(notes: &[Note]) -> BTreeSet<NoteKey> {
    notes.iter().map(Note::key).collect()
}

// =============================================================
// parse_batch
// =============================================================

#[test]
fn parse_batch_filters_malformed_entries() {
    let values = vec![
        json!({"id": 1, "content": "ok", "color": "pink"}),
        json!({"content": "missing id", "color": "pink"}),
        json!(null),
        json!({"id": 2, "content": "ok too", "color": "blue"}),
    ];
    let records = parse_batch(&values, NoteSource::Personal);
    assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
}

// =============================================================
// dedupe_by_id
// =============================================================

#[test]
fn dedupe_keeps_last_write_in_first_position() {
    let out = dedupe_by_id(vec![record(1, "a"), record(2, "b"), record(1, "c")]);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].id, 1);
    assert_eq!(out[0].content, "c");
    assert_eq!(out[1].id, 2);
}

// =============================================================
// merge
// =============================================================

#[test]
fn merge_replaces_whole_source_slice() {
    let first = merge(&[], vec![record(1, "a"), record(2, "b")], NoteSource::Personal, "u");
    let second = merge(&first, vec![record(2, "b2")], NoteSource::Personal, "u");
    assert_eq!(keys(&second), BTreeSet::from([NoteKey::personal(2)]));
    assert_eq!(second[0].content, "b2");
}

#[test]
fn merge_keeps_other_source_untouched() {
    let personal = merge(&[], vec![record(1, "mine")], NoteSource::Personal, "alice");
    let both = merge(
        &personal,
        vec![shared(1, json!({"alice": {"row": 2, "col": 0}}))],
        NoteSource::Shared,
        "alice",
    );
    assert_eq!(keys(&both), BTreeSet::from([NoteKey::personal(1), NoteKey::shared(1)]));
    let mine = both.iter().find(|n| n.source == NoteSource::Personal).unwrap();
    assert_eq!(mine.content, "mine");
}

#[test]
fn merge_dedupes_incoming_batch() {
    let out = merge(&[], vec![record(4, "x"), record(4, "y")], NoteSource::Personal, "u");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].content, "y");
}

#[test]
fn merge_resolves_shared_placement_for_current_user() {
    let out = merge(
        &[],
        vec![shared(1, json!({"alice": {"row": 2, "col": 1}, "bob": {"row": 0, "col": 0}}))],
        NoteSource::Shared,
        "alice",
    );
    assert_eq!(out[0].cell(), Cell::new(2, 1));
}

#[test]
fn merge_defaults_unplaced_shared_note_to_origin() {
    let out = merge(&[], vec![shared(1, json!({"bob": {"row": 3, "col": 3}}))], NoteSource::Shared, "alice");
    assert_eq!(out[0].cell(), Cell::new(0, 0));
}

#[test]
fn merge_hides_shared_notes_dismissed_by_user() {
    let mut dismissed = shared(2, json!({"alice": {"row": 0, "col": 0}}));
    dismissed.dismissed_by = Some(vec!["bob".into()]);
    let for_bob = merge(&[], vec![dismissed.clone()], NoteSource::Shared, "bob");
    assert!(for_bob.is_empty());
    let for_alice = merge(&[], vec![dismissed], NoteSource::Shared, "alice");
    assert_eq!(for_alice.len(), 1);
}

#[test]
fn empty_batch_clears_only_its_source() {
    let personal = merge(&[], vec![record(1, "a")], NoteSource::Personal, "alice");
    let both = merge(&personal, vec![shared(1, json!({}))], NoteSource::Shared, "alice");
    let cleared = merge(&both, Vec::new(), NoteSource::Personal, "alice");
    assert_eq!(keys(&cleared), BTreeSet::from([NoteKey::shared(1)]));
}

#[test]
fn interleaved_merges_converge_regardless_of_order() {
    let p1 = vec![record(1, "p1"), record(2, "p2")];
    let p2 = vec![record(2, "p2'"), record(3, "p3"), record(3, "p3'")];
    let s1 = vec![shared(1, json!({"u": {"row": 0, "col": 0}}))];
    let s2 = vec![shared(5, json!({"u": {"row": 1, "col": 1}})), shared(6, json!({}))];

    let orders: Vec<Vec<(NoteSource, Vec<NoteRecord>)>> = vec![
        vec![
            (NoteSource::Personal, p1.clone()),
            (NoteSource::Shared, s1.clone()),
            (NoteSource::Personal, p2.clone()),
            (NoteSource::Shared, s2.clone()),
        ],
        vec![
            (NoteSource::Shared, s1.clone()),
            (NoteSource::Shared, s2.clone()),
            (NoteSource::Personal, p1.clone()),
            (NoteSource::Personal, p2.clone()),
        ],
        vec![
            (NoteSource::Personal, p1),
            (NoteSource::Personal, p2),
            (NoteSource::Shared, s1),
            (NoteSource::Shared, s2),
        ],
    ];

    let expected = BTreeSet::from([
        NoteKey::personal(2),
        NoteKey::personal(3),
        NoteKey::shared(5),
        NoteKey::shared(6),
    ]);

    for order in orders {
        let mut list = Vec::new();
        for (source, batch) in order {
            list = merge(&list, batch, source, "u");
        }
        assert_eq!(keys(&list), expected);
        assert_eq!(list.len(), expected.len(), "no duplicate ids within a source");
        let p3 = list.iter().find(|n| n.key() == NoteKey::personal(3)).unwrap();
        assert_eq!(p3.content, "p3'");
    }
}
