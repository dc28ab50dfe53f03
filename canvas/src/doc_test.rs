#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;

fn note_with_z(z: u64) -> Note {
    Note::new(0.0, 0.0, NoteColor::Yellow, z)
}

// =============================================================
// NoteColor
// =============================================================

#[test]
fn color_default_is_yellow() {
    assert_eq!(NoteColor::default(), NoteColor::Yellow);
}

#[test]
fn color_wire_names_are_lowercase() {
    for color in NoteColor::ALL {
        let json = serde_json::to_value(color).unwrap();
        assert_eq!(json, json!(color.as_str()));
        assert_eq!(color.to_string(), color.as_str());
    }
}

#[test]
fn color_parse_known_and_unknown() {
    assert_eq!(NoteColor::parse("pink"), Some(NoteColor::Pink));
    assert_eq!(NoteColor::parse("green"), Some(NoteColor::Green));
    assert_eq!(NoteColor::parse("Pink"), None);
    assert_eq!(NoteColor::parse("purple"), None);
}

#[test]
fn color_rejects_unknown_on_deserialize() {
    let result: Result<NoteColor, _> = serde_json::from_value(json!("orange"));
    assert!(result.is_err());
}

// =============================================================
// Note
// =============================================================

#[test]
fn new_note_is_blank_with_fresh_id() {
    let a = Note::new(10.0, 20.0, NoteColor::Blue, 7);
    let b = Note::new(10.0, 20.0, NoteColor::Blue, 7);
    assert_ne!(a.id, b.id);
    assert!(a.title.is_empty());
    assert!(a.content.is_empty());
    assert_eq!((a.x, a.y), (10.0, 20.0));
    assert_eq!(a.z_index, 7);
    assert_eq!(a.updated_at, 0);
}

#[test]
fn note_serde_field_names() {
    let note = Note::new(1.0, 2.0, NoteColor::Green, 3);
    let json = serde_json::to_value(&note).unwrap();
    assert_eq!(json["color"], json!("green"));
    assert_eq!(json["z_index"], json!(3));
    assert_eq!(json["updated_at"], json!(0));
    assert_eq!(json["id"], json!(note.id.to_string()));
}

#[test]
fn apply_sets_only_present_fields() {
    let mut note = Note::new(0.0, 0.0, NoteColor::Yellow, 1);
    note.title = "keep".into();
    note.apply(&NotePatch { content: Some("body".into()), x: Some(5.0), ..Default::default() });
    assert_eq!(note.title, "keep");
    assert_eq!(note.content, "body");
    assert_eq!(note.x, 5.0);
    assert_eq!(note.y, 0.0);
    assert_eq!(note.color, NoteColor::Yellow);
}

// =============================================================
// NotePatch
// =============================================================

#[test]
fn patch_default_is_empty() {
    assert!(NotePatch::default().is_empty());
    assert!(!NotePatch::position(1.0, 2.0).is_empty());
    assert!(!NotePatch::z_index(4).is_empty());
}

#[test]
fn patch_skips_absent_fields_on_serialize() {
    let json = serde_json::to_value(NotePatch::position(3.0, 4.0)).unwrap();
    assert_eq!(json, json!({ "x": 3.0, "y": 4.0 }));
}

#[test]
fn patch_deserializes_partial_object() {
    let patch: NotePatch = serde_json::from_value(json!({ "title": "t", "color": "blue" })).unwrap();
    assert_eq!(patch.title.as_deref(), Some("t"));
    assert_eq!(patch.color, Some(NoteColor::Blue));
    assert!(patch.x.is_none());
}

// =============================================================
// NoteDoc
// =============================================================

#[test]
fn doc_insert_get_remove() {
    let mut doc = NoteDoc::new();
    let note = note_with_z(1);
    let id = note.id;
    doc.insert(note);
    assert_eq!(doc.len(), 1);
    assert!(doc.get(&id).is_some());
    assert!(doc.remove(&id).is_some());
    assert!(doc.is_empty());
    assert!(doc.remove(&id).is_none());
}

#[test]
fn doc_apply_patch_missing_returns_false() {
    let mut doc = NoteDoc::new();
    assert!(!doc.apply_patch(&Uuid::new_v4(), &NotePatch::position(1.0, 1.0)));
}

#[test]
fn doc_apply_patch_updates_note() {
    let mut doc = NoteDoc::new();
    let note = note_with_z(1);
    let id = note.id;
    doc.insert(note);
    assert!(doc.apply_patch(&id, &NotePatch::z_index(9)));
    assert_eq!(doc.get(&id).map(|n| n.z_index), Some(9));
}

#[test]
fn doc_load_snapshot_replaces_everything() {
    let mut doc = NoteDoc::new();
    let stale = note_with_z(1);
    let stale_id = stale.id;
    doc.insert(stale);

    let fresh = vec![note_with_z(2), note_with_z(3)];
    doc.load_snapshot(fresh);
    assert_eq!(doc.len(), 2);
    assert!(doc.get(&stale_id).is_none());
}

#[test]
fn sorted_notes_orders_by_z_then_id() {
    let mut doc = NoteDoc::new();
    let top = note_with_z(10);
    let bottom = note_with_z(1);
    let tie_a = note_with_z(5);
    let tie_b = note_with_z(5);
    let (top_id, bottom_id) = (top.id, bottom.id);
    let (lo_tie, hi_tie) = if tie_a.id < tie_b.id { (tie_a.id, tie_b.id) } else { (tie_b.id, tie_a.id) };
    for n in [top, tie_b, bottom, tie_a] {
        doc.insert(n);
    }

    let ids: Vec<NoteId> = doc.sorted_notes().iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![bottom_id, lo_tie, hi_tie, top_id]);
}

#[test]
fn sorted_notes_empty_doc() {
    assert!(NoteDoc::new().sorted_notes().is_empty());
}
