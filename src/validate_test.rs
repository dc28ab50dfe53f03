use serde_json::json;

use super::*;
use crate::records::{Cursor, Lock, Presence};
use canvas::doc::Note;

fn valid_note() -> Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "title": "Plan",
        "content": "ship it",
        "x": 10.5,
        "y": -20.0,
        "color": "pink",
        "z_index": 3,
        "updated_at": 1_700_000_000_000_i64,
    })
}

fn with(mut doc: Value, field: &str, value: Value) -> Value {
    doc[field] = value;
    doc
}

fn without(mut doc: Value, field: &str) -> Value {
    if let Some(map) = doc.as_object_mut() {
        map.remove(field);
    }
    doc
}

// =============================================================================
// Notes
// =============================================================================

#[test]
fn valid_note_parses() {
    let note = Note::from_value(&valid_note()).unwrap();
    assert_eq!(note.title, "Plan");
    assert_eq!(note.color, NoteColor::Pink);
    assert_eq!(note.z_index, 3);
}

#[test]
fn note_rejects_each_bad_field() {
    let cases = [
        (without(valid_note(), "title"), ValidationError::Missing("title")),
        (with(valid_note(), "content", Value::Null), ValidationError::Missing("content")),
        (with(valid_note(), "x", json!("10")), ValidationError::WrongType { field: "x", expected: "a number" }),
        (with(valid_note(), "color", json!("purple")), ValidationError::UnknownColor("purple".into())),
        (with(valid_note(), "z_index", json!(-1)), ValidationError::NotNonNegativeInteger("z_index")),
        (with(valid_note(), "z_index", json!(1.5)), ValidationError::NotNonNegativeInteger("z_index")),
        (with(valid_note(), "updated_at", json!(0)), ValidationError::BadTimestamp("updated_at")),
        (with(valid_note(), "id", json!("not-a-uuid")), ValidationError::WrongType { field: "id", expected: "a UUID" }),
    ];
    for (doc, expected) in cases {
        assert_eq!(Note::from_value(&doc).unwrap_err(), expected, "{doc}");
    }
}

#[test]
fn non_object_is_rejected() {
    assert_eq!(Note::from_value(&json!([1, 2])).unwrap_err(), ValidationError::NotAnObject);
}

#[test]
fn filter_valid_drops_only_bad_documents() {
    let good = valid_note();
    let bad = with(valid_note(), "y", json!(null));
    let notes: Vec<Note> = filter_valid(vec![good.clone(), bad, json!("junk")]);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id.to_string(), good["id"].as_str().unwrap());
}

#[test]
fn unknown_fields_are_ignored() {
    let doc = with(valid_note(), "legacy_flag", json!(true));
    assert!(Note::from_value(&doc).is_ok());
}

// =============================================================================
// Locks, presence, cursors
// =============================================================================

#[test]
fn lock_round_trips_through_json() {
    let lock = Lock {
        note_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        username: "ada".into(),
        user_color: "#e91e63".into(),
        locked_at: 5,
    };
    let parsed = Lock::from_value(&serde_json::to_value(&lock).unwrap()).unwrap();
    assert_eq!(parsed, lock);
}

#[test]
fn presence_requires_positive_last_seen() {
    let doc = json!({ "user_id": Uuid::new_v4().to_string(), "username": "b", "color": "#000", "last_seen": -5 });
    assert_eq!(Presence::from_value(&doc).unwrap_err(), ValidationError::BadTimestamp("last_seen"));
}

#[test]
fn cursor_requires_coordinates() {
    let doc = json!({
        "user_id": Uuid::new_v4().to_string(),
        "username": "c",
        "color": "#000",
        "canvas_x": 1.0,
        "last_moved_at": 10,
    });
    assert_eq!(Cursor::from_value(&doc).unwrap_err(), ValidationError::Missing("canvas_y"));
}

#[test]
fn validation_error_codes() {
    use crate::error::ErrorCode;

    assert_eq!(ValidationError::Missing("x").error_code(), "E_VALIDATION_MISSING");
    assert_eq!(ValidationError::UnknownColor("x".into()).error_code(), "E_VALIDATION_COLOR");
    assert!(!ValidationError::NotAnObject.retryable());
}
