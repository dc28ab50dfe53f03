//! Shared document types other than notes: locks, presence and cursors.
//!
//! All four collections implement [`Document`], which names the collection,
//! the key a document is stored under, and how an untrusted JSON document is
//! validated into the typed record.

use canvas::doc::{Note, NoteId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::validate::{Fields, ValidationError};

pub const NOTES: &str = "notes";
pub const LOCKS: &str = "locks";
pub const PRESENCE: &str = "presence";
pub const CURSORS: &str = "cursors";

/// A record stored in a named collection and keyed by one of its fields.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Field whose value is the document key.
    const KEY_FIELD: &'static str;

    fn key(&self) -> String;

    /// Validate an inbound document.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    fn from_value(value: &Value) -> Result<Self, ValidationError>;
}

/// Advisory editing lock, keyed by the note it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    pub note_id: NoteId,
    pub user_id: Uuid,
    pub username: String,
    pub user_color: String,
    pub locked_at: i64,
}

/// Liveness heartbeat for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    pub user_id: Uuid,
    pub username: String,
    pub color: String,
    pub last_seen: i64,
}

/// Last broadcast pointer position of one user, in canvas coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub user_id: Uuid,
    pub username: String,
    pub color: String,
    pub canvas_x: f64,
    pub canvas_y: f64,
    pub last_moved_at: i64,
}

impl Document for Note {
    const COLLECTION: &'static str = NOTES;
    const KEY_FIELD: &'static str = "id";

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::of(value)?;
        Ok(Self {
            id: f.uuid("id")?,
            title: f.string("title")?,
            content: f.string("content")?,
            x: f.finite("x")?,
            y: f.finite("y")?,
            color: f.color("color")?,
            z_index: f.non_negative_int("z_index")?,
            updated_at: f.timestamp("updated_at")?,
        })
    }
}

impl Document for Lock {
    const COLLECTION: &'static str = LOCKS;
    const KEY_FIELD: &'static str = "note_id";

    fn key(&self) -> String {
        self.note_id.to_string()
    }

    fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::of(value)?;
        Ok(Self {
            note_id: f.uuid("note_id")?,
            user_id: f.uuid("user_id")?,
            username: f.string("username")?,
            user_color: f.string("user_color")?,
            locked_at: f.timestamp("locked_at")?,
        })
    }
}

impl Document for Presence {
    const COLLECTION: &'static str = PRESENCE;
    const KEY_FIELD: &'static str = "user_id";

    fn key(&self) -> String {
        self.user_id.to_string()
    }

    fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::of(value)?;
        Ok(Self {
            user_id: f.uuid("user_id")?,
            username: f.string("username")?,
            color: f.string("color")?,
            last_seen: f.timestamp("last_seen")?,
        })
    }
}

impl Document for Cursor {
    const COLLECTION: &'static str = CURSORS;
    const KEY_FIELD: &'static str = "user_id";

    fn key(&self) -> String {
        self.user_id.to_string()
    }

    fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::of(value)?;
        Ok(Self {
            user_id: f.uuid("user_id")?,
            username: f.string("username")?,
            color: f.string("color")?,
            canvas_x: f.finite("canvas_x")?,
            canvas_y: f.finite("canvas_y")?,
            last_moved_at: f.timestamp("last_moved_at")?,
        })
    }
}
