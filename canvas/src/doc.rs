//! Document model: notes, their colors, sparse patches, and the in-memory note cache.
//!
//! This module defines what lives on the board (`Note`, `NoteColor`), a
//! sparse-update type for incremental edits (`NotePatch`), and the
//! client-side cache the engine reads from (`NoteDoc`).
//!
//! Data flows into this layer from store snapshots (whole-collection
//! replacement) and from the input engine (optimistic local edits). The
//! renderer and hit-tester read notes in paint order via `sorted_notes`.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique, client-generated identifier for a note.
pub type NoteId = Uuid;

/// Background color of a note card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteColor {
    #[default]
    Yellow,
    Pink,
    Blue,
    Green,
}

impl NoteColor {
    /// Every color, in toolbar order.
    pub const ALL: [NoteColor; 4] = [Self::Yellow, Self::Pink, Self::Blue, Self::Green];

    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yellow => "yellow",
            Self::Pink => "pink",
            Self::Blue => "blue",
            Self::Green => "green",
        }
    }

    /// Parse a wire name. Returns `None` for anything outside the enum.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for NoteColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sticky note as stored in the shared document set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Globally unique identifier, generated by the creating client.
    pub id: NoteId,
    pub title: String,
    pub content: String,
    /// Canvas-space x of the top-left corner.
    pub x: f64,
    /// Canvas-space y of the top-left corner.
    pub y: f64,
    pub color: NoteColor,
    /// Paint order; higher values are drawn above lower values.
    pub z_index: u64,
    /// Milliseconds since the Unix epoch of the last write. Stamped by the store.
    pub updated_at: i64,
}

impl Note {
    /// A blank note at a canvas position with a fresh id.
    #[must_use]
    pub fn new(x: f64, y: f64, color: NoteColor, z_index: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            content: String::new(),
            x,
            y,
            color,
            z_index,
            updated_at: 0,
        }
    }

    /// Apply every present field of `patch`.
    pub fn apply(&mut self, patch: &NotePatch) {
        if let Some(ref title) = patch.title {
            self.title.clone_from(title);
        }
        if let Some(ref content) = patch.content {
            self.content.clone_from(content);
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(z) = patch.z_index {
            self.z_index = z;
        }
    }
}

/// Sparse update for a note. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<NoteColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<u64>,
}

impl NotePatch {
    /// A position-only patch.
    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Default::default() }
    }

    /// A z-index-only patch.
    #[must_use]
    pub fn z_index(z_index: u64) -> Self {
        Self { z_index: Some(z_index), ..Default::default() }
    }

    /// Returns `true` when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.x.is_none()
            && self.y.is_none()
            && self.color.is_none()
            && self.z_index.is_none()
    }
}

/// In-memory cache of the notes a client currently knows about.
#[derive(Debug, Default)]
pub struct NoteDoc {
    notes: HashMap<NoteId, Note>,
}

impl NoteDoc {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self { notes: HashMap::new() }
    }

    /// Insert or replace a note.
    pub fn insert(&mut self, note: Note) {
        self.notes.insert(note.id, note);
    }

    /// Remove a note by id, returning it if it was present.
    pub fn remove(&mut self, id: &NoteId) -> Option<Note> {
        self.notes.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.get(id)
    }

    /// Apply a patch to an existing note. Returns false if the note doesn't exist.
    pub fn apply_patch(&mut self, id: &NoteId, patch: &NotePatch) -> bool {
        let Some(note) = self.notes.get_mut(id) else {
            return false;
        };
        note.apply(patch);
        true
    }

    /// Replace all notes with a full snapshot.
    pub fn load_snapshot(&mut self, notes: Vec<Note>) {
        self.notes.clear();
        for note in notes {
            self.notes.insert(note.id, note);
        }
    }

    /// All notes sorted by `(z_index, id)`, bottom first.
    #[must_use]
    pub fn sorted_notes(&self) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.notes.values().collect();
        notes.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));
        notes
    }

    /// Iterate notes in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
