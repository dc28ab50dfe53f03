//! Local single-user backend.
//!
//! DESIGN
//! ======
//! Notes live in local storage as one serialized array under
//! [`NOTES_KEY`]; every write loads the array, changes it, and writes it back.
//! Loading re-derives the same shape through the inbound validation, so a
//! hand-edited or stale blob cannot inject malformed notes. Locks, presence
//! and cursors only matter while the process runs and stay in memory.
//!
//! ERROR HANDLING
//! ==============
//! Storage failures (quota, I/O) are returned to the caller as
//! `StoreError::LocalPersistence`. An unreadable blob is logged and treated as
//! empty; it is a cache, not the only copy in multi-user mode.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canvas::doc::{Note, NoteId, NotePatch};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::channel::{SnapshotChannel, SnapshotEvent, Subscription};
use super::{Backend, DocumentStore};
use crate::clock::now_ms;
use crate::error::{Saved, StoreError};
use crate::records::{Cursor, Document, Lock, Presence};
use crate::storage::{LocalStorage, NOTES_KEY, StorageError};
use crate::validate::filter_valid;

/// The notes array in local storage.
#[derive(Clone)]
pub struct LocalNotes {
    storage: Arc<dyn LocalStorage>,
}

impl LocalNotes {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    /// Every valid stored note.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn load(&self) -> Result<Vec<Note>, StorageError> {
        let Some(raw) = self.storage.get(NOTES_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(docs) => Ok(filter_valid(docs)),
            Err(e) => {
                warn!(error = %e, "local notes blob unreadable; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Replace the stored array.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the storage write fails.
    pub fn save(&self, notes: &[Note]) -> Result<(), StorageError> {
        crate::storage::save_json(self.storage.as_ref(), NOTES_KEY, notes)
    }
}

/// An in-memory collection with snapshot fan-out.
struct Ephemeral<T> {
    docs: Mutex<BTreeMap<String, T>>,
    channel: SnapshotChannel<T>,
}

impl<T: Document> Ephemeral<T> {
    fn new() -> Self {
        Self { docs: Mutex::new(BTreeMap::new()), channel: SnapshotChannel::default() }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, T>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put(&self, doc: T) {
        let mut docs = self.lock();
        docs.insert(doc.key(), doc);
        self.channel.publish(&docs.values().cloned().collect::<Vec<_>>());
    }

    fn delete(&self, key: &str) {
        let mut docs = self.lock();
        if docs.remove(key).is_some() {
            self.channel.publish(&docs.values().cloned().collect::<Vec<_>>());
        }
    }

    fn subscribe(&self) -> Subscription<T> {
        let docs = self.lock();
        self.channel.subscribe(SnapshotEvent::Snapshot(docs.values().cloned().collect()))
    }
}

/// Single-user store over local storage.
pub struct LocalStore {
    notes: LocalNotes,
    write: Mutex<()>,
    note_channel: SnapshotChannel<Note>,
    locks: Ephemeral<Lock>,
    presence: Ephemeral<Presence>,
    cursors: Ephemeral<Cursor>,
}

impl LocalStore {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self {
            notes: LocalNotes::new(storage),
            write: Mutex::new(()),
            note_channel: SnapshotChannel::default(),
            locks: Ephemeral::new(),
            presence: Ephemeral::new(),
            cursors: Ephemeral::new(),
        }
    }

    /// Replace the cached notes array without notifying subscribers.
    pub(crate) fn mirror_notes(&self, notes: &[Note]) -> Result<(), StorageError> {
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        self.notes.save(notes)
    }

    /// The cached notes array.
    pub(crate) fn cached_notes(&self) -> Result<Vec<Note>, StorageError> {
        self.notes.load()
    }

    /// Load, change and save the notes array under the write lock, then
    /// publish the result. `change` returns false to skip the write.
    fn modify_notes(&self, change: impl FnOnce(&mut Vec<Note>) -> bool) -> Result<Saved, StoreError> {
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        let mut notes = self.notes.load()?;
        if !change(&mut notes) {
            return Ok(Saved::Local);
        }
        self.notes.save(&notes)?;
        self.note_channel.publish(&notes);
        Ok(Saved::Local)
    }
}

#[async_trait::async_trait]
impl DocumentStore for LocalStore {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    async fn create_note(&self, mut note: Note) -> Result<Saved, StoreError> {
        note.updated_at = now_ms();
        self.modify_notes(|notes| {
            match notes.iter_mut().find(|n| n.id == note.id) {
                Some(existing) => *existing = note,
                None => notes.push(note),
            }
            true
        })
    }

    async fn update_note(&self, id: NoteId, fields: NotePatch) -> Result<Saved, StoreError> {
        self.modify_notes(|notes| {
            let Some(note) = notes.iter_mut().find(|n| n.id == id) else {
                debug!(%id, "update for unknown note ignored");
                return false;
            };
            note.apply(&fields);
            note.updated_at = now_ms();
            true
        })
    }

    async fn delete_note(&self, id: NoteId) -> Result<Saved, StoreError> {
        self.modify_notes(|notes| {
            let before = notes.len();
            notes.retain(|n| n.id != id);
            notes.len() != before
        })
    }

    async fn put_lock(&self, lock: Lock) -> Result<(), StoreError> {
        self.locks.put(lock);
        Ok(())
    }

    async fn delete_lock(&self, note_id: NoteId) -> Result<(), StoreError> {
        self.locks.delete(&note_id.to_string());
        Ok(())
    }

    async fn put_presence(&self, presence: Presence) -> Result<(), StoreError> {
        self.presence.put(presence);
        Ok(())
    }

    async fn delete_presence(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.presence.delete(&user_id.to_string());
        Ok(())
    }

    async fn put_cursor(&self, cursor: Cursor) -> Result<(), StoreError> {
        self.cursors.put(cursor);
        Ok(())
    }

    async fn delete_cursor(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.cursors.delete(&user_id.to_string());
        Ok(())
    }

    fn subscribe_notes(&self) -> Subscription<Note> {
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        let initial = match self.notes.load() {
            Ok(notes) => SnapshotEvent::Snapshot(notes),
            Err(e) => SnapshotEvent::Error(e.into()),
        };
        self.note_channel.subscribe(initial)
    }

    fn subscribe_locks(&self) -> Subscription<Lock> {
        self.locks.subscribe()
    }

    fn subscribe_presence(&self) -> Subscription<Presence> {
        self.presence.subscribe()
    }

    fn subscribe_cursors(&self) -> Subscription<Cursor> {
        self.cursors.subscribe()
    }
}
