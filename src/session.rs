//! Board session: the facade a hosting UI drives.
//!
//! DESIGN
//! ======
//! A session owns the interaction engine plus every collaborator it feeds:
//! the four collection subscriptions, the lock coordinator, the cursor
//! publisher, the presence heartbeat and the notice queue. Input handlers
//! run the engine synchronously, then route the resulting [`Action`]s:
//!
//! - `NoteCreated` / `NoteDeleted` go straight to the store (a delete also
//!   purges the note's lock).
//! - `NoteUpdated` goes through [`LockCoordinator::try_mutate`].
//! - `CursorMoved` goes to the throttled [`CursorPublisher`].
//! - `ViewChanged` is persisted to local storage.
//!
//! Inbound snapshots are only applied when the host calls
//! [`BoardSession::next_change`] or [`BoardSession::drain`], so waiting for
//! the next snapshot stays outside the synchronous engine.
//!
//! ERROR HANDLING
//! ==============
//! Store failures never escape an input handler. They are logged with their
//! `E_*` code and surfaced as notices; fallback outcomes add a warning.

use std::sync::Arc;

use canvas::camera::{CanvasTransform, Point};
use canvas::doc::{Note, NoteColor, NoteId, NotePatch};
use canvas::engine::{Action, EngineCore, ViewState};
use canvas::hit::Rect;
use canvas::input::{Button, Key, Mode, Modifiers, WheelDelta};
use tracing::{debug, error, info, warn};

use crate::clock::now_ms;
use crate::config::Timing;
use crate::error::{ErrorCode, Saved, StoreError};
use crate::identity::LocalUser;
use crate::notify::{ActiveNotice, Notice, NoticeQueue};
use crate::records::{Cursor, Lock, Presence};
use crate::services::cursor::{CursorPublisher, active_cursors};
use crate::services::lock::{LockCoordinator, LockState, Mutation};
use crate::services::presence::{Heartbeat, online_users};
use crate::storage::{LocalStorage, VIEW_KEY, load_json, save_json};
use crate::store::{Backend, DocumentStore, SnapshotEvent, Subscription};

const CONNECTION_LOST: &str = "Connection lost, using local data";

/// Shared collection a change arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Notes,
    Locks,
    Presence,
    Cursors,
}

/// What [`BoardSession::next_change`] applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// A fresh snapshot replaced the cached collection.
    Snapshot(Collection),
    /// The subscription reported an error.
    Failed(Collection),
}

enum Incoming {
    Notes(SnapshotEvent<Note>),
    Locks(SnapshotEvent<Lock>),
    Presence(SnapshotEvent<Presence>),
    Cursors(SnapshotEvent<Cursor>),
}

pub struct BoardSession {
    store: Arc<dyn DocumentStore>,
    storage: Arc<dyn LocalStorage>,
    user: LocalUser,
    timing: Timing,
    engine: EngineCore,
    locks: LockCoordinator,
    cursors: CursorPublisher,
    heartbeat: Option<Heartbeat>,
    notices: NoticeQueue,
    note_feed: Subscription<Note>,
    lock_feed: Subscription<Lock>,
    presence_feed: Subscription<Presence>,
    cursor_feed: Subscription<Cursor>,
    presence: Vec<Presence>,
    remote_cursors: Vec<Cursor>,
    notes_loaded: bool,
    locks_loaded: bool,
}

impl BoardSession {
    /// Subscribe to every collection, start the heartbeat and restore the
    /// persisted view. Must be called inside a tokio runtime.
    pub fn open(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn LocalStorage>,
        user: LocalUser,
        timing: Timing,
    ) -> Self {
        let mut engine = EngineCore::new();
        match load_json::<ViewState>(storage.as_ref(), VIEW_KEY) {
            Ok(Some(view)) => engine.restore_view(view),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "stored view unreadable; using default"),
        }

        info!(
            user_id = %user.user_id,
            username = %user.username,
            backend = store.backend().as_str(),
            "board session opened"
        );

        Self {
            locks: LockCoordinator::new(Arc::clone(&store), user.clone(), timing.lock_grace),
            cursors: CursorPublisher::new(Arc::clone(&store), user.clone(), timing.cursor_throttle_ms()),
            heartbeat: Some(Heartbeat::spawn(Arc::clone(&store), user.clone(), timing.heartbeat)),
            note_feed: store.subscribe_notes(),
            lock_feed: store.subscribe_locks(),
            presence_feed: store.subscribe_presence(),
            cursor_feed: store.subscribe_cursors(),
            notices: NoticeQueue::new(),
            presence: Vec::new(),
            remote_cursors: Vec::new(),
            notes_loaded: false,
            locks_loaded: false,
            store,
            storage,
            user,
            timing,
            engine,
        }
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.engine.set_viewport(width, height);
    }

    pub fn set_trash_rect(&mut self, rect: Option<Rect>) {
        self.engine.set_trash_rect(rect);
    }

    pub async fn pointer_down(&mut self, at: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        let actions = self.engine.on_pointer_down(at, button, modifiers);
        self.dispatch(actions).await
    }

    pub async fn pointer_move(&mut self, at: Point, modifiers: Modifiers) -> Vec<Action> {
        let actions = self.engine.on_pointer_move(at, modifiers);
        self.dispatch(actions).await
    }

    pub async fn pointer_up(&mut self, at: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        let actions = self.engine.on_pointer_up(at, button, modifiers);
        self.dispatch(actions).await
    }

    pub async fn wheel(&mut self, at: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        let actions = self.engine.on_wheel(at, delta, modifiers);
        self.dispatch(actions).await
    }

    pub async fn key_down(&mut self, key: Key, modifiers: Modifiers) -> Vec<Action> {
        let actions = self.engine.on_key_down(key, modifiers);
        self.dispatch(actions).await
    }

    pub async fn enter_add_mode(&mut self, color: NoteColor) -> Vec<Action> {
        let actions = self.engine.enter_add_mode(color);
        self.dispatch(actions).await
    }

    pub async fn cancel_add_mode(&mut self) -> Vec<Action> {
        let actions = self.engine.cancel_add_mode();
        self.dispatch(actions).await
    }

    pub async fn zoom_in(&mut self) -> Vec<Action> {
        let actions = self.engine.zoom_in();
        self.dispatch(actions).await
    }

    pub async fn zoom_out(&mut self) -> Vec<Action> {
        let actions = self.engine.zoom_out();
        self.dispatch(actions).await
    }

    pub async fn reset_view(&mut self) -> Vec<Action> {
        let actions = self.engine.reset_view();
        self.dispatch(actions).await
    }

    pub async fn fit_to_content(&mut self) -> Vec<Action> {
        let actions = self.engine.fit_to_content();
        self.dispatch(actions).await
    }

    // =========================================================================
    // EDITING
    // =========================================================================

    /// Field focus on a note. Returns false when another user holds the lock.
    pub async fn begin_edit(&mut self, id: NoteId) -> bool {
        self.locks.begin_edit(id).await
    }

    /// Field blur on a note. The lock is released after the grace window.
    pub fn end_edit(&mut self, id: NoteId) {
        self.locks.end_edit(id);
    }

    /// Apply a local edit and issue the lock-gated write.
    pub async fn edit_note(&mut self, id: NoteId, patch: NotePatch) -> Vec<Action> {
        let actions = self.engine.edit_note(&id, patch);
        self.dispatch(actions).await
    }

    pub async fn move_note(&mut self, id: NoteId, x: f64, y: f64) -> Vec<Action> {
        self.edit_note(id, NotePatch::position(x, y)).await
    }

    /// Create a note at a canvas position. The new note becomes the selection.
    pub async fn create_note(&mut self, at: Point, color: NoteColor) -> Vec<Action> {
        let actions = self.engine.place_note_at(at, color);
        self.dispatch(actions).await
    }

    pub async fn delete_note(&mut self, id: NoteId) -> Vec<Action> {
        let actions = self.engine.delete_note(&id);
        self.dispatch(actions).await
    }

    async fn dispatch(&mut self, actions: Vec<Action>) -> Vec<Action> {
        for action in &actions {
            match action {
                Action::NoteCreated(note) => {
                    let result = self.store.create_note(note.clone()).await;
                    self.record_write("create", result);
                }
                Action::NoteUpdated { id, fields } => match self.locks.try_mutate(*id, fields.clone()).await {
                    Ok(Mutation::Written(saved)) => self.record_write("update", Ok(saved)),
                    Ok(Mutation::Locked { by }) => debug!(note_id = %id, holder = %by, "update dropped; note locked"),
                    Err(e) => self.record_write("update", Err(e)),
                },
                Action::NoteDeleted { id } => {
                    let result = self.store.delete_note(*id).await;
                    self.record_write("delete", result);
                    self.locks.purge(*id).await;
                }
                Action::CursorMoved(at) => {
                    self.cursors.publish(*at).await;
                }
                Action::ViewChanged(view) => self.save_view(*view),
                Action::SelectionChanged(_) | Action::SetCursor(_) | Action::RenderNeeded => {}
            }
        }
        actions
    }

    fn record_write(&mut self, op: &str, result: Result<Saved, StoreError>) {
        match result {
            Ok(saved) => {
                if let Some(notice) = saved.notice() {
                    self.notices.push(notice);
                }
            }
            Err(e) => {
                error!(op, code = e.error_code(), error = %e, "note write failed");
                self.notices.push(Notice::error(format!("Could not {op} note: {e}")));
            }
        }
    }

    fn save_view(&self, view: ViewState) {
        if let Err(e) = save_json(self.storage.as_ref(), VIEW_KEY, &view) {
            warn!(error = %e, "failed to persist view");
        }
    }

    // =========================================================================
    // SYNC
    // =========================================================================

    /// Wait for the next subscription event and apply it. `None` once every
    /// subscription has closed.
    pub async fn next_change(&mut self) -> Option<Change> {
        let incoming = tokio::select! {
            Some(event) = self.note_feed.next() => Incoming::Notes(event),
            Some(event) = self.lock_feed.next() => Incoming::Locks(event),
            Some(event) = self.presence_feed.next() => Incoming::Presence(event),
            Some(event) = self.cursor_feed.next() => Incoming::Cursors(event),
            else => return None,
        };
        Some(self.apply(incoming))
    }

    /// Apply every already-queued event without waiting. Returns how many
    /// were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let incoming = if let Some(event) = self.note_feed.try_next() {
                Incoming::Notes(event)
            } else if let Some(event) = self.lock_feed.try_next() {
                Incoming::Locks(event)
            } else if let Some(event) = self.presence_feed.try_next() {
                Incoming::Presence(event)
            } else if let Some(event) = self.cursor_feed.try_next() {
                Incoming::Cursors(event)
            } else {
                return applied;
            };
            self.apply(incoming);
            applied += 1;
        }
    }

    /// Wait until the first note and lock snapshots have been applied.
    /// Returns false if the subscriptions closed first.
    pub async fn ready(&mut self) -> bool {
        while !(self.notes_loaded && self.locks_loaded) {
            if self.next_change().await.is_none() {
                return false;
            }
        }
        true
    }

    fn apply(&mut self, incoming: Incoming) -> Change {
        match incoming {
            Incoming::Notes(SnapshotEvent::Snapshot(notes)) => {
                debug!(count = notes.len(), "note snapshot");
                self.engine.load_snapshot(notes);
                self.notes_loaded = true;
                Change::Snapshot(Collection::Notes)
            }
            Incoming::Notes(SnapshotEvent::Error(e)) => {
                warn!(code = e.error_code(), error = %e, "note subscription failed");
                self.notices.push(Notice::error(CONNECTION_LOST));
                Change::Failed(Collection::Notes)
            }
            Incoming::Locks(SnapshotEvent::Snapshot(locks)) => {
                self.locks.apply_snapshot(locks);
                self.engine.set_foreign_locks(self.locks.foreign_locks());
                self.locks_loaded = true;
                Change::Snapshot(Collection::Locks)
            }
            Incoming::Presence(SnapshotEvent::Snapshot(records)) => {
                self.presence = records;
                Change::Snapshot(Collection::Presence)
            }
            Incoming::Cursors(SnapshotEvent::Snapshot(records)) => {
                self.remote_cursors = records;
                Change::Snapshot(Collection::Cursors)
            }
            Incoming::Locks(SnapshotEvent::Error(e)) => failed(Collection::Locks, &e),
            Incoming::Presence(SnapshotEvent::Error(e)) => failed(Collection::Presence, &e),
            Incoming::Cursors(SnapshotEvent::Error(e)) => failed(Collection::Cursors, &e),
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.store.backend()
    }

    #[must_use]
    pub fn user(&self) -> &LocalUser {
        &self.user
    }

    #[must_use]
    pub fn engine(&self) -> &EngineCore {
        &self.engine
    }

    /// Notes in paint order, bottom first.
    #[must_use]
    pub fn notes(&self) -> Vec<&Note> {
        self.engine.notes()
    }

    #[must_use]
    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.engine.note(id)
    }

    #[must_use]
    pub fn selection(&self) -> Option<NoteId> {
        self.engine.selection()
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.engine.mode()
    }

    #[must_use]
    pub fn transform(&self) -> CanvasTransform {
        self.engine.transform()
    }

    #[must_use]
    pub fn lock_state(&self, id: &NoteId) -> LockState {
        self.locks.state(id)
    }

    #[must_use]
    pub fn locks(&self) -> Vec<Lock> {
        self.locks.locks()
    }

    #[must_use]
    pub fn online_users(&self) -> Vec<Presence> {
        online_users(&self.presence, now_ms(), self.timing.presence_timeout_ms())
    }

    /// Other users' recently moved cursors.
    #[must_use]
    pub fn active_cursors(&self) -> Vec<Cursor> {
        active_cursors(&self.remote_cursors, now_ms(), self.timing.cursor_timeout_ms(), Some(self.user.user_id))
    }

    pub fn notices(&mut self) -> &[ActiveNotice] {
        self.notices.active()
    }

    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        self.notices.dismiss(id)
    }

    /// Queue a notice from the host, e.g. a backend-selection warning.
    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    /// Stop the heartbeat, release own locks, clear the own cursor and
    /// persist the view. Subscriptions close when the session drops.
    pub async fn close(mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop().await;
        }
        self.locks.release_all().await;
        self.cursors.clear().await;
        self.save_view(self.engine.view_state());
        info!(user_id = %self.user.user_id, "board session closed");
    }
}

fn failed(collection: Collection, e: &StoreError) -> Change {
    warn!(?collection, code = e.error_code(), error = %e, "subscription failed");
    Change::Failed(collection)
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
