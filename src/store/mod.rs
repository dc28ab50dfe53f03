//! Document store abstraction.
//!
//! DESIGN
//! ======
//! [`DocumentStore`] is the one capability every consumer holds, as an
//! `Arc<dyn DocumentStore>` chosen once at startup by [`open_store`] /
//! [`select_store`]:
//!
//! - [`RemoteStore`]: multi-user, backed by a [`DocumentService`]
//!   (Postgres or in-process), mirroring notes into local storage.
//! - [`LocalStore`]: single-user, notes persisted as one local blob.
//!
//! Subscriptions deliver whole-collection snapshots; consumers replace their
//! cached view on every event. Inbound documents pass through
//! [`crate::validate`] and invalid ones are dropped from the snapshot.
//!
//! ERROR HANDLING
//! ==============
//! Every mutating call returns a `Result` the caller must inspect. Note
//! writes that fail remotely fall back to local storage and report
//! [`Saved::LocalFallback`]; lock, presence and cursor writes report the
//! network error and are not retried.

mod channel;
mod factory;
mod local;
mod memory;
mod postgres;
mod remote;
mod service;

pub use channel::{Feed, SnapshotChannel, SnapshotEvent, Subscription};
pub use factory::{OpenedStore, open_store, select_store};
pub use local::{LocalNotes, LocalStore};
pub use memory::MemoryDocumentService;
pub use postgres::PgDocumentService;
pub use remote::RemoteStore;
pub use service::{DocumentService, ServiceError, WatchEvent, WatchStream};

use canvas::doc::{Note, NoteId, NotePatch};
use uuid::Uuid;

use crate::error::{Saved, StoreError};
use crate::records::{Cursor, Lock, Presence};

/// Which implementation is authoritative for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Remote,
    Local,
}

impl Backend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend(&self) -> Backend;

    /// Insert or overwrite a note. `updated_at` is stamped by the store.
    async fn create_note(&self, note: Note) -> Result<Saved, StoreError>;

    /// Merge `fields` into a note. An unknown id is a no-op success.
    async fn update_note(&self, id: NoteId, fields: NotePatch) -> Result<Saved, StoreError>;

    /// Delete a note. An unknown id is a no-op success.
    async fn delete_note(&self, id: NoteId) -> Result<Saved, StoreError>;

    async fn put_lock(&self, lock: Lock) -> Result<(), StoreError>;
    async fn delete_lock(&self, note_id: NoteId) -> Result<(), StoreError>;
    async fn put_presence(&self, presence: Presence) -> Result<(), StoreError>;
    async fn delete_presence(&self, user_id: Uuid) -> Result<(), StoreError>;
    async fn put_cursor(&self, cursor: Cursor) -> Result<(), StoreError>;
    async fn delete_cursor(&self, user_id: Uuid) -> Result<(), StoreError>;

    fn subscribe_notes(&self) -> Subscription<Note>;
    fn subscribe_locks(&self) -> Subscription<Lock>;
    fn subscribe_presence(&self) -> Subscription<Presence>;
    fn subscribe_cursors(&self) -> Subscription<Cursor>;
}
