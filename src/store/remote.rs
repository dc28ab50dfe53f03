//! Remote multi-user backend.
//!
//! DESIGN
//! ======
//! Writes go to a [`DocumentService`]. Note mutations that fail with a
//! network error are retried once against the local backend and reported as
//! [`Saved::LocalFallback`]; there is no background resync. Lock, presence
//! and cursor writes are not retried: they return the network error and the
//! caller drops them.
//!
//! Every remote note snapshot is mirrored into local storage. When the note
//! watch fails, subscribers get the error followed by the mirrored
//! collection, and keep receiving local snapshots until the remote watch
//! delivers again.

use std::sync::Arc;

use canvas::doc::{Note, NoteId, NotePatch};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::channel::{Feed, SnapshotEvent, Subscription};
use super::local::LocalStore;
use super::service::{DocumentService, ServiceError, WatchStream};
use super::{Backend, DocumentStore};
use crate::clock::now_ms;
use crate::error::{Saved, StoreError};
use crate::records::{Cursor, Document, Lock, Presence};
use crate::storage::LocalStorage;
use crate::validate::filter_valid;

pub struct RemoteStore {
    service: Arc<dyn DocumentService>,
    local: Arc<LocalStore>,
}

impl RemoteStore {
    pub fn new(service: Arc<dyn DocumentService>, storage: Arc<dyn LocalStorage>) -> Self {
        Self { service, local: Arc::new(LocalStore::new(storage)) }
    }

    async fn put<T: Document>(&self, doc: &T) -> Result<(), StoreError> {
        let value = encode(doc)?;
        self.service.set(T::COLLECTION, &doc.key(), value, true).await?;
        Ok(())
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        self.service.delete(collection, key).await?;
        Ok(())
    }

    fn subscribe_ephemeral<T: Document>(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watch = self.service.watch(T::COLLECTION);
        let task = tokio::spawn(async move {
            while let Some(event) = watch.next().await {
                let event = match event {
                    Ok(docs) => SnapshotEvent::Snapshot(filter_valid::<T>(docs)),
                    Err(e) => {
                        warn!(collection = T::COLLECTION, error = %e, "subscription error");
                        SnapshotEvent::Error(e.into())
                    }
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        });
        Feed::new(rx, Some(task))
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Value, ServiceError> {
    Ok(serde_json::to_value(value)?)
}

fn is_network(e: &ServiceError) -> bool {
    !matches!(e, ServiceError::NotFound { .. } | ServiceError::Encode(_))
}

#[async_trait::async_trait]
impl DocumentStore for RemoteStore {
    fn backend(&self) -> Backend {
        Backend::Remote
    }

    async fn create_note(&self, mut note: Note) -> Result<Saved, StoreError> {
        note.updated_at = now_ms();
        let value = encode(&note)?;
        match self.service.set(Note::COLLECTION, &note.key(), value, false).await {
            Ok(()) => Ok(Saved::Remote),
            Err(e) if is_network(&e) => {
                warn!(note_id = %note.id, error = %e, "remote create failed; saving locally");
                self.local.create_note(note).await.map(|_| Saved::LocalFallback)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_note(&self, id: NoteId, fields: NotePatch) -> Result<Saved, StoreError> {
        let mut value = encode(&fields)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("updated_at".into(), now_ms().into());
        }
        match self.service.update(Note::COLLECTION, &id.to_string(), value).await {
            Ok(()) => Ok(Saved::Remote),
            Err(ServiceError::NotFound { .. }) => {
                debug!(note_id = %id, "remote update for missing note ignored");
                Ok(Saved::Remote)
            }
            Err(e) if is_network(&e) => {
                warn!(note_id = %id, error = %e, "remote update failed; saving locally");
                self.local.update_note(id, fields).await.map(|_| Saved::LocalFallback)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_note(&self, id: NoteId) -> Result<Saved, StoreError> {
        match self.service.delete(Note::COLLECTION, &id.to_string()).await {
            Ok(()) => Ok(Saved::Remote),
            Err(e) if is_network(&e) => {
                warn!(note_id = %id, error = %e, "remote delete failed; deleting locally");
                self.local.delete_note(id).await.map(|_| Saved::LocalFallback)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put_lock(&self, lock: Lock) -> Result<(), StoreError> {
        self.put(&lock).await
    }

    async fn delete_lock(&self, note_id: NoteId) -> Result<(), StoreError> {
        self.remove(Lock::COLLECTION, &note_id.to_string()).await
    }

    async fn put_presence(&self, presence: Presence) -> Result<(), StoreError> {
        self.put(&presence).await
    }

    async fn delete_presence(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.remove(Presence::COLLECTION, &user_id.to_string()).await
    }

    async fn put_cursor(&self, cursor: Cursor) -> Result<(), StoreError> {
        self.put(&cursor).await
    }

    async fn delete_cursor(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.remove(Cursor::COLLECTION, &user_id.to_string()).await
    }

    fn subscribe_notes(&self) -> Subscription<Note> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watch = self.service.watch(Note::COLLECTION);
        let local_feed = self.local.subscribe_notes();
        let task = tokio::spawn(forward_notes(watch, local_feed, Arc::clone(&self.local), tx));
        Feed::new(rx, Some(task))
    }

    fn subscribe_locks(&self) -> Subscription<Lock> {
        self.subscribe_ephemeral()
    }

    fn subscribe_presence(&self) -> Subscription<Presence> {
        self.subscribe_ephemeral()
    }

    fn subscribe_cursors(&self) -> Subscription<Cursor> {
        self.subscribe_ephemeral()
    }
}

/// Drive one note subscription: remote snapshots are mirrored and forwarded;
/// while the remote watch is failing, local snapshots are forwarded instead.
async fn forward_notes(
    mut remote: WatchStream,
    mut local: Subscription<Note>,
    cache: Arc<LocalStore>,
    tx: mpsc::UnboundedSender<SnapshotEvent<Note>>,
) {
    let mut offline = false;
    let mut local_open = true;

    loop {
        let event = tokio::select! {
            remote_event = remote.next() => match remote_event {
                None => break,
                Some(Ok(docs)) => {
                    if offline {
                        info!("remote note subscription recovered");
                        offline = false;
                    }
                    let notes = filter_valid::<Note>(docs);
                    if let Err(e) = cache.mirror_notes(&notes) {
                        warn!(error = %e, "failed to mirror notes to local storage");
                    }
                    SnapshotEvent::Snapshot(notes)
                }
                Some(Err(e)) => {
                    warn!(error = %e, "remote note subscription failed; using local data");
                    if tx.send(SnapshotEvent::Error(e.into())).is_err() {
                        break;
                    }
                    offline = true;
                    while local.try_next().is_some() {}
                    match cache.cached_notes() {
                        Ok(notes) => SnapshotEvent::Snapshot(notes),
                        Err(e) => SnapshotEvent::Error(e.into()),
                    }
                }
            },
            local_event = local.next(), if offline && local_open => match local_event {
                Some(event) => event,
                None => {
                    local_open = false;
                    continue;
                }
            },
        };
        if tx.send(event).is_err() {
            break;
        }
    }
}
