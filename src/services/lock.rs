//! Lock coordinator: advisory per-note edit locks.
//!
//! DESIGN
//! ======
//! A lock record keyed by note id says "this user is editing this note".
//! Nothing enforces it server-side; cooperating clients check it before
//! writing. Per note the coordinator sees one of three states:
//!
//! - `Unlocked`: no record, nothing held.
//! - `LockedBySelf`: our record, or a lock we wrote that no snapshot has
//!   echoed yet.
//! - `LockedByOther`: another user's record from the latest snapshot.
//!
//! `end_edit` releases after a short grace window so focus moving between
//! fields of the same note does not drop and re-take the lock. A
//! `begin_edit` inside the window cancels the pending release.
//!
//! Locks never expire and dragging does not take a lock; both are
//! deliberate and documented in DESIGN.md.
//!
//! ERROR HANDLING
//! ==============
//! Lock writes are best-effort: failures are logged and dropped. A conflict
//! is not an error; `try_mutate` reports it as [`Mutation::Locked`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use canvas::doc::{NoteId, NotePatch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::clock::now_ms;
use crate::error::{Saved, StoreError};
use crate::identity::LocalUser;
use crate::records::Lock;
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq)]
pub enum LockState {
    Unlocked,
    LockedBySelf,
    LockedByOther(Lock),
}

/// Outcome of a lock-gated note mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Written(Saved),
    /// Dropped because another user holds the lock.
    Locked { by: String },
}

#[derive(Default)]
struct Inner {
    /// Latest lock snapshot, by note.
    locks: HashMap<NoteId, Lock>,
    /// Locks this client has written and not yet released.
    held: HashSet<NoteId>,
    /// Scheduled grace-window releases.
    pending: HashMap<NoteId, JoinHandle<()>>,
}

impl Inner {
    fn foreign(&self, note_id: &NoteId, user: &LocalUser) -> Option<&Lock> {
        self.locks.get(note_id).filter(|lock| lock.user_id != user.user_id)
    }

    fn cancel_release(&mut self, note_id: &NoteId) {
        if let Some(task) = self.pending.remove(note_id) {
            task.abort();
        }
    }
}

pub struct LockCoordinator {
    store: Arc<dyn DocumentStore>,
    user: LocalUser,
    grace: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl LockCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, user: LocalUser, grace: Duration) -> Self {
        Self { store, user, grace, inner: Arc::default() }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the cached lock view with a fresh snapshot.
    pub fn apply_snapshot(&self, locks: Vec<Lock>) {
        let mut inner = self.lock();
        inner.locks = locks.into_iter().map(|lock| (lock.note_id, lock)).collect();

        // Another client overwrote a lock we believed we held.
        let lost: Vec<NoteId> = inner
            .held
            .iter()
            .filter(|id| inner.foreign(id, &self.user).is_some())
            .copied()
            .collect();
        for note_id in lost {
            debug!(%note_id, "held lock taken over by another user");
            inner.held.remove(&note_id);
            inner.cancel_release(&note_id);
        }
    }

    #[must_use]
    pub fn state(&self, note_id: &NoteId) -> LockState {
        let inner = self.lock();
        if let Some(lock) = inner.locks.get(note_id) {
            if lock.user_id != self.user.user_id {
                return LockState::LockedByOther(lock.clone());
            }
            return LockState::LockedBySelf;
        }
        if inner.held.contains(note_id) { LockState::LockedBySelf } else { LockState::Unlocked }
    }

    /// Notes locked by someone else, for the interaction engine.
    #[must_use]
    pub fn foreign_locks(&self) -> Vec<NoteId> {
        let inner = self.lock();
        inner.locks.values().filter(|lock| lock.user_id != self.user.user_id).map(|lock| lock.note_id).collect()
    }

    /// Every lock in the latest snapshot.
    #[must_use]
    pub fn locks(&self) -> Vec<Lock> {
        self.lock().locks.values().cloned().collect()
    }

    #[must_use]
    pub fn can_drag(&self, note_id: &NoteId) -> bool {
        !matches!(self.state(note_id), LockState::LockedByOther(_))
    }

    /// Take (or refresh) the lock on a note. Returns false without writing
    /// when another user holds it.
    pub async fn begin_edit(&self, note_id: NoteId) -> bool {
        {
            let mut inner = self.lock();
            if let Some(lock) = inner.foreign(&note_id, &self.user) {
                debug!(%note_id, holder = %lock.username, "edit refused; note locked");
                return false;
            }
            inner.cancel_release(&note_id);
            inner.held.insert(note_id);
        }

        if let Err(e) = self.store.put_lock(self.user.lock_for(note_id, now_ms())).await {
            warn!(%note_id, error = %e, "lock write failed");
        }
        true
    }

    /// Release our lock on a note once the grace window passes.
    pub fn end_edit(&self, note_id: NoteId) {
        let mut inner = self.lock();
        if !inner.held.contains(&note_id) {
            return;
        }
        inner.cancel_release(&note_id);

        let store = Arc::clone(&self.store);
        let shared = Arc::clone(&self.inner);
        let user = self.user.clone();
        let grace = self.grace;
        let task = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let release = {
                let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
                inner.pending.remove(&note_id);
                inner.held.remove(&note_id)
            };
            if !release {
                return;
            }
            delete_lock(store.as_ref(), note_id).await;

            // A begin_edit during the delete cannot cancel it, and its write
            // may have landed first.
            let retaken = shared.lock().unwrap_or_else(PoisonError::into_inner).held.contains(&note_id);
            if retaken {
                debug!(%note_id, "lock retaken during release; rewriting");
                if let Err(e) = store.put_lock(user.lock_for(note_id, now_ms())).await {
                    warn!(%note_id, error = %e, "lock write failed");
                }
            }
        });
        inner.pending.insert(note_id, task);
    }

    /// Release our lock on a note immediately.
    pub async fn release_now(&self, note_id: NoteId) {
        let release = {
            let mut inner = self.lock();
            inner.cancel_release(&note_id);
            inner.held.remove(&note_id)
        };
        if release {
            delete_lock(self.store.as_ref(), note_id).await;
        }
    }

    /// Release every lock this client holds.
    pub async fn release_all(&self) {
        let held: Vec<NoteId> = {
            let mut inner = self.lock();
            for (_, task) in inner.pending.drain() {
                task.abort();
            }
            inner.held.drain().collect()
        };
        for note_id in held {
            delete_lock(self.store.as_ref(), note_id).await;
        }
    }

    /// Drop any lock on a deleted note, whoever held it.
    pub async fn purge(&self, note_id: NoteId) {
        let known = {
            let mut inner = self.lock();
            inner.cancel_release(&note_id);
            let held = inner.held.remove(&note_id);
            inner.locks.remove(&note_id).is_some() || held
        };
        if known {
            delete_lock(self.store.as_ref(), note_id).await;
        }
    }

    /// Write `fields` unless another user holds the note's lock.
    ///
    /// # Errors
    ///
    /// Returns the store's error when the write itself fails.
    pub async fn try_mutate(&self, note_id: NoteId, fields: NotePatch) -> Result<Mutation, StoreError> {
        if let LockState::LockedByOther(lock) = self.state(&note_id) {
            debug!(%note_id, holder = %lock.username, "mutation dropped; note locked");
            return Ok(Mutation::Locked { by: lock.username });
        }
        self.store.update_note(note_id, fields).await.map(Mutation::Written)
    }
}

async fn delete_lock(store: &dyn DocumentStore, note_id: NoteId) {
    if let Err(e) = store.delete_lock(note_id).await {
        warn!(%note_id, error = %e, "lock release failed");
    }
}

#[cfg(test)]
#[path = "lock_test.rs"]
mod lock_test;
