//! Publish/subscribe plumbing for whole-collection snapshots.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::StoreError;

/// One delivery on a collection subscription.
#[derive(Debug)]
pub enum SnapshotEvent<T> {
    /// The complete current collection. Replaces any cached view.
    Snapshot(Vec<T>),
    /// The backing subscription failed. A fallback snapshot may follow.
    Error(StoreError),
}

/// Receiving end of a feed, optionally driven by a background task.
///
/// Dropping the feed (or calling [`Feed::unsubscribe`]) aborts the task, so
/// no listener outlives its consumer.
#[derive(Debug)]
pub struct Feed<E> {
    rx: mpsc::UnboundedReceiver<E>,
    task: Option<JoinHandle<()>>,
}

/// Snapshot subscription for one collection.
pub type Subscription<T> = Feed<SnapshotEvent<T>>;

impl<E> Feed<E> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<E>, task: Option<JoinHandle<()>>) -> Self {
        Self { rx, task }
    }

    /// Wait for the next event. `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// The next already-queued event, without waiting.
    pub fn try_next(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }

    /// Stop receiving and tear down the driving task.
    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}

impl<E> Drop for Feed<E> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Fan-out of snapshots to any number of in-process subscribers.
#[derive(Debug)]
pub struct SnapshotChannel<T> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SnapshotEvent<T>>>>,
}

impl<T> Default for SnapshotChannel<T> {
    fn default() -> Self {
        Self { subscribers: Mutex::new(Vec::new()) }
    }
}

impl<T: Clone> SnapshotChannel<T> {
    /// Register a subscriber and hand it `initial` as its first event.
    pub fn subscribe(&self, initial: SnapshotEvent<T>) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(initial).is_ok() {
            self.lock().push(tx);
        }
        Feed::new(rx, None)
    }

    /// Deliver a snapshot to every live subscriber, pruning closed ones.
    pub fn publish(&self, snapshot: &[T]) {
        self.lock().retain(|tx| tx.send(SnapshotEvent::Snapshot(snapshot.to_vec())).is_ok());
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().iter().filter(|tx| !tx.is_closed()).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<SnapshotEvent<T>>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
