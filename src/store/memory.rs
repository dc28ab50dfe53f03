//! In-process document service.
//!
//! Several clients can share one instance to model a multi-user remote
//! backend without a database. The service can be switched offline: writes
//! then fail with [`ServiceError::Unavailable`] and every watcher receives an
//! error, as a dropped connection would produce.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::info;

use super::channel::Feed;
use super::service::{DocumentService, ServiceError, WatchEvent, WatchStream, merge_into};

#[derive(Debug)]
pub struct MemoryDocumentService {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    online: bool,
    collections: HashMap<String, BTreeMap<String, Value>>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<WatchEvent>>>,
}

impl Inner {
    fn snapshot(&self, collection: &str) -> Vec<Value> {
        self.collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    fn notify(&mut self, collection: &str) {
        let snapshot = self.snapshot(collection);
        if let Some(watchers) = self.watchers.get_mut(collection) {
            watchers.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
        }
    }

    fn check_online(&self) -> Result<(), ServiceError> {
        if self.online { Ok(()) } else { Err(offline()) }
    }
}

fn offline() -> ServiceError {
    ServiceError::Unavailable("backend offline".into())
}

impl Default for MemoryDocumentService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { online: true, collections: HashMap::new(), watchers: HashMap::new() }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch connectivity. Going offline errors every watcher; coming back
    /// re-delivers every watched collection.
    pub fn set_online(&self, online: bool) {
        let mut inner = self.lock();
        if inner.online == online {
            return;
        }
        inner.online = online;
        info!(online, "memory document service connectivity changed");

        let watched: Vec<String> = inner.watchers.keys().cloned().collect();
        for collection in watched {
            if online {
                inner.notify(&collection);
            } else if let Some(watchers) = inner.watchers.get_mut(&collection) {
                watchers.retain(|tx| tx.send(Err(offline())).is_ok());
            }
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.lock().online
    }

    /// Raw stored documents of a collection, ordered by id. Ignores connectivity.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.lock().snapshot(collection)
    }

    /// Store a raw document without validation or connectivity checks.
    pub fn insert_raw(&self, collection: &str, id: &str, doc: Value) {
        let mut inner = self.lock();
        inner.collections.entry(collection.to_string()).or_default().insert(id.to_string(), doc);
        inner.notify(collection);
    }
}

#[async_trait::async_trait]
impl DocumentService for MemoryDocumentService {
    async fn probe(&self) -> Result<(), ServiceError> {
        self.lock().check_online()
    }

    async fn set(&self, collection: &str, id: &str, doc: Value, merge: bool) -> Result<(), ServiceError> {
        let mut inner = self.lock();
        inner.check_online()?;
        let docs = inner.collections.entry(collection.to_string()).or_default();
        let replacement = match docs.get_mut(id) {
            Some(existing) if merge => {
                merge_into(existing, doc);
                None
            }
            _ => Some(doc),
        };
        if let Some(doc) = replacement {
            docs.insert(id.to_string(), doc);
        }
        inner.notify(collection);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), ServiceError> {
        let mut inner = self.lock();
        inner.check_online()?;
        let Some(existing) = inner.collections.get_mut(collection).and_then(|docs| docs.get_mut(id)) else {
            return Err(ServiceError::NotFound { collection: collection.to_string(), id: id.to_string() });
        };
        merge_into(existing, fields);
        inner.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), ServiceError> {
        let mut inner = self.lock();
        inner.check_online()?;
        let removed = inner.collections.get_mut(collection).and_then(|docs| docs.remove(id));
        if removed.is_some() {
            inner.notify(collection);
        }
        Ok(())
    }

    fn watch(&self, collection: &str) -> WatchStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let first = if inner.online { Ok(inner.snapshot(collection)) } else { Err(offline()) };
        if tx.send(first).is_ok() {
            inner.watchers.entry(collection.to_string()).or_default().push(tx);
        }
        Feed::new(rx, None)
    }
}
