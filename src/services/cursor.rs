//! Throttled cursor broadcast.
//!
//! Each publisher owns its throttle window, so independent sessions in one
//! process never suppress each other. A move inside the window is dropped,
//! not queued.

use std::sync::{Arc, Mutex, PoisonError};

use canvas::camera::Point;
use tracing::warn;
use uuid::Uuid;

use crate::clock::{age_ms, now_ms};
use crate::identity::LocalUser;
use crate::records::Cursor;
use crate::store::DocumentStore;

pub struct CursorPublisher {
    store: Arc<dyn DocumentStore>,
    user: LocalUser,
    throttle_ms: i64,
    last_sent: Mutex<Option<i64>>,
}

impl CursorPublisher {
    pub fn new(store: Arc<dyn DocumentStore>, user: LocalUser, throttle_ms: i64) -> Self {
        Self { store, user, throttle_ms, last_sent: Mutex::new(None) }
    }

    /// Publish a canvas position unless one went out within the throttle
    /// window. Returns whether a write was issued.
    pub async fn publish(&self, at: Point) -> bool {
        self.publish_at(at, now_ms()).await
    }

    pub async fn publish_at(&self, at: Point, now: i64) -> bool {
        {
            let mut last = self.last_sent.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(prev) = *last {
                if age_ms(now, prev) < self.throttle_ms {
                    return false;
                }
            }
            *last = Some(now);
        }

        if let Err(e) = self.store.put_cursor(self.user.cursor(at, now)).await {
            warn!(user_id = %self.user.user_id, error = %e, "cursor publish failed");
        }
        true
    }

    /// Delete this user's cursor record.
    pub async fn clear(&self) {
        if let Err(e) = self.store.delete_cursor(self.user.user_id).await {
            warn!(user_id = %self.user.user_id, error = %e, "cursor delete failed");
        }
    }
}

/// Cursors moved within `timeout_ms` of `now`, excluding `exclude`.
#[must_use]
pub fn active_cursors(cursors: &[Cursor], now: i64, timeout_ms: i64, exclude: Option<Uuid>) -> Vec<Cursor> {
    cursors
        .iter()
        .filter(|c| Some(c.user_id) != exclude)
        .filter(|c| age_ms(now, c.last_moved_at) < timeout_ms)
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "cursor_test.rs"]
mod cursor_test;
