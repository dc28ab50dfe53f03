//! Presence heartbeat and the online-users view.
//!
//! A heartbeat upserts the caller's presence record immediately and then on
//! a fixed interval. Records are never expired server-side; observers apply
//! [`online_users`] instead. A clean shutdown deletes the record.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::{age_ms, now_ms};
use crate::identity::LocalUser;
use crate::records::Presence;
use crate::store::DocumentStore;

/// Background presence publisher. Dropping it stops publication without
/// deleting the record; call [`Heartbeat::stop`] for a clean shutdown.
pub struct Heartbeat {
    store: Arc<dyn DocumentStore>,
    user_id: Uuid,
    task: JoinHandle<()>,
}

impl Heartbeat {
    pub fn spawn(store: Arc<dyn DocumentStore>, user: LocalUser, every: Duration) -> Self {
        let user_id = user.user_id;
        let every = every.max(Duration::from_millis(1));
        let task = tokio::spawn(run(Arc::clone(&store), user, every));
        Self { store, user_id, task }
    }

    /// Stop publishing and delete the presence record.
    pub async fn stop(self) {
        self.task.abort();
        if let Err(e) = self.store.delete_presence(self.user_id).await {
            warn!(user_id = %self.user_id, error = %e, "presence delete failed");
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(store: Arc<dyn DocumentStore>, user: LocalUser, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        match store.put_presence(user.presence(now_ms())).await {
            Ok(()) => debug!(user_id = %user.user_id, "presence heartbeat"),
            Err(e) => warn!(user_id = %user.user_id, error = %e, "presence heartbeat failed"),
        }
    }
}

/// Users seen within `timeout_ms` of `now`, ordered by name.
#[must_use]
pub fn online_users(presence: &[Presence], now: i64, timeout_ms: i64) -> Vec<Presence> {
    let mut online: Vec<Presence> =
        presence.iter().filter(|p| age_ms(now, p.last_seen) < timeout_ms).cloned().collect();
    online.sort_by(|a, b| a.username.cmp(&b.username).then(a.user_id.cmp(&b.user_id)));
    online
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;
