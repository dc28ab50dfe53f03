//! The calling client's own identity, generated once and kept in local storage.

#[cfg(test)]
#[path = "identity_test.rs"]
mod identity_test;

use canvas::camera::Point;
use canvas::doc::NoteId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::records::{Cursor, Lock, Presence};
use crate::storage::{IDENTITY_KEY, LocalStorage, StorageError, load_json, save_json};

/// Colours handed out to new identities for cursors, presence and lock badges.
pub const PALETTE: [&str; 8] = [
    "#e53935", "#8e24aa", "#3949ab", "#039be5", "#00897b", "#7cb342", "#fb8c00", "#6d4c41",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub user_id: Uuid,
    pub username: String,
    pub color: String,
}

impl LocalUser {
    /// A fresh identity with a random palette colour.
    #[must_use]
    pub fn generate(username: Option<&str>) -> Self {
        let user_id = Uuid::new_v4();
        let username = match username {
            Some(name) => name.to_string(),
            None => format!("guest-{}", &user_id.simple().to_string()[..6]),
        };
        let color = PALETTE[rand::rng().random_range(0..PALETTE.len())].to_string();
        Self { user_id, username, color }
    }

    /// Return the stored identity, or create and store a new one.
    ///
    /// A supplied `username` that differs from the stored one renames the
    /// identity; its id and colour are kept. A corrupt record is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity cannot be read or written.
    pub fn load_or_create(storage: &dyn LocalStorage, username: Option<&str>) -> Result<Self, StorageError> {
        let stored = match load_json::<Self>(storage, IDENTITY_KEY) {
            Ok(stored) => stored,
            Err(StorageError::Corrupt { source, .. }) => {
                warn!(error = %source, "identity record corrupt; creating a new identity");
                None
            }
            Err(e) => return Err(e),
        };

        let user = match (stored, username) {
            (Some(user), Some(name)) if user.username != name => Self { username: name.to_string(), ..user },
            (Some(user), _) => return Ok(user),
            (None, name) => {
                let user = Self::generate(name);
                info!(user_id = %user.user_id, username = %user.username, "created local identity");
                user
            }
        };
        save_json(storage, IDENTITY_KEY, &user)?;
        Ok(user)
    }

    #[must_use]
    pub fn lock_for(&self, note_id: NoteId, now: i64) -> Lock {
        Lock {
            note_id,
            user_id: self.user_id,
            username: self.username.clone(),
            user_color: self.color.clone(),
            locked_at: now,
        }
    }

    #[must_use]
    pub fn presence(&self, now: i64) -> Presence {
        Presence { user_id: self.user_id, username: self.username.clone(), color: self.color.clone(), last_seen: now }
    }

    #[must_use]
    pub fn cursor(&self, at: Point, now: i64) -> Cursor {
        Cursor {
            user_id: self.user_id,
            username: self.username.clone(),
            color: self.color.clone(),
            canvas_x: at.x,
            canvas_y: at.y,
            last_moved_at: now,
        }
    }
}
