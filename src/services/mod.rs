//! Collaboration services layered on a [`crate::store::DocumentStore`].
//!
//! - [`lock`]: advisory per-note edit locks.
//! - [`presence`]: heartbeat publication and the online-users filter.
//! - [`cursor`]: throttled pointer broadcast and the active-cursor filter.
//!
//! Every service holds the store as an `Arc<dyn DocumentStore>` and the
//! caller's [`crate::identity::LocalUser`]. Publication failures are logged
//! and swallowed; they never reach the editing path.

pub mod cursor;
pub mod lock;
pub mod presence;
