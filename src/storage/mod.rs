//! Local storage: small string records that survive restarts.
//!
//! DESIGN
//! ======
//! A synchronous key/value capability, like a browser's local storage. The
//! board keeps three records: the view (transform plus z-index counter), the
//! full notes array, and the local identity. Records are JSON text; typed
//! access goes through [`load_json`] / [`save_json`].
//!
//! ERROR HANDLING
//! ==============
//! I/O and quota failures surface as [`StorageError`] so callers can report a
//! failed save. A record that no longer parses is reported as
//! [`StorageError::Corrupt`]; callers treat it as absent.

mod file;
mod memory;


pub use file::FileStorage;
pub use memory::MemoryStorage;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Transform and z-index counter.
pub const VIEW_KEY: &str = "stickyboard.view";
/// Full notes array.
pub const NOTES_KEY: &str = "stickyboard.notes";
/// Local identity `{ user_id, username, color }`.
pub const IDENTITY_KEY: &str = "stickyboard.identity";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage i/o failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("storage quota exceeded writing {key}: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { key: String, needed: usize, quota: usize },
    #[error("record {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode record {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl crate::error::ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "E_STORAGE_IO",
            Self::QuotaExceeded { .. } => "E_STORAGE_QUOTA",
            Self::Corrupt { .. } => "E_STORAGE_CORRUPT",
            Self::Encode { .. } => "E_STORAGE_ENCODE",
        }
    }
}

/// String-valued key/value store local to this client.
pub trait LocalStorage: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns an error if the write fails or exceeds the quota.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a JSON record.
///
/// # Errors
///
/// Returns an error if the read fails or the record does not decode as `T`.
pub fn load_json<T: DeserializeOwned>(storage: &dyn LocalStorage, key: &str) -> Result<Option<T>, StorageError> {
    let Some(raw) = storage.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StorageError::Corrupt { key: key.to_string(), source })
}

/// Encode and write a JSON record.
///
/// # Errors
///
/// Returns an error if encoding or the write fails.
pub fn save_json<T: Serialize + ?Sized>(storage: &dyn LocalStorage, key: &str, value: &T) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode { key: key.to_string(), source })?;
    storage.set(key, &raw)
}
