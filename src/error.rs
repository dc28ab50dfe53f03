//! Error taxonomy shared by every store backend.
//!
//! DESIGN
//! ======
//! Each concern owns a `thiserror` enum (`ValidationError`, `StorageError`,
//! `ServiceError`). `StoreError` is the public channel returned by every
//! mutating store call, so callers inspect one type. A lock conflict is not
//! an error: it surfaces as `Mutation::Locked` from the lock coordinator.
//!
//! ERROR HANDLING
//! ==============
//! Every error maps to a grepable `E_*` code through [`ErrorCode`]. Network
//! failures are the only retryable class.

use crate::notify::Notice;
use crate::storage::StorageError;
use crate::store::ServiceError;
use crate::validate::ValidationError;

/// Grepable error code and retryable flag for user-facing and logged errors.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Failure of a store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid document: {0}")]
    Validation(#[from] ValidationError),
    #[error("network error: {0}")]
    Network(#[from] ServiceError),
    #[error("local persistence failed: {0}")]
    LocalPersistence(#[from] StorageError),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::Network(e) => e.error_code(),
            Self::LocalPersistence(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Where a successful note write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    /// Acknowledged by the remote backend.
    Remote,
    /// Written by the local backend, the authoritative store in single-user mode.
    Local,
    /// The remote write failed and the change was kept in local storage instead.
    LocalFallback,
}

impl Saved {
    /// The notice a user should see for this outcome, if any.
    #[must_use]
    pub fn notice(self) -> Option<Notice> {
        match self {
            Self::Remote | Self::Local => None,
            Self::LocalFallback => Some(Notice::warning("Saved locally, will sync")),
        }
    }
}
