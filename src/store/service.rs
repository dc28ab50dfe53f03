//! Remote document service capability.
//!
//! The remote backend offers only what a hosted document database offers:
//! keyed JSON documents in named collections, merge writes, and
//! whole-collection change notifications. No transactions and no
//! server-side conflict resolution.

use serde_json::Value;

use super::channel::Feed;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("remote backend unavailable: {0}")]
    Unavailable(String),
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("could not encode document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::error::ErrorCode for ServiceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "E_REMOTE_UNAVAILABLE",
            Self::NotFound { .. } => "E_REMOTE_NOT_FOUND",
            Self::Encode(_) => "E_REMOTE_ENCODE",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Database(_))
    }
}

/// One notification on a watched collection: every raw document, or a failure.
pub type WatchEvent = Result<Vec<Value>, ServiceError>;

/// Stream of raw collection snapshots. The first event arrives as soon as
/// the watch is established.
pub type WatchStream = Feed<WatchEvent>;

#[async_trait::async_trait]
pub trait DocumentService: Send + Sync {
    /// Check that the backend is reachable.
    async fn probe(&self) -> Result<(), ServiceError>;

    /// Create or overwrite a document. With `merge`, top-level fields of
    /// `doc` are merged into an existing document instead.
    async fn set(&self, collection: &str, id: &str, doc: Value, merge: bool) -> Result<(), ServiceError>;

    /// Merge `fields` into an existing document.
    ///
    /// Fails with [`ServiceError::NotFound`] when the document does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), ServiceError>;

    /// Delete a document. Deleting an absent document succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), ServiceError>;

    /// Watch a collection for changes.
    fn watch(&self, collection: &str) -> WatchStream;
}

/// Shallow merge of `patch`'s top-level fields into `base`.
pub(crate) fn merge_into(base: &mut Value, patch: Value) {
    match patch {
        Value::Object(fields) => match base.as_object_mut() {
            Some(map) => map.extend(fields),
            None => *base = Value::Object(fields),
        },
        other => *base = other,
    }
}
