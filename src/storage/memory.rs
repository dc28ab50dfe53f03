use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{LocalStorage, StorageError};

/// In-process storage with an optional byte quota across all values.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes pushing the total stored bytes past `quota`.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self { entries: Mutex::default(), quota: Some(quota) }
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(quota) = self.quota {
            let others: usize = entries.iter().filter(|(k, _)| k.as_str() != key).map(|(_, v)| v.len()).sum();
            let needed = others + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { key: key.to_string(), needed, quota });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
