use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::SessionStorage;
use crate::error::StorageError;

/// In-process storage with the same batch semantics as the SQLite backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the raw key/value pairs currently stored.
    pub fn entries(&self) -> HashMap<String, String> {
        self.lock().clone()
    }

    /// Write a single raw entry, bypassing session encoding.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(key.into(), value.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn read_entries(&self) -> Result<HashMap<String, String>, StorageError> {
        Ok(self.entries())
    }

    async fn write_entries(&self, entries: &[(&'static str, String)]) -> Result<(), StorageError> {
        let mut map = self.lock();
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    async fn remove_entries(&self, keys: &[&'static str]) -> Result<(), StorageError> {
        let mut map = self.lock();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}
