//! In-memory preference backend.
//!
//! The in-process equivalent of a platform preference cache. Nothing is
//! written to disk; data is lost on process exit. Clones share the same
//! underlying map, which lets tests seed values behind a store's back.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::{validate_key, PreferenceBackend};
use crate::error::Result;
use crate::value::RawValue;

/// In-memory implementation of PreferenceBackend.
///
/// Uses a BTreeMap for ordered key iteration and RwLock for concurrency.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<String, RawValue>>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with `entries`.
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, RawValue)>,
        K: Into<String>,
    {
        let data = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Get the number of entries in the backend.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the backend is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// All keys, in lexicographic order.
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl PreferenceBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<RawValue>> {
        validate_key(key)?;
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: RawValue) -> Result<()> {
        validate_key(key)?;
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.data.write().remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.data.read().contains_key(key))
    }
}
