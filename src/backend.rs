//! PreferenceBackend trait - the persistence seam every typed store writes
//! through.
//!
//! A backend is a flat map from string keys to [`RawValue`]s. It knows
//! nothing about element types or observers; those live in
//! [`TypedStore`](crate::TypedStore).

use std::sync::Arc;

use crate::error::{PrefsError, Result};
use crate::value::RawValue;

/// Maximum key length in bytes.
pub const MAX_KEY_LENGTH: usize = 1024;

/// Validate that a key is well-formed.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(PrefsError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(PrefsError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    if key.chars().any(char::is_control) {
        return Err(PrefsError::InvalidKey(
            "key cannot contain control characters".to_string(),
        ));
    }
    Ok(())
}

/// The preference persistence trait.
///
/// Implementations use interior mutability so a single handle can be shared
/// by several stores. There is no transactional isolation: the last `set`
/// for a key wins.
pub trait PreferenceBackend: Send + Sync {
    /// Get the raw value stored under `key`.
    ///
    /// Returns `None` if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<RawValue>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: RawValue) -> Result<()>;

    /// Remove `key`.
    ///
    /// Returns `Ok(())` if the key was removed or didn't exist.
    fn remove(&self, key: &str) -> Result<()>;

    /// Check if a key exists.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<B: PreferenceBackend + ?Sized> PreferenceBackend for &B {
    fn get(&self, key: &str) -> Result<Option<RawValue>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: RawValue) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        (**self).contains(key)
    }
}

impl<B: PreferenceBackend + ?Sized> PreferenceBackend for Arc<B> {
    fn get(&self, key: &str) -> Result<Option<RawValue>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: RawValue) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        (**self).contains(key)
    }
}
