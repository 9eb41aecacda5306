//! TypedStore - one typed, observable value persisted under a single key.
//!
//! A store pairs a key and a default value with a [`PreferenceBackend`].
//! Reads fall back to the default when nothing is stored; writes replace the
//! stored value and then run every registered update handler, in
//! registration order, before returning.

use std::fmt;

use tracing::{debug, error, warn};

use crate::backend::{validate_key, PreferenceBackend};
use crate::error::{BoxError, HandlerFailure, PrefsError, Result};
use crate::memory::MemoryBackend;
use crate::value::Storable;
use crate::watch::{ChangeEvent, ChangeSender, ChangeStream};

type UpdateHandler<T, B> =
    Box<dyn Fn(&TypedStore<T, B>) -> std::result::Result<(), BoxError> + Send + Sync>;

/// An observable value container.
///
/// Abstracts over where the value lives so callers can depend on the
/// behavior (default fallback, notify on write) rather than a backend.
pub trait DataStore {
    /// The element type held by the store.
    type Element: Storable;

    /// Current value, or the default if nothing is stored.
    fn get(&self) -> Result<Self::Element>;

    /// Replace the stored value and notify update handlers.
    fn set(&self, value: Self::Element) -> Result<()>;

    /// Register a handler to run after every successful `set`.
    fn add_update_handler<F>(&mut self, handler: F)
    where
        F: Fn(&Self) + Send + Sync + 'static;
}

/// A value of type `T` stored under a fixed key in backend `B`.
pub struct TypedStore<T, B = MemoryBackend> {
    key: String,
    default_value: T,
    backend: B,
    handlers: Vec<UpdateHandler<T, B>>,
    changes: ChangeSender,
}

impl<T, B> TypedStore<T, B>
where
    T: Storable + Clone,
    B: PreferenceBackend,
{
    /// Create a store for `key`, falling back to `default_value` when the
    /// backend holds nothing for it.
    pub fn new(key: impl Into<String>, default_value: T, backend: B) -> Result<Self> {
        let key = key.into();
        validate_key(&key)?;

        Ok(Self {
            key,
            default_value,
            backend,
            handlers: Vec::new(),
            changes: ChangeSender::default(),
        })
    }

    /// Replace the change channel with one of the given capacity.
    ///
    /// Subscribers created before this call stop receiving events.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.changes = ChangeSender::new(capacity);
        self
    }

    /// The key this store reads and writes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value returned while nothing is stored.
    pub fn default_value(&self) -> &T {
        &self.default_value
    }

    /// The backend this store persists through.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of registered update handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the backend currently holds a value for the key.
    pub fn is_set(&self) -> Result<bool> {
        self.backend.contains(&self.key)
    }

    /// Read the current value.
    ///
    /// Returns the default when the key is absent, and
    /// [`PrefsError::Deserialization`] when the stored value does not
    /// describe a `T`. A mismatched value is never replaced by the default.
    pub fn get(&self) -> Result<T> {
        let raw = match self.backend.get(&self.key)? {
            Some(raw) => raw,
            None => return Ok(self.default_value.clone()),
        };

        match T::from_native(&raw) {
            Some(value) => Ok(value),
            None => {
                error!(key = %self.key, kind = raw.kind(), "Stored value has the wrong shape");
                Err(PrefsError::Deserialization {
                    key: self.key.clone(),
                    raw,
                })
            }
        }
    }

    /// Write `value`, overwriting whatever was stored, then notify.
    ///
    /// Handlers run synchronously in registration order and each receives
    /// this store. If the value has no native form or the backend write
    /// fails, no handler runs. If any
    /// fallible handler fails, the remaining handlers still run and the
    /// failures are returned together as [`PrefsError::Notification`]; the
    /// new value stays written.
    pub fn set(&self, value: T) -> Result<()> {
        let raw = value.to_native()?;
        // The overwrite must still go through when the old value is unreadable.
        let old_value = self.backend.get(&self.key).ok().flatten();

        self.backend.set(&self.key, raw.clone())?;
        debug!(key = %self.key, kind = raw.kind(), "Preference written");

        let failures = self.notify();
        self.changes
            .send(ChangeEvent::new(self.key.clone(), old_value, raw));

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PrefsError::Notification {
                key: self.key.clone(),
                failures,
            })
        }
    }

    /// Register a handler to run after every successful [`set`](Self::set).
    ///
    /// Handlers are never deduplicated or removed, and registering one does
    /// not invoke it.
    pub fn add_update_handler<F>(&mut self, handler: F)
    where
        F: Fn(&Self) + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(
            move |store: &Self| -> std::result::Result<(), BoxError> {
                handler(store);
                Ok(())
            },
        ));
    }

    /// Register a handler whose failure is reported back from `set`.
    pub fn add_fallible_update_handler<F, E>(&mut self, handler: F)
    where
        F: Fn(&Self) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.handlers.push(Box::new(
            move |store: &Self| -> std::result::Result<(), BoxError> {
                handler(store).map_err(Into::into)
            },
        ));
    }

    /// Subscribe to change events for writes made after this call.
    pub fn subscribe(&self) -> ChangeStream {
        self.changes.subscribe()
    }

    fn notify(&self) -> Vec<HandlerFailure> {
        let mut failures = Vec::new();
        for (index, handler) in self.handlers.iter().enumerate() {
            if let Err(error) = handler(self) {
                warn!(key = %self.key, index, %error, "Update handler failed");
                failures.push(HandlerFailure { index, error });
            }
        }
        failures
    }
}

impl<T, B> DataStore for TypedStore<T, B>
where
    T: Storable + Clone,
    B: PreferenceBackend,
{
    type Element = T;

    fn get(&self) -> Result<T> {
        TypedStore::get(self)
    }

    fn set(&self, value: T) -> Result<()> {
        TypedStore::set(self, value)
    }

    fn add_update_handler<F>(&mut self, handler: F)
    where
        F: Fn(&Self) + Send + Sync + 'static,
    {
        TypedStore::add_update_handler(self, handler)
    }
}

impl<T: fmt::Debug, B> fmt::Debug for TypedStore<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedStore")
            .field("key", &self.key)
            .field("default_value", &self.default_value)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}
