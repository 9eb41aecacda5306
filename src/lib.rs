//! # univrs-prefs
//!
//! Typed, observable preference storage for the Univrs ecosystem.
//!
//! A [`TypedStore`] holds one value of type `T` under a fixed key in a
//! [`PreferenceBackend`]:
//!
//! - **Default fallback**: reading an absent key yields the store's default
//! - **Typed values**: `T` maps onto the backend's native [`RawValue`]
//!   shapes through the [`Storable`] trait
//! - **Notify on write**: every successful `set` runs the registered update
//!   handlers synchronously, in registration order
//! - **Change streams**: async consumers can [`subscribe`](TypedStore::subscribe)
//!
//! ## Backends
//!
//! - [`MemoryBackend`]: in-process preference cache (testing and development)
//! - [`FileBackend`]: single JSON document on disk, atomically rewritten
//!
//! ## Quick Start
//!
//! ```rust
//! use univrs_prefs::{MemoryBackend, TypedStore};
//!
//! fn main() -> univrs_prefs::Result<()> {
//!     let mut store = TypedStore::new("flag", false, MemoryBackend::new())?;
//!
//!     store.add_update_handler(|store| {
//!         println!("{} changed", store.key());
//!     });
//!
//!     assert!(!store.get()?);
//!     store.set(true)?;
//!     assert!(store.get()?);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Persistent Preferences
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use univrs_prefs::{FileBackend, TypedStore};
//!
//! fn main() -> univrs_prefs::Result<()> {
//!     let prefs = Arc::new(FileBackend::open("/var/lib/univrs/prefs.json")?);
//!
//!     let theme = TypedStore::new("theme", "light".to_string(), prefs.clone())?;
//!     let recent = TypedStore::new("recent", Vec::<String>::new(), prefs)?;
//!
//!     theme.set("dark".to_string())?;
//!     recent.set(vec!["notes.txt".to_string()])?;
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;
pub mod typed;
pub mod value;
pub mod watch;

// Re-export main types
pub use backend::{PreferenceBackend, MAX_KEY_LENGTH};
pub use error::{BoxError, HandlerFailure, PrefsError, Result};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use typed::{DataStore, TypedStore};
pub use value::{Data, Json, RawValue, Storable};
pub use watch::{ChangeEvent, ChangeStream, DEFAULT_CHANNEL_CAPACITY};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::backend::PreferenceBackend;
    pub use crate::error::{PrefsError, Result};
    pub use crate::file::FileBackend;
    pub use crate::memory::MemoryBackend;
    pub use crate::typed::{DataStore, TypedStore};
    pub use crate::value::{Data, Json, RawValue, Storable};
    pub use crate::watch::{ChangeEvent, ChangeStream};
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn test_memory_store_basic() {
        let store = TypedStore::new("/test", 0i64, MemoryBackend::new()).unwrap();

        store.set(42).unwrap();
        assert_eq!(store.get().unwrap(), 42);
    }

    #[test]
    fn test_file_store_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");

        {
            let store = TypedStore::new("launches", 0u32, FileBackend::open(&path).unwrap()).unwrap();
            store.set(store.get().unwrap() + 1).unwrap();
        }

        let store = TypedStore::new("launches", 0u32, FileBackend::open(&path).unwrap()).unwrap();
        assert_eq!(store.get().unwrap(), 1);
    }

    #[test]
    fn test_non_finite_write_keeps_file_loadable() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        let prefs = std::sync::Arc::new(FileBackend::open(&path).unwrap());

        let flag = TypedStore::new("flag", false, prefs.clone()).unwrap();
        let ratio = TypedStore::new("ratio", 1.0f64, prefs).unwrap();
        flag.set(true).unwrap();

        assert!(matches!(
            ratio.set(f64::INFINITY),
            Err(PrefsError::Serialization(_))
        ));
        assert_eq!(ratio.get().unwrap(), 1.0);

        let reopened = FileBackend::open(&path).unwrap();
        let flag = TypedStore::new("flag", false, reopened).unwrap();
        assert!(flag.get().unwrap());
    }

    #[tokio::test]
    async fn test_change_stream() {
        let store = TypedStore::new("volume", 0i64, MemoryBackend::new())
            .unwrap()
            .with_channel_capacity(8);
        let mut changes = store.subscribe();

        store.set(3).unwrap();

        let event = changes.next().await.unwrap();
        assert_eq!(event.key, "volume");
        assert_eq!(event.new_value, RawValue::Integer(3));
        assert!(event.is_first_write());
    }

    #[test]
    fn test_stores_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<MemoryBackend>();
        assert_send_sync::<FileBackend>();
        assert_send_sync::<TypedStore<bool>>();
        assert_send_sync::<TypedStore<String, FileBackend>>();
    }
}
