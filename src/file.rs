//! File-backed preference backend.
//!
//! All keys live in one pretty-printed JSON document, loaded once at open
//! and kept in memory. Every mutation rewrites the document through a
//! temporary file in the same directory that is then renamed over the
//! target, so readers never observe a half-written file.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::backend::{validate_key, PreferenceBackend};
use crate::error::{PrefsError, Result};
use crate::value::RawValue;

type Document = BTreeMap<String, RawValue>;

/// JSON file implementation of PreferenceBackend.
pub struct FileBackend {
    path: PathBuf,
    data: RwLock<Document>,
}

impl FileBackend {
    /// Open or create a preference file at the given path.
    ///
    /// A missing file is treated as an empty document; it is created on the
    /// first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Opening preference file at {:?}", path);

        let data = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Document::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                PrefsError::Corrupt(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(entries = data.len(), "Preference file loaded");
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Serialize `doc` and atomically replace the backing file with it.
    fn write_document(&self, doc: &Document) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let bytes = serde_json::to_vec_pretty(doc)?;
        let mut temp_file = NamedTempFile::new_in(dir)?;
        temp_file.write_all(&bytes)?;
        temp_file.flush()?;
        temp_file.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = ?self.path, entries = doc.len(), "Preference file written");
        Ok(())
    }

    /// Apply `change` to a copy of the document, persist it, then publish it.
    ///
    /// The in-memory cache is only updated once the file write succeeds.
    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Document) -> bool,
    {
        let mut data = self.data.write();
        let mut next = data.clone();
        if !change(&mut next) {
            return Ok(());
        }
        self.write_document(&next)?;
        *data = next;
        Ok(())
    }
}

impl PreferenceBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<RawValue>> {
        validate_key(key)?;
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: RawValue) -> Result<()> {
        validate_key(key)?;
        // serde_json writes NaN and infinity as null, which would not load back.
        value.ensure_finite()?;
        self.update(|doc| {
            doc.insert(key.to_string(), value);
            true
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.update(|doc| doc.remove(key).is_some())
    }
}
