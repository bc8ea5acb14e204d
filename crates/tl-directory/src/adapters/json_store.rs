//! File-backed directory store.
//!
//! The whole directory is kept as one JSON document. Every write produces
//! a new document in a temp file, syncs it and renames it over the old one,
//! so a crash leaves either the previous or the next state on disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::info;

use super::snapshot::{DirectorySnapshot, DEFAULT_RETENTION};
use crate::domain::{Assignment, Backend, BackendId, StoreError, TableChange};
use crate::ports::DirectoryStore;

/// Directory store persisted as a JSON snapshot.
#[derive(Debug)]
pub struct JsonFileDirectoryStore {
    path: PathBuf,
    state: Mutex<DirectorySnapshot>,
    retention: usize,
}

impl JsonFileDirectoryStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_retention(path, DEFAULT_RETENTION)
    }

    /// Open the store keeping `retention` superseded records.
    pub fn open_with_retention<P: AsRef<Path>>(
        path: P,
        retention: usize,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read(&path) {
            Ok(bytes) => {
                let snapshot: DirectorySnapshot = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                info!(
                    "[tl-dir] Loaded {} assignments and {} backends from {}",
                    snapshot.assignments.len(),
                    snapshot.backends.len(),
                    path.display()
                );
                snapshot
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("[tl-dir] No existing directory file at {}", path.display());
                DirectorySnapshot::default()
            }
            Err(e) => return Err(io_error(&path, e)),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
            retention,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, f: impl FnOnce(&mut DirectorySnapshot)) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        f(&mut next);
        self.save(&next)?;
        *state = next;
        Ok(())
    }

    fn save(&self, snapshot: &DirectorySnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
        }
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| io_error(&temp_path, e))?;
        file.write_all(&bytes).map_err(|e| io_error(&temp_path, e))?;
        file.sync_all().map_err(|e| io_error(&temp_path, e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }
}

fn io_error(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

impl DirectoryStore for JsonFileDirectoryStore {
    fn load_all_assignments(&self) -> Result<Vec<Assignment>, StoreError> {
        Ok(self.state.lock().assignments.clone())
    }

    fn load_all_backends(&self) -> Result<Vec<Backend>, StoreError> {
        Ok(self.state.lock().backends.clone())
    }

    fn persist_assignments(&self, change: &TableChange) -> Result<(), StoreError> {
        let retention = self.retention;
        self.update(|s| s.record_change(change, retention))
    }

    fn persist_backend(&self, backend: &Backend) -> Result<(), StoreError> {
        self.update(|s| s.upsert_backend(backend))
    }

    fn remove_backend(&self, id: BackendId) -> Result<(), StoreError> {
        self.update(|s| s.remove_backend(id))
    }
}
