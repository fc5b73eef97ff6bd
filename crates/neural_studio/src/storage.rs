//! State persistence.
//!
//! The whole [`ProjectState`] is one JSON blob stored under a fixed key in
//! a key/value backend. The default backend is a JSON object on disk:
//!
//! ```text
//! <workspace>/.neural/storage.json
//! { "neural-studio-state": "<serialized ProjectState>" }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use neural_core::{AgentStatus, ProjectState};

use crate::error::StudioResult;

/// Key/value storage for state blobs.
#[cfg_attr(test, mockall::automock)]
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> StudioResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StudioResult<()>;
    fn remove(&self, key: &str) -> StudioResult<()>;
}

/// JSON object file on disk.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> StudioResult<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_map(&self, map: &HashMap<String, String>) -> StudioResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write then rename so a crash never leaves half a file behind
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn get(&self, key: &str) -> StudioResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> StudioResult<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> StudioResult<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// In-process storage, for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> StudioResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StudioResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StudioResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Saves and restores the state blob under one key.
#[derive(Clone)]
pub struct StatePersistence {
    backend: Arc<dyn StorageBackend>,
    key: String,
}

impl StatePersistence {
    pub fn new(backend: Arc<dyn StorageBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Restore the last saved state, defaulting on anything unreadable.
    ///
    /// A session saved mid-run cannot resume its stage handler, so an
    /// active status is demoted to `error`.
    pub fn load(&self) -> ProjectState {
        let blob = match self.backend.get(&self.key) {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!("No saved state under '{}'", self.key);
                return ProjectState::default();
            }
            Err(e) => {
                warn!("Failed to read saved state: {}", e);
                return ProjectState::default();
            }
        };

        let mut state: ProjectState = match serde_json::from_str(&blob) {
            Ok(state) => state,
            Err(e) => {
                warn!("Discarding unreadable saved state: {}", e);
                return ProjectState::default();
            }
        };

        if state.status.is_active() {
            let interrupted = state.status;
            state.status = AgentStatus::Error;
            state.log(format!(
                "[system] Previous session was interrupted during {}",
                interrupted
            ));
            info!(status = %interrupted, "Restored an interrupted run as halted");
        }
        if let Some(id) = state.selected_history_id.clone() {
            if state.find_snapshot(&id).is_none() {
                state.selected_history_id = None;
            }
        }
        state.repair_cursor();
        state
    }

    pub fn save(&self, state: &ProjectState) -> StudioResult<()> {
        let blob = serde_json::to_string(state)?;
        self.backend.set(&self.key, &blob)
    }

    /// Remove the blob entirely.
    pub fn clear(&self) -> StudioResult<()> {
        self.backend.remove(&self.key)
    }

    /// Raw blob, if any.
    pub fn raw(&self) -> StudioResult<Option<String>> {
        self.backend.get(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StudioError;
    use tempfile::TempDir;

    fn file_persistence(dir: &TempDir) -> StatePersistence {
        let backend = FileStorage::new(dir.path().join(".neural/storage.json"));
        StatePersistence::new(Arc::new(backend), "neural-studio-state")
    }

    #[test]
    fn test_missing_blob_defaults() {
        let dir = TempDir::new().unwrap();
        let state = file_persistence(&dir).load();
        assert_eq!(state, ProjectState::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let persistence = file_persistence(&dir);
        let mut state = ProjectState::new();
        state.user_prompt = "todo app".to_string();
        state.write_file("src/App.tsx", "app");

        persistence.save(&state).unwrap();
        let loaded = persistence.load();
        assert_eq!(loaded.user_prompt, "todo app");
        assert_eq!(loaded.file_system["src/App.tsx"], "app");
    }

    #[test]
    fn test_corrupt_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv.json");
        fs::write(&path, "{ not json").unwrap();
        let backend = FileStorage::new(&path);

        assert!(backend.set("state", "{}").is_err());
        assert!(backend.remove("state").is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_other_keys_untouched() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FileStorage::new(dir.path().join("kv.json")));
        backend.set("other", "value").unwrap();

        let persistence = StatePersistence::new(backend.clone(), "state");
        persistence.save(&ProjectState::new()).unwrap();
        persistence.clear().unwrap();

        assert_eq!(backend.get("other").unwrap().as_deref(), Some("value"));
        assert_eq!(backend.get("state").unwrap(), None);
    }

    #[test]
    fn test_corrupt_blob_defaults() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set("k", "{not json").unwrap();
        let state = StatePersistence::new(backend, "k").load();
        assert_eq!(state.status, AgentStatus::Idle);
    }

    #[test]
    fn test_interrupted_run_is_demoted() {
        let backend = Arc::new(MemoryStorage::new());
        let persistence = StatePersistence::new(backend, "k");
        let mut state = ProjectState::new();
        state.start_run("todo").unwrap();
        persistence.save(&state).unwrap();

        let loaded = persistence.load();
        assert_eq!(loaded.status, AgentStatus::Error);
        assert!(loaded
            .terminal_logs
            .last()
            .unwrap()
            .contains("interrupted during managing"));
        assert!(loaded.status.can_start_run());
    }

    #[test]
    fn test_backend_read_error_defaults() {
        let mut backend = MockStorageBackend::new();
        backend
            .expect_get()
            .returning(|_| Err(StudioError::storage("disk unplugged")));
        let state = StatePersistence::new(Arc::new(backend), "k").load();
        assert_eq!(state, ProjectState::default());
    }
}
