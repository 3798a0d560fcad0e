//! Persistence of the workspace registry.

#![allow(missing_docs)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Registered workspace roots and the active one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceState {
    #[serde(default)]
    pub workspaces: IndexSet<String>,
    #[serde(default)]
    pub active: Option<String>,
}

/// Backing storage for [`WorkspaceState`].
///
/// `load` never fails: unreadable or malformed state yields the empty state.
pub trait WorkspaceStore: Send + Sync {
    fn load(&self) -> WorkspaceState;
    fn save(&self, state: &WorkspaceState) -> io::Result<()>;
}

/// JSON file store, `{"workspaces": [...], "active": ...}`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the empty state if the file does not exist yet.
    pub fn ensure_exists(&self) -> io::Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.save(&WorkspaceState::default())
    }
}

impl WorkspaceStore for JsonFileStore {
    fn load(&self) -> WorkspaceState {
        if let Err(err) = self.ensure_exists() {
            warn!(path = %self.path.display(), "failed to create workspace state file: {err}");
        }
        let Ok(data) = fs::read_to_string(&self.path) else {
            return WorkspaceState::default();
        };
        let mut state: WorkspaceState = match serde_json::from_str(&data) {
            Ok(state) => state,
            Err(err) => {
                warn!(path = %self.path.display(), "ignoring unreadable workspace state: {err}");
                WorkspaceState::default()
            }
        };
        if state.active.as_deref().is_some_and(str::is_empty) {
            state.active = None;
        }
        state
    }

    fn save(&self, state: &WorkspaceState) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(state).map_err(io::Error::other)?;
        fs::write(&self.path, data)
    }
}

/// In-memory store; `saved` keeps the last persisted snapshot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<WorkspaceState>,
}

impl MemoryStore {
    #[must_use]
    pub fn with_state(state: WorkspaceState) -> Self {
        Self {
            saved: Mutex::new(state),
        }
    }

    #[must_use]
    pub fn saved(&self) -> WorkspaceState {
        self.saved.lock().clone()
    }
}

impl WorkspaceStore for MemoryStore {
    fn load(&self) -> WorkspaceState {
        self.saved.lock().clone()
    }

    fn save(&self, state: &WorkspaceState) -> io::Result<()> {
        *self.saved.lock() = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "treepad-store-{name}-{}/workspaces.json",
            std::process::id()
        ))
    }

    #[test]
    fn missing_file_is_created_with_empty_state() {
        let path = temp_file("missing");
        let _ = fs::remove_file(&path);
        let store = JsonFileStore::new(path.clone());
        assert_eq!(store.load(), WorkspaceState::default());
        let text = fs::read_to_string(&path).expect("state file created");
        assert!(text.contains("\"workspaces\": []"));
        assert!(text.contains("\"active\": null"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn malformed_file_resets_to_empty_state() {
        let path = temp_file("malformed");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(path.clone());
        assert_eq!(store.load(), WorkspaceState::default());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn state_round_trips_in_insertion_order() {
        let path = temp_file("roundtrip");
        let store = JsonFileStore::new(path.clone());
        let mut state = WorkspaceState::default();
        state.workspaces.insert("/b".to_string());
        state.workspaces.insert("/a".to_string());
        state.active = Some("/a".to_string());
        store.save(&state).expect("save state");

        let loaded = store.load();
        assert_eq!(loaded, state);
        assert_eq!(
            loaded.workspaces.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["/b", "/a"]
        );
        let _ = fs::remove_file(path);
    }
}
