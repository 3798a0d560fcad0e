//! Workspace registry: the set of candidate base directories and the active one.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{FsError, FsErrorKind};
use crate::resolve::absolutize;
use crate::store::{WorkspaceState, WorkspaceStore};

/// Computes the base directory used while no workspace is active.
#[derive(Debug, Clone, Default)]
pub struct DefaultBaseDir {
    configured: Option<PathBuf>,
}

impl DefaultBaseDir {
    #[must_use]
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self { configured }
    }

    /// First existing directory among the configured one, home, and the
    /// working directory, made absolute.
    #[must_use]
    pub fn compute(&self) -> PathBuf {
        let cwd = std::env::current_dir().ok();
        let candidates = [self.configured.clone(), home::home_dir(), cwd.clone()];
        let chosen = candidates
            .into_iter()
            .flatten()
            .find(|dir| dir.is_dir())
            .or(cwd)
            .unwrap_or_else(|| PathBuf::from("."));
        absolutize(&chosen).unwrap_or(chosen)
    }
}

/// Registered workspaces, owned by the request-handling context.
pub struct Workspaces {
    state: Mutex<WorkspaceState>,
    store: Arc<dyn WorkspaceStore>,
    default_dir: PathBuf,
}

impl std::fmt::Debug for Workspaces {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspaces")
            .field("state", &*self.state.lock())
            .field("default_dir", &self.default_dir)
            .finish_non_exhaustive()
    }
}

impl Workspaces {
    /// Loads state from `store`; the default directory is computed once.
    #[must_use]
    pub fn load(store: Arc<dyn WorkspaceStore>, default: &DefaultBaseDir) -> Self {
        let state = store.load();
        Self {
            state: Mutex::new(state),
            store,
            default_dir: default.compute(),
        }
    }

    #[must_use]
    pub fn list_workspaces(&self) -> Vec<String> {
        self.state.lock().workspaces.iter().cloned().collect()
    }

    #[must_use]
    pub fn active_workspace(&self) -> Option<String> {
        self.state.lock().active.clone()
    }

    #[must_use]
    pub fn default_dir(&self) -> &Path {
        &self.default_dir
    }

    /// The directory every client path is resolved against.
    #[must_use]
    pub fn active_base_dir(&self) -> PathBuf {
        self.state
            .lock()
            .active
            .as_ref()
            .map_or_else(|| self.default_dir.clone(), PathBuf::from)
    }

    pub fn add_workspace(&self, path: &str) -> Result<Vec<String>, FsError> {
        let resolved = existing_dir(path)?;
        let mut guard = self.state.lock();
        if guard.workspaces.insert(resolved.clone()) {
            info!(workspace = %resolved, "workspace added");
            self.persist(&guard);
        }
        Ok(guard.workspaces.iter().cloned().collect())
    }

    pub fn remove_workspace(&self, path: &str) -> Result<Vec<String>, FsError> {
        let resolved = absolutize(Path::new(path.trim()))?
            .to_string_lossy()
            .into_owned();
        let mut guard = self.state.lock();
        guard.workspaces.shift_remove(&resolved);
        if guard.active.as_deref() == Some(resolved.as_str()) {
            guard.active = None;
        }
        self.persist(&guard);
        Ok(guard.workspaces.iter().cloned().collect())
    }

    /// Activates `path`, registering it first when needed.
    pub fn set_active_base_dir(&self, path: &str) -> Result<String, FsError> {
        let resolved = existing_dir(path)?;
        let mut guard = self.state.lock();
        guard.workspaces.insert(resolved.clone());
        guard.active = Some(resolved.clone());
        self.persist(&guard);
        info!(base_dir = %resolved, "active base directory changed");
        Ok(resolved)
    }

    fn persist(&self, state: &WorkspaceState) {
        if let Err(err) = self.store.save(state) {
            warn!("failed to persist workspace state: {err}");
        }
    }
}

fn existing_dir(path: &str) -> Result<String, FsError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(FsError::invalid_input("Path required"));
    }
    let resolved = absolutize(Path::new(trimmed))?;
    let metadata = std::fs::metadata(&resolved).map_err(|err| {
        FsError::new(
            FsErrorKind::NotADirectory,
            format!("{}: {err}", resolved.display()),
        )
    })?;
    if !metadata.is_dir() {
        return Err(FsError::new(
            FsErrorKind::NotADirectory,
            "Path is not a directory",
        ));
    }
    Ok(resolved.to_string_lossy().into_owned())
}
