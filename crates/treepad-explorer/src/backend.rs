//! Listing and mutation backends the explorer talks to.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use treepad_fs::{FileService, FsError, Workspaces};

use crate::tree::FileNode;

/// A directory listing as returned by `GET /api/list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirListing {
    #[serde(default)]
    pub files: Vec<FileNode>,
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub current_base_dir: Option<String>,
    #[serde(default)]
    pub workspaces: Vec<String>,
    #[serde(default)]
    pub active: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Server error: {status} - {message}")]
    Status { status: u16, message: String },
    #[error("{0}")]
    Api(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("Unexpected response from server: {0}")]
    Decode(String),
    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Server operations the explorer needs.
pub trait ExplorerBackend {
    fn list(&self, dir: &str) -> Result<DirListing, BackendError>;
    fn create_file(&self, path: &str) -> Result<(), BackendError>;
    fn create_folder(&self, path: &str) -> Result<(), BackendError>;
    fn rename(&self, old_path: &str, new_path: &str) -> Result<(), BackendError>;
}

impl<B: ExplorerBackend + ?Sized> ExplorerBackend for &B {
    fn list(&self, dir: &str) -> Result<DirListing, BackendError> {
        (**self).list(dir)
    }

    fn create_file(&self, path: &str) -> Result<(), BackendError> {
        (**self).create_file(path)
    }

    fn create_folder(&self, path: &str) -> Result<(), BackendError> {
        (**self).create_folder(path)
    }

    fn rename(&self, old_path: &str, new_path: &str) -> Result<(), BackendError> {
        (**self).rename(old_path, new_path)
    }
}

/// REST client for a running treepad server.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    agent: ureq::Agent,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(2))
            .timeout_read(Duration::from_secs(10))
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, route: &str, body: &Value) -> Result<Value, BackendError> {
        let url = format!("{}{route}", self.base_url);
        let result = self.agent.post(&url).send_json(body);
        read_json(result)
    }
}

impl ExplorerBackend for HttpBackend {
    fn list(&self, dir: &str) -> Result<DirListing, BackendError> {
        let url = format!("{}/api/list", self.base_url);
        let value = read_json(self.agent.get(&url).query("dir", dir).call())?;
        serde_json::from_value(value).map_err(|err| BackendError::Decode(err.to_string()))
    }

    fn create_file(&self, path: &str) -> Result<(), BackendError> {
        self.post("/api/create-file", &json!({ "filePath": path }))
            .map(|_| ())
    }

    fn create_folder(&self, path: &str) -> Result<(), BackendError> {
        self.post("/api/create-folder", &json!({ "folderPath": path }))
            .map(|_| ())
    }

    fn rename(&self, old_path: &str, new_path: &str) -> Result<(), BackendError> {
        self.post(
            "/api/rename",
            &json!({ "oldPath": old_path, "newPath": new_path }),
        )
        .map(|_| ())
    }
}

fn read_json(result: Result<ureq::Response, ureq::Error>) -> Result<Value, BackendError> {
    match result {
        Ok(response) => {
            let text = response
                .into_string()
                .map_err(|err| BackendError::Transport(err.to_string()))?;
            let value: Value =
                serde_json::from_str(&text).map_err(|_| BackendError::Decode(text.clone()))?;
            if let Some(error) = value.get("error").and_then(Value::as_str) {
                return Err(BackendError::Api(error.to_string()));
            }
            Ok(value)
        }
        Err(ureq::Error::Status(status, response)) => {
            let text = response.into_string().unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|value| value.get("error").and_then(Value::as_str).map(String::from))
                .unwrap_or(text);
            Err(BackendError::Status { status, message })
        }
        Err(err) => Err(BackendError::Transport(err.to_string())),
    }
}

/// In-process backend over the workspace registry; no HTTP involved.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    workspaces: Arc<Workspaces>,
}

impl LocalBackend {
    #[must_use]
    pub fn new(workspaces: Arc<Workspaces>) -> Self {
        Self { workspaces }
    }

    fn files(&self) -> FileService {
        FileService::new(self.workspaces.active_base_dir())
    }
}

impl ExplorerBackend for LocalBackend {
    fn list(&self, dir: &str) -> Result<DirListing, BackendError> {
        let listing = self.files().list(dir)?;
        Ok(DirListing {
            files: listing.files.into_iter().map(FileNode::from).collect(),
            base_path: Some(listing.base_path),
            current_base_dir: Some(listing.current_base_dir),
            workspaces: self.workspaces.list_workspaces(),
            active: self.workspaces.active_workspace(),
        })
    }

    fn create_file(&self, path: &str) -> Result<(), BackendError> {
        self.files().create_file(path, "")?;
        Ok(())
    }

    fn create_folder(&self, path: &str) -> Result<(), BackendError> {
        self.files().create_folder(path)?;
        Ok(())
    }

    fn rename(&self, old_path: &str, new_path: &str) -> Result<(), BackendError> {
        self.files().rename(old_path, new_path)?;
        Ok(())
    }
}
