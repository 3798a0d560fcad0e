//! Sandboxed file operations rooted at a base directory.

#![allow(missing_docs)]

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FsError;
use crate::resolve::{join_client, resolve, ResolvedPath};

/// Entry kind as sent to clients (`"file"` / `"dir"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub files: Vec<DirEntry>,
    /// The directory as the client asked for it.
    pub base_path: String,
    pub current_base_dir: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextFile {
    pub content: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct RawFile {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameResult {
    pub old_path: String,
    pub new_path: String,
}

/// File operations bound to one base directory.
///
/// Construct one per request from the active base directory so a workspace
/// switch takes effect on the next call.
#[derive(Debug, Clone)]
pub struct FileService {
    base: PathBuf,
}

impl FileService {
    #[must_use]
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn resolve(&self, client_path: &str) -> Result<ResolvedPath, FsError> {
        resolve(&self.base, client_path)
    }

    /// Lists one directory; hidden entries are skipped, directories first.
    pub fn list(&self, dir: &str) -> Result<Listing, FsError> {
        let resolved = self.resolve(dir)?;
        let entries = fs::read_dir(&resolved.full).map_err(|err| {
            io_error(&err, "Failed to list directory", &resolved.full)
        })?;

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry
                .file_type()
                .map(|kind| kind.is_dir())
                .unwrap_or(false)
                || entry.path().is_dir();
            files.push(DirEntry {
                path: join_client(&resolved.client, &name),
                kind: if is_dir { EntryKind::Dir } else { EntryKind::File },
                name,
            });
        }
        files.sort_by(compare_entries);
        debug!(dir = %resolved.client, count = files.len(), "listed directory");

        Ok(Listing {
            files,
            base_path: if dir.is_empty() { "/".to_string() } else { dir.to_string() },
            current_base_dir: self.base.to_string_lossy().into_owned(),
        })
    }

    pub fn read_text(&self, path: &str) -> Result<TextFile, FsError> {
        let resolved = self.resolve(path)?;
        let metadata = fs::metadata(&resolved.full)
            .map_err(|err| io_error(&err, "Failed to read file", &resolved.full))?;
        if metadata.is_dir() {
            return Err(FsError::invalid_input("Path is a directory"));
        }
        let content = fs::read_to_string(&resolved.full)
            .map_err(|err| io_error(&err, "Failed to read file", &resolved.full))?;
        Ok(TextFile {
            content,
            path: resolved.client,
        })
    }

    pub fn read_raw(&self, path: &str) -> Result<RawFile, FsError> {
        let resolved = self.resolve(path)?;
        let bytes = fs::read(&resolved.full)
            .map_err(|err| io_error(&err, "Failed to read file", &resolved.full))?;
        Ok(RawFile {
            bytes,
            mime: mime_for(&resolved.full),
        })
    }

    /// Writes `content`, replacing any existing file.
    pub fn save(&self, path: &str, content: &str) -> Result<String, FsError> {
        let resolved = self.resolve(path)?;
        fs::write(&resolved.full, content)
            .map_err(|err| io_error(&err, "Failed to save file", &resolved.full))?;
        Ok(resolved.client)
    }

    pub fn create_file(&self, path: &str, content: &str) -> Result<String, FsError> {
        let resolved = self.resolve(path)?;
        if resolved.full.exists() {
            return Err(FsError::already_exists("File already exists"));
        }
        fs::write(&resolved.full, content)
            .map_err(|err| io_error(&err, "Failed to create file", &resolved.full))?;
        Ok(resolved.client)
    }

    pub fn create_folder(&self, path: &str) -> Result<String, FsError> {
        let resolved = self.resolve(path)?;
        if resolved.full.exists() {
            return Err(FsError::already_exists("Folder already exists"));
        }
        fs::create_dir_all(&resolved.full)
            .map_err(|err| io_error(&err, "Failed to create folder", &resolved.full))?;
        Ok(resolved.client)
    }

    /// Moves `old_path` to `new_path`, creating the destination's parent.
    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<RenameResult, FsError> {
        let old = self.resolve(old_path)?;
        let new = self.resolve(new_path)?;
        if !old.full.exists() {
            return Err(FsError::not_found("Source does not exist"));
        }
        if let Some(parent) = new.full.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| io_error(&err, "Failed to rename", parent))?;
        }
        fs::rename(&old.full, &new.full)
            .map_err(|err| io_error(&err, "Failed to rename", &old.full))?;
        Ok(RenameResult {
            old_path: old.client,
            new_path: new.client,
        })
    }

    /// Removes a file, or a directory with everything below it.
    pub fn delete(&self, path: &str) -> Result<(), FsError> {
        let resolved = self.resolve(path)?;
        if resolved.is_base() {
            return Err(FsError::access_denied());
        }
        let metadata = fs::symlink_metadata(&resolved.full)
            .map_err(|_| FsError::not_found("Path does not exist"))?;
        let result = if metadata.is_dir() {
            fs::remove_dir_all(&resolved.full)
        } else {
            fs::remove_file(&resolved.full)
        };
        result.map_err(|err| io_error(&err, "Failed to delete", &resolved.full))
    }
}

/// `Content-Type` for raw file responses.
#[must_use]
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "html" | "htm" => "text/html; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "json" => "application/json",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn compare_entries(a: &DirEntry, b: &DirEntry) -> Ordering {
    match (a.kind, b.kind) {
        (EntryKind::Dir, EntryKind::File) => Ordering::Less,
        (EntryKind::File, EntryKind::Dir) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    }
}

fn io_error(err: &io::Error, message: &str, path: &Path) -> FsError {
    debug!(path = %path.display(), "{message}: {err}");
    if err.kind() == io::ErrorKind::NotFound {
        FsError::not_found(message)
    } else {
        FsError::internal(message)
    }
}
