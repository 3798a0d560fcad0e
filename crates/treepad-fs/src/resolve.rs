//! Client path resolution against the active base directory.
//!
//! Client paths are `/`-rooted from the point of view of the base directory
//! (`/notes/todo.md`). Resolution is purely lexical: symlinks inside the base
//! directory are not followed or checked.

#![allow(missing_docs)]

use std::path::{Component, Path, PathBuf};

use crate::error::FsError;

/// A client path that passed the containment check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute filesystem path.
    pub full: PathBuf,
    /// Base-relative path with `/` separators and one leading `/`.
    pub client: String,
}

impl ResolvedPath {
    /// True when the path designates the base directory itself.
    #[must_use]
    pub fn is_base(&self) -> bool {
        self.client == "/"
    }
}

/// Resolves `client_path` under `base`, rejecting anything that escapes it.
///
/// A relative `base` is taken against the working directory first; an empty
/// prefix would contain every path.
pub fn resolve(base: &Path, client_path: &str) -> Result<ResolvedPath, FsError> {
    let base = if base.is_absolute() {
        normalize_lexically(base)
    } else {
        absolutize(base)?
    };
    let trimmed = client_path.trim();
    let relative = trimmed.trim_start_matches(['/', '\\']);
    let joined = if relative.is_empty() {
        base.clone()
    } else {
        normalize_lexically(&base.join(relative))
    };

    let Ok(inner) = joined.strip_prefix(&base) else {
        return Err(FsError::access_denied());
    };
    Ok(ResolvedPath {
        client: client_path_of(inner),
        full: joined,
    })
}

/// Collapses `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root, as on POSIX.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir | Component::Prefix(_))
                );
                if at_root {
                    if !out.has_root() {
                        out.push("..");
                    }
                } else if out.ends_with("..") {
                    out.push("..");
                } else {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Makes `path` absolute against the working directory and normalizes it.
///
/// An empty path means the working directory.
pub fn absolutize(path: &Path) -> Result<PathBuf, FsError> {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    let absolute = std::path::absolute(path)
        .map_err(|err| FsError::internal(format!("cannot resolve {}: {err}", path.display())))?;
    Ok(normalize_lexically(&absolute))
}

/// Client path of a child entry named `name` inside the client directory `dir`.
#[must_use]
pub fn join_client(dir: &str, name: &str) -> String {
    if dir == "/" || dir.is_empty() {
        format!("/{name}")
    } else {
        format!("{}/{name}", dir.trim_end_matches('/'))
    }
}

fn client_path_of(inner: &Path) -> String {
    let parts = inner
        .components()
        .filter_map(|component| match component {
            Component::Normal(value) => Some(value.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>();
    format!("/{}", parts.join("/"))
}
