//! `treepad-fs` - sandboxed filesystem access and workspace registry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Error taxonomy shared with the web layer.
pub mod error;
/// Sandboxed file operations.
pub mod files;
/// Client path resolution and containment checks.
pub mod resolve;
/// Workspace state persistence.
pub mod store;
/// Registered workspaces and the active base directory.
pub mod workspace;

pub use error::{FsError, FsErrorKind};
pub use files::{DirEntry, EntryKind, FileService, Listing, RawFile, RenameResult, TextFile};
pub use resolve::{resolve, ResolvedPath};
pub use store::{JsonFileStore, MemoryStore, WorkspaceState, WorkspaceStore};
pub use workspace::{DefaultBaseDir, Workspaces};
