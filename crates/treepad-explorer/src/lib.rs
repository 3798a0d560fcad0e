//! `treepad-explorer` - client-side directory tree and inline edit state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Listing and mutation backends (HTTP or in-process).
pub mod backend;
/// Explorer state machine.
pub mod explorer;
/// Flat node store and client path helpers.
pub mod tree;

pub use backend::{BackendError, DirListing, ExplorerBackend, HttpBackend, LocalBackend};
pub use explorer::{Explorer, ExplorerCommand, InlineEdit, LoadState, Row, Selection};
pub use tree::{FileNode, FlatStore, NodeKind};
