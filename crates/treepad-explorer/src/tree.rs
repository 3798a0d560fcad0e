//! Flattened directory tree built from per-directory listings.

#![allow(missing_docs)]

use rustc_hash::FxHashSet;
use serde::Deserialize;
use treepad_fs::{DirEntry, EntryKind};

pub type NodeKind = EntryKind;

/// One file or directory known to the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub path: String,
}

impl FileNode {
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }
}

impl From<DirEntry> for FileNode {
    fn from(entry: DirEntry) -> Self {
        Self {
            name: entry.name,
            kind: entry.kind,
            path: entry.path,
        }
    }
}

/// Backslashes become `/` and the path gets exactly one leading `/`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let fixed = path.replace('\\', "/");
    format!("/{}", fixed.trim_start_matches('/'))
}

/// Parent of a client path; anything one segment deep has parent `/`.
#[must_use]
pub fn parent_path(path: &str) -> String {
    let parts = path.split('/').filter(|part| !part.is_empty()).collect::<Vec<_>>();
    if parts.len() <= 1 {
        return "/".to_string();
    }
    format!("/{}", parts[..parts.len() - 1].join("/"))
}

/// Path of `name` inside `parent`, with repeated slashes collapsed.
#[must_use]
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = if parent == "/" { "" } else { parent };
    let joined = format!("{parent}/{name}");
    let mut out = String::with_capacity(joined.len());
    for ch in joined.chars() {
        if ch == '/' && out.ends_with('/') {
            continue;
        }
        out.push(ch);
    }
    out
}

/// Last path segment.
#[must_use]
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').find(|part| !part.is_empty()).unwrap_or("")
}

/// Every node fetched so far, unique by path.
///
/// Nodes are never evicted on collapse; a directory's children are replaced
/// wholesale each time a listing for it arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatStore {
    nodes: Vec<FileNode>,
}

impl FlatStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileNode> {
        self.nodes.iter().find(|node| node.path == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileNode> {
        self.nodes.iter()
    }

    /// Replaces everything below `dir` with `entries`.
    ///
    /// The record for `dir` itself survives. Merging the same listing twice
    /// leaves the store unchanged.
    pub fn merge_listing(&mut self, dir: &str, entries: Vec<FileNode>) {
        let prefix = if dir == "/" || dir.ends_with('/') {
            dir.to_string()
        } else {
            format!("{dir}/")
        };
        self.nodes
            .retain(|node| !node.path.starts_with(&prefix) || node.path == dir);
        self.nodes.extend(entries.into_iter().map(|mut node| {
            node.path = normalize_path(&node.path);
            node
        }));

        let mut seen = FxHashSet::default();
        self.nodes.retain(|node| seen.insert(node.path.clone()));
    }

    /// Direct children of `path` in store order.
    #[must_use]
    pub fn children_of(&self, path: &str) -> Vec<&FileNode> {
        let path = if path.is_empty() { "/" } else { path };
        self.nodes
            .iter()
            .filter(|node| parent_path(&node.path) == path)
            .collect()
    }
}
