//! Explorer state: lazily loaded tree, expansion, and inline create/rename.

#![allow(missing_docs)]

use std::fmt::Write as _;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::backend::{BackendError, DirListing, ExplorerBackend};
use crate::tree::{
    base_name, join_path, normalize_path, parent_path, FileNode, FlatStore, NodeKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    Errored(String),
}

/// In-place create or rename that has not been sent to the server yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InlineEdit {
    #[default]
    None,
    Create {
        parent: String,
        is_folder: bool,
        draft: String,
    },
    Rename {
        target: String,
        draft: String,
    },
}

impl InlineEdit {
    fn draft(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Create { draft, .. } | Self::Rename { draft, .. } => Some(draft),
        }
    }
}

/// Requests other components send to the explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplorerCommand {
    Refresh,
    /// The active workspace changed; `None` means "re-read from the server".
    BaseDirChanged(Option<String>),
    Create { parent: String, is_folder: bool },
    Rename { path: String },
    Open { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    File(String),
    Dir(String),
}

/// One line of the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub depth: usize,
    pub name: String,
    /// `None` for the synthetic row of a pending create.
    pub path: Option<String>,
    pub kind: NodeKind,
    pub expanded: bool,
    pub editing: bool,
    pub load_state: Option<LoadState>,
}

/// Client-side view of the server's directory tree.
#[derive(Debug)]
pub struct Explorer<B> {
    backend: B,
    store: FlatStore,
    expanded: FxHashSet<String>,
    load_states: FxHashMap<String, LoadState>,
    inline: InlineEdit,
    current_path: String,
    base_dir: Option<String>,
    workspaces: Vec<String>,
    active: Option<String>,
    error: Option<String>,
    loading: bool,
}

impl<B: ExplorerBackend> Explorer<B> {
    pub fn new(backend: B) -> Self {
        let mut expanded = FxHashSet::default();
        expanded.insert("/".to_string());
        Self {
            backend,
            store: FlatStore::new(),
            expanded,
            load_states: FxHashMap::default(),
            inline: InlineEdit::None,
            current_path: "/".to_string(),
            base_dir: None,
            workspaces: Vec::new(),
            active: None,
            error: None,
            loading: true,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &FlatStore {
        &self.store
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    pub fn load_state(&self, dir: &str) -> LoadState {
        self.load_states
            .get(dir)
            .cloned()
            .unwrap_or(LoadState::Unloaded)
    }

    pub fn inline_edit(&self) -> &InlineEdit {
        &self.inline
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn base_dir(&self) -> Option<&str> {
        self.base_dir.as_deref()
    }

    pub fn workspaces(&self) -> &[String] {
        &self.workspaces
    }

    pub fn active_workspace(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Fetches `dir` and merges the result.
    pub fn load_directory(&mut self, dir: &str) {
        let dir = normalize_dir(dir);
        self.begin_load(&dir);
        let result = self.backend.list(&dir);
        self.apply_listing(&dir, result);
    }

    /// Marks `dir` as in flight. Pair with [`Self::apply_listing`].
    pub fn begin_load(&mut self, dir: &str) {
        self.error = None;
        self.load_states
            .insert(normalize_dir(dir), LoadState::Loading);
    }

    /// Applies a listing response whenever it arrives, stale or not.
    pub fn apply_listing(&mut self, dir: &str, result: Result<DirListing, BackendError>) {
        let dir = normalize_dir(dir);
        self.loading = false;
        match result {
            Ok(listing) => {
                debug!(dir = %dir, entries = listing.files.len(), "merging listing");
                self.forget_load_states_below(&dir);
                self.store.merge_listing(&dir, listing.files);
                self.load_states.insert(dir, LoadState::Loaded);
                if listing.current_base_dir.is_some() {
                    self.base_dir = listing.current_base_dir;
                }
                self.workspaces = listing.workspaces;
                self.active = listing.active;
            }
            Err(err) => {
                let message = match err {
                    BackendError::Api(message) => message,
                    other => format!("Failed to load directory: {other}"),
                };
                warn!(dir = %dir, "{message}");
                self.load_states
                    .insert(dir, LoadState::Errored(message.clone()));
                self.error = Some(message);
            }
        }
    }

    /// Loads `dir` again after a failure.
    pub fn retry(&mut self, dir: &str) {
        self.load_directory(dir);
    }

    /// Drops everything fetched and re-lists the current directory, then
    /// every expanded directory that still exists, parents first.
    ///
    /// Expanded directories that disappeared are collapsed.
    pub fn refresh(&mut self) {
        self.store.clear();
        self.load_states.clear();
        self.loading = true;
        let current = self.current_path.clone();
        self.load_directory(&current);

        let mut expanded = self
            .expanded
            .iter()
            .filter(|path| **path != current)
            .cloned()
            .collect::<Vec<_>>();
        expanded.sort_by(|a, b| {
            a.matches('/')
                .count()
                .cmp(&b.matches('/').count())
                .then_with(|| a.cmp(b))
        });
        for path in expanded {
            if self.store.get(&path).is_some_and(FileNode::is_dir) {
                self.load_directory(&path);
            } else if path != "/" {
                self.expanded.remove(&path);
            }
        }
    }

    /// Expands or collapses `path`. Expanding re-lists the directory;
    /// collapsing keeps the fetched children.
    pub fn toggle_expanded(&mut self, path: &str) {
        let path = normalize_dir(path);
        if self.expanded.remove(&path) {
            return;
        }
        self.expanded.insert(path.clone());
        let is_file = self
            .store
            .get(&path)
            .is_some_and(|node| node.kind == NodeKind::File);
        if !is_file {
            self.load_directory(&path);
        }
    }

    pub fn begin_create(&mut self, parent: &str, is_folder: bool) {
        let parent = normalize_dir(parent);
        self.expanded.insert(parent.clone());
        if self.load_state(&parent) == LoadState::Unloaded {
            self.load_directory(&parent);
        }
        self.inline = InlineEdit::Create {
            parent,
            is_folder,
            draft: String::new(),
        };
    }

    pub fn begin_rename(&mut self, target: &str) {
        let target = normalize_path(target);
        self.inline = InlineEdit::Rename {
            draft: base_name(&target).to_string(),
            target,
        };
    }

    pub fn set_draft(&mut self, text: &str) {
        match &mut self.inline {
            InlineEdit::None => {}
            InlineEdit::Create { draft, .. } | InlineEdit::Rename { draft, .. } => {
                *draft = text.to_string();
            }
        }
    }

    /// Escape: drop the pending edit without contacting the server.
    pub fn cancel(&mut self) {
        self.inline = InlineEdit::None;
    }

    /// Focus left the input: an empty draft cancels, anything else commits.
    pub fn blur(&mut self) -> Option<BackendError> {
        if self.inline.draft().is_some_and(|draft| !draft.trim().is_empty()) {
            self.commit()
        } else {
            self.cancel();
            None
        }
    }

    /// Sends the pending create/rename, then re-lists the affected directory.
    ///
    /// The directory is re-listed and the edit cleared whether or not the
    /// request succeeded; the request error, if any, is returned.
    pub fn commit(&mut self) -> Option<BackendError> {
        let inline = std::mem::take(&mut self.inline);
        let (affected, result) = match inline {
            InlineEdit::None => return None,
            InlineEdit::Create {
                parent,
                is_folder,
                draft,
            } => {
                let name = draft.trim();
                if name.is_empty() {
                    return None;
                }
                let path = join_path(&parent, name);
                let result = if is_folder {
                    self.backend.create_folder(&path)
                } else {
                    self.backend.create_file(&path)
                };
                (parent, result)
            }
            InlineEdit::Rename { target, draft } => {
                let name = draft.trim();
                if name.is_empty() {
                    return None;
                }
                let parent = parent_path(&target);
                let path = join_path(&parent, name);
                let result = if path == target {
                    Ok(())
                } else {
                    self.backend.rename(&target, &path)
                };
                (parent, result)
            }
        };

        if let Err(err) = &result {
            warn!("inline edit failed: {err}");
        }
        self.load_directory(&affected);
        result.err()
    }

    /// Handles a command from another component.
    pub fn dispatch(&mut self, command: ExplorerCommand) -> Option<Selection> {
        match command {
            ExplorerCommand::Refresh => self.refresh(),
            ExplorerCommand::BaseDirChanged(Some(base_dir)) => {
                self.base_dir = Some(base_dir);
                self.expanded.clear();
                self.expanded.insert("/".to_string());
                self.inline = InlineEdit::None;
                self.current_path = "/".to_string();
                self.refresh();
            }
            ExplorerCommand::BaseDirChanged(None) => self.load_directory("/"),
            ExplorerCommand::Create { parent, is_folder } => {
                self.begin_create(&parent, is_folder);
            }
            ExplorerCommand::Rename { path } => self.begin_rename(&path),
            ExplorerCommand::Open { path } => {
                let path = normalize_path(&path);
                let selection = match self.store.get(&path) {
                    Some(node) if node.is_dir() => Selection::Dir(path),
                    _ => Selection::File(path),
                };
                return Some(selection);
            }
        }
        None
    }

    /// Rows currently visible, depth first from the root.
    pub fn visible_rows(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        self.collect_rows("/", 0, &mut rows);
        rows
    }

    fn collect_rows(&self, parent: &str, depth: usize, rows: &mut Vec<Row>) {
        if let InlineEdit::Create {
            parent: target,
            is_folder,
            draft,
        } = &self.inline
        {
            if target == parent {
                rows.push(Row {
                    depth,
                    name: draft.clone(),
                    path: None,
                    kind: if *is_folder { NodeKind::Dir } else { NodeKind::File },
                    expanded: false,
                    editing: true,
                    load_state: None,
                });
            }
        }

        for node in self.store.children_of(parent) {
            let expanded = self.expanded.contains(&node.path);
            rows.push(self.row_for(node, depth, expanded));
            if expanded && node.is_dir() {
                self.collect_rows(&node.path, depth + 1, rows);
            }
        }
    }

    fn row_for(&self, node: &FileNode, depth: usize, expanded: bool) -> Row {
        let rename_draft = match &self.inline {
            InlineEdit::Rename { target, draft } if *target == node.path => Some(draft.clone()),
            _ => None,
        };
        Row {
            depth,
            editing: rename_draft.is_some(),
            name: rename_draft.unwrap_or_else(|| node.name.clone()),
            path: Some(node.path.clone()),
            kind: node.kind,
            expanded,
            load_state: node.is_dir().then(|| self.load_state(&node.path)),
        }
    }

    /// Plain-text rendering of [`Self::visible_rows`].
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(error) = &self.error {
            let _ = writeln!(out, "! {error}");
        }
        for row in self.visible_rows() {
            let indent = "  ".repeat(row.depth);
            let marker = match (row.kind, row.expanded) {
                (NodeKind::Dir, true) => "- ",
                (NodeKind::Dir, false) => "+ ",
                (NodeKind::File, _) => "  ",
            };
            let name = if row.editing {
                format!("[{}]", row.name)
            } else {
                row.name.clone()
            };
            let suffix = match (row.kind, &row.load_state) {
                (NodeKind::Dir, Some(LoadState::Loading)) => "/ (loading)",
                (NodeKind::Dir, Some(LoadState::Errored(_))) => "/ (failed)",
                (NodeKind::Dir, _) => "/",
                (NodeKind::File, _) => "",
            };
            let _ = writeln!(out, "{indent}{marker}{name}{suffix}");
        }
        out
    }

    fn forget_load_states_below(&mut self, dir: &str) {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{dir}/")
        };
        self.load_states
            .retain(|path, _| path == dir || !path.starts_with(&prefix));
    }
}

fn normalize_dir(dir: &str) -> String {
    if dir.trim().is_empty() {
        return "/".to_string();
    }
    let normalized = normalize_path(dir);
    if normalized.len() > 1 {
        normalized.trim_end_matches('/').to_string()
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use expect_test::expect;

    /// Scripted backend over an in-memory path table.
    #[derive(Default)]
    struct FakeBackend {
        entries: RefCell<BTreeMap<String, NodeKind>>,
        calls: RefCell<Vec<String>>,
        fail_lists: RefCell<bool>,
    }

    impl FakeBackend {
        fn with(paths: &[(&str, NodeKind)]) -> Self {
            let backend = Self::default();
            for (path, kind) in paths {
                backend.entries.borrow_mut().insert((*path).to_string(), *kind);
            }
            backend
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl ExplorerBackend for FakeBackend {
        fn list(&self, dir: &str) -> Result<DirListing, BackendError> {
            self.calls.borrow_mut().push(format!("list {dir}"));
            if *self.fail_lists.borrow() {
                return Err(BackendError::Transport("connection refused".to_string()));
            }
            let files = self
                .entries
                .borrow()
                .iter()
                .filter(|(path, _)| parent_path(path) == dir)
                .map(|(path, kind)| FileNode {
                    name: base_name(path).to_string(),
                    kind: *kind,
                    path: path.clone(),
                })
                .collect();
            Ok(DirListing {
                files,
                base_path: Some(dir.to_string()),
                current_base_dir: Some("/srv/files".to_string()),
                ..DirListing::default()
            })
        }

        fn create_file(&self, path: &str) -> Result<(), BackendError> {
            self.calls.borrow_mut().push(format!("create-file {path}"));
            let mut entries = self.entries.borrow_mut();
            if entries.contains_key(path) {
                return Err(BackendError::Status {
                    status: 400,
                    message: "File already exists".to_string(),
                });
            }
            entries.insert(path.to_string(), NodeKind::File);
            Ok(())
        }

        fn create_folder(&self, path: &str) -> Result<(), BackendError> {
            self.calls.borrow_mut().push(format!("create-folder {path}"));
            self.entries
                .borrow_mut()
                .insert(path.to_string(), NodeKind::Dir);
            Ok(())
        }

        fn rename(&self, old_path: &str, new_path: &str) -> Result<(), BackendError> {
            self.calls
                .borrow_mut()
                .push(format!("rename {old_path} {new_path}"));
            let mut entries = self.entries.borrow_mut();
            let moved = entries
                .keys()
                .filter(|path| *path == old_path || path.starts_with(&format!("{old_path}/")))
                .cloned()
                .collect::<Vec<_>>();
            for path in moved {
                if let Some(kind) = entries.remove(&path) {
                    entries.insert(format!("{new_path}{}", &path[old_path.len()..]), kind);
                }
            }
            Ok(())
        }
    }

    fn sample() -> FakeBackend {
        FakeBackend::with(&[
            ("/docs", NodeKind::Dir),
            ("/docs/guide.md", NodeKind::File),
            ("/docs/api", NodeKind::Dir),
            ("/docs/api/index.md", NodeKind::File),
            ("/readme.md", NodeKind::File),
        ])
    }

    #[test]
    fn expanding_relists_and_collapsing_keeps_children() {
        let backend = sample();
        let mut explorer = Explorer::new(&backend);
        explorer.load_directory("/");
        explorer.toggle_expanded("/docs");
        assert_eq!(explorer.load_state("/docs"), LoadState::Loaded);
        assert_eq!(explorer.store().len(), 4);

        explorer.toggle_expanded("/docs");
        assert!(!explorer.is_expanded("/docs"));
        assert_eq!(explorer.store().len(), 4);

        explorer.toggle_expanded("/docs");
        assert_eq!(backend.calls(), vec!["list /", "list /docs", "list /docs"]);
        expect![[r#"
            - docs/
              + api/
                guide.md
              readme.md
        "#]]
        .assert_eq(&explorer.render());
    }

    #[test]
    fn failed_listing_sets_error_and_retry_recovers() {
        let backend = sample();
        *backend.fail_lists.borrow_mut() = true;
        let mut explorer = Explorer::new(&backend);
        explorer.load_directory("/");
        assert!(matches!(explorer.load_state("/"), LoadState::Errored(_)));
        assert_eq!(
            explorer.error(),
            Some("Failed to load directory: request failed: connection refused")
        );
        assert!(!explorer.is_loading());

        *backend.fail_lists.borrow_mut() = false;
        explorer.retry("/");
        assert_eq!(explorer.load_state("/"), LoadState::Loaded);
        assert_eq!(explorer.error(), None);
        assert_eq!(explorer.base_dir(), Some("/srv/files"));
    }

    #[test]
    fn out_of_order_responses_settle_on_last_applied() {
        let backend = sample();
        let mut explorer = Explorer::new(&backend);
        explorer.load_directory("/");
        explorer.begin_load("/docs");
        explorer.begin_load("/docs");
        let fresh = backend.list("/docs").unwrap();
        let stale = DirListing {
            files: vec![FileNode {
                name: "old.md".to_string(),
                kind: NodeKind::File,
                path: "/docs/old.md".to_string(),
            }],
            ..DirListing::default()
        };
        explorer.apply_listing("/docs", Ok(fresh.clone()));
        explorer.apply_listing("/docs", Ok(stale));
        assert!(explorer.store().get("/docs/old.md").is_some());
        assert!(explorer.store().get("/docs/guide.md").is_none());

        explorer.apply_listing("/docs", Ok(fresh));
        assert!(explorer.store().get("/docs/old.md").is_none());
        assert_eq!(explorer.store().children_of("/docs").len(), 2);
    }

    #[test]
    fn create_commit_builds_path_and_relists_parent() {
        let backend = sample();
        let mut explorer = Explorer::new(&backend);
        explorer.load_directory("/");
        explorer.dispatch(ExplorerCommand::Create {
            parent: "/docs".to_string(),
            is_folder: false,
        });
        explorer.set_draft("notes.md");
        expect![[r#"
            - docs/
                [notes.md]
              + api/
                guide.md
              readme.md
        "#]]
        .assert_eq(&explorer.render());

        assert!(explorer.commit().is_none());
        assert_eq!(explorer.inline_edit(), &InlineEdit::None);
        assert!(explorer.store().get("/docs/notes.md").is_some());
        assert_eq!(
            backend.calls(),
            vec![
                "list /",
                "list /docs",
                "create-file /docs/notes.md",
                "list /docs",
            ]
        );
    }

    #[test]
    fn failed_create_still_relists_and_clears_edit() {
        let backend = sample();
        let mut explorer = Explorer::new(&backend);
        explorer.load_directory("/");
        explorer.begin_create("/", false);
        explorer.set_draft("readme.md");
        let err = explorer.commit().expect("duplicate create fails");
        assert_eq!(err.to_string(), "Server error: 400 - File already exists");
        assert_eq!(explorer.inline_edit(), &InlineEdit::None);
        assert_eq!(backend.calls().last().map(String::as_str), Some("list /"));
    }

    #[test]
    fn empty_names_cancel_without_request() {
        let backend = sample();
        let mut explorer = Explorer::new(&backend);
        explorer.load_directory("/");
        explorer.begin_create("/", true);
        explorer.set_draft("   ");
        assert!(explorer.blur().is_none());
        assert_eq!(explorer.inline_edit(), &InlineEdit::None);

        explorer.begin_rename("/readme.md");
        explorer.cancel();
        assert_eq!(explorer.inline_edit(), &InlineEdit::None);
        assert_eq!(backend.calls(), vec!["list /"]);
    }

    #[test]
    fn rename_moves_node_and_drops_stale_children() {
        let backend = sample();
        let mut explorer = Explorer::new(&backend);
        explorer.load_directory("/");
        explorer.toggle_expanded("/docs");
        explorer.toggle_expanded("/docs/api");
        assert!(explorer.store().get("/docs/api/index.md").is_some());

        explorer.begin_rename("/docs");
        assert_eq!(
            explorer.inline_edit(),
            &InlineEdit::Rename {
                target: "/docs".to_string(),
                draft: "docs".to_string(),
            }
        );
        explorer.set_draft("manual");
        assert!(explorer.blur().is_none());

        assert!(explorer.store().get("/docs").is_none());
        assert!(explorer.store().get("/docs/api/index.md").is_none());
        assert!(explorer.store().get("/manual").is_some());
        assert_eq!(explorer.load_state("/docs/api"), LoadState::Unloaded);
        assert!(backend.calls().contains(&"rename /docs /manual".to_string()));
    }

    #[test]
    fn open_command_distinguishes_directories() {
        let backend = sample();
        let mut explorer = Explorer::new(&backend);
        explorer.load_directory("/");
        assert_eq!(
            explorer.dispatch(ExplorerCommand::Open {
                path: "/docs".to_string()
            }),
            Some(Selection::Dir("/docs".to_string()))
        );
        assert_eq!(
            explorer.dispatch(ExplorerCommand::Open {
                path: "readme.md".to_string()
            }),
            Some(Selection::File("/readme.md".to_string()))
        );
    }

    #[test]
    fn refresh_relists_expanded_directories_and_prunes_missing_ones() {
        let backend = sample();
        let mut explorer = Explorer::new(&backend);
        explorer.load_directory("/");
        explorer.toggle_expanded("/docs");
        explorer.toggle_expanded("/docs/api");
        backend.entries.borrow_mut().remove("/docs/api");
        backend.entries.borrow_mut().remove("/docs/api/index.md");
        backend
            .entries
            .borrow_mut()
            .insert("/docs/faq.md".to_string(), NodeKind::File);

        explorer.dispatch(ExplorerCommand::Refresh);
        assert_eq!(explorer.load_state("/docs"), LoadState::Loaded);
        assert!(explorer.is_expanded("/docs"));
        assert!(!explorer.is_expanded("/docs/api"));
        assert_eq!(
            backend.calls(),
            vec!["list /", "list /docs", "list /docs/api", "list /", "list /docs"]
        );
        expect![[r#"
            - docs/
                faq.md
                guide.md
              readme.md
        "#]]
        .assert_eq(&explorer.render());
    }

    #[test]
    fn base_dir_change_resets_tree() {
        let backend = sample();
        let mut explorer = Explorer::new(&backend);
        explorer.load_directory("/");
        explorer.toggle_expanded("/docs");
        explorer.dispatch(ExplorerCommand::BaseDirChanged(Some("/other".to_string())));
        assert!(!explorer.is_expanded("/docs"));
        assert!(explorer.is_expanded("/"));
        assert_eq!(explorer.store().len(), 2);
        assert_eq!(explorer.current_path(), "/");
    }
}
