use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use expect_test::expect;
use treepad_explorer::{Explorer, ExplorerCommand, InlineEdit, LoadState, LocalBackend};
use treepad_fs::{DefaultBaseDir, MemoryStore, Workspaces};

fn temp_dir(prefix: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let root = std::env::temp_dir().join(format!("treepad-explorer-{prefix}-{stamp}"));
    fs::create_dir_all(&root).expect("create temp dir");
    root
}

fn local_explorer(root: &PathBuf) -> Explorer<LocalBackend> {
    let workspaces = Workspaces::load(
        Arc::new(MemoryStore::default()),
        &DefaultBaseDir::new(Some(root.clone())),
    );
    Explorer::new(LocalBackend::new(Arc::new(workspaces)))
}

fn seed(root: &PathBuf) {
    fs::create_dir_all(root.join("notes/archive")).expect("create notes");
    fs::write(root.join("notes/todo.md"), "- [ ] ship").expect("write todo");
    fs::write(root.join("notes/archive/2023.md"), "old").expect("write archive");
    fs::write(root.join("readme.md"), "# hi").expect("write readme");
    fs::write(root.join(".hidden"), "secret").expect("write hidden");
}

#[test]
fn lazily_expanding_local_tree() {
    let root = temp_dir("expand");
    seed(&root);
    let mut explorer = local_explorer(&root);

    explorer.load_directory("/");
    assert_eq!(explorer.base_dir(), Some(root.to_string_lossy().as_ref()));
    expect![[r#"
        + notes/
          readme.md
    "#]]
    .assert_eq(&explorer.render());

    explorer.toggle_expanded("/notes");
    explorer.toggle_expanded("/notes/archive");
    expect![[r#"
        - notes/
          - archive/
              2023.md
            todo.md
          readme.md
    "#]]
    .assert_eq(&explorer.render());

    explorer.toggle_expanded("/notes");
    expect![[r#"
        + notes/
          readme.md
    "#]]
    .assert_eq(&explorer.render());
    assert_eq!(explorer.store().len(), 5);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn inline_create_writes_to_disk() {
    let root = temp_dir("create");
    seed(&root);
    let mut explorer = local_explorer(&root);
    explorer.load_directory("/");

    explorer.dispatch(ExplorerCommand::Create {
        parent: "/notes".to_string(),
        is_folder: true,
    });
    assert!(explorer.is_expanded("/notes"));
    explorer.set_draft("  drafts ");
    assert!(explorer.commit().is_none());
    assert!(root.join("notes/drafts").is_dir());
    assert!(explorer.store().get("/notes/drafts").is_some());

    explorer.begin_create("/notes/drafts", false);
    explorer.set_draft("idea.md");
    assert!(explorer.blur().is_none());
    assert_eq!(fs::read_to_string(root.join("notes/drafts/idea.md")).unwrap(), "");
    assert_eq!(explorer.inline_edit(), &InlineEdit::None);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn duplicate_create_surfaces_error_and_relists() {
    let root = temp_dir("duplicate");
    seed(&root);
    let mut explorer = local_explorer(&root);
    explorer.load_directory("/");

    explorer.begin_create("/", false);
    explorer.set_draft("readme.md");
    let err = explorer.commit().expect("duplicate is rejected");
    assert_eq!(err.to_string(), "File already exists");
    assert_eq!(fs::read_to_string(root.join("readme.md")).unwrap(), "# hi");
    assert_eq!(explorer.load_state("/"), LoadState::Loaded);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn inline_rename_moves_file() {
    let root = temp_dir("rename");
    seed(&root);
    let mut explorer = local_explorer(&root);
    explorer.load_directory("/");
    explorer.toggle_expanded("/notes");

    explorer.dispatch(ExplorerCommand::Rename {
        path: "/notes/todo.md".to_string(),
    });
    explorer.set_draft("done.md");
    expect![[r#"
        - notes/
          + archive/
            [done.md]
          readme.md
    "#]]
    .assert_eq(&explorer.render());

    assert!(explorer.commit().is_none());
    assert!(!root.join("notes/todo.md").exists());
    assert!(root.join("notes/done.md").is_file());
    assert!(explorer.store().get("/notes/done.md").is_some());
    assert!(explorer.store().get("/notes/todo.md").is_none());

    let _ = fs::remove_dir_all(root);
}

#[test]
fn missing_directory_marks_load_failed() {
    let root = temp_dir("missing");
    let mut explorer = local_explorer(&root);
    explorer.load_directory("/");
    explorer.toggle_expanded("/gone");
    assert!(matches!(explorer.load_state("/gone"), LoadState::Errored(_)));
    assert_eq!(
        explorer.error(),
        Some("Failed to load directory: Failed to list directory")
    );

    fs::create_dir_all(root.join("gone")).expect("create late dir");
    explorer.retry("/gone");
    assert_eq!(explorer.load_state("/gone"), LoadState::Loaded);
    assert_eq!(explorer.error(), None);

    let _ = fs::remove_dir_all(root);
}
