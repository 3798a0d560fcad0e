//! `treepad tree`: the explorer view, printed.

use std::sync::Arc;

use treepad_explorer::tree::{normalize_path, parent_path};
use treepad_explorer::{Explorer, ExplorerBackend, HttpBackend, LocalBackend};
use treepad_fs::{DefaultBaseDir, JsonFileStore, Workspaces};

use crate::cli::ConfigArgs;
use crate::style;

pub fn run_tree(
    config: &ConfigArgs,
    server: Option<String>,
    local: bool,
    expand: &[String],
) -> anyhow::Result<()> {
    let config = config.load()?;
    if local {
        let store = JsonFileStore::new(config.state_file.clone());
        let workspaces = Workspaces::load(
            Arc::new(store),
            &DefaultBaseDir::new(config.default_dir.clone()),
        );
        print_tree(LocalBackend::new(Arc::new(workspaces)), expand)
    } else {
        let url = server.unwrap_or_else(|| {
            let listen = config.listen.replace("0.0.0.0", "127.0.0.1");
            format!("http://{listen}")
        });
        print_tree(HttpBackend::new(&url), expand)
    }
}

fn print_tree<B: ExplorerBackend>(backend: B, expand: &[String]) -> anyhow::Result<()> {
    let mut explorer = Explorer::new(backend);
    explorer.load_directory("/");
    if let Some(error) = explorer.error() {
        anyhow::bail!("{error}");
    }

    for path in expand_order(expand) {
        if !explorer.is_expanded(&path) {
            explorer.toggle_expanded(&path);
        }
    }

    if let Some(base_dir) = explorer.base_dir() {
        println!("{}", style::muted(base_dir));
    }
    print!("{}", explorer.render());
    Ok(())
}

/// Requested directories plus their ancestors, shallowest first.
fn expand_order(expand: &[String]) -> Vec<String> {
    let mut paths = Vec::new();
    for path in expand {
        let mut chain = Vec::new();
        let mut current = normalize_path(path.trim_end_matches('/'));
        while current != "/" {
            chain.push(current.clone());
            current = parent_path(&current);
        }
        for path in chain.into_iter().rev() {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths
}
