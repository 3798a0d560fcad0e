//! `treepad workspace` commands operating on the state file directly.

use std::sync::Arc;

use treepad_fs::{DefaultBaseDir, JsonFileStore, Workspaces};

use crate::cli::{ConfigArgs, WorkspaceAction};
use crate::style;

pub fn run_workspace(config: &ConfigArgs, action: WorkspaceAction) -> anyhow::Result<()> {
    let config = config.load()?;
    let store = JsonFileStore::new(config.state_file.clone());
    let workspaces = Workspaces::load(
        Arc::new(store),
        &DefaultBaseDir::new(config.default_dir.clone()),
    );

    match action {
        WorkspaceAction::List => {}
        WorkspaceAction::Add { path } => {
            workspaces.add_workspace(&path)?;
        }
        WorkspaceAction::Remove { path } => {
            workspaces.remove_workspace(&path)?;
        }
        WorkspaceAction::Activate { path } => {
            let active = workspaces.set_active_base_dir(&path)?;
            println!("{}", style::success(format!("Active workspace: {active}")));
        }
    }

    print_workspaces(&workspaces);
    Ok(())
}

fn print_workspaces(workspaces: &Workspaces) {
    let active = workspaces.active_workspace();
    let list = workspaces.list_workspaces();
    if list.is_empty() {
        println!("{}", style::muted("No workspaces registered."));
    }
    for path in list {
        if active.as_deref() == Some(path.as_str()) {
            println!("* {}", style::accent(&path));
        } else {
            println!("  {path}");
        }
    }
    if active.is_none() {
        println!(
            "{}",
            style::muted(format!(
                "Default base directory: {}",
                workspaces.default_dir().display()
            ))
        );
    }
}
