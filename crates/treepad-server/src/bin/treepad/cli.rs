//! CLI definitions for treepad.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use treepad_server::ServerConfig;

#[derive(Debug, Parser)]
#[command(
    name = "treepad",
    version,
    about = "Browser file explorer backend",
    infer_subcommands = true,
    after_help = "Examples:\n  treepad                              # serve on 127.0.0.1:3001\n  treepad serve --dir ~/notes          # serve a specific folder\n  treepad workspace add ./project      # register a workspace\n  treepad tree --local --expand /docs  # print the tree without a server"
)]
pub struct Cli {
    /// Show debug logging.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP file server (default).
    Serve(ServeArgs),
    /// Manage registered workspaces without a running server.
    Workspace {
        #[command(flatten)]
        config: ConfigArgs,
        #[command(subcommand)]
        action: WorkspaceAction,
    },
    /// Print the directory tree as the browser explorer shows it.
    Tree {
        #[command(flatten)]
        config: ConfigArgs,
        /// Server URL (defaults to the configured listen address).
        #[arg(long, conflicts_with = "local")]
        server: Option<String>,
        /// Read the filesystem directly instead of calling a server.
        #[arg(long)]
        local: bool,
        /// Directory to expand; repeatable.
        #[arg(long = "expand", value_name = "PATH")]
        expand: Vec<String>,
    },
}

#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Listen address (host:port).
    #[arg(long)]
    pub listen: Option<String>,
}

#[derive(Debug, Default, Clone, Args)]
pub struct ConfigArgs {
    /// Configuration file (default: ./treepad.toml when present).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Workspace state file.
    #[arg(long)]
    pub state_file: Option<PathBuf>,
    /// Base directory used while no workspace is active.
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

impl ConfigArgs {
    /// File, then environment, then these flags.
    pub fn load(&self) -> anyhow::Result<ServerConfig> {
        let mut config =
            ServerConfig::load(self.config.as_deref()).context("failed to load configuration")?;
        config.apply_env();
        if let Some(state_file) = &self.state_file {
            config.state_file.clone_from(state_file);
        }
        if let Some(dir) = &self.dir {
            config.default_dir = Some(dir.clone());
        }
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum WorkspaceAction {
    /// List registered workspaces; the active one is marked.
    List,
    /// Register a directory.
    Add { path: String },
    /// Unregister a directory.
    Remove { path: String },
    /// Make a directory the active base directory.
    Activate { path: String },
}
