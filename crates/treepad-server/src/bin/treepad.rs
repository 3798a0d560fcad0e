//! CLI entrypoint for the treepad file server.

#[path = "treepad/cli.rs"]
mod cli;
#[path = "treepad/serve.rs"]
mod serve;
#[path = "treepad/style.rs"]
mod style;
#[path = "treepad/tree.rs"]
mod tree;
#[path = "treepad/workspace.rs"]
mod workspace;

use clap::Parser;

use cli::{Cli, Command};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("{}", style::error(format!("Error: {}", format_error_with_tip(&err))));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        None => serve::run_serve(cli::ServeArgs::default()),
        Some(Command::Serve(args)) => serve::run_serve(args),
        Some(Command::Workspace { config, action }) => workspace::run_workspace(&config, action),
        Some(Command::Tree {
            config,
            server,
            local,
            expand,
        }) => tree::run_tree(&config, server, local, &expand),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn format_error_with_tip(err: &anyhow::Error) -> String {
    let message = format!("{err:#}");
    let tip = if message.contains("web bind") && message.contains("in use") {
        Some("Tip: pass `--listen 127.0.0.1:<port>` or set SERVER_PORT to pick a free port.")
    } else if message.contains("treepad.toml") {
        Some("Tip: check the [server], [workspace], [cors] and [ai] sections of treepad.toml.")
    } else if message.contains("Connection refused") {
        Some("Tip: start the server with `treepad serve`, or use `treepad tree --local`.")
    } else {
        None
    };
    match tip {
        Some(tip) => format!("{message}\n{tip}"),
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_failures_suggest_another_port() {
        let err = anyhow::anyhow!("web bind 127.0.0.1:3001: Address already in use")
            .context("failed to start server");
        let message = format_error_with_tip(&err);
        assert!(message.starts_with("failed to start server: web bind 127.0.0.1:3001"));
        assert!(message.ends_with("or set SERVER_PORT to pick a free port."));
    }

    #[test]
    fn unknown_failures_have_no_tip() {
        let err = anyhow::anyhow!("disk full");
        assert_eq!(format_error_with_tip(&err), "disk full");
    }
}
