//! `treepad serve`.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use treepad_server::{start_web_server, AppContext};

use crate::cli::ServeArgs;
use crate::style;

pub fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = args.config.load()?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    let ctx = Arc::new(AppContext::from_config(&config));
    let base_dir = ctx.workspaces.active_base_dir();
    info!(
        state_file = %config.state_file.display(),
        llm = ctx.ai.is_configured(),
        "starting file server"
    );

    let server = start_web_server(&config.listen, ctx).context("failed to start server")?;
    println!(
        "{}",
        style::success(format!("treepad listening on http://{}", server.listen))
    );
    println!("Base directory: {}", style::accent(base_dir.display().to_string()));
    server.join();
    Ok(())
}
