pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod present;
pub mod refresh;
pub mod reorder;
pub mod store;
pub mod task;
pub mod theme;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting tally");

    let mut cfg = config::Config::load(cli.config.as_deref())?;
    cfg.apply_overrides(
        cli.rc_overrides
            .into_iter()
            .map(|kv| (kv.key, kv.value)),
    );

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let mut store = store::TaskStore::open(&data_dir)
        .with_context(|| format!("failed to open task store at {}", data_dir.display()))?;

    let mut renderer = present::Renderer::new(&cfg)?;
    let inv = cli::Invocation::parse(&cfg, cli.rest)?;

    let now = Utc::now();
    let command = commands::parse_command(&cfg, &inv, now)?;
    debug!(?command, "parsed invocation");

    let mut confirm = commands::StdinConfirm;
    commands::dispatch(&mut store, &cfg, &mut renderer, &mut confirm, command, now)?;

    info!("done");
    Ok(())
}
