pub mod cli;
pub mod commands;
pub mod config;
pub mod confirm;
pub mod datastore;
pub mod datetime;
pub mod inline_edit;
pub mod render;
pub mod report;
pub mod scheduler;
pub mod selector;
pub mod session;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting ticklist"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  debug!(files = ?cfg.loaded_files, "configuration loaded");

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let kv = datastore::FileStore::open(
    &data_dir
  )
  .with_context(|| {
    format!(
      "failed to open datastore at \
       {}",
      data_dir.display()
    )
  })?;

  let mut store = store::TaskStore::open(
    datastore::TaskPersistence::new(kv)
  );
  let renderer =
    render::Renderer::new(&cfg)?;
  let command = cli
    .command
    .unwrap_or(cli::Command::List);

  if command == cli::Command::Shell {
    let timings =
      config::Timings::from_config(
        &cfg
      )?;
    let session = session::Session::new(
      store,
      renderer,
      timings,
      io::stdout()
    );
    session::run_interactive(session)?;
  } else {
    commands::dispatch(
      &mut store,
      &cfg,
      &renderer,
      command,
      &mut io::stdin().lock(),
      &mut io::stdout().lock(),
      Utc::now()
    )?;
  }

  info!("done");
  Ok(())
}
