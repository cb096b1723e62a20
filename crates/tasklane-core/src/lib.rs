pub mod api;
pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod render;
pub mod resource;
pub mod session;
pub mod task;
pub mod view;

use std::ffi::OsString;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub async fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting tasklane"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rcfile.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open data directory \
         at {}",
        data_dir.display()
      )
    })?;

  let session = session::SessionGate::new(
    Arc::new(store.token_store())
  );
  let api = api::ApiClient::new(
    cfg.api_url()?,
    session
  )
  .context("failed to build HTTP client")?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let zone = cfg.zone();

  let app = commands::App {
    api,
    store,
    cfg,
    renderer,
    zone
  };

  let command =
    cli.command.unwrap_or_else(|| {
      cli::Command::Tasks(
        cli::TasksArgs::default()
      )
    });
  commands::dispatch(&app, command)
    .await?;

  info!("done");
  Ok(())
}
