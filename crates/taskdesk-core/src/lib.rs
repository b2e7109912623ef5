pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod filter;
pub mod forms;
pub mod list;
pub mod pages;
pub mod render;
pub mod session;
pub mod token_store;

use std::ffi::OsString;

use anyhow::Context;
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
    "starting taskdesk CLI"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;
  debug!(
    base_url = %cfg.api.base_url,
    page_size = cfg.page_size(),
    "effective config"
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
    token_store::TokenStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open token store \
         at {}",
        data_dir.display()
      )
    })?;

  let api = api::ApiClient::new(
    cfg.base_url()?,
    cfg.timeout()
  )
  .context(
    "failed to build HTTP client"
  )?;

  let renderer =
    render::Renderer::new(&cfg);

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  let ctx = commands::AppContext {
    cfg:      &cfg,
    store:    &store,
    api:      &api,
    renderer: &renderer
  };

  runtime.block_on(
    commands::dispatch(
      &ctx,
      cli.command
    )
  )?;

  info!("done");
  Ok(())
}
