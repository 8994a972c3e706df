pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod controls;
pub mod datetime;
pub mod form;
pub mod http;
pub mod message;
pub mod render;
pub mod runtime;
pub mod session;
pub mod tags;
pub mod views;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
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
    "starting bulletin CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.bulletinrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let session =
    session::SessionContext::from_config(
      &cfg
    );
  let dates =
    datetime::DateFormat::from_config(
      &cfg
    );
  debug!(
    messages = %session.message_api,
    tags = %session.tags_api,
    timezone = %dates.timezone(),
    "resolved session"
  );

  let transport =
    http::HttpTransport::new(
      cfg.http_timeout()?
    )?;
  let renderer =
    render::TextRenderer::new(&cfg)?;
  let assume_yes = cli.yes
    || !cfg
      .get_bool("confirm")
      .unwrap_or(true);
  let prompter =
    commands::StdPrompter::stdio(
      assume_yes
    );

  let mut runtime =
    runtime::Runtime::new(
      controller::ViewController::new(
        session, dates
      ),
      transport,
      renderer,
      prompter,
      std::io::stdout()
    );

  commands::dispatch(
    &mut runtime,
    &cfg,
    cli.command
  )?;

  info!("done");
  Ok(())
}
