//! `story-sync` entry point: loads settings, wires services, runs one command.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use ortho_config::OrthoConfig;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use story_sync::bootstrap::ClientServices;
use story_sync::config::SyncSettings;
use story_sync::inbound::cli::{CliArgs, run_command};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = CliArgs::parse();
    let mut settings = SyncSettings::load_from_iter([OsString::from("story-sync")])
        .wrap_err("load settings")?;
    if let Some(database) = args.database.clone() {
        settings.database_path = Some(database);
    }

    let services = ClientServices::from_settings(&settings).wrap_err("wire services")?;
    services.start().await.wrap_err("open local store")?;
    if args.offline {
        services.connectivity().set_online(false);
    } else {
        services.refresh_connectivity().await;
    }

    let token = settings.auth_token();
    let mut stdout = io::stdout();
    let outcome = run_command(args.command, &services, &token, &mut stdout).await;

    if let Err(error) = services.shutdown().await {
        warn!(%error, "local store did not close cleanly");
    }
    outcome.wrap_err("command failed")
}
