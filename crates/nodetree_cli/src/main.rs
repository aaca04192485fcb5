//! Server entry point.
//!
//! # Responsibility
//! - Resolve configuration, start logging, open the database.
//! - Hand the connection to `nodetree_api` and serve until interrupted.

mod config;

use anyhow::{anyhow, Context};
use clap::Parser;
use config::{Cli, DbLocation, ServerConfig};
use log::info;
use nodetree_api::AppState;
use nodetree_core::db::{open_db, open_db_in_memory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_cli(Cli::parse()).map_err(|err| anyhow!(err))?;

    nodetree_core::init_logging(&config.log_level, config.log_dir.as_deref())
        .map_err(|err| anyhow!(err))
        .context("failed to initialize logging")?;

    let conn = match &config.db {
        DbLocation::Memory => open_db_in_memory(),
        DbLocation::File(path) => open_db(path),
    }
    .context("failed to open database")?;
    info!(
        "event=config_loaded module=cli status=ok db={:?} bind={} version={}",
        config.db,
        config.bind,
        nodetree_core::core_version()
    );

    nodetree_api::serve(config.bind, AppState::new(conn))
        .await
        .context("server failed")
}
