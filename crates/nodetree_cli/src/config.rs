//! Server configuration.
//!
//! # Responsibility
//! - Parse command-line flags with environment fallbacks.
//! - Validate values before any file or socket is opened.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Sentinel accepted by `--db` for a throwaway in-memory store.
pub const IN_MEMORY_DB: &str = ":memory:";

/// Ordered node tree REST server
#[derive(Parser, Debug)]
#[command(name = "nodetree")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// SQLite database file, or `:memory:`
    #[arg(long = "db", env = "NODETREE_DB_PATH", default_value = "nodetree.sqlite3")]
    pub db_path: String,

    /// Socket address to listen on
    #[arg(long, env = "NODETREE_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// trace|debug|info|warn|error (default depends on build mode)
    #[arg(long, env = "NODETREE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rolling log files (stderr when unset)
    #[arg(long, env = "NODETREE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Where the node table lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    Memory,
    File(PathBuf),
}

/// Validated runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db: DbLocation,
    pub bind: SocketAddr,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl ServerConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, String> {
        let db_path = cli.db_path.trim();
        let db = match db_path {
            "" => return Err("database path cannot be empty".to_string()),
            IN_MEMORY_DB => DbLocation::Memory,
            path => DbLocation::File(PathBuf::from(path)),
        };

        let log_dir = cli
            .log_dir
            .map(|dir| {
                dir.into_os_string()
                    .into_string()
                    .map_err(|raw| format!("log directory is not valid UTF-8: {raw:?}"))
            })
            .transpose()?;

        Ok(Self {
            db,
            bind: cli.bind,
            log_level: cli
                .log_level
                .unwrap_or_else(|| nodetree_core::default_log_level().to_string()),
            log_dir,
        })
    }
}
