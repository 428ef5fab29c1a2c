//! Configuration types and constants for the postboard server.

use std::path::PathBuf;

use clap::Parser;

use crate::hashing::{DEFAULT_ROUNDS, DEFAULT_SALT};
use crate::storage::default_db_path;

pub(crate) const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

/// Profiles, posts and comments over HTTP, persisted in SQLite.
///
/// Configuration can be set via CLI arguments or environment variables.
/// CLI arguments take precedence over environment variables.
#[derive(Parser, Debug, Default)]
#[command(name = "postboard", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: POSTBOARD_BIND] [default: 127.0.0.1:5000]
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// SQLite database file [env: POSTBOARD_DATABASE] [default: ./postboard.db]
    #[arg(long, short = 'd')]
    pub database: Option<PathBuf>,

    /// Salt mixed into password hashes [env: POSTBOARD_HASH_SALT] [default: abcd]
    #[arg(long)]
    pub salt: Option<String>,

    /// Number of hashing rounds [env: POSTBOARD_HASH_ROUNDS] [default: 1]
    #[arg(long)]
    pub rounds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: String,
    pub database: PathBuf,
    pub hash_salt: String,
    pub hash_rounds: u32,
}

impl Config {
    pub fn from_cli_and_env(cli: Cli) -> Self {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// Resolve each setting as CLI, then `env`, then default.
    /// An unparsable `POSTBOARD_HASH_ROUNDS` falls back to the default.
    pub fn resolve(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Self {
        let bind_addr = cli
            .bind
            .or_else(|| env("POSTBOARD_BIND"))
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let database = cli
            .database
            .or_else(|| env("POSTBOARD_DATABASE").map(PathBuf::from))
            .unwrap_or_else(default_db_path);

        let hash_salt = cli
            .salt
            .or_else(|| env("POSTBOARD_HASH_SALT"))
            .unwrap_or_else(|| DEFAULT_SALT.to_string());

        let hash_rounds = cli
            .rounds
            .or_else(|| env("POSTBOARD_HASH_ROUNDS").and_then(|v| v.parse().ok()))
            .unwrap_or(DEFAULT_ROUNDS);

        Self {
            bind_addr,
            database,
            hash_salt,
            hash_rounds,
        }
    }
}
