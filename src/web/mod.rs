//! postboard web server: profiles, posts and comments over HTTP.
//!
//! Handlers return JSON view payloads; state lives in a single SQLite
//! database shared behind a mutex.

pub mod config;
pub mod flash;
pub mod handlers;
pub mod router;
pub mod state;
pub mod utils;

use std::error::Error;

use clap::Parser;

use crate::hashing::PasswordHasher;
use crate::storage::Storage;

use config::{Cli, Config};

/// Entry point: parse CLI, open the database, start serving.
pub async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = Config::from_cli_and_env(cli);

    crate::logging::init();

    crate::plog!("postboard starting");
    crate::plog!("  database: {}", config.database.display());
    crate::plog!("  hash rounds: {}", config.hash_rounds);

    let storage = Storage::open(&config.database)?;
    crate::plog!("  profiles: {}", storage.count_profiles()?);

    let hasher = PasswordHasher::new(config.hash_salt, config.hash_rounds);
    let state = state::shared_state(storage, hasher);
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    crate::plog!("postboard listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
