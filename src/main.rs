//! Relay server entry point (CLI binary).
//!
//! This is a thin wrapper around the `music_relay` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use music_relay::initialization::init_logger_with;
use music_relay::{run, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    let _ = dotenvy::dotenv();

    let config = Config::parse();

    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    if let Err(e) = run(config).await {
        eprintln!("music_relay error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}
