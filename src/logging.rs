// Log output setup

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::Level;

use crate::config::LoggingConfig;

/// Target for raw encoder output lines
pub const ENCODER_TARGET: &str = "hbctl::encoder";

/// Level from config text; unknown names fall back to info
pub fn parse_level(level: &str) -> Level {
    level.trim().parse().unwrap_or(Level::INFO)
}

/// Install the global subscriber. `verbose` forces debug output.
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        parse_level(&config.level)
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(verbose);

    match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
    Ok(())
}
