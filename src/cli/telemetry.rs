use anyhow::{Context, Result};
use chrono::Utc;
use log::LevelFilter;
use std::io::Write;

/// Map the `-v` count to a log level
#[must_use]
pub const fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initialize logging to stderr; `RUST_LOG` overrides the verbosity flag
///
/// # Errors
///
/// Returns an error if a logger is already installed
pub fn init(verbosity: u8) -> Result<()> {
    env_logger::Builder::new()
        .filter_level(level_for(verbosity))
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .try_init()
        .context("failed to initialize logger")
}
