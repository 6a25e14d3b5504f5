//! Tracing subscriber initialization.
//!
//! Diagnostics go to stderr; stdout carries the log payload when no output
//! file is given. `RUST_LOG` takes precedence; otherwise the `-v` count picks
//! the level.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Maps the number of `-v` flags to a default level.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Installs the global stderr subscriber.
///
/// Fails only if a global subscriber is already installed.
pub fn init(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbosity).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
}
