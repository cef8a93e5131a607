//! Utilities for logging.
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

/// How log lines should be formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingMode {
    /// Structured json output, one object per line.
    Json,
    /// Human readable output including span context.
    #[default]
    Full,
    /// Human readable output without targets.
    Compact,
}

impl FromStr for LoggingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "json" => LoggingMode::Json,
            "full" => LoggingMode::Full,
            "compact" => LoggingMode::Compact,
            other => return Err(format!("unknown logging mode: {other}")),
        })
    }
}

/// Maps a verbosity count (e.g. number of `-v` flags) to a level.
pub fn verbosity_to_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn env_filter(level: Level) -> EnvFilter {
    // RUST_LOG takes precedence over the verbosity.
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Install the global subscriber.
///
/// Does nothing if a global subscriber has already been set.
pub fn init(verbosity: u8, mode: LoggingMode) {
    let level = verbosity_to_level(verbosity);
    let builder = SubscriberBuilder::default().with_env_filter(env_filter(level));

    let _ = match mode {
        LoggingMode::Json => builder.json().try_init(),
        LoggingMode::Full => builder.try_init(),
        LoggingMode::Compact => builder.compact().with_target(false).try_init(),
    };
}

/// Install a subscriber that writes through the test harness' captured
/// output. Safe to call from every test.
pub fn init_test() {
    let _ = SubscriberBuilder::default()
        .with_env_filter(env_filter(Level::DEBUG))
        .with_test_writer()
        .try_init();
}
