//! Tracing setup. The palette owns the terminal, so logs go to a file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const CRATES: &[&str] = &[
    "pearl", "pl_cli", "pl_config", "pl_core", "pl_nvim", "pl_tools", "pl_tui", "pl_utils",
];
const LOG_FILE_PREFIX: &str = "pearl.log";

pub struct LogConfig<'a> {
    pub dir: &'a Path,
    pub verbose: bool,
    /// Keep stderr quiet while the palette draws.
    pub tui_mode: bool,
}

/// Install a daily-rolling file writer, plus stderr output outside the palette.
///
/// The returned guard flushes buffered lines when dropped; hold it until exit.
pub fn init_logging(config: LogConfig<'_>) -> Result<WorkerGuard> {
    fs::create_dir_all(config.dir).with_context(|| {
        format!("failed to create log directory {}", config.dir.display())
    })?;
    let appender = tracing_appender::rolling::daily(config.dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config.verbose)));
    let console = (!config.tui_mode).then(|| {
        let filter = if config.verbose {
            EnvFilter::new(default_filter(true))
        } else {
            EnvFilter::new("warn")
        };
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter)
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(console)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

/// Filter enabling every workspace crate at `info`, or `debug` when verbose.
pub fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    CRATES
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_every_crate_to_debug() {
        let filter = default_filter(true);
        assert!(filter.starts_with("pearl=debug,"));
        assert!(filter.contains("pl_tui=debug"));
        assert!(!filter.contains("info"));
    }

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(default_filter(false)).is_ok());
    }
}
