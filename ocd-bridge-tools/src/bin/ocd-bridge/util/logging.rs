use std::fs::File;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter as Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log level as written on the command line and in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[clap(rename_all = "UPPER")]
#[serde(rename_all = "UPPERCASE")]
pub enum LevelFilter {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LevelFilter> for Level {
    fn from(level: LevelFilter) -> Self {
        match level {
            LevelFilter::Off => Level::OFF,
            LevelFilter::Error => Level::ERROR,
            LevelFilter::Warn => Level::WARN,
            LevelFilter::Info => Level::INFO,
            LevelFilter::Debug => Level::DEBUG,
            LevelFilter::Trace => Level::TRACE,
        }
    }
}

/// An explicit level overrides `RUST_LOG`, otherwise `RUST_LOG` applies on top of INFO.
fn stderr_filter(level: Option<LevelFilter>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(Level::from(level).to_string()),
        None => EnvFilter::builder()
            .with_default_directive(Level::INFO.into())
            .from_env_lossy(),
    }
}

/// Installs the global subscriber.
///
/// Stdout carries the bus transport, so human readable logs go to stderr. With
/// a `log_path` every event is additionally written to that file as JSON lines;
/// the returned guard flushes it when dropped.
pub fn setup_logging(
    log_path: Option<&Path>,
    level: Option<LevelFilter>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let stderr = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter(level));

    let (file, guard) = match log_path {
        Some(path) => {
            let log_file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
                .lossy(false)
                .finish(log_file);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(Level::TRACE);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(stderr).with(file).init();

    if let Some(path) = log_path {
        tracing::debug!("Logging to {}", path.display());
    }

    Ok(guard)
}
