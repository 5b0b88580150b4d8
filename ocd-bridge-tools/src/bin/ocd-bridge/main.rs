mod cmd;
mod config;
mod transport;
mod util;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{load_config, Config};
use crate::util::logging::{setup_logging, LevelFilter};

#[derive(clap::Parser)]
#[clap(
    name = "ocd-bridge",
    about = "Bridges a message bus to an OpenOCD debug server",
    version
)]
struct Cli {
    /// Location for log file
    ///
    /// The file receives every log message as JSON, regardless of `--log-level`.
    #[clap(long, global = true, help_heading = "LOG CONFIGURATION")]
    log_file: Option<PathBuf>,
    /// Level of the log messages printed to stderr. Falls back to `log_level`
    /// from the configuration, then to `RUST_LOG`.
    #[clap(long, global = true, value_enum, help_heading = "LOG CONFIGURATION")]
    log_level: Option<LevelFilter>,
    /// Configuration file, merged over the `ocd-bridge.*` files of the home and
    /// working directory
    #[clap(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    subcommand: Subcommand,
}

impl Cli {
    async fn run(self, config: Config) -> Result<()> {
        match self.subcommand {
            Subcommand::Serve(cmd) => cmd.run(config).await,
            Subcommand::Config(cmd) => cmd.run(&config),
        }
    }
}

#[derive(clap::Subcommand)]
enum Subcommand {
    /// Run the configured drivers
    Serve(cmd::serve::Cmd),
    /// Print the effective configuration
    Config(cmd::config::Cmd),
}

fn main() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime.")?;
    let result = runtime.block_on(run());

    // Reading stdin blocks a runtime thread until the next line arrives.
    runtime.shutdown_background();

    result
}

async fn run() -> Result<()> {
    let matches = Cli::parse();

    let config =
        load_config(matches.config.as_deref()).context("Failed to load configuration.")?;

    let log_path = matches.log_file.clone();
    let _logger_guard = setup_logging(log_path.as_deref(), matches.log_level.or(config.log_level))?;

    matches.run(config).await
}
