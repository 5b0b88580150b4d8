//! Runs the configured drivers on an in-process bus.
//!
//! All drivers are polled by this one task. Each driver owns its state, so
//! nothing is shared between them except the bus.

use anyhow::Context;
use futures_util::future::try_join_all;
use ocd_bridge::bus::LocalBus;
use ocd_bridge::driver::{MemoryDriver, OpenOcdDriver, ResetDriver};
use ocd_bridge::openocd::OpenOcd;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::transport::stdio;

#[derive(clap::Parser)]
pub struct Cmd {
    /// Do not connect the bus to stdin and stdout
    #[clap(long)]
    no_stdio: bool,
}

impl Cmd {
    pub async fn run(self, config: Config) -> anyhow::Result<()> {
        anyhow::ensure!(
            config.has_drivers(),
            "No drivers are configured. Add an `openocd`, `memory` or `reset` section to the configuration."
        );

        let bus = LocalBus::new();
        let token = CancellationToken::new();

        let openocd = async {
            let Some(settings) = &config.openocd else {
                return anyhow::Ok(());
            };

            let target = OpenOcd::connect(&settings.host, settings.port)
                .await
                .with_context(|| format!("Failed to start OpenOCD driver {}", settings.interface))?;

            OpenOcdDriver::new(bus.clone(), settings, target)
                .run(token.clone())
                .await
                .with_context(|| format!("OpenOCD driver {} failed", settings.interface))
        };

        let memory = async {
            try_join_all(
                config
                    .memory
                    .iter()
                    .map(|settings| MemoryDriver::new(bus.clone(), settings).run(token.clone())),
            )
            .await
            .context("Memory driver failed")?;
            anyhow::Ok(())
        };

        let reset = async {
            try_join_all(
                config
                    .reset
                    .iter()
                    .map(|settings| ResetDriver::new(bus.clone(), settings).run(token.clone())),
            )
            .await
            .context("Reset driver failed")?;
            anyhow::Ok(())
        };

        let transport = async {
            if self.no_stdio {
                return anyhow::Ok(());
            }

            let input = BufReader::new(tokio::io::stdin());
            stdio::run(bus.clone(), input, tokio::io::stdout(), token.clone()).await
        };

        let shutdown = async {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;
            tracing::info!("Shutting down");
            token.cancel();
            anyhow::Ok(())
        };

        tracing::info!(
            "Serving {} memory and {} reset drivers{}",
            config.memory.len(),
            config.reset.len(),
            if config.openocd.is_some() {
                " with OpenOCD"
            } else {
                ""
            }
        );

        tokio::try_join!(openocd, memory, reset, transport, shutdown)?;

        Ok(())
    }
}
