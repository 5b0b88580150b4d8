//! The memory driver: read, write and watch target memory cells over the bus.
//!
//! Commands:
//!
//! | topic                  | payload                                    |
//! |------------------------|--------------------------------------------|
//! | `<itf>/cmds/read`      | `{"addr": "0x…", "width": 4}`              |
//! | `<itf>/cmds/write`     | `{"addr": "0x…", "value": "0x…", "width": 4}` |
//! | `<itf>/cmds/watch`     | `{"addr": "0x…", "width": 4, "pollTime": 100}` |
//!
//! The current map is published retained on `<itf>/atts/map` as
//! `{"regs": [{"addr", "value", "width"}, …]}` after every change.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::bus::{Bus, Interface, Message};
use crate::error::Error;
use crate::memory::{BusBackend, BusPublisher, MemorySync};
use crate::protocol::{MemoryUpdate, ReadRequest, WatchRequest, WriteRequest};

use super::decode_message;

fn default_tick_ms() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemorySettings {
    /// Topic path of this driver.
    pub interface: String,
    /// Topic path of the OpenOCD driver that executes the reads.
    pub openocd: String,
    /// How long the loop yields between two scheduler ticks.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

type Engine<B> = MemorySync<BusBackend<B>, BusPublisher<B>>;

pub struct MemoryDriver<B: Bus> {
    bus: B,
    interface: Interface,
    openocd: Interface,
    tick: Duration,
    engine: Engine<B>,
}

impl<B: Bus> MemoryDriver<B> {
    pub fn new(bus: B, settings: &MemorySettings) -> Self {
        let interface = Interface::new(&settings.interface);
        let openocd = Interface::new(&settings.openocd);

        let engine = MemorySync::new(
            BusBackend::new(bus.clone(), openocd.clone()),
            BusPublisher::new(bus.clone(), interface.clone()),
        );

        Self {
            bus,
            interface,
            openocd,
            tick: Duration::from_millis(settings.tick_ms.max(1)),
            engine,
        }
    }

    pub fn engine(&self) -> &Engine<B> {
        &self.engine
    }

    /// Drives the engine until `token` is cancelled or the bus goes away.
    ///
    /// Commands, backend updates and scheduler ticks are all handled on this
    /// one task.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), Error> {
        let mut commands = self.bus.subscribe(&self.interface.commands())?;
        let mut updates = self
            .bus
            .subscribe(&self.openocd.attribute("memory/map"))?;

        tracing::info!(
            "Memory driver on {} using OpenOCD at {}",
            self.interface,
            self.openocd
        );

        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => break,
                message = commands.recv() => {
                    let Some(message) = message else { break };
                    self.handle_command(&message);
                }
                message = updates.recv() => {
                    let Some(message) = message else { break };
                    self.handle_update(&message);
                }
                _ = tokio::time::sleep(self.tick) => {}
            }

            let now = Instant::now();
            self.engine.tick(now.duration_since(last_tick));
            last_tick = now;
        }

        tracing::debug!("Memory driver on {} stopped", self.interface);

        Ok(())
    }

    fn handle_command(&mut self, message: &Message) {
        let Some(name) = self.interface.command_name(&message.topic) else {
            return;
        };

        let result = match name {
            "read" => decode_message::<ReadRequest>(message).and_then(|r| self.engine.read(r)),
            "write" => decode_message::<WriteRequest>(message).and_then(|r| self.engine.write(r)),
            "watch" => decode_message::<WatchRequest>(message)
                .and_then(|r| self.engine.watch(r))
                .map(|_| ()),
            other => {
                tracing::warn!("Unknown memory command `{other}`");
                Ok(())
            }
        };

        if let Err(error) = result {
            tracing::error!("Command `{name}` failed: {error}");
        }
    }

    fn handle_update(&mut self, message: &Message) {
        let result =
            decode_message::<MemoryUpdate>(message).and_then(|u| self.engine.apply_update(u));

        if let Err(error) = result {
            tracing::error!("Dropping memory update: {error}");
        }
    }
}
