//! The OpenOCD driver: executes debug commands received on the bus against an
//! OpenOCD server and publishes the results as retained attributes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::address::parse_hex;
use crate::bus::{Bus, Interface, Message};
use crate::error::Error;
use crate::openocd::{Target, DEFAULT_TCL_PORT};
use crate::protocol::{
    encode_message, CommandRequest, CommandResult, MemoryUpdate, ReadRequest, RegisterRead,
    RegisterUpdate, RegisterWrite, TargetStateReport, WriteRequest,
};

use super::decode_message;

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_TCL_PORT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenOcdSettings {
    /// Topic path of this driver.
    pub interface: String,
    /// Host of the OpenOCD TCL RPC server.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Publish the target state every this many seconds. Disabled if unset or
    /// not positive.
    #[serde(default)]
    pub target_polling: Option<f64>,
}

impl OpenOcdSettings {
    pub fn polling_period(&self) -> Option<Duration> {
        self.target_polling
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
            .map(Duration::from_secs_f64)
    }
}

pub struct OpenOcdDriver<B, T> {
    bus: B,
    interface: Interface,
    target: T,
    polling: Option<Duration>,
}

impl<B: Bus, T: Target> OpenOcdDriver<B, T> {
    pub fn new(bus: B, settings: &OpenOcdSettings, target: T) -> Self {
        Self {
            bus,
            interface: Interface::new(&settings.interface),
            target,
            polling: settings.polling_period(),
        }
    }

    /// Serves commands until `token` is cancelled or the bus goes away.
    ///
    /// Publishes the target state, the register list and the target info once
    /// on start.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), Error> {
        let mut commands = self.bus.subscribe(&self.interface.commands())?;

        match self.polling {
            Some(period) => tracing::info!("Target state polling every {period:?}"),
            None => tracing::info!("Target state polling disabled"),
        }

        for name in ["getState", "getAvailableRegisters", "info"] {
            self.dispatch(name, &Message::new(self.interface.command(name), "{}"))
                .await;
        }

        let mut poll = self.polling.map(|period| {
            let mut poll = interval(period);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
            poll
        });

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => break,
                message = commands.recv() => {
                    let Some(message) = message else { break };
                    let Some(name) = self.interface.command_name(&message.topic) else {
                        continue;
                    };
                    let name = name.to_string();
                    self.dispatch(&name, &message).await;
                }
                _ = next_poll(&mut poll) => {
                    if let Err(error) = self.publish_state().await {
                        tracing::error!("Polling target state failed: {error}");
                    }
                }
            }
        }

        tracing::debug!("OpenOCD driver on {} stopped", self.interface);

        Ok(())
    }

    async fn dispatch(&mut self, name: &str, message: &Message) {
        if let Err(error) = self.handle(name, message).await {
            tracing::error!("Command `{name}` failed: {error}");
        }
    }

    async fn handle(&mut self, name: &str, message: &Message) -> Result<(), Error> {
        match name {
            "readMemory" => {
                let request: ReadRequest = decode_message(message)?;
                self.publish_memory(request).await
            }
            "writeMemory" => {
                let request: WriteRequest = decode_message(message)?;
                let value = parse_value(message, &request.value)?;
                self.target
                    .write_memory(request.addr, request.width, value)
                    .await?;
                self.publish_memory(ReadRequest {
                    addr: request.addr,
                    width: request.width,
                })
                .await
            }
            "readRegister" => {
                let request: RegisterRead = decode_message(message)?;
                self.publish_register(&request.reg).await
            }
            "writeRegister" => {
                let request: RegisterWrite = decode_message(message)?;
                let value = parse_value(message, &request.value)?;
                self.target.write_register(&request.reg, value).await?;
                self.publish_register(&request.reg).await
            }
            "getAvailableRegisters" => {
                let registers = self.target.available_registers().await?;
                self.publish("target/cpu_registers", &registers)
            }
            "getState" => self.publish_state().await,
            "reset" | "halt" | "resetHalt" => {
                self.publish_state().await?;
                match name {
                    "halt" => self.target.halt().await?,
                    other => self.target.reset(other == "resetHalt").await?,
                }
                self.publish_state().await
            }
            "resume" => {
                self.target.resume().await?;
                self.publish_state().await
            }
            "command" => {
                let request: CommandRequest = decode_message(message)?;
                let result = self.target.command(&request.cmd).await?;
                self.publish(
                    "openocd_cmd/result",
                    &CommandResult {
                        cmd: request.cmd,
                        result,
                    },
                )
            }
            "info" => {
                let info = self.target.info().await?;
                self.publish("target/info", &info)
            }
            other => {
                tracing::warn!("Unknown OpenOCD command `{other}`");
                Ok(())
            }
        }
    }

    async fn publish_memory(&mut self, request: ReadRequest) -> Result<(), Error> {
        let value = self.target.read_memory(request.addr, request.width).await?;

        self.publish(
            "memory/map",
            &MemoryUpdate {
                addr: request.addr,
                value: format!("{value:#x}"),
                width: request.width,
            },
        )
    }

    async fn publish_register(&mut self, name: &str) -> Result<(), Error> {
        let value = self.target.read_register(name).await?;

        self.publish(
            "registers/map",
            &RegisterUpdate {
                addr: name.to_string(),
                value: format!("{value:#x}"),
            },
        )
    }

    async fn publish_state(&mut self) -> Result<(), Error> {
        let state = self.target.state().await?;

        self.publish(
            "target/state",
            &TargetStateReport {
                value: state.to_string(),
            },
        )
    }

    fn publish<R: Serialize>(&self, attribute: &str, record: &R) -> Result<(), Error> {
        self.bus.publish(encode_message(
            self.interface.attribute(attribute),
            record,
            true,
        )?)?;
        Ok(())
    }
}

fn parse_value(message: &Message, value: &str) -> Result<u64, Error> {
    parse_hex(value).map_err(|source| Error::Value {
        topic: message.topic.clone(),
        source,
    })
}

async fn next_poll(poll: &mut Option<Interval>) {
    match poll {
        Some(poll) => {
            poll.tick().await;
        }
        None => futures_util::future::pending().await,
    }
}
