//! The reset driver: a single `reset/trigger` command in front of the OpenOCD
//! driver, for clients that only need to restart the target.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::bus::{Bus, Interface, Message};
use crate::error::Error;
use crate::protocol::ResetTrigger;

use super::decode_message;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetSettings {
    /// Topic path of this driver.
    pub interface: String,
    /// Topic path of the OpenOCD driver that performs the reset.
    pub openocd: String,
}

pub struct ResetDriver<B> {
    bus: B,
    interface: Interface,
    openocd: Interface,
}

impl<B: Bus> ResetDriver<B> {
    pub fn new(bus: B, settings: &ResetSettings) -> Self {
        Self {
            bus,
            interface: Interface::new(&settings.interface),
            openocd: Interface::new(&settings.openocd),
        }
    }

    /// Forwards triggers and mirrors the target state until `token` is
    /// cancelled or the bus goes away.
    pub async fn run(self, token: CancellationToken) -> Result<(), Error> {
        let mut commands = self.bus.subscribe(&self.interface.commands())?;
        let mut states = self.bus.subscribe(&self.openocd.attribute("target/state"))?;

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => break,
                message = commands.recv() => {
                    let Some(message) = message else { break };
                    if let Err(error) = self.handle_command(&message) {
                        tracing::error!("Reset command on {} failed: {error}", message.topic);
                    }
                }
                message = states.recv() => {
                    let Some(message) = message else { break };
                    let mirrored =
                        Message::retained(self.interface.attribute("state"), message.payload);
                    if let Err(error) = self.bus.publish(mirrored) {
                        tracing::error!("Mirroring the target state failed: {error}");
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_command(&self, message: &Message) -> Result<(), Error> {
        match self.interface.command_name(&message.topic) {
            Some("reset/trigger") => {
                let trigger: ResetTrigger = decode_message(message)?;
                let command = if trigger.halt_after_reset {
                    "resetHalt"
                } else {
                    "reset"
                };

                tracing::info!("Triggering {command} on {}", self.openocd);
                self.bus
                    .publish(Message::new(self.openocd.command(command), "{}"))?;
            }
            Some(other) => tracing::warn!("Unknown reset command `{other}`"),
            None => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use tokio::time::sleep;

    use super::*;
    use crate::bus::LocalBus;

    fn driver() -> (LocalBus, ResetDriver<LocalBus>) {
        let bus = LocalBus::new();
        let driver = ResetDriver::new(
            bus.clone(),
            &ResetSettings {
                interface: "bench/reset".to_string(),
                openocd: "bench/openocd".to_string(),
            },
        );
        (bus, driver)
    }

    #[test_case(r#"{"haltAfterReset": true}"#, "bench/openocd/cmds/resetHalt")]
    #[test_case(r#"{"haltAfterReset": false}"#, "bench/openocd/cmds/reset")]
    fn trigger_is_forwarded(payload: &str, expected: &str) {
        let (bus, driver) = driver();
        let mut openocd = bus.subscribe("bench/openocd/cmds/#").unwrap();

        driver
            .handle_command(&Message::new(
                "bench/reset/cmds/reset/trigger",
                payload.to_string(),
            ))
            .unwrap();

        let forwarded = openocd.try_recv().unwrap();
        assert_eq!(forwarded.topic, expected);
        assert_eq!(forwarded.payload, "{}");
    }

    #[test]
    fn trigger_without_flag_is_rejected() {
        let (_bus, driver) = driver();

        let result = driver.handle_command(&Message::new("bench/reset/cmds/reset/trigger", "{}"));

        assert!(matches!(result, Err(Error::Payload { .. })));
    }

    #[tokio::test]
    async fn target_state_is_mirrored() {
        let (bus, driver) = driver();
        let token = CancellationToken::new();
        bus.publish(Message::retained(
            "bench/openocd/atts/target/state",
            r#"{"value":"halted"}"#,
        ))
        .unwrap();

        let run = driver.run(token.clone());
        let stop = async {
            let mut mirrored = bus.subscribe("bench/reset/atts/state").unwrap();
            let message = mirrored.recv().await.unwrap();
            token.cancel();
            message
        };
        let (result, message) = tokio::join!(run, stop);

        result.unwrap();
        assert!(message.retain);
        assert_eq!(message.payload, r#"{"value":"halted"}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn mirror_failure_keeps_driver_running() {
        let bus = LocalBus::new();
        let driver = ResetDriver::new(
            bus.clone(),
            &ResetSettings {
                // Valid as a filter, but not as an attribute topic.
                interface: "bench/+/reset".to_string(),
                openocd: "bench/openocd".to_string(),
            },
        );
        bus.publish(Message::retained(
            "bench/openocd/atts/target/state",
            r#"{"value":"halted"}"#,
        ))
        .unwrap();
        let token = CancellationToken::new();

        let run = driver.run(token.clone());
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => panic!("driver stopped early: {result:?}"),
            _ = sleep(Duration::from_secs(1)) => {}
        }

        token.cancel();
        run.await.unwrap();
    }
}
