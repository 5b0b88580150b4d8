use crate::bus::{Bus, Interface};
use crate::error::Error;
use crate::protocol::{encode_message, ReadRequest, WriteRequest};

use super::MemoryMap;

/// Where memory requests are sent.
///
/// Requests are fire-and-forget: results come back later as independent
/// push-updates, never as return values.
pub trait MemoryBackend {
    fn read_memory(&mut self, request: &ReadRequest) -> Result<(), Error>;

    fn write_memory(&mut self, request: &WriteRequest) -> Result<(), Error>;
}

/// Where the memory map is published after each change.
pub trait SnapshotPublisher {
    fn publish_snapshot(&mut self, map: &MemoryMap) -> Result<(), Error>;
}

/// Forwards memory requests to the command topics of an OpenOCD driver.
#[derive(Debug, Clone)]
pub struct BusBackend<B> {
    bus: B,
    openocd: Interface,
}

impl<B: Bus> BusBackend<B> {
    pub fn new(bus: B, openocd: Interface) -> Self {
        Self { bus, openocd }
    }
}

impl<B: Bus> MemoryBackend for BusBackend<B> {
    fn read_memory(&mut self, request: &ReadRequest) -> Result<(), Error> {
        self.bus.publish(encode_message(
            self.openocd.command("readMemory"),
            request,
            false,
        )?)?;
        Ok(())
    }

    fn write_memory(&mut self, request: &WriteRequest) -> Result<(), Error> {
        self.bus.publish(encode_message(
            self.openocd.command("writeMemory"),
            request,
            false,
        )?)?;
        Ok(())
    }
}

/// Publishes the map as the retained `map` attribute of an interface.
#[derive(Debug, Clone)]
pub struct BusPublisher<B> {
    bus: B,
    interface: Interface,
}

impl<B: Bus> BusPublisher<B> {
    pub fn new(bus: B, interface: Interface) -> Self {
        Self { bus, interface }
    }
}

impl<B: Bus> SnapshotPublisher for BusPublisher<B> {
    fn publish_snapshot(&mut self, map: &MemoryMap) -> Result<(), Error> {
        self.bus
            .publish(encode_message(self.interface.attribute("map"), map, true)?)?;
        Ok(())
    }
}
