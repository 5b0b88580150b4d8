//! Bus drivers.
//!
//! Each driver owns one interface path on the bus, subscribes to its command
//! topics and runs until its cancellation token fires. A driver processes one
//! message at a time, so the state it owns is never shared between tasks.

pub mod memory;
pub mod openocd;
pub mod reset;

use serde::de::DeserializeOwned;

use crate::bus::Message;
use crate::error::Error;
use crate::protocol::decode;

pub use memory::{MemoryDriver, MemorySettings};
pub use openocd::{OpenOcdDriver, OpenOcdSettings};
pub use reset::{ResetDriver, ResetSettings};

/// Decodes the payload of `message`, tagging failures with its topic.
pub(crate) fn decode_message<T: DeserializeOwned>(message: &Message) -> Result<T, Error> {
    decode(&message.payload).map_err(|source| Error::payload(&message.topic, source))
}
