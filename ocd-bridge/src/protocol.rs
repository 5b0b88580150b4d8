//! Payload records exchanged over the bus.
//!
//! All payloads are JSON objects. Extra fields are ignored, missing required
//! fields are reported as a [`PayloadError`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::bus::Message;
use crate::error::Error;

/// Access width in bytes.
pub type Width = u32;

/// Payload is not valid JSON for this record: {0}
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub struct PayloadError(#[from] serde_json::Error);

/// Decodes a JSON payload into one of the request records.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, PayloadError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Encodes a record as a JSON payload.
pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, PayloadError> {
    Ok(serde_json::to_vec(record)?)
}

/// Builds a message carrying `record`, tagging encoding failures with the topic.
pub(crate) fn encode_message<T: Serialize>(
    topic: String,
    record: &T,
    retain: bool,
) -> Result<Message, Error> {
    let payload = encode(record).map_err(|source| Error::payload(&topic, source))?;

    Ok(Message {
        topic,
        payload: payload.into(),
        retain,
    })
}

/// `read`: fetch a single memory cell once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub addr: Address,
    pub width: Width,
}

/// `write`: store a value into a memory cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub addr: Address,
    /// Hex encoded value.
    pub value: String,
    pub width: Width,
}

/// `watch`: poll a memory cell every `pollTime` milliseconds, or stop polling
/// it when `pollTime <= 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRequest {
    pub addr: Address,
    pub width: Width,
    #[serde(rename = "pollTime")]
    pub poll_time: i64,
}

/// A memory value reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUpdate {
    pub addr: Address,
    pub value: String,
    pub width: Width,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRead {
    pub reg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWrite {
    pub reg: String,
    pub value: String,
}

/// A CPU register value reported by the backend. The register name travels in
/// `addr` so consumers can treat registers and memory cells alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUpdate {
    pub addr: String,
    pub value: String,
}

/// Register names mapped to their width in bits.
pub type CpuRegisters = BTreeMap<String, u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetTrigger {
    #[serde(rename = "haltAfterReset")]
    pub halt_after_reset: bool,
}

/// Raw OpenOCD command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub cmd: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub cmd: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStateReport {
    pub value: String,
}

/// Static information about the debugged target. Fields the debug server
/// cannot answer are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub name: Option<String>,
    pub endianness: Option<String>,
    pub chipname: Option<String>,
    pub cputapid: Option<String>,
    pub workareasize: Option<String>,
}
