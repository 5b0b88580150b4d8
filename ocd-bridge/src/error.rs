use crate::address::{Address, AddressParseError};
use crate::bus::BusError;
use crate::openocd::TclError;
use crate::protocol::PayloadError;

/// The error type for all operations of the bridge.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum Error {
    /// Malformed payload on `{topic}`
    Payload {
        topic: String,
        #[source]
        source: PayloadError,
    },
    /// Invalid value on `{topic}`
    Value {
        topic: String,
        #[source]
        source: AddressParseError,
    },
    /// No watch is active for address {0}
    WatchNotFound(Address),
    /// Memory accesses of {0} bytes are not supported
    UnsupportedWidth(u32),
    /// Message bus error
    Bus(#[from] BusError),
    /// OpenOCD request failed
    Tcl(#[from] TclError),
}

impl Error {
    pub(crate) fn payload(topic: impl Into<String>, source: PayloadError) -> Self {
        Self::Payload {
            topic: topic.into(),
            source,
        }
    }
}
