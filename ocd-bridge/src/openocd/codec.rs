use std::io;

use tokio_util::bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Terminates every command and every response of the TCL RPC protocol.
pub(crate) const TERMINATOR: u8 = 0x1a;

/// Framing for the OpenOCD TCL RPC server.
///
/// Commands are sent as text followed by `0x1a`, responses come back the same
/// way. There is no other header and no request id.
#[derive(Debug, Default)]
pub(crate) struct TclCodec {
    // Bytes already scanned for a terminator, so a response that trickles in is
    // not scanned from the start on every read.
    scanned: usize,
}

impl TclCodec {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl Decoder for TclCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(offset) = src[self.scanned..].iter().position(|&b| b == TERMINATOR) else {
            self.scanned = src.len();
            return Ok(None);
        };

        let end = self.scanned + offset;
        self.scanned = 0;

        let frame = src.split_to(end + 1);
        let text = String::from_utf8_lossy(&frame[..end]).into_owned();

        Ok(Some(text))
    }
}

impl Encoder<&str> for TclCodec {
    type Error = io::Error;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.as_bytes().contains(&TERMINATOR) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "command contains the TCL RPC terminator",
            ));
        }

        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(TERMINATOR);

        Ok(())
    }
}
