//! Client side of the OpenOCD debug server.
//!
//! OpenOCD exposes a TCL RPC server (port 6666 by default). [`TclClient`]
//! speaks its framing, [`OpenOcd`] builds the target operations the bridge
//! needs on top of it.

mod codec;
mod target;
mod tcl;

pub use target::{OpenOcd, Target, TargetState};
pub use tcl::{TclClient, TclError, DEFAULT_TCL_PORT};
