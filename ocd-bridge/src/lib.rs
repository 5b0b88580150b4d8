//! # ocd-bridge
//!
//! Connects a publish/subscribe message bus to an [OpenOCD] debug server.
//!
//! Three drivers share one [`bus::Bus`]:
//!
//! - [`driver::OpenOcdDriver`] runs debug commands (memory and register access,
//!   reset, halt, resume, raw commands) against OpenOCD's TCL RPC server and
//!   publishes the results as retained attributes.
//! - [`driver::MemoryDriver`] lets clients read, write and periodically watch
//!   memory cells. It keeps the latest value of every cell in a
//!   [`memory::MemoryMap`] and republishes it whenever it changes.
//! - [`driver::ResetDriver`] offers a single reset trigger.
//!
//! The memory driver never talks to OpenOCD itself. It sends read requests to
//! the OpenOCD driver and picks the answers up from its `memory/map`
//! attribute, so several memory drivers can share one debug server.
//!
//! ```no_run
//! use ocd_bridge::bus::LocalBus;
//! use ocd_bridge::driver::{MemoryDriver, MemorySettings, OpenOcdDriver, OpenOcdSettings};
//! use ocd_bridge::openocd::OpenOcd;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), ocd_bridge::Error> {
//! let bus = LocalBus::new();
//! let token = CancellationToken::new();
//!
//! let openocd = OpenOcdSettings {
//!     interface: "bench/openocd".to_string(),
//!     host: "localhost".to_string(),
//!     port: 6666,
//!     target_polling: None,
//! };
//! let target = OpenOcd::connect(&openocd.host, openocd.port).await?;
//! let memory = MemorySettings {
//!     interface: "bench/memory".to_string(),
//!     openocd: openocd.interface.clone(),
//!     tick_ms: 1,
//! };
//!
//! tokio::try_join!(
//!     OpenOcdDriver::new(bus.clone(), &openocd, target).run(token.clone()),
//!     MemoryDriver::new(bus.clone(), &memory).run(token.clone()),
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! [OpenOCD]: https://openocd.org

pub mod address;
pub mod bus;
pub mod driver;
mod error;
pub mod memory;
pub mod openocd;
pub mod protocol;

pub use address::Address;
pub use error::Error;
