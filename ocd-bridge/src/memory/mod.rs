//! Memory-state synchronization.
//!
//! Clients declare memory cells to be polled at their own rates ([`WatchScheduler`]),
//! reads are correlated with the backend's asynchronous answers by address
//! ([`CorrelationGate`]) and the latest value of each cell is kept in a
//! [`MemoryMap`] which is republished on every change. [`MemorySync`] ties the
//! three together.

mod engine;
mod gate;
mod map;
mod ports;
mod watch;

pub use engine::MemorySync;
pub use gate::CorrelationGate;
pub use map::{MapEntry, MemoryMap, Upsert};
pub use ports::{BusBackend, BusPublisher, MemoryBackend, SnapshotPublisher};
pub use watch::{DueRead, NotWatched, WatchChange, WatchEntry, WatchScheduler};
