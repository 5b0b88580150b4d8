use std::time::Duration;

use crate::address::Address;
use crate::error::Error;
use crate::protocol::{MemoryUpdate, ReadRequest, WatchRequest, WriteRequest};

use super::{
    CorrelationGate, MapEntry, MemoryBackend, MemoryMap, NotWatched, SnapshotPublisher, Upsert,
    WatchChange, WatchScheduler,
};

/// Keeps a map of target memory cells in sync with the backend.
///
/// Owns the watch scheduler, the correlation gate and the memory map. All three
/// are only ever touched through `&mut self`, so as long as a single task drives
/// the engine the gate-then-send and check-then-merge sequences need no lock.
#[derive(Debug)]
pub struct MemorySync<B, P> {
    scheduler: WatchScheduler,
    gate: CorrelationGate,
    map: MemoryMap,
    backend: B,
    publisher: P,
}

impl<B: MemoryBackend, P: SnapshotPublisher> MemorySync<B, P> {
    pub fn new(backend: B, publisher: P) -> Self {
        Self {
            scheduler: WatchScheduler::new(),
            gate: CorrelationGate::new(),
            map: MemoryMap::new(),
            backend,
            publisher,
        }
    }

    /// Reads a memory cell once. The value lands in the map when the backend
    /// answers.
    pub fn read(&mut self, request: ReadRequest) -> Result<(), Error> {
        let fresh = self.mark_pending(request.addr);

        self.backend.read_memory(&request).inspect_err(|_| {
            if fresh {
                self.gate.release(request.addr);
            }
        })
    }

    /// Writes a memory cell. The backend answers with the value read back after
    /// the write, which is admitted like the result of a read.
    pub fn write(&mut self, request: WriteRequest) -> Result<(), Error> {
        let fresh = self.mark_pending(request.addr);

        self.backend.write_memory(&request).inspect_err(|_| {
            if fresh {
                self.gate.release(request.addr);
            }
        })
    }

    /// Starts, changes or stops polling a memory cell.
    pub fn watch(&mut self, request: WatchRequest) -> Result<WatchChange, Error> {
        let change = self
            .scheduler
            .set_watch(request.addr, request.width, request.poll_time)
            .map_err(|NotWatched(address)| Error::WatchNotFound(address))?;

        match change {
            WatchChange::Enabled | WatchChange::Replaced => tracing::info!(
                "Enabled watch for {} every {} ms",
                request.addr,
                request.poll_time
            ),
            WatchChange::Disabled => tracing::info!("Disabled watch for {}", request.addr),
        }

        Ok(change)
    }

    /// Advances the watch timers and issues the reads that are due.
    ///
    /// Returns the number of reads that were issued successfully. A read that
    /// cannot be forwarded is logged and retried on its next due time.
    pub fn tick(&mut self, elapsed: Duration) -> usize {
        let mut issued = 0;

        for due in self.scheduler.tick(elapsed) {
            let request = ReadRequest {
                addr: due.address,
                width: due.width,
            };

            match self.read(request) {
                Ok(()) => issued += 1,
                Err(error) => tracing::error!("Polling {} failed: {error}", due.address),
            }
        }

        issued
    }

    /// Merges a push-update from the backend into the map.
    ///
    /// Returns `Ok(false)` without touching anything if the address has no read
    /// in flight. Otherwise the entry is inserted or replaced and the full map is
    /// published.
    pub fn apply_update(&mut self, update: MemoryUpdate) -> Result<bool, Error> {
        if !self.gate.try_accept(update.addr) {
            tracing::trace!("Ignoring unsolicited update for {}", update.addr);
            return Ok(false);
        }

        let address = update.addr;
        match self.map.upsert(MapEntry::from(update)) {
            Upsert::Inserted => tracing::info!("Created new entry for {address}"),
            Upsert::Updated => tracing::debug!("Updated entry for {address}"),
        }

        self.publisher.publish_snapshot(&self.map)?;

        Ok(true)
    }

    pub fn snapshot(&self) -> &[MapEntry] {
        self.map.entries()
    }

    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    pub fn is_pending(&self, address: Address) -> bool {
        self.gate.is_pending(address)
    }

    pub fn scheduler(&self) -> &WatchScheduler {
        &self.scheduler
    }

    fn mark_pending(&mut self, address: Address) -> bool {
        let fresh = self.gate.mark_pending(address);
        if !fresh {
            // The backend answers without request ids, the first answer resolves both reads.
            tracing::warn!("Read for {address} issued while a previous read is still pending");
        }
        fresh
    }
}
