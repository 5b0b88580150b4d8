use std::collections::HashSet;

use crate::address::Address;

/// Addresses with a solicited read in flight.
///
/// The backend reports memory values without any request identifier, so the
/// address is the only correlation key: at most one outstanding read per
/// address can be told apart. A push for an address that is not pending did
/// not come from us and must not touch the memory map.
#[derive(Debug, Default)]
pub struct CorrelationGate {
    pending: HashSet<Address>,
}

impl CorrelationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `address` as awaiting a response.
    ///
    /// Returns `false` if it already was pending. The gate keeps a single flag
    /// per address, so two overlapping reads are resolved by whichever
    /// response arrives first.
    pub fn mark_pending(&mut self, address: Address) -> bool {
        self.pending.insert(address)
    }

    /// Admits a push-update for `address`, consuming the pending mark.
    pub fn try_accept(&mut self, address: Address) -> bool {
        self.pending.remove(&address)
    }

    /// Drops the pending mark without accepting anything, used when the
    /// request never made it to the backend.
    pub fn release(&mut self, address: Address) {
        self.pending.remove(&address);
    }

    pub fn is_pending(&self, address: Address) -> bool {
        self.pending.contains(&address)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
