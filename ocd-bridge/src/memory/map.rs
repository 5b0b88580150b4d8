use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::protocol::{MemoryUpdate, Width};

/// The last known value of one memory cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    pub addr: Address,
    pub value: String,
    pub width: Width,
}

impl From<MemoryUpdate> for MapEntry {
    fn from(update: MemoryUpdate) -> Self {
        Self {
            addr: update.addr,
            value: update.value,
            width: update.width,
        }
    }
}

/// Whether [`MemoryMap::upsert`] added or replaced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// Current value per address, one entry per address.
///
/// Serializes as `{"regs": [...]}`, which is the snapshot published after every
/// change. Entries keep the position of their first insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMap {
    regs: Vec<MapEntry>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, entry: MapEntry) -> Upsert {
        match self.regs.iter_mut().find(|e| e.addr == entry.addr) {
            Some(existing) => {
                *existing = entry;
                Upsert::Updated
            }
            None => {
                self.regs.push(entry);
                Upsert::Inserted
            }
        }
    }

    pub fn get(&self, address: Address) -> Option<&MapEntry> {
        self.regs.iter().find(|e| e.addr == address)
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.regs
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }
}
