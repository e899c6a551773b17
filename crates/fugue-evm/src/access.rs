//! Warm/cold access bookkeeping (EIP-2929)
//!
//! One tracker lives for the whole transaction. Child frames take a
//! checkpoint; a failed frame rolls the tracker back to it.

use crate::state::StorageCell;
use fugue_primitives::Address;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum AccessEntry {
    Address(Address),
    Cell(StorageCell),
    Created(Address),
}

/// Position in the access journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessCheckpoint(usize);

/// Warm addresses, warm slots and accounts created in this transaction
#[derive(Debug, Clone, Default)]
pub struct AccessTracker {
    addresses: HashSet<Address>,
    cells: HashSet<StorageCell>,
    created: HashSet<Address>,
    journal: Vec<AccessEntry>,
}

impl AccessTracker {
    /// Empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `address` warm; returns whether it was cold
    pub fn warm_up_address(&mut self, address: Address) -> bool {
        let cold = self.addresses.insert(address);
        if cold {
            self.journal.push(AccessEntry::Address(address));
        }
        cold
    }

    /// Mark `cell` warm; returns whether it was cold
    pub fn warm_up_cell(&mut self, cell: StorageCell) -> bool {
        let cold = self.cells.insert(cell);
        if cold {
            self.journal.push(AccessEntry::Cell(cell));
        }
        cold
    }

    /// Whether `address` is warm
    pub fn is_warm(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    /// Whether `cell` is warm
    pub fn is_cell_warm(&self, cell: &StorageCell) -> bool {
        self.cells.contains(cell)
    }

    /// Record a contract created in this transaction (EIP-6780)
    pub fn mark_created(&mut self, address: Address) {
        if self.created.insert(address) {
            self.journal.push(AccessEntry::Created(address));
        }
    }

    /// Whether `address` was created in this transaction
    pub fn was_created(&self, address: &Address) -> bool {
        self.created.contains(address)
    }

    /// Current journal position
    pub fn checkpoint(&self) -> AccessCheckpoint {
        AccessCheckpoint(self.journal.len())
    }

    /// Forget everything recorded after `checkpoint`
    pub fn rollback(&mut self, checkpoint: AccessCheckpoint) {
        while self.journal.len() > checkpoint.0 {
            match self.journal.pop() {
                Some(AccessEntry::Address(address)) => {
                    self.addresses.remove(&address);
                }
                Some(AccessEntry::Cell(cell)) => {
                    self.cells.remove(&cell);
                }
                Some(AccessEntry::Created(address)) => {
                    self.created.remove(&address);
                }
                None => break,
            }
        }
    }
}
