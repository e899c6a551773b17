//! World state seam
//!
//! The VM never owns account data. It reads and mutates it through
//! [`WorldState`] and rolls failed frames back with [`Snapshot`] tokens.

mod in_memory;

pub use in_memory::InMemoryWorldState;

use bytes::Bytes;
use fugue_primitives::{Account, Address, H256, U256};

/// One storage slot of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageCell {
    /// Owning account
    pub address: Address,
    /// Slot index
    pub index: U256,
}

impl StorageCell {
    /// Slot `index` of `address`
    pub fn new(address: Address, index: U256) -> Self {
        Self { address, index }
    }
}

/// Opaque undo token returned by [`WorldState::take_snapshot`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snapshot(pub usize);

/// Account, code and storage access used by the VM
///
/// Mutations made after a snapshot are undone by [`WorldState::restore`];
/// snapshots nest and are restored innermost first.
pub trait WorldState {
    /// Whether an account exists at `address`
    fn account_exists(&self, address: &Address) -> bool;

    /// Missing or empty (EIP-161)
    fn is_dead_account(&self, address: &Address) -> bool {
        self.get_account(address).is_none_or(|account| account.is_empty())
    }

    /// Account record
    fn get_account(&self, address: &Address) -> Option<Account>;

    /// Balance, zero for missing accounts
    fn get_balance(&self, address: &Address) -> U256 {
        self.get_account(address).map_or(U256::zero(), |a| a.balance)
    }

    /// Nonce, zero for missing accounts
    fn get_nonce(&self, address: &Address) -> u64 {
        self.get_account(address).map_or(0, |a| a.nonce)
    }

    /// Code hash, `None` for missing accounts
    fn get_code_hash(&self, address: &Address) -> Option<H256> {
        self.get_account(address).map(|a| a.code_hash)
    }

    /// Code stored under `hash`
    fn get_code(&self, hash: &H256) -> Option<Bytes>;

    /// Current value of a slot
    fn get_storage(&self, cell: &StorageCell) -> U256;

    /// Value of a slot at the start of the transaction
    fn get_original_storage(&self, cell: &StorageCell) -> U256;

    /// Transient (EIP-1153) value of a slot
    fn get_transient(&self, cell: &StorageCell) -> U256;

    /// Create an account holding `balance`
    fn create_account(&mut self, address: Address, balance: U256);

    /// Remove an account with its storage
    fn delete_account(&mut self, address: &Address);

    /// Credit an existing account; touches it even for zero
    fn add_to_balance(&mut self, address: &Address, value: U256);

    /// Debit an existing account; touches it even for zero
    fn subtract_from_balance(&mut self, address: &Address, value: U256);

    /// Bump the nonce
    fn increment_nonce(&mut self, address: &Address);

    /// Store code and point the account at it
    fn insert_code(&mut self, address: &Address, code_hash: H256, code: Bytes);

    /// Write a slot
    fn set_storage(&mut self, cell: StorageCell, value: U256);

    /// Drop every slot of `address`
    fn clear_storage(&mut self, address: &Address);

    /// Point the account at the empty storage trie
    fn reset_storage_root(&mut self, address: &Address);

    /// Write a transient slot
    fn set_transient(&mut self, cell: StorageCell, value: U256);

    /// Current undo position
    fn take_snapshot(&mut self) -> Snapshot;

    /// Undo everything after `snapshot`
    fn restore(&mut self, snapshot: Snapshot);

    /// Close the transaction: drop transient storage, reset original
    /// values and, when `clear_empty_touched`, delete touched empty
    /// accounts
    fn commit_transaction(&mut self, clear_empty_touched: bool);
}
