//! Journaled in-memory world state
//!
//! Every mutation pushes an undo entry; a [`Snapshot`] is the journal
//! length at the time it was taken.

use super::{Snapshot, StorageCell, WorldState};
use bytes::Bytes;
use fugue_primitives::{Account, Address, EMPTY_CODE_HASH, EMPTY_TRIE_ROOT, H256, U256};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone)]
enum JournalEntry {
    Account {
        address: Address,
        previous: Option<Account>,
    },
    Storage {
        cell: StorageCell,
        previous: U256,
    },
    StorageWiped {
        address: Address,
        slots: Vec<(U256, U256)>,
    },
    Transient {
        cell: StorageCell,
        previous: U256,
    },
    Touched {
        address: Address,
    },
}

/// World state backed by hash maps
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorldState {
    accounts: HashMap<Address, Account>,
    code: HashMap<H256, Bytes>,
    storage: HashMap<Address, BTreeMap<U256, U256>>,
    original: HashMap<StorageCell, U256>,
    transient: HashMap<StorageCell, U256>,
    touched: HashSet<Address>,
    journal: Vec<JournalEntry>,
}

impl InMemoryWorldState {
    /// Empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account outside of any transaction
    pub fn insert_account(
        &mut self,
        address: Address,
        account: Account,
        code: Option<Bytes>,
        storage: impl IntoIterator<Item = (U256, U256)>,
    ) {
        let mut account = account;
        if let Some(code) = code.filter(|code| !code.is_empty()) {
            let hash = fugue_crypto::keccak256(&code);
            self.code.insert(hash, code);
            account.code_hash = hash;
        }
        self.accounts.insert(address, account);
        let slots: BTreeMap<U256, U256> =
            storage.into_iter().filter(|(_, v)| !v.is_zero()).collect();
        if slots.is_empty() {
            self.storage.remove(&address);
        } else {
            self.storage.insert(address, slots);
        }
    }

    /// All accounts
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    /// Non-zero slots of `address`
    pub fn storage_of(&self, address: &Address) -> Vec<(U256, U256)> {
        self.storage
            .get(address)
            .map(|slots| slots.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default()
    }

    /// Runtime code of `address`
    pub fn code_of(&self, address: &Address) -> Bytes {
        self.accounts
            .get(address)
            .and_then(|a| self.code.get(&a.code_hash).cloned())
            .unwrap_or_default()
    }

    /// Journal length
    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    fn touch(&mut self, address: &Address) {
        if self.touched.insert(*address) {
            self.journal.push(JournalEntry::Touched { address: *address });
        }
    }

    fn update_account(&mut self, address: &Address, update: impl FnOnce(&mut Account)) {
        let previous = self.accounts.get(address).copied();
        let mut account = previous.unwrap_or_default();
        update(&mut account);
        self.journal.push(JournalEntry::Account {
            address: *address,
            previous,
        });
        self.accounts.insert(*address, account);
    }

    fn record_original(&mut self, cell: &StorageCell) {
        if !self.original.contains_key(cell) {
            let value = self.get_storage(cell);
            self.original.insert(*cell, value);
        }
    }

    fn wipe_storage(&mut self, address: &Address) {
        let Some(slots) = self.storage.remove(address) else {
            return;
        };
        for index in slots.keys() {
            let cell = StorageCell::new(*address, *index);
            if !self.original.contains_key(&cell) {
                self.original.insert(cell, slots[index]);
            }
        }
        self.journal.push(JournalEntry::StorageWiped {
            address: *address,
            slots: slots.into_iter().collect(),
        });
    }

    fn write_slot(&mut self, cell: StorageCell, value: U256) {
        let slots = self.storage.entry(cell.address).or_default();
        if value.is_zero() {
            slots.remove(&cell.index);
            if slots.is_empty() {
                self.storage.remove(&cell.address);
            }
        } else {
            slots.insert(cell.index, value);
        }
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Account { address, previous } => match previous {
                Some(account) => {
                    self.accounts.insert(address, account);
                }
                None => {
                    self.accounts.remove(&address);
                }
            },
            JournalEntry::Storage { cell, previous } => self.write_slot(cell, previous),
            JournalEntry::StorageWiped { address, slots } => {
                self.storage.insert(address, slots.into_iter().collect());
            }
            JournalEntry::Transient { cell, previous } => {
                if previous.is_zero() {
                    self.transient.remove(&cell);
                } else {
                    self.transient.insert(cell, previous);
                }
            }
            JournalEntry::Touched { address } => {
                self.touched.remove(&address);
            }
        }
    }
}

impl WorldState for InMemoryWorldState {
    fn account_exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    fn get_account(&self, address: &Address) -> Option<Account> {
        self.accounts.get(address).copied()
    }

    fn get_code(&self, hash: &H256) -> Option<Bytes> {
        if *hash == EMPTY_CODE_HASH {
            return Some(Bytes::new());
        }
        self.code.get(hash).cloned()
    }

    fn get_storage(&self, cell: &StorageCell) -> U256 {
        self.storage
            .get(&cell.address)
            .and_then(|slots| slots.get(&cell.index).copied())
            .unwrap_or_default()
    }

    fn get_original_storage(&self, cell: &StorageCell) -> U256 {
        match self.original.get(cell) {
            Some(value) => *value,
            None => self.get_storage(cell),
        }
    }

    fn get_transient(&self, cell: &StorageCell) -> U256 {
        self.transient.get(cell).copied().unwrap_or_default()
    }

    fn create_account(&mut self, address: Address, balance: U256) {
        self.update_account(&address, |account| {
            *account = Account::with_balance(balance);
        });
        self.touch(&address);
    }

    fn delete_account(&mut self, address: &Address) {
        if !self.accounts.contains_key(address) {
            return;
        }
        self.wipe_storage(address);
        let previous = self.accounts.remove(address);
        self.journal.push(JournalEntry::Account {
            address: *address,
            previous,
        });
    }

    fn add_to_balance(&mut self, address: &Address, value: U256) {
        self.update_account(address, |account| {
            account.balance = account.balance.saturating_add(value);
        });
        self.touch(address);
    }

    fn subtract_from_balance(&mut self, address: &Address, value: U256) {
        self.update_account(address, |account| {
            account.balance = account.balance.saturating_sub(value);
        });
        self.touch(address);
    }

    fn increment_nonce(&mut self, address: &Address) {
        self.update_account(address, |account| {
            account.nonce = account.nonce.saturating_add(1);
        });
    }

    fn insert_code(&mut self, address: &Address, code_hash: H256, code: Bytes) {
        if !code.is_empty() {
            self.code.insert(code_hash, code);
        }
        self.update_account(address, |account| account.code_hash = code_hash);
    }

    fn set_storage(&mut self, cell: StorageCell, value: U256) {
        self.record_original(&cell);
        let previous = self.get_storage(&cell);
        self.journal.push(JournalEntry::Storage { cell, previous });
        self.write_slot(cell, value);
    }

    fn clear_storage(&mut self, address: &Address) {
        self.wipe_storage(address);
    }

    fn reset_storage_root(&mut self, address: &Address) {
        self.wipe_storage(address);
        self.update_account(address, |account| account.storage_root = EMPTY_TRIE_ROOT);
    }

    fn set_transient(&mut self, cell: StorageCell, value: U256) {
        let previous = self.get_transient(&cell);
        self.journal.push(JournalEntry::Transient { cell, previous });
        if value.is_zero() {
            self.transient.remove(&cell);
        } else {
            self.transient.insert(cell, value);
        }
    }

    fn take_snapshot(&mut self) -> Snapshot {
        Snapshot(self.journal.len())
    }

    fn restore(&mut self, snapshot: Snapshot) {
        while self.journal.len() > snapshot.0 {
            if let Some(entry) = self.journal.pop() {
                self.undo(entry);
            }
        }
        tracing::trace!(position = snapshot.0, "world state restored");
    }

    fn commit_transaction(&mut self, clear_empty_touched: bool) {
        if clear_empty_touched {
            let dead: Vec<Address> = self
                .touched
                .iter()
                .filter(|address| self.accounts.get(*address).is_some_and(Account::is_empty))
                .copied()
                .collect();
            for address in dead {
                self.accounts.remove(&address);
                self.storage.remove(&address);
            }
        }
        self.touched.clear();
        self.transient.clear();
        self.original.clear();
        self.journal.clear();
    }
}
