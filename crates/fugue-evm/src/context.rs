//! Execution context
//!
//! Block and transaction data is shared by every frame of a transaction
//! through an `Arc`; [`ExecutionEnvironment`] is the immutable per-frame
//! part.

use crate::code::CodeInfo;
use bytes::Bytes;
use fugue_primitives::{Address, H256, U256};
use std::collections::HashMap;
use std::sync::Arc;

/// Block header fields visible to contracts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockContext {
    /// Block number
    pub number: u64,
    /// Block timestamp
    pub timestamp: u64,
    /// Block gas limit
    pub gas_limit: u64,
    /// Block beneficiary
    pub coinbase: Address,
    /// Base fee (EIP-1559)
    pub base_fee: U256,
    /// Blob base fee (EIP-7516), absent before Cancun
    pub blob_base_fee: Option<U256>,
    /// Beacon randomness (EIP-4399)
    pub prev_randao: H256,
    /// Proof-of-work difficulty
    pub difficulty: U256,
    /// Chain ID
    pub chain_id: u64,
}

impl Default for BlockContext {
    fn default() -> Self {
        Self {
            number: 0,
            timestamp: 0,
            gas_limit: 30_000_000,
            coinbase: Address::ZERO,
            base_fee: U256::zero(),
            blob_base_fee: None,
            prev_randao: H256::ZERO,
            difficulty: U256::zero(),
            chain_id: 1,
        }
    }
}

/// Transaction-wide context
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxExecutionContext {
    /// Original sender
    pub origin: Address,
    /// Effective gas price
    pub gas_price: U256,
    /// Blob versioned hashes (EIP-4844)
    pub blob_versioned_hashes: Vec<H256>,
    /// Enclosing block
    pub block: BlockContext,
}

impl TxExecutionContext {
    /// Context for `origin` in `block`
    pub fn new(origin: Address, gas_price: U256, block: BlockContext) -> Self {
        Self {
            origin,
            gas_price,
            blob_versioned_hashes: Vec::new(),
            block,
        }
    }
}

/// Immutable per-frame environment
#[derive(Clone, Debug)]
pub struct ExecutionEnvironment {
    /// Shared transaction context
    pub tx: Arc<TxExecutionContext>,
    /// Message sender (CALLER)
    pub caller: Address,
    /// Account whose code runs, `None` for creation
    pub code_source: Option<Address>,
    /// Account whose storage and balance are in scope (ADDRESS)
    pub executing_account: Address,
    /// Value actually moved into this frame
    pub transfer_value: U256,
    /// Value reported by CALLVALUE
    pub value: U256,
    /// Call data, or empty for creation
    pub input: Bytes,
    /// Code being executed
    pub code: Arc<CodeInfo>,
    /// Depth in the frame tree, 0 at top level
    pub call_depth: usize,
}

/// Lookup for recent block hashes (BLOCKHASH)
pub trait BlockhashProvider: Send + Sync + std::fmt::Debug {
    /// Hash of block `number`, `None` if unknown
    fn block_hash(&self, number: u64) -> Option<H256>;
}

/// Provider that knows no hashes
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBlockhashes;

impl BlockhashProvider for NoBlockhashes {
    fn block_hash(&self, _number: u64) -> Option<H256> {
        None
    }
}

impl BlockhashProvider for HashMap<u64, H256> {
    fn block_hash(&self, number: u64) -> Option<H256> {
        self.get(&number).copied()
    }
}

/// BLOCKHASH only sees the 256 most recent ancestors
pub fn blockhash_in_range(current: u64, requested: U256) -> Option<u64> {
    if requested >= U256::from(current) {
        return None;
    }
    let requested = requested.low_u64();
    if current - requested > 256 {
        return None;
    }
    Some(requested)
}
