//! Type definitions for the GeneralStateTests JSON format

use fugue_primitives::{Address, H256, U256};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};

fn hex_digits<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(s.strip_prefix("0x").unwrap_or(&s).to_string())
}

/// Hex-encoded bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = hex_digits(deserializer)?;
        if s.is_empty() {
            return Ok(HexBytes(Vec::new()));
        }
        hex::decode(&s)
            .map(HexBytes)
            .map_err(serde::de::Error::custom)
    }
}

/// Hex-encoded word; odd lengths and leading zeros are accepted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HexU256(pub U256);

impl<'de> Deserialize<'de> for HexU256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = hex_digits(deserializer)?;
        if s.is_empty() {
            return Ok(HexU256(U256::zero()));
        }
        let trimmed = s.trim_start_matches('0');
        if trimmed.len() > 64 {
            return Err(serde::de::Error::custom(format!("word too long: 0x{s}")));
        }
        if trimmed.is_empty() {
            return Ok(HexU256(U256::zero()));
        }
        U256::from_str_radix(trimmed, 16)
            .map(HexU256)
            .map_err(serde::de::Error::custom)
    }
}

/// Hex-encoded u64
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HexU64(pub u64);

impl<'de> Deserialize<'de> for HexU64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = hex_digits(deserializer)?;
        if s.is_empty() {
            return Ok(HexU64(0));
        }
        u64::from_str_radix(&s, 16)
            .map(HexU64)
            .map_err(serde::de::Error::custom)
    }
}

/// 32-byte hash, left-padded when shorter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HexH256(pub H256);

impl<'de> Deserialize<'de> for HexH256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = hex_digits(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() > 32 {
            return Err(serde::de::Error::custom(format!(
                "invalid hash length: {}",
                bytes.len()
            )));
        }
        let mut result = [0u8; 32];
        result[32 - bytes.len()..].copy_from_slice(&bytes);
        Ok(HexH256(H256::from_bytes(result)))
    }
}

// =============================================================================
// State Test Types
// =============================================================================

/// Fixture file: test name -> test case
pub type StateTestFile = BTreeMap<String, StateTestCase>;

/// Single state test case
#[derive(Debug, Deserialize)]
pub struct StateTestCase {
    /// Block environment
    pub env: StateEnv,
    /// Pre-execution accounts
    pub pre: HashMap<Address, AccountState>,
    /// Transaction variants
    pub transaction: StateTransaction,
    /// Expectations per fork name
    pub post: BTreeMap<String, Vec<PostStateResult>>,
}

/// Block environment of a state test
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEnv {
    /// Current coinbase
    pub current_coinbase: Address,
    /// Current difficulty
    #[serde(default)]
    pub current_difficulty: HexU256,
    /// Current gas limit
    pub current_gas_limit: HexU64,
    /// Current block number
    pub current_number: HexU64,
    /// Current timestamp
    pub current_timestamp: HexU64,
    /// Current base fee (EIP-1559)
    pub current_base_fee: Option<HexU256>,
    /// Current random (post-merge)
    pub current_random: Option<HexH256>,
    /// Blob base fee (EIP-4844)
    pub current_blob_base_fee: Option<HexU256>,
}

/// Transaction template; each post entry picks one data, gas and value
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransaction {
    /// Data options
    pub data: Vec<HexBytes>,
    /// Gas limit options
    pub gas_limit: Vec<HexU64>,
    /// Legacy gas price
    pub gas_price: Option<HexU256>,
    /// Fee cap (EIP-1559)
    pub max_fee_per_gas: Option<HexU256>,
    /// Priority fee cap (EIP-1559)
    pub max_priority_fee_per_gas: Option<HexU256>,
    /// Nonce
    pub nonce: HexU64,
    /// Signing key; the sender is derived from it unless `sender` is given
    pub secret_key: Option<HexH256>,
    /// Explicit sender
    pub sender: Option<Address>,
    /// Recipient; empty for contract creation
    #[serde(default)]
    pub to: String,
    /// Value options
    pub value: Vec<HexU256>,
    /// Access list per data index
    pub access_lists: Option<Vec<Option<Vec<AccessListEntry>>>>,
    /// Blob hashes (EIP-4844)
    #[serde(default)]
    pub blob_versioned_hashes: Vec<HexH256>,
}

/// Access list entry
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListEntry {
    /// Address
    pub address: Address,
    /// Storage keys
    pub storage_keys: Vec<HexH256>,
}

/// Expectation for one index combination
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStateResult {
    /// Index selectors
    pub indexes: IndexSelector,
    /// Expected post-state root; not checked
    pub hash: Option<HexH256>,
    /// Expected logs hash; not checked
    pub logs: Option<HexH256>,
    /// The transaction must be rejected
    pub expect_exception: Option<String>,
    /// Per-account expectations
    pub expect: Option<HashMap<Address, ExpectedAccount>>,
}

/// Index selector for transaction variations
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IndexSelector {
    /// Data index
    pub data: usize,
    /// Gas index
    pub gas: usize,
    /// Value index
    pub value: usize,
}

// =============================================================================
// Common Types
// =============================================================================

/// Pre-state account
#[derive(Debug, Deserialize)]
pub struct AccountState {
    /// Balance
    pub balance: HexU256,
    /// Code
    #[serde(default)]
    pub code: HexBytes,
    /// Nonce
    pub nonce: HexU64,
    /// Storage
    #[serde(default)]
    pub storage: BTreeMap<HexU256, HexU256>,
}

/// Post-state expectation; absent fields are not checked
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedAccount {
    /// Balance
    pub balance: Option<HexU256>,
    /// Nonce
    pub nonce: Option<HexU64>,
    /// Code
    pub code: Option<HexBytes>,
    /// Storage slots; unlisted slots are not checked
    pub storage: Option<BTreeMap<HexU256, HexU256>>,
    /// The account must not exist
    #[serde(default)]
    pub should_not_exist: bool,
}
