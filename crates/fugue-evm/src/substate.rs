//! Result of a top-level execution

use crate::error::ExceptionKind;
use bytes::Bytes;
use fugue_primitives::{Address, H256, U256};
use serde::Serialize;

/// Emitted log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Log {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics (0 to 4)
    pub topics: Vec<H256>,
    /// Payload
    #[serde(serialize_with = "serialize_hex")]
    pub data: Bytes,
}

pub(crate) fn serialize_hex<S: serde::Serializer>(bytes: &Bytes, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("0x{}", hex::encode(bytes)))
}

/// Everything a finished top-level frame hands back to the processor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionSubstate {
    /// Return or revert data
    pub output: Bytes,
    /// Accumulated refund, uncapped
    pub refund: i64,
    /// Accounts to delete at the end of the transaction
    pub destroy_list: Vec<Address>,
    /// Logs in emission order; empty unless successful
    pub logs: Vec<Log>,
    /// Top-level frame reverted or failed
    pub should_revert: bool,
    /// Failure kind when the top-level frame raised an exception
    pub exception: Option<ExceptionKind>,
    /// Gas left in the top-level frame
    pub gas_left: u64,
}

/// `Error(string)` selector
const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// `Panic(uint256)` selector
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

impl TransactionSubstate {
    /// Failed top-level frame
    pub fn from_exception(kind: ExceptionKind) -> Self {
        Self {
            should_revert: true,
            exception: Some(kind),
            ..Self::default()
        }
    }

    /// Reverted top-level frame
    pub fn from_revert(output: Bytes, gas_left: u64) -> Self {
        Self {
            output,
            should_revert: true,
            gas_left,
            ..Self::default()
        }
    }

    /// Whether the top-level frame succeeded
    pub fn is_success(&self) -> bool {
        !self.should_revert
    }

    /// Human-readable revert reason for `Error(string)` and `Panic(uint256)`
    /// payloads
    pub fn revert_reason(&self) -> Option<String> {
        if !self.should_revert || self.output.len() < 4 {
            return None;
        }
        let (selector, body) = self.output.split_at(4);
        if selector == ERROR_SELECTOR {
            decode_abi_string(body)
        } else if selector == PANIC_SELECTOR && body.len() >= 32 {
            Some(format!("panic code {:#x}", U256::from_big_endian(&body[..32])))
        } else {
            None
        }
    }
}

fn decode_abi_string(body: &[u8]) -> Option<String> {
    let word = |at: usize| -> Option<usize> {
        let bytes = body.get(at..at.checked_add(32)?)?;
        let value = U256::from_big_endian(bytes);
        if value > U256::from(u32::MAX) {
            return None;
        }
        Some(value.low_u64() as usize)
    };
    let offset = word(0)?;
    let len = word(offset)?;
    let start = offset.checked_add(32)?;
    let data = body.get(start..start.checked_add(len)?)?;
    Some(String::from_utf8_lossy(data).into_owned())
}
