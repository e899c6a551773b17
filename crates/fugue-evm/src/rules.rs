//! Protocol rule sets
//!
//! A [`ReleaseSpec`] is a flat set of feature flags; every behavioural or
//! pricing difference between forks is read from it. [`Fork`] provides the
//! mainnet presets and [`SpecProvider`] picks the rules for a block.

use crate::context::BlockContext;
use crate::error::{VmError, VmResult};
use crate::gas::{code_deposit_cost, cost};
use fugue_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Feature flags for one protocol release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReleaseSpec {
    /// DELEGATECALL, creation failure on code-deposit OOG at top level (EIP-2, EIP-7)
    pub homestead: bool,
    /// Failing to pay the code deposit fails the creation (EIP-2)
    pub fail_on_out_of_gas_code_deposit: bool,
    /// Child calls get at most all but one 64th of the remaining gas (EIP-150)
    pub use_63_over_64_rule: bool,
    /// IO-heavy opcode repricing (EIP-150)
    pub use_shanghai_ddos_protection: bool,
    /// Touched empty accounts are deleted (EIP-161)
    pub clear_empty_account_when_touched: bool,
    /// Deployed code size is capped (EIP-170)
    pub limit_code_size: bool,
    /// Maximum deployed code size
    pub max_code_size: usize,
    /// EXP byte cost raised to 50 (EIP-160)
    pub raise_exp_byte_cost: bool,
    /// REVERT (EIP-140)
    pub revert_opcode: bool,
    /// RETURNDATASIZE / RETURNDATACOPY (EIP-211)
    pub return_data_opcodes: bool,
    /// STATICCALL (EIP-214)
    pub static_call: bool,
    /// SHL / SHR / SAR (EIP-145)
    pub shift_opcodes: bool,
    /// CREATE2 (EIP-1014)
    pub create2_opcode: bool,
    /// EXTCODEHASH (EIP-1052)
    pub ext_code_hash_opcode: bool,
    /// Net gas metering for SSTORE (EIP-1283 / EIP-2200)
    pub use_net_gas_metering: bool,
    /// SSTORE fails when gas left does not exceed the stipend (EIP-2200)
    pub net_gas_metering_stipend_fix: bool,
    /// CHAINID (EIP-1344)
    pub chain_id_opcode: bool,
    /// SELFBALANCE (EIP-1884)
    pub self_balance_opcode: bool,
    /// Trie-size-dependent repricing (EIP-1884, EIP-2028, EIP-1108)
    pub istanbul_repricing: bool,
    /// EIP-2315 subroutines; never active on mainnet
    pub subroutines: bool,
    /// Cold/warm access pricing (EIP-2929)
    pub use_hot_and_cold_storage: bool,
    /// Typed access lists (EIP-2930)
    pub access_lists: bool,
    /// MODEXP repricing (EIP-2565)
    pub modexp_repricing: bool,
    /// BASEFEE (EIP-3198)
    pub base_fee_opcode: bool,
    /// Reduced refunds (EIP-3529)
    pub reduced_refunds: bool,
    /// Reject new code starting with 0xEF (EIP-3541)
    pub reject_ef_code: bool,
    /// Fee market (EIP-1559)
    pub fee_market: bool,
    /// DIFFICULTY becomes PREVRANDAO (EIP-4399)
    pub prevrandao: bool,
    /// PUSH0 (EIP-3855)
    pub push0: bool,
    /// Coinbase is warm at transaction start (EIP-3651)
    pub warm_coinbase: bool,
    /// Init code size limit and metering (EIP-3860)
    pub limit_init_code: bool,
    /// Maximum init code size
    pub max_init_code_size: usize,
    /// TLOAD / TSTORE (EIP-1153)
    pub transient_storage: bool,
    /// MCOPY (EIP-5656)
    pub mcopy_opcode: bool,
    /// BLOBHASH / BLOBBASEFEE (EIP-4844, EIP-7516)
    pub blob_opcodes: bool,
    /// SELFDESTRUCT only deletes contracts created in the same transaction (EIP-6780)
    pub selfdestruct_only_same_transaction: bool,
    /// Highest enabled precompile address
    pub precompile_count: u64,
}

impl Default for ReleaseSpec {
    fn default() -> Self {
        Fork::Cancun.spec()
    }
}

impl ReleaseSpec {
    /// Rules with every feature switched off (Frontier)
    pub fn frontier() -> Self {
        Self {
            homestead: false,
            fail_on_out_of_gas_code_deposit: false,
            use_63_over_64_rule: false,
            use_shanghai_ddos_protection: false,
            clear_empty_account_when_touched: false,
            limit_code_size: false,
            max_code_size: cost::MAX_CODE_SIZE,
            raise_exp_byte_cost: false,
            revert_opcode: false,
            return_data_opcodes: false,
            static_call: false,
            shift_opcodes: false,
            create2_opcode: false,
            ext_code_hash_opcode: false,
            use_net_gas_metering: false,
            net_gas_metering_stipend_fix: false,
            chain_id_opcode: false,
            self_balance_opcode: false,
            istanbul_repricing: false,
            subroutines: false,
            use_hot_and_cold_storage: false,
            access_lists: false,
            modexp_repricing: false,
            base_fee_opcode: false,
            reduced_refunds: false,
            reject_ef_code: false,
            fee_market: false,
            prevrandao: false,
            push0: false,
            warm_coinbase: false,
            limit_init_code: false,
            max_init_code_size: cost::MAX_INIT_CODE_SIZE,
            transient_storage: false,
            mcopy_opcode: false,
            blob_opcodes: false,
            selfdestruct_only_same_transaction: false,
            precompile_count: 4,
        }
    }

    /// Apply JSON overrides on top of these rules.
    ///
    /// `overrides` is an object whose keys are camelCase flag names.
    pub fn with_overrides(&self, overrides: &str) -> VmResult<Self> {
        let patch: serde_json::Value = serde_json::from_str(overrides)
            .map_err(|e| VmError::Configuration(format!("rule overrides: {e}")))?;
        let serde_json::Value::Object(patch) = patch else {
            return Err(VmError::Configuration(
                "rule overrides must be a JSON object".to_string(),
            ));
        };
        let mut base = serde_json::to_value(self)
            .map_err(|e| VmError::Configuration(format!("rule overrides: {e}")))?;
        if let serde_json::Value::Object(fields) = &mut base {
            for (key, value) in patch {
                if !fields.contains_key(&key) {
                    return Err(VmError::Configuration(format!("unknown rule flag `{key}`")));
                }
                fields.insert(key, value);
            }
        }
        serde_json::from_value(base)
            .map_err(|e| VmError::Configuration(format!("rule overrides: {e}")))
    }

    /// Whether `address` is an enabled precompile
    pub fn is_precompile(&self, address: &Address) -> bool {
        matches!(address.low_u64(), Some(n) if n >= 1 && n <= self.precompile_count)
    }

    /// Enabled precompile addresses
    pub fn precompile_addresses(&self) -> impl Iterator<Item = Address> {
        (1..=self.precompile_count).map(Address::from_low_u64)
    }

    /// BALANCE base cost; access cost is charged separately under EIP-2929
    pub fn balance_cost(&self) -> u64 {
        if self.use_hot_and_cold_storage {
            0
        } else if self.istanbul_repricing {
            cost::BALANCE_EIP1884
        } else if self.use_shanghai_ddos_protection {
            cost::BALANCE_EIP150
        } else {
            cost::BALANCE
        }
    }

    /// SLOAD base cost
    pub fn sload_cost(&self) -> u64 {
        if self.use_hot_and_cold_storage {
            0
        } else if self.istanbul_repricing {
            cost::SLOAD_EIP1884
        } else if self.use_shanghai_ddos_protection {
            cost::SLOAD_EIP150
        } else {
            cost::SLOAD
        }
    }

    /// EXTCODESIZE / EXTCODECOPY base cost
    pub fn ext_code_cost(&self) -> u64 {
        if self.use_hot_and_cold_storage {
            0
        } else if self.use_shanghai_ddos_protection {
            cost::EXT_CODE_EIP150
        } else {
            cost::EXT_CODE
        }
    }

    /// EXTCODEHASH base cost
    pub fn ext_code_hash_cost(&self) -> u64 {
        if self.use_hot_and_cold_storage {
            0
        } else if self.istanbul_repricing {
            cost::EXT_CODE_HASH_EIP1884
        } else {
            cost::EXT_CODE_HASH
        }
    }

    /// CALL family base cost
    pub fn call_cost(&self) -> u64 {
        if self.use_hot_and_cold_storage {
            0
        } else if self.use_shanghai_ddos_protection {
            cost::CALL_EIP150
        } else {
            cost::CALL
        }
    }

    /// EXP cost per exponent byte
    pub fn exp_byte_cost(&self) -> u64 {
        if self.raise_exp_byte_cost {
            cost::EXP_BYTE_EIP160
        } else {
            cost::EXP_BYTE
        }
    }

    /// SSTORE cost when changing a non-zero slot
    pub fn sstore_reset_cost(&self) -> u64 {
        if self.use_hot_and_cold_storage {
            cost::SRESET - cost::COLD_SLOAD
        } else {
            cost::SRESET
        }
    }

    /// SSTORE cost when net metering finds nothing to pay for
    pub fn net_metered_sstore_cost(&self) -> u64 {
        if self.use_hot_and_cold_storage {
            cost::WARM_STATE_READ
        } else if self.istanbul_repricing {
            cost::SSTORE_NET_METERED_EIP2200
        } else {
            cost::SSTORE_NET_METERED_EIP1283
        }
    }

    /// Refund for clearing a slot
    pub fn sclear_refund(&self) -> i64 {
        if self.reduced_refunds {
            cost::SCLEAR_REFUND_EIP3529
        } else {
            cost::SCLEAR_REFUND
        }
    }

    /// Refund when a slot is set and later restored to its zero original
    pub fn set_reversal_refund(&self) -> i64 {
        (cost::SSET - self.net_metered_sstore_cost()) as i64
    }

    /// Refund when a slot is changed and later restored to its non-zero original
    pub fn clear_reversal_refund(&self) -> i64 {
        if self.use_hot_and_cold_storage {
            (cost::SRESET - cost::COLD_SLOAD - cost::WARM_STATE_READ) as i64
        } else {
            (cost::SRESET - self.net_metered_sstore_cost()) as i64
        }
    }

    /// Refund per self-destructed account
    pub fn destroy_refund(&self) -> i64 {
        if self.reduced_refunds {
            0
        } else {
            cost::DESTROY_REFUND
        }
    }

    /// Refund cap divisor applied to gas used
    pub fn max_refund_quotient(&self) -> u64 {
        if self.reduced_refunds {
            5
        } else {
            2
        }
    }

    /// Intrinsic cost of a non-zero calldata byte
    pub fn tx_data_non_zero_cost(&self) -> u64 {
        if self.istanbul_repricing {
            cost::TX_DATA_NONZERO_EIP2028
        } else {
            cost::TX_DATA_NONZERO
        }
    }

    /// Whether freshly produced runtime code has a rejected prefix (EIP-3541)
    pub fn code_is_invalid(&self, code: &[u8]) -> bool {
        self.reject_ef_code && code.first() == Some(&0xEF)
    }

    /// Gas to deposit `len` bytes of runtime code.
    ///
    /// Code above the size limit can never be paid for, so it fails the
    /// same way as a deposit the frame cannot afford.
    pub fn code_deposit_cost(&self, len: usize) -> u64 {
        if self.limit_code_size && len > self.max_code_size {
            u64::MAX
        } else {
            code_deposit_cost(len)
        }
    }
}

/// Mainnet protocol releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Fork {
    /// Launch rules
    Frontier,
    /// EIP-2, EIP-7
    Homestead,
    /// EIP-150
    TangerineWhistle,
    /// EIP-155, EIP-160, EIP-161, EIP-170
    SpuriousDragon,
    /// EIP-140, EIP-196..198, EIP-211, EIP-214
    Byzantium,
    /// EIP-145, EIP-1014, EIP-1052, EIP-1283
    Constantinople,
    /// Constantinople without EIP-1283
    Petersburg,
    /// EIP-152, EIP-1108, EIP-1344, EIP-1884, EIP-2028, EIP-2200
    Istanbul,
    /// EIP-2565, EIP-2929, EIP-2930
    Berlin,
    /// EIP-1559, EIP-3198, EIP-3529, EIP-3541
    London,
    /// EIP-4399
    Paris,
    /// EIP-3651, EIP-3855, EIP-3860
    Shanghai,
    /// EIP-1153, EIP-4844, EIP-5656, EIP-6780, EIP-7516
    Cancun,
}

impl Fork {
    /// All forks, oldest first
    pub const ALL: [Fork; 13] = [
        Fork::Frontier,
        Fork::Homestead,
        Fork::TangerineWhistle,
        Fork::SpuriousDragon,
        Fork::Byzantium,
        Fork::Constantinople,
        Fork::Petersburg,
        Fork::Istanbul,
        Fork::Berlin,
        Fork::London,
        Fork::Paris,
        Fork::Shanghai,
        Fork::Cancun,
    ];

    /// Name as used by Ethereum test fixtures
    pub fn name(self) -> &'static str {
        match self {
            Fork::Frontier => "Frontier",
            Fork::Homestead => "Homestead",
            Fork::TangerineWhistle => "EIP150",
            Fork::SpuriousDragon => "EIP158",
            Fork::Byzantium => "Byzantium",
            Fork::Constantinople => "Constantinople",
            Fork::Petersburg => "ConstantinopleFix",
            Fork::Istanbul => "Istanbul",
            Fork::Berlin => "Berlin",
            Fork::London => "London",
            Fork::Paris => "Merge",
            Fork::Shanghai => "Shanghai",
            Fork::Cancun => "Cancun",
        }
    }

    /// Rules in force from this fork on
    pub fn spec(self) -> ReleaseSpec {
        let mut s = ReleaseSpec::frontier();
        if self >= Fork::Homestead {
            s.homestead = true;
            s.fail_on_out_of_gas_code_deposit = true;
        }
        if self >= Fork::TangerineWhistle {
            s.use_63_over_64_rule = true;
            s.use_shanghai_ddos_protection = true;
        }
        if self >= Fork::SpuriousDragon {
            s.clear_empty_account_when_touched = true;
            s.limit_code_size = true;
            s.raise_exp_byte_cost = true;
        }
        if self >= Fork::Byzantium {
            s.revert_opcode = true;
            s.return_data_opcodes = true;
            s.static_call = true;
            s.precompile_count = 8;
        }
        if self >= Fork::Constantinople {
            s.shift_opcodes = true;
            s.create2_opcode = true;
            s.ext_code_hash_opcode = true;
        }
        if self == Fork::Constantinople {
            s.use_net_gas_metering = true;
        }
        if self >= Fork::Istanbul {
            s.use_net_gas_metering = true;
            s.net_gas_metering_stipend_fix = true;
            s.chain_id_opcode = true;
            s.self_balance_opcode = true;
            s.istanbul_repricing = true;
            s.precompile_count = 9;
        }
        if self >= Fork::Berlin {
            s.use_hot_and_cold_storage = true;
            s.access_lists = true;
            s.modexp_repricing = true;
        }
        if self >= Fork::London {
            s.base_fee_opcode = true;
            s.reduced_refunds = true;
            s.reject_ef_code = true;
            s.fee_market = true;
        }
        if self >= Fork::Paris {
            s.prevrandao = true;
        }
        if self >= Fork::Shanghai {
            s.push0 = true;
            s.warm_coinbase = true;
            s.limit_init_code = true;
        }
        if self >= Fork::Cancun {
            s.transient_storage = true;
            s.mcopy_opcode = true;
            s.blob_opcodes = true;
            s.selfdestruct_only_same_transaction = true;
            s.precompile_count = 10;
        }
        s
    }
}

impl fmt::Display for Fork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Fork {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fork = match s {
            "Frontier" => Fork::Frontier,
            "Homestead" => Fork::Homestead,
            "EIP150" | "TangerineWhistle" => Fork::TangerineWhistle,
            "EIP158" | "SpuriousDragon" => Fork::SpuriousDragon,
            "Byzantium" => Fork::Byzantium,
            "Constantinople" => Fork::Constantinople,
            "ConstantinopleFix" | "Petersburg" => Fork::Petersburg,
            "Istanbul" => Fork::Istanbul,
            "Berlin" => Fork::Berlin,
            "London" => Fork::London,
            "Merge" | "Paris" => Fork::Paris,
            "Shanghai" => Fork::Shanghai,
            "Cancun" => Fork::Cancun,
            other => return Err(VmError::Configuration(format!("unknown fork `{other}`"))),
        };
        Ok(fork)
    }
}

/// Chooses the rules for a block
pub trait SpecProvider: Send + Sync {
    /// Rules applying to `block`
    fn spec_for(&self, block: &BlockContext) -> Arc<ReleaseSpec>;
}

/// The same rules for every block
#[derive(Debug, Clone)]
pub struct FixedSpec(Arc<ReleaseSpec>);

impl FixedSpec {
    /// Wrap a rule set
    pub fn new(spec: ReleaseSpec) -> Self {
        Self(Arc::new(spec))
    }
}

impl From<Fork> for FixedSpec {
    fn from(fork: Fork) -> Self {
        Self::new(fork.spec())
    }
}

impl SpecProvider for FixedSpec {
    fn spec_for(&self, _block: &BlockContext) -> Arc<ReleaseSpec> {
        self.0.clone()
    }
}

/// Forks activated at block numbers
#[derive(Debug, Clone)]
pub struct ForkSchedule {
    transitions: Vec<(u64, Arc<ReleaseSpec>)>,
}

impl ForkSchedule {
    /// Schedule from `(activation block, fork)` pairs; the first entry must
    /// activate at block zero
    pub fn new(transitions: &[(u64, Fork)]) -> VmResult<Self> {
        match transitions.first() {
            Some((0, _)) => {}
            _ => {
                return Err(VmError::Configuration(
                    "fork schedule must start at block 0".to_string(),
                ))
            }
        }
        if transitions.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(VmError::Configuration(
                "fork schedule must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            transitions: transitions
                .iter()
                .map(|(block, fork)| (*block, Arc::new(fork.spec())))
                .collect(),
        })
    }
}

impl SpecProvider for ForkSchedule {
    fn spec_for(&self, block: &BlockContext) -> Arc<ReleaseSpec> {
        let idx = self
            .transitions
            .partition_point(|(activation, _)| *activation <= block.number);
        self.transitions[idx.saturating_sub(1)].1.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fork_presets_are_cumulative() {
        let byzantium = Fork::Byzantium.spec();
        assert!(byzantium.static_call);
        assert!(byzantium.use_63_over_64_rule);
        assert!(!byzantium.shift_opcodes);
        assert_eq!(byzantium.precompile_count, 8);

        let cancun = Fork::Cancun.spec();
        assert!(cancun.transient_storage);
        assert!(cancun.homestead);
        assert!(!cancun.subroutines);
        assert_eq!(cancun.precompile_count, 10);
    }

    #[test]
    fn test_net_metering_only_constantinople_and_istanbul_on() {
        assert!(Fork::Constantinople.spec().use_net_gas_metering);
        assert!(!Fork::Constantinople.spec().net_gas_metering_stipend_fix);
        assert!(!Fork::Petersburg.spec().use_net_gas_metering);
        assert!(Fork::Istanbul.spec().use_net_gas_metering);
        assert!(Fork::London.spec().net_gas_metering_stipend_fix);
    }

    #[test]
    fn test_derived_costs() {
        let frontier = Fork::Frontier.spec();
        assert_eq!(frontier.balance_cost(), 20);
        assert_eq!(frontier.call_cost(), 40);
        assert_eq!(frontier.sload_cost(), 50);
        assert_eq!(frontier.exp_byte_cost(), 10);

        let istanbul = Fork::Istanbul.spec();
        assert_eq!(istanbul.balance_cost(), 700);
        assert_eq!(istanbul.sload_cost(), 800);
        assert_eq!(istanbul.ext_code_hash_cost(), 700);
        assert_eq!(istanbul.tx_data_non_zero_cost(), 16);

        let berlin = Fork::Berlin.spec();
        assert_eq!(berlin.balance_cost(), 0);
        assert_eq!(berlin.sload_cost(), 0);
        assert_eq!(berlin.sstore_reset_cost(), 2900);
    }

    #[test]
    fn test_refund_schedule() {
        let constantinople = Fork::Constantinople.spec();
        assert_eq!(constantinople.set_reversal_refund(), 19800);
        assert_eq!(constantinople.clear_reversal_refund(), 4800);

        let istanbul = Fork::Istanbul.spec();
        assert_eq!(istanbul.set_reversal_refund(), 19200);
        assert_eq!(istanbul.clear_reversal_refund(), 4200);
        assert_eq!(istanbul.sclear_refund(), 15000);

        let london = Fork::London.spec();
        assert_eq!(london.set_reversal_refund(), 19900);
        assert_eq!(london.clear_reversal_refund(), 2800);
        assert_eq!(london.sclear_refund(), 4800);
        assert_eq!(london.max_refund_quotient(), 5);
        assert_eq!(london.destroy_refund(), 0);
    }

    #[test]
    fn test_precompile_range() {
        let rules = Fork::Istanbul.spec();
        assert!(rules.is_precompile(&Address::from_low_u64(9)));
        assert!(!rules.is_precompile(&Address::from_low_u64(10)));
        assert!(!rules.is_precompile(&Address::ZERO));
        assert_eq!(rules.precompile_addresses().count(), 9);
    }

    #[test]
    fn test_code_is_invalid() {
        let london = Fork::London.spec();
        assert!(london.code_is_invalid(&[0xEF, 0x00]));
        assert!(!london.code_is_invalid(&[0xFE]));
        assert!(!london.code_is_invalid(&vec![0u8; cost::MAX_CODE_SIZE + 1]));
        assert!(!Fork::Berlin.spec().code_is_invalid(&[0xEF]));
    }

    #[test]
    fn test_oversized_code_deposit_is_unpayable() {
        let london = Fork::London.spec();
        assert_eq!(london.code_deposit_cost(1), 200);
        assert_eq!(london.code_deposit_cost(cost::MAX_CODE_SIZE), 200 * cost::MAX_CODE_SIZE as u64);
        assert_eq!(london.code_deposit_cost(cost::MAX_CODE_SIZE + 1), u64::MAX);
        // no size limit before EIP-170
        let homestead = Fork::Homestead.spec();
        assert_eq!(homestead.code_deposit_cost(30_000), 6_000_000);
    }

    #[test]
    fn test_with_overrides() {
        let rules = Fork::Berlin
            .spec()
            .with_overrides(r#"{"subroutines": true, "precompileCount": 4}"#)
            .unwrap();
        assert!(rules.subroutines);
        assert_eq!(rules.precompile_count, 4);
        assert!(rules.use_hot_and_cold_storage);
    }

    #[test]
    fn test_with_overrides_rejects_unknown_flag() {
        let err = Fork::Berlin.spec().with_overrides(r#"{"warpDrive": true}"#);
        assert!(matches!(err, Err(VmError::Configuration(_))));
        let err = Fork::Berlin.spec().with_overrides("[]");
        assert!(matches!(err, Err(VmError::Configuration(_))));
    }

    #[test]
    fn test_fork_names_round_trip() {
        for fork in Fork::ALL {
            assert_eq!(fork.name().parse::<Fork>().unwrap(), fork);
        }
        assert!("Prague".parse::<Fork>().is_err());
    }

    #[test]
    fn test_fork_schedule() {
        let schedule = ForkSchedule::new(&[(0, Fork::Istanbul), (100, Fork::Berlin)]).unwrap();
        let mut block = BlockContext::default();
        block.number = 99;
        assert!(!schedule.spec_for(&block).use_hot_and_cold_storage);
        block.number = 100;
        assert!(schedule.spec_for(&block).use_hot_and_cold_storage);

        assert!(ForkSchedule::new(&[(5, Fork::Berlin)]).is_err());
        assert!(ForkSchedule::new(&[(0, Fork::Berlin), (0, Fork::London)]).is_err());
    }
}
