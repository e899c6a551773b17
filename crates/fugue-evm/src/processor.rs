//! Transaction processing
//!
//! Wraps one message in the bookkeeping around the VM: validation,
//! intrinsic gas, warm-up, code deposit for top-level creation, refunds,
//! fee payment and end-of-transaction cleanup.

use crate::access::AccessTracker;
use crate::address::create_address;
use crate::code::CodeInfo;
use crate::context::{BlockContext, ExecutionEnvironment, TxExecutionContext};
use crate::error::{ExceptionKind, TransactionError, VmError};
use crate::frame::{EvmState, ExecutionType};
use crate::gas::cost;
use crate::math::div32_ceil;
use crate::rules::ReleaseSpec;
use crate::state::{Snapshot, StorageCell, WorldState};
use crate::substate::{Log, TransactionSubstate};
use crate::tracer::Tracer;
use crate::vm::VirtualMachine;
use bytes::Bytes;
use fugue_primitives::{Address, EMPTY_CODE_HASH, H256, U256};
use serde::Serialize;
use std::sync::Arc;

/// A signed-and-recovered message ready for execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Recovered sender
    pub sender: Address,
    /// Recipient, `None` for contract creation
    pub to: Option<Address>,
    /// Sender nonce
    pub nonce: u64,
    /// Value moved to the recipient
    pub value: U256,
    /// Call data or init code
    pub data: Bytes,
    /// Gas limit
    pub gas_limit: u64,
    /// Legacy gas price, or the fee cap of a fee-market transaction
    pub gas_price: U256,
    /// Priority fee cap (EIP-1559); `None` for legacy pricing
    pub max_priority_fee_per_gas: Option<U256>,
    /// Pre-warmed addresses and slots (EIP-2930)
    pub access_list: Vec<(Address, Vec<H256>)>,
    /// Blob commitments (EIP-4844)
    pub blob_versioned_hashes: Vec<H256>,
}

impl Transaction {
    /// Whether this creates a contract
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }
}

/// Final status of an executed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Top-level frame succeeded
    Success,
    /// Reverted or failed; only fees and the nonce bump remain
    Failure,
}

/// What an executed transaction produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutcome {
    /// Success or failure
    pub status: TxStatus,
    /// Gas charged to the sender after refunds
    pub gas_used: u64,
    /// Refund granted after capping
    pub refund: u64,
    /// Return or revert data
    #[serde(serialize_with = "crate::substate::serialize_hex")]
    pub output: Bytes,
    /// Logs of a successful transaction
    pub logs: Vec<Log>,
    /// Created contract, for successful creations
    pub contract_address: Option<Address>,
    /// Exceptional halt of the top-level frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransactionOutcome {
    /// Whether the transaction succeeded
    pub fn is_success(&self) -> bool {
        self.status == TxStatus::Success
    }
}

/// Intrinsic gas of `tx`: base cost, call data, access list, init code words
pub fn intrinsic_gas(tx: &Transaction, rules: &ReleaseSpec) -> u64 {
    let mut gas = cost::TX;
    if tx.is_create() && rules.homestead {
        gas += cost::TX_CREATE;
    }
    let non_zero_cost = rules.tx_data_non_zero_cost();
    for byte in tx.data.iter() {
        gas += if *byte == 0 {
            cost::TX_DATA_ZERO
        } else {
            non_zero_cost
        };
    }
    for (_, keys) in &tx.access_list {
        gas += cost::ACCESS_LIST_ADDRESS + cost::ACCESS_LIST_STORAGE_KEY * keys.len() as u64;
    }
    if tx.is_create() && rules.limit_init_code {
        gas += cost::INIT_CODE_WORD * div32_ceil(U256::from(tx.data.len()));
    }
    gas
}

/// Runs transactions through a [`VirtualMachine`]
#[derive(Debug, Clone)]
pub struct TransactionProcessor {
    vm: Arc<VirtualMachine>,
}

impl TransactionProcessor {
    /// Processor driving `vm`
    pub fn new(vm: Arc<VirtualMachine>) -> Self {
        Self { vm }
    }

    /// Underlying VM
    pub fn vm(&self) -> &Arc<VirtualMachine> {
        &self.vm
    }

    fn effective_gas_price(
        tx: &Transaction,
        block: &BlockContext,
        rules: &ReleaseSpec,
    ) -> Result<U256, TransactionError> {
        if !rules.fee_market {
            return Ok(tx.gas_price);
        }
        if tx.gas_price < block.base_fee {
            return Err(TransactionError::FeeCapTooLow {
                max_fee: tx.gas_price,
                base_fee: block.base_fee,
            });
        }
        Ok(match tx.max_priority_fee_per_gas {
            Some(tip) => tx
                .gas_price
                .min(block.base_fee.saturating_add(tip)),
            None => tx.gas_price,
        })
    }

    fn validate(
        &self,
        tx: &Transaction,
        block: &BlockContext,
        rules: &ReleaseSpec,
        world: &dyn WorldState,
    ) -> Result<(U256, U256, u64), TransactionError> {
        let intrinsic = intrinsic_gas(tx, rules);
        if tx.gas_limit < intrinsic {
            return Err(TransactionError::IntrinsicGasTooLow {
                required: intrinsic,
                limit: tx.gas_limit,
            });
        }
        if tx.gas_limit > block.gas_limit {
            return Err(TransactionError::GasLimitExceedsBlock {
                limit: tx.gas_limit,
                block_limit: block.gas_limit,
            });
        }
        if tx.is_create() && rules.limit_init_code && tx.data.len() > rules.max_init_code_size {
            return Err(TransactionError::InitCodeTooLarge {
                size: tx.data.len(),
                limit: rules.max_init_code_size,
            });
        }

        let nonce = world.get_nonce(&tx.sender);
        if nonce != tx.nonce {
            return Err(TransactionError::NonceMismatch {
                expected: nonce,
                got: tx.nonce,
            });
        }
        if nonce == u64::MAX {
            return Err(TransactionError::NonceOverflow);
        }

        let price = Self::effective_gas_price(tx, block, rules)?;
        let blob_fee = if rules.blob_opcodes {
            let blob_gas = cost::BLOB_GAS_PER_BLOB * tx.blob_versioned_hashes.len() as u64;
            U256::from(blob_gas).saturating_mul(block.blob_base_fee.unwrap_or_default())
        } else {
            U256::zero()
        };
        // the fee cap, not the effective price, must be covered
        let required = U256::from(tx.gas_limit)
            .saturating_mul(tx.gas_price)
            .saturating_add(tx.value)
            .saturating_add(blob_fee);
        let available = world.get_balance(&tx.sender);
        if available < required {
            return Err(TransactionError::InsufficientBalance {
                required,
                available,
            });
        }
        Ok((price, blob_fee, intrinsic))
    }

    fn warm_up(tx: &Transaction, block: &BlockContext, rules: &ReleaseSpec, target: Address) -> AccessTracker {
        let mut access = AccessTracker::new();
        if !rules.use_hot_and_cold_storage {
            return access;
        }
        access.warm_up_address(tx.sender);
        access.warm_up_address(target);
        for precompile in rules.precompile_addresses() {
            access.warm_up_address(precompile);
        }
        if rules.warm_coinbase {
            access.warm_up_address(block.coinbase);
        }
        for (address, keys) in &tx.access_list {
            access.warm_up_address(*address);
            for key in keys {
                access.warm_up_cell(StorageCell::new(*address, key.to_word()));
            }
        }
        access
    }

    /// Execute `tx` in `block` against `world`.
    ///
    /// Invalid transactions are rejected without touching `world`. A
    /// valid transaction always pays for its gas and bumps the sender
    /// nonce, whether or not its execution succeeds.
    pub fn execute<T: Tracer>(
        &self,
        tx: &Transaction,
        block: &BlockContext,
        world: &mut dyn WorldState,
        tracer: &mut T,
    ) -> Result<TransactionOutcome, TransactionError> {
        let rules = self.vm.spec_for(block);
        let (price, blob_fee, intrinsic) = self.validate(tx, block, &rules, world)?;

        let gas_cost = U256::from(tx.gas_limit).saturating_mul(price);
        world.subtract_from_balance(&tx.sender, gas_cost.saturating_add(blob_fee));
        world.increment_nonce(&tx.sender);

        let mut tx_context = TxExecutionContext::new(tx.sender, price, block.clone());
        tx_context.blob_versioned_hashes = tx.blob_versioned_hashes.clone();
        let tx_context = Arc::new(tx_context);

        let (kind, target, code, input) = match tx.to {
            Some(to) => {
                let code = self.vm.get_cached_code(&*world, &to, &rules)?;
                (ExecutionType::Call, to, code, tx.data.clone())
            }
            None => {
                let contract = create_address(&tx.sender, tx.nonce);
                let code = Arc::new(CodeInfo::new(tx.data.clone()));
                (ExecutionType::Create, contract, code, Bytes::new())
            }
        };

        let snapshot = world.take_snapshot();
        let gas_available = tx.gas_limit - intrinsic;
        let substate = match self.run_message(
            tx, block, &rules, world, tracer, kind, target, code, input, tx_context, snapshot,
            gas_available,
        ) {
            Ok(substate) => substate,
            Err(TransactionError::Vm(VmError::PrecompileFailure { address })) => {
                tracing::warn!(%address, "top-level precompile call failed");
                world.restore(snapshot);
                TransactionSubstate::from_exception(ExceptionKind::Other)
            }
            Err(err) => return Err(err),
        };

        Ok(self.settle(tx, block, &rules, world, price, kind, target, substate, snapshot))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_message<T: Tracer>(
        &self,
        tx: &Transaction,
        block: &BlockContext,
        rules: &ReleaseSpec,
        world: &mut dyn WorldState,
        tracer: &mut T,
        kind: ExecutionType,
        target: Address,
        code: Arc<CodeInfo>,
        input: Bytes,
        tx_context: Arc<TxExecutionContext>,
        snapshot: Snapshot,
        gas_available: u64,
    ) -> Result<TransactionSubstate, TransactionError> {
        let mut pre_existing = false;
        if kind.is_create() && world.account_exists(&target) {
            let has_code = world.get_code_hash(&target) != Some(EMPTY_CODE_HASH);
            if has_code || world.get_nonce(&target) != 0 {
                tracing::warn!(contract = %target, "contract address collision");
                return Ok(TransactionSubstate::from_exception(ExceptionKind::Other));
            }
            world.reset_storage_root(&target);
            pre_existing = true;
        }
        world.subtract_from_balance(&tx.sender, tx.value);

        let env = ExecutionEnvironment {
            tx: tx_context,
            caller: tx.sender,
            code_source: (!kind.is_create()).then_some(target),
            executing_account: target,
            transfer_value: tx.value,
            value: tx.value,
            input,
            code,
            call_depth: 0,
        };
        let access = Self::warm_up(tx, block, rules, target);
        let mut frame = EvmState::top_level(env, kind, gas_available, snapshot, access);
        frame.is_create_on_pre_existing_account = pre_existing;

        Ok(self.vm.run(frame, world, tracer)?)
    }

    #[allow(clippy::too_many_arguments)]
    fn settle(
        &self,
        tx: &Transaction,
        block: &BlockContext,
        rules: &ReleaseSpec,
        world: &mut dyn WorldState,
        price: U256,
        kind: ExecutionType,
        target: Address,
        mut substate: TransactionSubstate,
        snapshot: Snapshot,
    ) -> TransactionOutcome {
        if substate.exception.is_none() && substate.should_revert {
            world.restore(snapshot);
        }

        // top-level code deposit
        if substate.is_success() && kind.is_create() {
            let deposit = rules.code_deposit_cost(substate.output.len());
            let invalid = rules.code_is_invalid(&substate.output);
            if substate.gas_left >= deposit && !invalid {
                substate.gas_left -= deposit;
                self.vm
                    .insert_code(world, substate.output.clone(), &target);
            } else if rules.fail_on_out_of_gas_code_deposit || invalid {
                tracing::debug!(contract = %target, invalid, deposit, "top-level code deposit failed");
                world.restore(snapshot);
                let kind = if invalid {
                    ExceptionKind::InvalidCode
                } else {
                    ExceptionKind::OutOfGas
                };
                substate = TransactionSubstate::from_exception(kind);
            }
        }

        let mut refund = 0;
        if substate.is_success() {
            let mut destroyed = 0i64;
            for address in &substate.destroy_list {
                world.delete_account(address);
                destroyed += 1;
            }
            let total = substate.refund + destroyed * rules.destroy_refund();
            let spent = tx.gas_limit - substate.gas_left;
            refund = (total.max(0) as u64).min(spent / rules.max_refund_quotient());
        }
        let gas_left = substate.gas_left + refund;
        let gas_used = tx.gas_limit - gas_left;

        world.add_to_balance(&tx.sender, U256::from(gas_left).saturating_mul(price));
        let tip = if rules.fee_market {
            price.saturating_sub(block.base_fee)
        } else {
            price
        };
        world.add_to_balance(&block.coinbase, U256::from(gas_used).saturating_mul(tip));
        world.commit_transaction(rules.clear_empty_account_when_touched);

        let success = substate.is_success();
        if let Some(kind) = substate.exception {
            tracing::debug!(sender = %tx.sender, error = %kind, gas_used, "transaction failed");
        }
        TransactionOutcome {
            status: if success {
                TxStatus::Success
            } else {
                TxStatus::Failure
            },
            gas_used,
            refund,
            output: substate.output,
            logs: if success { substate.logs } else { Vec::new() },
            contract_address: (success && kind.is_create()).then_some(target),
            error: substate.exception.map(|kind| kind.to_string()),
        }
    }
}
