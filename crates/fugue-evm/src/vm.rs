//! The virtual machine
//!
//! [`VirtualMachine`] owns the long-lived collaborators (configuration,
//! code cache, crypto provider, block hashes, rule schedule) and drives a
//! transaction's frames on an explicit stack. A frame that starts a
//! sub-call is suspended on the stack and resumed with the child's outcome
//! once the child completes; nothing recurses natively.

use crate::analysis;
use crate::cache::CodeCache;
use crate::code::CodeInfo;
use crate::config::{AnalysisMode, VmConfig};
use crate::context::{BlockContext, BlockhashProvider, NoBlockhashes};
use crate::error::{ExceptionKind, VmError, VmResult};
use crate::frame::EvmState;
use crate::interpreter::{CallResult, Interpreter, Resume};
use crate::precompiles::Precompile;
use crate::rules::{ReleaseSpec, SpecProvider};
use crate::state::WorldState;
use crate::substate::TransactionSubstate;
use crate::tracer::{CallAction, Tracer};
use bytes::Bytes;
use fugue_crypto::{Crypto, NativeCrypto};
use fugue_primitives::{Address, EMPTY_CODE_HASH, U256};
use std::fmt;
use std::sync::Arc;

/// Frame-stack EVM
pub struct VirtualMachine {
    config: VmConfig,
    specs: Arc<dyn SpecProvider>,
    blockhashes: Arc<dyn BlockhashProvider>,
    crypto: Arc<dyn Crypto>,
    cache: Arc<CodeCache>,
    precompiles: Vec<Arc<CodeInfo>>,
    empty_code: Arc<CodeInfo>,
}

impl fmt::Debug for VirtualMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("config", &self.config)
            .field("cached_code", &self.cache.len())
            .field("crypto", &self.crypto)
            .finish_non_exhaustive()
    }
}

impl VirtualMachine {
    /// VM with the default configuration
    pub fn new(specs: Arc<dyn SpecProvider>) -> Self {
        Self::build(specs, VmConfig::default())
    }

    /// VM with a validated configuration
    pub fn with_config(specs: Arc<dyn SpecProvider>, config: VmConfig) -> VmResult<Self> {
        config.validate()?;
        Ok(Self::build(specs, config))
    }

    fn build(specs: Arc<dyn SpecProvider>, config: VmConfig) -> Self {
        let cache = Arc::new(CodeCache::new(config.code_cache_capacity));
        Self {
            config,
            specs,
            blockhashes: Arc::new(NoBlockhashes),
            crypto: Arc::new(NativeCrypto),
            cache,
            precompiles: Precompile::ALL
                .iter()
                .map(|p| Arc::new(CodeInfo::for_precompile(*p)))
                .collect(),
            empty_code: Arc::new(CodeInfo::empty()),
        }
    }

    /// Use `provider` for BLOCKHASH
    pub fn with_blockhashes(mut self, provider: Arc<dyn BlockhashProvider>) -> Self {
        self.blockhashes = provider;
        self
    }

    /// Use `crypto` for hashing and precompiles
    pub fn with_crypto(mut self, crypto: Arc<dyn Crypto>) -> Self {
        self.crypto = crypto;
        self
    }

    /// Share an existing code cache
    pub fn with_code_cache(mut self, cache: Arc<CodeCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Configuration
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Crypto provider
    pub fn crypto(&self) -> &dyn Crypto {
        self.crypto.as_ref()
    }

    /// Shared code cache
    pub fn code_cache(&self) -> &Arc<CodeCache> {
        &self.cache
    }

    /// Block-hash source
    pub fn blockhashes(&self) -> &dyn BlockhashProvider {
        self.blockhashes.as_ref()
    }

    /// Rules for `block`
    pub fn spec_for(&self, block: &BlockContext) -> Arc<ReleaseSpec> {
        self.specs.spec_for(block)
    }

    /// Analyzed code of `address`
    ///
    /// Enabled precompiles resolve to their marker code; accounts without
    /// code share one empty entry. Everything else goes through the cache.
    pub fn get_cached_code(
        &self,
        world: &dyn WorldState,
        address: &Address,
        rules: &ReleaseSpec,
    ) -> VmResult<Arc<CodeInfo>> {
        if let Some(precompile) = Precompile::from_address(address, rules) {
            return Ok(self.precompiles[precompile as usize].clone());
        }
        let code_hash = match world.get_code_hash(address) {
            Some(hash) if hash != EMPTY_CODE_HASH => hash,
            _ => return Ok(self.empty_code.clone()),
        };
        self.cache.get_or_try_insert_with(code_hash, || {
            let code = world.get_code(&code_hash).ok_or(VmError::MissingCode {
                address: *address,
                code_hash,
            })?;
            tracing::debug!(%address, %code_hash, len = code.len(), "code cache miss");
            Ok(Arc::new(CodeInfo::new(code)))
        })
    }

    /// Deploy `code` to `owner` and publish it in the cache
    pub fn insert_code(&self, world: &mut dyn WorldState, code: Bytes, owner: &Address) {
        let code_hash = self.crypto.keccak256(&code);
        world.insert_code(owner, code_hash, code.clone());
        let info = Arc::new(CodeInfo::new(code));
        if self.config.analysis_mode == AnalysisMode::Background && !info.is_empty() {
            Self::analyze_in_background(info.clone());
        }
        self.cache.set(code_hash, info);
    }

    /// Count an execution of `code`, compiling its segments at the threshold
    pub(crate) fn notice_execution(&self, code: &Arc<CodeInfo>) {
        if self.config.analysis_mode == AnalysisMode::Off {
            return;
        }
        if code.notice_execution() != self.config.segment_threshold || code.has_segments() {
            return;
        }
        match self.config.analysis_mode {
            AnalysisMode::Inline => {
                analysis::analyze(code);
            }
            AnalysisMode::Background => Self::analyze_in_background(code.clone()),
            AnalysisMode::Off => {}
        }
    }

    fn analyze_in_background(info: Arc<CodeInfo>) {
        rayon::spawn(move || {
            let segments = analysis::analyze(&info);
            tracing::debug!(code_len = info.len(), segments, "background analysis finished");
        });
    }

    /// Execute `initial` and every frame it spawns.
    ///
    /// The initial frame must be built with [`EvmState::top_level`]; its
    /// access tracker is moved into the run and shared by all frames.
    /// World-state changes of failed frames are rolled back here; a
    /// top-level revert is left for the caller to restore.
    pub fn run<T: Tracer>(
        &self,
        mut initial: EvmState,
        world: &mut dyn WorldState,
        tracer: &mut T,
    ) -> VmResult<TransactionSubstate> {
        let rules = self.spec_for(&initial.env.tx.block);
        let access = std::mem::take(&mut initial.access);
        let mut interp = Interpreter::new(self, &rules, world, tracer, access);

        let mut frames: Vec<EvmState> = Vec::new();
        let mut current = initial;
        let mut resume: Option<Resume> = None;

        loop {
            if T::IS_TRACING_ACTIONS && !current.is_continuation {
                interp.tracer.report_action(&call_action(&current));
            }

            let result = match current.env.code.precompile() {
                Some(precompile) => interp.execute_precompile(&mut current, precompile)?,
                None => interp.execute_call(&mut current, resume.take())?,
            };

            match result {
                CallResult::Child(child) => {
                    tracing::trace!(
                        depth = child.env.call_depth,
                        kind = %child.kind,
                        to = %child.env.executing_account,
                        gas = child.gas.remaining(),
                        "entering frame"
                    );
                    current.is_continuation = true;
                    frames.push(current);
                    current = *child;
                    interp.return_data = Bytes::new();
                }

                CallResult::Exception(kind) => {
                    tracing::trace!(depth = current.env.call_depth, error = %kind, "frame failed");
                    if T::IS_TRACING_ACTIONS {
                        interp.tracer.report_action_error(kind);
                    }
                    interp.unwind(&current);
                    interp.retouch_ripemd();
                    match frames.pop() {
                        None => return Ok(TransactionSubstate::from_exception(kind)),
                        Some(parent) => {
                            interp.return_data = Bytes::new();
                            resume = Some(Resume::failure());
                            current = parent;
                        }
                    }
                }

                CallResult::Return {
                    output,
                    precompile_success,
                    should_revert,
                } => {
                    let child = current;
                    let gas_left = child.gas.remaining();
                    let Some(mut parent) = frames.pop() else {
                        return Ok(finish_top_level(&mut interp, child, output, should_revert));
                    };
                    tracing::trace!(
                        depth = child.env.call_depth,
                        reverted = should_revert,
                        gas_left,
                        "leaving frame"
                    );
                    resume = Some(if should_revert {
                        parent.gas.return_gas(gas_left);
                        if T::IS_TRACING_ACTIONS {
                            interp.tracer.report_action_revert(gas_left, &output);
                        }
                        interp.unwind(&child);
                        let resume = sliced_resume(U256::zero(), &output, &child);
                        interp.return_data = output;
                        resume
                    } else if child.kind.is_create() {
                        finish_create(&mut interp, &mut parent, child, output)
                    } else {
                        parent.gas.return_gas(gas_left);
                        if T::IS_TRACING_ACTIONS {
                            interp.tracer.report_action_end(gas_left, &output);
                        }
                        let status = match precompile_success {
                            Some(false) => U256::zero(),
                            _ => U256::one(),
                        };
                        let resume = sliced_resume(status, &output, &child);
                        interp.return_data = output;
                        child.commit_to_parent(&mut parent);
                        resume
                    });
                    current = parent;
                }
            }
        }
    }
}

fn call_action(state: &EvmState) -> CallAction {
    let input = if state.kind.is_create() {
        state.env.code.bytes()
    } else {
        state.env.input.clone()
    };
    CallAction {
        kind: state.kind,
        from: state.env.caller,
        to: state.env.executing_account,
        value: state.env.value,
        input,
        gas: state.gas.remaining(),
        depth: state.env.call_depth,
    }
}

/// Status word plus the part of `output` that fits the caller's buffer
fn sliced_resume(status: U256, output: &Bytes, child: &EvmState) -> Resume {
    let len = output.len().min(child.output_length);
    Resume {
        status,
        output: output.slice(..len),
        destination: child.output_destination,
    }
}

fn finish_top_level<T: Tracer>(
    interp: &mut Interpreter<'_, T>,
    state: EvmState,
    output: Bytes,
    should_revert: bool,
) -> TransactionSubstate {
    let gas_left = state.gas.remaining();
    if should_revert {
        if T::IS_TRACING_ACTIONS {
            interp.tracer.report_action_revert(gas_left, &output);
        }
        return TransactionSubstate::from_revert(output, gas_left);
    }
    if T::IS_TRACING_ACTIONS {
        if state.kind.is_create() {
            // the deposit itself is charged by the transaction processor
            let deposit = interp.rules.code_deposit_cost(output.len());
            interp.tracer.report_create_end(
                gas_left.saturating_sub(deposit),
                &state.env.executing_account,
                &output,
            );
        } else {
            interp.tracer.report_action_end(gas_left, &output);
        }
    }
    TransactionSubstate {
        output,
        refund: state.refund,
        destroy_list: state.destroy_list,
        logs: state.logs,
        should_revert: false,
        exception: None,
        gas_left,
    }
}

/// Deposit the runtime code of a finished CREATE child, or undo it.
///
/// The deposit is paid from the child's leftover gas; only what remains
/// after it goes back to the parent.
fn finish_create<T: Tracer>(
    interp: &mut Interpreter<'_, T>,
    parent: &mut EvmState,
    child: EvmState,
    code: Bytes,
) -> Resume {
    let rules = interp.rules;
    let address = child.env.executing_account;
    let gas_left = child.gas.remaining();
    let deposit = rules.code_deposit_cost(code.len());
    let invalid = rules.code_is_invalid(&code);
    interp.return_data = Bytes::new();

    if !invalid && gas_left >= deposit {
        parent.gas.return_gas(gas_left - deposit);
        interp.vm.insert_code(&mut *interp.world, code.clone(), &address);
        if T::IS_TRACING_ACTIONS {
            interp
                .tracer
                .report_create_end(gas_left - deposit, &address, &code);
        }
        child.commit_to_parent(parent);
        return Resume::status(address.to_word());
    }

    if rules.fail_on_out_of_gas_code_deposit || invalid {
        // the child's leftover gas is forfeited
        interp.unwind(&child);
        if !child.is_create_on_pre_existing_account {
            interp.world.delete_account(&address);
        }
        if T::IS_TRACING_ACTIONS {
            let error = if invalid {
                ExceptionKind::InvalidCode
            } else {
                ExceptionKind::OutOfGas
            };
            interp.tracer.report_action_error(error);
        }
        tracing::trace!(%address, invalid, deposit, gas_left, "code deposit rejected");
        return Resume::failure();
    }

    // Frontier: the contract exists without code and keeps its gas
    parent.gas.return_gas(gas_left);
    if T::IS_TRACING_ACTIONS {
        interp.tracer.report_create_end(gas_left, &address, &[]);
    }
    child.commit_to_parent(parent);
    Resume::status(address.to_word())
}
