//! State test runner

use crate::error::{TestError, TestResult};
use crate::types::*;
use bytes::Bytes;
use fugue_evm::{
    BlockContext, FixedSpec, Fork, InMemoryWorldState, NullTracer, Transaction,
    TransactionProcessor, VirtualMachine, WorldState,
};
use fugue_primitives::{Account, Address, U256};
use std::path::Path;
use std::sync::Arc;

/// State test runner bound to one fork
pub struct StateTestRunner {
    fork: Fork,
    processor: TransactionProcessor,
    verbose: bool,
}

impl StateTestRunner {
    /// Runner for `fork`
    pub fn new(fork: Fork, verbose: bool) -> Self {
        let vm = VirtualMachine::new(Arc::new(FixedSpec::from(fork)));
        Self {
            fork,
            processor: TransactionProcessor::new(Arc::new(vm)),
            verbose,
        }
    }

    /// Fork under test
    pub fn fork(&self) -> Fork {
        self.fork
    }

    /// Run all tests in a file
    pub fn run_file(&self, path: &Path) -> TestResult<StateTestResults> {
        let content = std::fs::read_to_string(path)?;
        self.run_json(&path.to_string_lossy(), &content)
    }

    /// Run all tests in a JSON document
    pub fn run_json(&self, source: &str, json: &str) -> TestResult<StateTestResults> {
        let tests: StateTestFile = serde_json::from_str(json)?;
        let mut results = StateTestResults::new(source.to_string());

        for (name, test_case) in &tests {
            let Some(expectations) = test_case.post.get(self.fork.name()) else {
                results
                    .skipped
                    .push((name.clone(), format!("fork {} not in test", self.fork)));
                continue;
            };

            for (idx, expected) in expectations.iter().enumerate() {
                let test_name = format!("{name}_{idx}");
                match self.run_test_case(test_case, expected) {
                    Ok(()) => {
                        if self.verbose {
                            tracing::info!(test = %test_name, "PASS");
                        }
                        results.passed.push(test_name);
                    }
                    Err(e) => {
                        if self.verbose {
                            tracing::warn!(test = %test_name, error = %e, "FAIL");
                        }
                        results.failed.push((test_name, e.to_string()));
                    }
                }
            }
        }

        Ok(results)
    }

    /// Run one index combination and check its expectations
    fn run_test_case(&self, test: &StateTestCase, expected: &PostStateResult) -> TestResult<()> {
        let mut world = build_world(test);
        let tx = build_transaction(test, expected.indexes)?;
        let block = build_block(&test.env);

        let outcome = self
            .processor
            .execute(&tx, &block, &mut world, &mut NullTracer);

        match (&expected.expect_exception, outcome) {
            (Some(exception), Ok(_)) => {
                return Err(TestError::Assertion(format!(
                    "expected rejection '{exception}' but the transaction was valid"
                )));
            }
            (Some(_), Err(_)) => return Ok(()),
            (None, Err(e)) => {
                return Err(TestError::Assertion(format!(
                    "transaction rejected: {e}"
                )));
            }
            (None, Ok(outcome)) => {
                tracing::debug!(
                    status = ?outcome.status,
                    gas_used = outcome.gas_used,
                    "transaction executed"
                );
            }
        }

        if let Some(accounts) = &expected.expect {
            for (address, account) in accounts {
                check_account(&world, address, account)?;
            }
        }
        Ok(())
    }
}

/// Pre-state as an in-memory world
fn build_world(test: &StateTestCase) -> InMemoryWorldState {
    let mut world = InMemoryWorldState::new();
    for (address, state) in &test.pre {
        let account = Account {
            nonce: state.nonce.0,
            balance: state.balance.0,
            ..Account::default()
        };
        let code = Bytes::from(state.code.0.clone());
        let storage = state.storage.iter().map(|(k, v)| (k.0, v.0));
        world.insert_account(*address, account, Some(code), storage);
    }
    world
}

fn build_block(env: &StateEnv) -> BlockContext {
    BlockContext {
        number: env.current_number.0,
        timestamp: env.current_timestamp.0,
        gas_limit: env.current_gas_limit.0,
        coinbase: env.current_coinbase,
        base_fee: env.current_base_fee.map(|f| f.0).unwrap_or_default(),
        blob_base_fee: env.current_blob_base_fee.map(|f| f.0),
        prev_randao: env.current_random.map(|r| r.0).unwrap_or_default(),
        difficulty: env.current_difficulty.0,
        ..BlockContext::default()
    }
}

fn sender_of(tx: &StateTransaction) -> TestResult<Address> {
    if let Some(sender) = tx.sender {
        return Ok(sender);
    }
    let key = tx
        .secret_key
        .ok_or_else(|| TestError::Parse("transaction has neither sender nor secretKey".into()))?;
    fugue_crypto::private_key_to_address(key.0.as_bytes())
        .map_err(|e| TestError::Parse(format!("invalid secret key: {e}")))
}

/// Concrete transaction for one index combination
fn build_transaction(test: &StateTestCase, idx: IndexSelector) -> TestResult<Transaction> {
    let tx = &test.transaction;
    let data = tx
        .data
        .get(idx.data)
        .ok_or_else(|| TestError::Parse(format!("data index {} out of bounds", idx.data)))?;
    let gas_limit = tx
        .gas_limit
        .get(idx.gas)
        .ok_or_else(|| TestError::Parse(format!("gas index {} out of bounds", idx.gas)))?;
    let value = tx
        .value
        .get(idx.value)
        .ok_or_else(|| TestError::Parse(format!("value index {} out of bounds", idx.value)))?;

    let gas_price = tx
        .gas_price
        .or(tx.max_fee_per_gas)
        .map(|p| p.0)
        .unwrap_or_default();

    let to = match tx.to.as_str() {
        "" | "0x" => None,
        s => Some(
            Address::from_hex(s).map_err(|e| TestError::Parse(format!("invalid to: {e}")))?,
        ),
    };

    let access_list = tx
        .access_lists
        .as_ref()
        .and_then(|lists| lists.get(idx.data))
        .and_then(Option::as_ref)
        .map(|entries| {
            entries
                .iter()
                .map(|e| (e.address, e.storage_keys.iter().map(|k| k.0).collect()))
                .collect()
        })
        .unwrap_or_default();

    Ok(Transaction {
        sender: sender_of(tx)?,
        to,
        nonce: tx.nonce.0,
        value: value.0,
        data: Bytes::from(data.0.clone()),
        gas_limit: gas_limit.0,
        gas_price,
        max_priority_fee_per_gas: tx.max_priority_fee_per_gas.map(|p| p.0),
        access_list,
        blob_versioned_hashes: tx.blob_versioned_hashes.iter().map(|h| h.0).collect(),
    })
}

fn check_account(
    world: &InMemoryWorldState,
    address: &Address,
    expected: &ExpectedAccount,
) -> TestResult<()> {
    let exists = world.account_exists(address);
    if expected.should_not_exist {
        if exists {
            return Err(TestError::Assertion(format!("{address} should not exist")));
        }
        return Ok(());
    }
    if !exists {
        return Err(TestError::Assertion(format!("{address} missing")));
    }
    if let Some(balance) = expected.balance {
        let actual = world.get_balance(address);
        if actual != balance.0 {
            return Err(TestError::Assertion(format!(
                "{address} balance: expected {}, got {actual}",
                balance.0
            )));
        }
    }
    if let Some(nonce) = expected.nonce {
        let actual = world.get_nonce(address);
        if actual != nonce.0 {
            return Err(TestError::Assertion(format!(
                "{address} nonce: expected {}, got {actual}",
                nonce.0
            )));
        }
    }
    if let Some(code) = &expected.code {
        let actual = world.code_of(address);
        if actual.as_ref() != code.0.as_slice() {
            return Err(TestError::Assertion(format!(
                "{address} code: expected 0x{}, got 0x{}",
                hex::encode(&code.0),
                hex::encode(&actual)
            )));
        }
    }
    if let Some(storage) = &expected.storage {
        for (key, value) in storage {
            let actual = world.get_storage(&fugue_evm::StorageCell::new(*address, key.0));
            if actual != value.0 {
                return Err(TestError::Assertion(format!(
                    "{address} slot {:#x}: expected {:#x}, got {actual:#x}",
                    key.0, value.0
                )));
            }
        }
    }
    Ok(())
}

/// Results of one fixture file
#[derive(Debug)]
pub struct StateTestResults {
    /// File path
    pub file: String,
    /// Passed tests
    pub passed: Vec<String>,
    /// Failed tests (name, reason)
    pub failed: Vec<(String, String)>,
    /// Skipped tests (name, reason)
    pub skipped: Vec<(String, String)>,
}

impl StateTestResults {
    /// Empty results for `file`
    pub fn new(file: String) -> Self {
        Self {
            file,
            passed: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Executed tests
    pub fn executed(&self) -> usize {
        self.passed.len() + self.failed.len()
    }

    /// Total tests including skipped
    pub fn total(&self) -> usize {
        self.executed() + self.skipped.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> StateTestCase {
        serde_json::from_str(
            r#"{
                "env": {
                    "currentCoinbase": "0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba",
                    "currentGasLimit": "0x05f5e100",
                    "currentNumber": "0x01",
                    "currentTimestamp": "0x03e8",
                    "currentBaseFee": "0x0a"
                },
                "pre": {},
                "transaction": {
                    "data": ["0x", "0x0102"],
                    "gasLimit": ["0x5208", "0x010000"],
                    "gasPrice": "0x0a",
                    "nonce": "0x00",
                    "sender": "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b",
                    "to": "",
                    "value": ["0x00", "0x01"]
                },
                "post": {}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_transaction_selects_indexes() {
        let test = template();
        let tx = build_transaction(
            &test,
            IndexSelector {
                data: 1,
                gas: 1,
                value: 1,
            },
        )
        .unwrap();
        assert!(tx.is_create());
        assert_eq!(tx.data.as_ref(), &[1, 2]);
        assert_eq!(tx.gas_limit, 0x010000);
        assert_eq!(tx.value, U256::one());
        assert_eq!(tx.gas_price, U256::from(10));
    }

    #[test]
    fn test_build_transaction_rejects_bad_index() {
        let test = template();
        let err = build_transaction(
            &test,
            IndexSelector {
                data: 5,
                gas: 0,
                value: 0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, TestError::Parse(_)));
    }

    #[test]
    fn test_sender_from_secret_key() {
        let mut test = template();
        test.transaction.sender = None;
        test.transaction.secret_key = Some(
            serde_json::from_str(
                r#""0x45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8""#,
            )
            .unwrap(),
        );
        assert_eq!(
            sender_of(&test.transaction).unwrap(),
            Address::from_hex("0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b").unwrap()
        );
    }

    #[test]
    fn test_block_from_env() {
        let block = build_block(&template().env);
        assert_eq!(block.number, 1);
        assert_eq!(block.timestamp, 1000);
        assert_eq!(block.base_fee, U256::from(10));
        assert_eq!(block.gas_limit, 100_000_000);
    }
}
