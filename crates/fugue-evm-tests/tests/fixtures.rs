//! Runs small inline fixtures through the state test runner
//!
//! Balances assume a gas price of 10 and a base fee of 7, so the
//! coinbase earns 3 per gas used.

use fugue_evm::address::create_address;
use fugue_evm::Fork;
use fugue_evm_tests::{StateTestRunner, TestRunner};
use fugue_primitives::Address;

const SENDER: &str = "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b";
const SECRET_KEY: &str = "0x45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8";
const COINBASE: &str = "0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba";
const RECIPIENT: &str = "0x095e7baea6a6c7c4c2dfeb977efac326af552d87";
const CONTRACT: &str = "0x000000000000000000000000000000000000c0de";

fn env() -> String {
    format!(
        r#"{{
            "currentCoinbase": "{COINBASE}",
            "currentGasLimit": "0x05f5e100",
            "currentNumber": "0x01",
            "currentTimestamp": "0x03e8",
            "currentBaseFee": "0x07",
            "currentRandom": "0x0000000000000000000000000000000000000000000000000000000000020000"
        }}"#
    )
}

fn run(json: &str) -> fugue_evm_tests::StateTestResults {
    StateTestRunner::new(Fork::Cancun, true)
        .run_json("inline", json)
        .unwrap()
}

fn assert_all_pass(results: &fugue_evm_tests::StateTestResults, expected: usize) {
    assert!(results.failed.is_empty(), "failures: {:?}", results.failed);
    assert_eq!(results.passed.len(), expected);
}

// =============================================================================
// Value transfer
// =============================================================================

mod transfer {
    use super::*;

    fn fixture() -> String {
        format!(
            r#"{{
                "transfer": {{
                    "env": {env},
                    "pre": {{
                        "{SENDER}": {{ "balance": "0x0de0b6b3a7640000", "nonce": "0x00" }}
                    }},
                    "transaction": {{
                        "data": ["0x"],
                        "gasLimit": ["0x5208"],
                        "gasPrice": "0x0a",
                        "nonce": "0x00",
                        "secretKey": "{SECRET_KEY}",
                        "to": "{RECIPIENT}",
                        "value": ["0x0186a0"]
                    }},
                    "post": {{
                        "Cancun": [{{
                            "indexes": {{ "data": 0, "gas": 0, "value": 0 }},
                            "expect": {{
                                "{SENDER}": {{ "balance": "0x0de0b6b3a75f4510", "nonce": "0x01" }},
                                "{RECIPIENT}": {{ "balance": "0x0186a0", "nonce": "0x00" }},
                                "{COINBASE}": {{ "balance": "0xf618" }}
                            }}
                        }}]
                    }}
                }}
            }}"#,
            env = env()
        )
    }

    #[test]
    fn test_transfer_balances() {
        let results = run(&fixture());
        assert_all_pass(&results, 1);
    }

    #[test]
    fn test_wrong_balance_is_reported() {
        let json = fixture().replace("\"0x0186a0\", \"nonce\"", "\"0x0186a1\", \"nonce\"");
        let results = run(&json);
        assert_eq!(results.failed.len(), 1);
        assert!(results.failed[0].1.contains("balance"));
    }
}

// =============================================================================
// Storage
// =============================================================================

mod storage {
    use super::*;

    #[test]
    fn test_sstore_and_out_of_gas() {
        // PUSH1 0x2a, PUSH1 1, SSTORE, STOP
        // gas 0 uses 21000 + 3 + 3 + 22100; gas 1 runs out inside the call
        let json = format!(
            r#"{{
                "sstore": {{
                    "env": {env},
                    "pre": {{
                        "{SENDER}": {{ "balance": "0x0de0b6b3a7640000", "nonce": "0x00" }},
                        "{CONTRACT}": {{ "balance": "0x00", "nonce": "0x01", "code": "0x602a60015500" }}
                    }},
                    "transaction": {{
                        "data": ["0x"],
                        "gasLimit": ["0x0186a0", "0x5212"],
                        "gasPrice": "0x0a",
                        "nonce": "0x00",
                        "sender": "{SENDER}",
                        "to": "{CONTRACT}",
                        "value": ["0x00"]
                    }},
                    "post": {{
                        "Cancun": [
                            {{
                                "indexes": {{ "data": 0, "gas": 0, "value": 0 }},
                                "expect": {{
                                    "{SENDER}": {{ "balance": "0x0de0b6b3a75d6c2c", "nonce": "0x01" }},
                                    "{CONTRACT}": {{ "storage": {{ "0x01": "0x2a" }} }},
                                    "{COINBASE}": {{ "balance": "0x01f926" }}
                                }}
                            }},
                            {{
                                "indexes": {{ "data": 0, "gas": 1, "value": 0 }},
                                "expect": {{
                                    "{SENDER}": {{ "balance": "0x0de0b6b3a760cb4c", "nonce": "0x01" }},
                                    "{CONTRACT}": {{ "storage": {{ "0x01": "0x00" }} }},
                                    "{COINBASE}": {{ "balance": "0xf636" }}
                                }}
                            }}
                        ]
                    }}
                }}
            }}"#,
            env = env()
        );
        let results = run(&json);
        assert_all_pass(&results, 2);
    }
}

// =============================================================================
// Contract creation
// =============================================================================

mod creation {
    use super::*;

    #[test]
    fn test_deploy_and_ef_rejection() {
        let sender = Address::from_hex(SENDER).unwrap();
        let contract = create_address(&sender, 0);
        // PUSH1 b, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, RETURN
        // data 0 deploys 0xff; data 1 tries to deploy 0xef
        let json = format!(
            r#"{{
                "create": {{
                    "env": {env},
                    "pre": {{
                        "{SENDER}": {{ "balance": "0x0de0b6b3a7640000", "nonce": "0x00" }}
                    }},
                    "transaction": {{
                        "data": ["0x60ff60005360016000f3", "0x60ef60005360016000f3"],
                        "gasLimit": ["0x0186a0"],
                        "gasPrice": "0x0a",
                        "nonce": "0x00",
                        "sender": "{SENDER}",
                        "to": "",
                        "value": ["0x00"]
                    }},
                    "post": {{
                        "Cancun": [
                            {{
                                "indexes": {{ "data": 0, "gas": 0, "value": 0 }},
                                "expect": {{
                                    "{SENDER}": {{ "nonce": "0x01" }},
                                    "{contract}": {{ "code": "0xff" }}
                                }}
                            }},
                            {{
                                "indexes": {{ "data": 1, "gas": 0, "value": 0 }},
                                "expect": {{
                                    "{SENDER}": {{ "nonce": "0x01" }},
                                    "{contract}": {{ "shouldNotExist": true }}
                                }}
                            }}
                        ]
                    }}
                }}
            }}"#,
            env = env()
        );
        let results = run(&json);
        assert_all_pass(&results, 2);
    }
}

// =============================================================================
// Rejections and fork selection
// =============================================================================

mod selection {
    use super::*;

    fn bad_nonce(fork: &str) -> String {
        format!(
            r#"{{
                "badNonce": {{
                    "env": {env},
                    "pre": {{
                        "{SENDER}": {{ "balance": "0x0de0b6b3a7640000", "nonce": "0x00" }}
                    }},
                    "transaction": {{
                        "data": ["0x"],
                        "gasLimit": ["0x5208"],
                        "gasPrice": "0x0a",
                        "nonce": "0x01",
                        "sender": "{SENDER}",
                        "to": "{RECIPIENT}",
                        "value": ["0x01"]
                    }},
                    "post": {{
                        "{fork}": [{{
                            "indexes": {{ "data": 0, "gas": 0, "value": 0 }},
                            "expectException": "TransactionException.NONCE_MISMATCH_TOO_HIGH"
                        }}]
                    }}
                }}
            }}"#,
            env = env()
        )
    }

    #[test]
    fn test_expected_exception_passes() {
        let results = run(&bad_nonce("Cancun"));
        assert_all_pass(&results, 1);
    }

    #[test]
    fn test_other_fork_is_skipped() {
        let results = run(&bad_nonce("Berlin"));
        assert_eq!(results.executed(), 0);
        assert_eq!(results.skipped.len(), 1);
        assert_eq!(results.total(), 1);
    }

    #[test]
    fn test_missing_exception_fails() {
        let json = bad_nonce("Cancun").replace("\"nonce\": \"0x01\"", "\"nonce\": \"0x00\"");
        let results = run(&json);
        assert_eq!(results.failed.len(), 1);
        assert!(results.failed[0].1.contains("expected rejection"));
    }

    #[test]
    fn test_directory_run_aggregates() {
        let dir = std::env::temp_dir().join(format!("fugue-fixtures-{}", std::process::id()));
        let nested = dir.join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.join("a.json"), bad_nonce("Cancun")).unwrap();
        std::fs::write(nested.join("b.json"), bad_nonce("Berlin")).unwrap();
        std::fs::write(nested.join("broken.json"), "{ not json").unwrap();
        std::fs::write(nested.join("notes.txt"), "ignored").unwrap();

        let stats = TestRunner::new(Fork::Cancun, false).run(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(stats.passed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.broken_files.len(), 1);
        assert!(!stats.is_clean());
    }
}
