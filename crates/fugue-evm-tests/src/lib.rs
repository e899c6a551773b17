//! # fugue-evm-tests
//!
//! Fixture runner for the fugue EVM.
//!
//! This crate provides:
//! - JSON parsing for GeneralStateTests-style fixtures
//! - a state test runner driving [`fugue_evm::TransactionProcessor`]
//! - result aggregation for directories of fixtures
//!
//! Post-state roots are not computed; fixtures check accounts through
//! optional `expect` blocks instead.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod runner;
mod state_test;
mod types;

pub use error::{TestError, TestResult};
pub use runner::{TestRunner, TestStats};
pub use state_test::{StateTestResults, StateTestRunner};
pub use types::*;
