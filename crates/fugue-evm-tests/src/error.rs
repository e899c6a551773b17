//! Error types for fixture runs

use thiserror::Error;

/// Fixture error
#[derive(Error, Debug)]
pub enum TestError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Hex decoding error
    #[error("Hex error: {0}")]
    Hex(String),

    /// Malformed fixture
    #[error("Parse error: {0}")]
    Parse(String),

    /// The engine itself failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// Post-state mismatch
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// Fixture needs something the engine does not provide
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl From<hex::FromHexError> for TestError {
    fn from(e: hex::FromHexError) -> Self {
        TestError::Hex(e.to_string())
    }
}

impl From<fugue_evm::VmError> for TestError {
    fn from(e: fugue_evm::VmError) -> Self {
        TestError::Execution(e.to_string())
    }
}

/// Fixture result type
pub type TestResult<T> = Result<T, TestError>;
