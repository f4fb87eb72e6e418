use thiserror::Error;

use crate::{
    keypair::KeyError,
    ledger::{LedgerError, TransactionFailure},
    transaction::BuildError,
};

#[derive(Debug, Error)]
pub enum ContractError {
    #[error(transparent)]
    InvalidKey(#[from] KeyError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Build(#[from] BuildError),
    /// Every violation found before anything was submitted.
    #[error("Contract input rejected: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// The ledger's rejection payload, passed through as-is.
    #[error("Transaction rejected: {0}")]
    Submission(TransactionFailure),
    #[error(transparent)]
    Fatal(LedgerError),
}

impl From<LedgerError> for ContractError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(failure) => ContractError::Submission(failure),
            other => ContractError::Fatal(other),
        }
    }
}
