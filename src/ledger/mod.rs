use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::{account::AccountEntry, keypair::PublicKey, transaction::Transaction};

pub mod in_memory_ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionResultCode {
    TxFailed,
    TxBadSeq,
    TxBadAuth,
    TxInsufficientBalance,
    TxNoSourceAccount,
    TxMissingOperation,
    TxMalformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResultCode {
    OpSuccess,
    OpBadAuth,
    OpNoSourceAccount,
    OpMalformed,
    OpUnderfunded,
    OpLowReserve,
    OpAlreadyExists,
    OpNoDestination,
    OpNoTrust,
    OpSrcNoTrust,
    OpLineFull,
    OpNoIssuer,
    OpInvalidLimit,
    OpBadSigner,
    OpTooManySigners,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultCodes {
    pub transaction: TransactionResultCode,
    pub operations: Vec<OperationResultCode>,
}

/// Payload of a rejected transaction, as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionFailure {
    pub result_codes: ResultCodes,
}

impl TransactionFailure {
    pub fn new(transaction: TransactionResultCode) -> Self {
        Self {
            result_codes: ResultCodes {
                transaction,
                operations: Vec::new(),
            },
        }
    }
}

impl fmt::Display for TransactionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes = serde_json::to_string(&self.result_codes).map_err(|_| fmt::Error)?;
        f.write_str(&codes)
    }
}

impl std::error::Error for TransactionFailure {}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Account {account_id} was not found on the ledger")]
    NotFound { account_id: PublicKey },
    #[error("Transaction rejected: {0}")]
    Rejected(TransactionFailure),
    #[error("Ledger is unreachable: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResponse {
    pub hash: String,
    pub ledger: u32,
    pub fee_charged: Decimal,
    pub operation_count: usize,
}

/// Access to a ledger: account reads, transaction submission and network parameters.
///
/// Implementations report a missing account as [`LedgerError::NotFound`] so
/// callers can tell it apart from connectivity problems.
#[async_trait]
pub trait Ledger: Send + Sync {
    fn network_passphrase(&self) -> &str;

    async fn load_account(&self, id: &PublicKey) -> Result<AccountEntry, LedgerError>;

    async fn submit_transaction(&self, tx: &Transaction) -> Result<SubmitResponse, LedgerError>;

    /// Base reserve of the most recently closed ledger.
    async fn fetch_base_reserve(&self) -> Result<Decimal, LedgerError>;
}
