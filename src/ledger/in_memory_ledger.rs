use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
    account::{AccountEntry, AccountError, AccountEvent, LedgerAccount},
    keypair::PublicKey,
    transaction::{
        Asset, MAX_OPERATIONS, Operation, OperationBody, ThresholdCategory, Transaction,
    },
    utils::min_account_balance,
};

use super::{
    Ledger, LedgerError, OperationResultCode, ResultCodes, SubmitResponse, TransactionFailure,
    TransactionResultCode,
};

impl From<AccountError> for OperationResultCode {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Underfunded => OperationResultCode::OpUnderfunded,
            AccountError::SourceNoTrust => OperationResultCode::OpSrcNoTrust,
            AccountError::NoTrust => OperationResultCode::OpNoTrust,
            AccountError::LineFull => OperationResultCode::OpLineFull,
            AccountError::InvalidLimit => OperationResultCode::OpInvalidLimit,
            AccountError::Malformed(_) => OperationResultCode::OpMalformed,
            AccountError::BadSigner => OperationResultCode::OpBadSigner,
            AccountError::TooManySigners => OperationResultCode::OpTooManySigners,
        }
    }
}

struct LedgerState {
    accounts: HashMap<PublicKey, LedgerAccount>,
    base_reserve: Decimal,
    ledger_sequence: u32,
    submissions: usize,
    unreachable: HashSet<PublicKey>,
}

/// Sandbox ledger that enforces sequence numbers, signature weights, reserves
/// and trust lines the way the network does, without any network.
pub struct InMemoryLedger {
    network_passphrase: String,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(network_passphrase: impl Into<String>, base_reserve: Decimal) -> Self {
        Self {
            network_passphrase: network_passphrase.into(),
            state: Mutex::new(LedgerState {
                accounts: HashMap::new(),
                base_reserve,
                ledger_sequence: 1,
                submissions: 0,
                unreachable: HashSet::new(),
            }),
        }
    }

    // every submission works on a copy of the accounts, so a poisoned lock
    // never exposes a half-applied transaction
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a genesis account outside of any transaction.
    pub fn fund(&self, id: PublicKey, balance: Decimal) {
        let mut state = self.state();
        let sequence = i64::from(state.ledger_sequence) << 32;
        state
            .accounts
            .insert(id, LedgerAccount::new(id, sequence, balance));
    }

    /// Number of `submit_transaction` calls, accepted or not.
    pub fn submissions(&self) -> usize {
        self.state().submissions
    }

    /// Makes every load of `id` fail as if the ledger could not be reached.
    pub fn set_unreachable(&self, id: PublicKey) {
        self.state().unreachable.insert(id);
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    async fn load_account(&self, id: &PublicKey) -> Result<AccountEntry, LedgerError> {
        let state = self.state();
        if state.unreachable.contains(id) {
            return Err(LedgerError::Transport(format!(
                "connection reset while loading {id}"
            )));
        }
        state
            .accounts
            .get(id)
            .map(LedgerAccount::to_entry)
            .ok_or(LedgerError::NotFound { account_id: *id })
    }

    async fn submit_transaction(&self, tx: &Transaction) -> Result<SubmitResponse, LedgerError> {
        let mut state = self.state();
        state.submissions += 1;
        let response = state
            .submit(tx, &self.network_passphrase)
            .map_err(LedgerError::Rejected)?;
        debug!(hash = %response.hash, ledger = response.ledger, "Transaction applied");
        Ok(response)
    }

    async fn fetch_base_reserve(&self) -> Result<Decimal, LedgerError> {
        Ok(self.state().base_reserve)
    }
}

impl LedgerState {
    fn submit(
        &mut self,
        tx: &Transaction,
        network_passphrase: &str,
    ) -> Result<SubmitResponse, TransactionFailure> {
        let body = tx.body();
        let source = self
            .accounts
            .get(&body.source)
            .ok_or_else(|| TransactionFailure::new(TransactionResultCode::TxNoSourceAccount))?;
        if body.sequence != source.sequence() + 1 {
            return Err(TransactionFailure::new(TransactionResultCode::TxBadSeq));
        }
        if body.operations.is_empty() {
            return Err(TransactionFailure::new(
                TransactionResultCode::TxMissingOperation,
            ));
        }
        if body.operations.len() > MAX_OPERATIONS {
            return Err(TransactionFailure::new(TransactionResultCode::TxMalformed));
        }

        let hash = body
            .hash(network_passphrase)
            .map_err(|_| TransactionFailure::new(TransactionResultCode::TxMalformed))?;
        let signed: HashSet<PublicKey> = tx
            .signatures()
            .iter()
            .filter(|sig| sig.public_key.verify(&hash, &sig.signature))
            .map(|sig| sig.public_key)
            .collect();
        if !source.authorizes(ThresholdCategory::Low, &signed) {
            return Err(TransactionFailure::new(TransactionResultCode::TxBadAuth));
        }
        if source.native_balance() < body.fee {
            return Err(TransactionFailure::new(
                TransactionResultCode::TxInsufficientBalance,
            ));
        }

        self.ledger_sequence += 1;
        let mut working = self.accounts.clone();
        let mut operations = Vec::with_capacity(body.operations.len());
        let mut failed = false;
        for op in &body.operations {
            match self.execute_operation(&mut working, op, body.source, &signed) {
                Ok(()) => operations.push(OperationResultCode::OpSuccess),
                Err(code) => {
                    operations.push(code);
                    failed = true;
                    break;
                }
            }
        }
        if !failed {
            self.accounts = working;
        }

        // fee and sequence number are consumed even when an operation failed
        if let Some(source) = self.accounts.get_mut(&body.source) {
            source.apply(&AccountEvent::Debited {
                asset: Asset::Native,
                amount: body.fee,
            });
            source.apply(&AccountEvent::SequenceBumped);
        }

        if failed {
            return Err(TransactionFailure {
                result_codes: ResultCodes {
                    transaction: TransactionResultCode::TxFailed,
                    operations,
                },
            });
        }
        Ok(SubmitResponse {
            hash: hex::encode(hash),
            ledger: self.ledger_sequence,
            fee_charged: body.fee,
            operation_count: body.operations.len(),
        })
    }

    fn execute_operation(
        &self,
        accounts: &mut HashMap<PublicKey, LedgerAccount>,
        op: &Operation,
        tx_source: PublicKey,
        signed: &HashSet<PublicKey>,
    ) -> Result<(), OperationResultCode> {
        let source_id = op.source.unwrap_or(tx_source);
        let source = accounts
            .get(&source_id)
            .ok_or(OperationResultCode::OpNoSourceAccount)?;
        if !source.authorizes(op.threshold_category(), signed) {
            return Err(OperationResultCode::OpBadAuth);
        }

        match &op.body {
            OperationBody::CreateAccount {
                destination,
                starting_balance,
            } => {
                if accounts.contains_key(destination) {
                    return Err(OperationResultCode::OpAlreadyExists);
                }
                if *starting_balance < min_account_balance(0, self.base_reserve) {
                    return Err(OperationResultCode::OpLowReserve);
                }
                let debit =
                    source.handle_debit(&Asset::Native, *starting_balance, self.base_reserve)?;
                apply_event(accounts, &source_id, &debit);
                let sequence = i64::from(self.ledger_sequence) << 32;
                accounts.insert(
                    *destination,
                    LedgerAccount::new(*destination, sequence, *starting_balance),
                );
            }
            OperationBody::Payment {
                destination,
                asset,
                amount,
            } => {
                let receiver = accounts
                    .get(destination)
                    .ok_or(OperationResultCode::OpNoDestination)?;
                let debit = source.handle_debit(asset, *amount, self.base_reserve)?;
                let credit = receiver.handle_credit(asset, *amount)?;
                apply_event(accounts, &source_id, &debit);
                apply_event(accounts, destination, &credit);
            }
            OperationBody::ChangeTrust { asset, limit } => {
                if let Some(issuer) = asset.issuer() {
                    if !accounts.contains_key(issuer) {
                        return Err(OperationResultCode::OpNoIssuer);
                    }
                }
                let event = source.handle_change_trust(asset, *limit)?;
                apply_event(accounts, &source_id, &event);
            }
            OperationBody::SetOptions(opts) => {
                let events = source.handle_set_options(opts)?;
                for event in &events {
                    apply_event(accounts, &source_id, event);
                }
            }
        }
        Ok(())
    }
}

fn apply_event(
    accounts: &mut HashMap<PublicKey, LedgerAccount>,
    id: &PublicKey,
    event: &AccountEvent,
) {
    if let Some(account) = accounts.get_mut(id) {
        account.apply(event);
    }
}
