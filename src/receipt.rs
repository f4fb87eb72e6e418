//! Submission of signed transactions and read-back of the resulting account state.

use std::collections::BTreeMap;

use tracing::{error, info};

use crate::{
    account::{Balance, Thresholds},
    error::ContractError,
    keypair::PublicKey,
    ledger::{Ledger, SubmitResponse},
    transaction::Transaction,
};

/// Step name to submission result; `None` for steps that did not need to run.
pub type Transactions = BTreeMap<String, Option<SubmitResponse>>;

pub async fn submit<L>(
    ledger: &L,
    tx: &Transaction,
    step: &str,
) -> Result<SubmitResponse, ContractError>
where
    L: Ledger + ?Sized,
{
    info!(
        step,
        hash = %tx.hash_hex(),
        operations = tx.operations().len(),
        "Submitting transaction"
    );
    match ledger.submit_transaction(tx).await {
        Ok(response) => {
            info!(step, ledger = response.ledger, "Transaction accepted");
            Ok(response)
        }
        Err(err) => {
            error!(step, %err, "Transaction failed");
            Err(err.into())
        }
    }
}

pub async fn load_balances<L>(ledger: &L, id: &PublicKey) -> Result<Vec<Balance>, ContractError>
where
    L: Ledger + ?Sized,
{
    Ok(ledger.load_account(id).await?.balances)
}

pub async fn load_thresholds<L>(ledger: &L, id: &PublicKey) -> Result<Thresholds, ContractError>
where
    L: Ledger + ?Sized,
{
    Ok(ledger.load_account(id).await?.thresholds)
}
