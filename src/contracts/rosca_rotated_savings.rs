//! ROSCA rotated savings: a collector account signed by every club member,
//! trusting the asset the members deposit with.
//!
//! Payout rotation is left to the members themselves; `start_date` is only
//! echoed back in the receipt.

use async_trait::async_trait;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::ContractError,
    keypair::{Keypair, PublicKey},
    ledger::{Ledger, LedgerError},
    receipt::{Transactions, submit},
    transaction::{Asset, Operation, Transaction, TransactionBuilder},
    utils::{
        KeypairReadable, account_exists, fetch_base_reserve, keypair_readable,
        min_account_balance, stamp_memo,
    },
};

use super::Builder;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoscaInput {
    pub asset_code: String,
    pub asset_issuer: PublicKey,
    pub deposit_amount: Decimal,
    pub members: Vec<PublicKey>,
    pub signer_secret: String,
    pub start_date: String,
}

#[derive(Debug, Serialize)]
pub struct RoscaReceipt {
    pub rosca_account: KeypairReadable,
    pub transactions: Transactions,
    pub inputs: RoscaInput,
}

pub struct RoscaRotatedSavings<'a, L> {
    ledger: &'a L,
}

impl<'a, L: Ledger> RoscaRotatedSavings<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    /// Collects every reason the club cannot be set up. Member accounts are
    /// loaded concurrently.
    async fn validate_input(&self, input: &RoscaInput, asset: &Asset) -> Result<(), ContractError> {
        let mut errors = Vec::new();
        if !account_exists(self.ledger, &input.asset_issuer).await? {
            errors.push("Provided asset issuer does not exist on the network".to_string());
        } else {
            let loads = input.members.iter().map(|m| self.ledger.load_account(m));
            for (member, loaded) in input.members.iter().zip(join_all(loads).await) {
                let account = match loaded {
                    Ok(account) => account,
                    Err(LedgerError::NotFound { .. }) => {
                        errors.push(format!("Member {member} does not exist on the network"));
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                };
                match account.balance_of(asset) {
                    None => errors.push(format!(
                        "Member {member} does not have a trustline to the asset code/issuer pair"
                    )),
                    Some(line) if line.limit.unwrap_or_default() < input.deposit_amount => {
                        errors.push(format!(
                            "Member {member} has trustline but limit is below the required deposit amount"
                        ))
                    }
                    Some(_) => {}
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            warn!(violations = errors.len(), "ROSCA input rejected");
            Err(ContractError::Validation(errors))
        }
    }

    async fn build_transaction(
        &self,
        input: &RoscaInput,
        asset: Asset,
        limit: Decimal,
        rosca_keypair: &Keypair,
    ) -> Result<Transaction, ContractError> {
        let signer_keypair = Keypair::from_secret(&input.signer_secret)?;
        let signer_account = self.ledger.load_account(&signer_keypair.public_key()).await?;
        let rosca = rosca_keypair.public_key();

        let mut builder = TransactionBuilder::new(&signer_account);

        // collector and payout account
        let base_reserve = fetch_base_reserve(self.ledger).await?;
        builder.add_operation(Operation::create_account(
            rosca,
            min_account_balance(input.members.len(), base_reserve),
        ));

        for member in &input.members {
            builder.add_operation(Operation::add_signer(*member, 1).with_source(rosca));
        }

        builder
            .add_operation(Operation::change_trust(asset, limit).with_source(rosca))
            .add_memo(stamp_memo());
        debug!(operations = builder.operations().len(), "ROSCA transaction built");

        let mut tx = builder.build(self.ledger.network_passphrase())?;
        tx.sign(&signer_keypair);
        tx.sign(rosca_keypair);
        Ok(tx)
    }
}

/// Room for one full round of deposits.
fn trust_limit(input: &RoscaInput) -> Result<Decimal, ContractError> {
    Decimal::from(input.members.len())
        .checked_mul(input.deposit_amount)
        .ok_or_else(|| {
            ContractError::InvalidInput(format!(
                "{} deposits of {} overflow the trust line limit",
                input.members.len(),
                input.deposit_amount
            ))
        })
}

#[async_trait]
impl<L: Ledger> Builder for RoscaRotatedSavings<'_, L> {
    type Input = RoscaInput;
    type Output = RoscaReceipt;

    async fn create(&self, input: RoscaInput) -> Result<RoscaReceipt, ContractError> {
        // fail on a bad secret before touching the ledger
        Keypair::from_secret(&input.signer_secret)?;
        let asset = Asset::credit(&input.asset_code, input.asset_issuer)?;
        let limit = trust_limit(&input)?;
        info!(
            asset_code = %input.asset_code,
            issuer = %input.asset_issuer,
            members = input.members.len(),
            "Creating ROSCA rotated savings"
        );

        self.validate_input(&input, &asset).await?;

        let rosca_keypair = Keypair::random();
        let tx = self.build_transaction(&input, asset, limit, &rosca_keypair).await?;
        let response = submit(self.ledger, &tx, "create").await?;
        info!(rosca = %rosca_keypair.public_key(), "ROSCA collector account created");

        Ok(RoscaReceipt {
            rosca_account: keypair_readable(&rosca_keypair),
            transactions: Transactions::from([("create".to_string(), Some(response))]),
            inputs: input,
        })
    }
}
