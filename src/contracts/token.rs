//! Issue a token: an issuing account pays the whole supply to a distribution
//! account, optionally locking itself afterwards so no more can be minted.
//!
//! Every step is its own transaction. A failing step aborts the rest and
//! nothing already submitted is rolled back.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    account::{Balance, Thresholds},
    error::ContractError,
    keypair::Keypair,
    ledger::{Ledger, SubmitResponse},
    receipt::{Transactions, load_balances, load_thresholds, submit},
    transaction::{Asset, Operation, OperationBody, SetOptions, TransactionBuilder},
    utils::{KeypairReadable, keypair_readable},
};

use super::Builder;

/// Starting balances of the accounts created for a new token.
pub const ISSUING_STARTING_BALANCE: i64 = 31;
pub const DISTRIBUTION_STARTING_BALANCE: i64 = 41;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInput {
    pub asset_code: String,
    pub num_of_tokens: Decimal,
    #[serde(default)]
    pub limit: bool,
    #[serde(default)]
    pub issuing_account_key: Option<String>,
    #[serde(default)]
    pub dist_account_key: Option<String>,
    pub signer: String,
}

#[derive(Debug, Serialize)]
pub struct DistributionAccount {
    pub keys: KeypairReadable,
    pub balances: Vec<Balance>,
}

#[derive(Debug, Serialize)]
pub struct IssuingAccount {
    pub keys: KeypairReadable,
    pub balances: Vec<Balance>,
    pub thresholds: Thresholds,
}

#[derive(Debug, Serialize)]
pub struct TokenAccounts {
    pub distribution: DistributionAccount,
    pub issuing: IssuingAccount,
}

/// Disclosure document to fill in and publish alongside the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocTemplate {
    pub about: String,
    pub code: String,
    pub name: String,
    pub description: String,
    pub conditions: String,
}

impl DocTemplate {
    pub fn new(code: &str) -> Self {
        Self {
            about: "Example of a doc file for a token. Fill it out, sign it and publish it \
                    so holders can look up what the token stands for."
                .to_string(),
            code: code.to_string(),
            name: format!("{code} token"),
            description: format!("The {code} token ..."),
            conditions: "Enter some conditions of token use here ...".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenReceipt {
    pub accounts: TokenAccounts,
    pub doc_template: DocTemplate,
    pub transactions: Transactions,
    pub inputs: TokenInput,
}

pub struct Token<'a, L> {
    ledger: &'a L,
}

impl<'a, L: Ledger> Token<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    /// Creates whichever of the two accounts the caller did not provide.
    async fn create_token_accounts(
        &self,
        signer_keypair: &Keypair,
        issuing: Option<&Keypair>,
        dist: Option<&Keypair>,
    ) -> Result<SubmitResponse, ContractError> {
        let signing_account = self.ledger.load_account(&signer_keypair.public_key()).await?;
        let mut builder = TransactionBuilder::new(&signing_account);
        if let Some(issuing) = issuing {
            builder.add_operation(Operation::create_account(
                issuing.public_key(),
                Decimal::from(ISSUING_STARTING_BALANCE),
            ));
        }
        if let Some(dist) = dist {
            builder.add_operation(Operation::create_account(
                dist.public_key(),
                Decimal::from(DISTRIBUTION_STARTING_BALANCE),
            ));
        }
        let mut tx = builder.build(self.ledger.network_passphrase())?;
        tx.sign(signer_keypair);
        submit(self.ledger, &tx, "create_accounts").await
    }

    /// Single operation transaction sourced and signed by `keypair`.
    async fn submit_single(
        &self,
        keypair: &Keypair,
        operation: Operation,
        step: &str,
    ) -> Result<SubmitResponse, ContractError> {
        let account = self.ledger.load_account(&keypair.public_key()).await?;
        let mut builder = TransactionBuilder::new(&account);
        builder.add_operation(operation);
        let mut tx = builder.build(self.ledger.network_passphrase())?;
        tx.sign(keypair);
        submit(self.ledger, &tx, step).await
    }
}

fn provided_keypair(secret: Option<&str>) -> Result<Option<Keypair>, ContractError> {
    Ok(secret.map(Keypair::from_secret).transpose()?)
}

#[async_trait]
impl<L: Ledger> Builder for Token<'_, L> {
    type Input = TokenInput;
    type Output = TokenReceipt;

    async fn create(&self, input: TokenInput) -> Result<TokenReceipt, ContractError> {
        info!(
            asset_code = %input.asset_code,
            num_of_tokens = %input.num_of_tokens,
            "Issuing token"
        );
        let provided_issuing = provided_keypair(input.issuing_account_key.as_deref())?;
        let provided_dist = provided_keypair(input.dist_account_key.as_deref())?;
        let issuing_generated = provided_issuing.is_none();
        let dist_generated = provided_dist.is_none();
        let issuing = provided_issuing.unwrap_or_else(Keypair::random);
        let dist = provided_dist.unwrap_or_else(Keypair::random);

        let mut transactions = Transactions::new();
        let create_accounts = if issuing_generated || dist_generated {
            let signer_keypair = Keypair::from_secret(&input.signer)?;
            let response = self
                .create_token_accounts(
                    &signer_keypair,
                    issuing_generated.then_some(&issuing),
                    dist_generated.then_some(&dist),
                )
                .await?;
            Some(response)
        } else {
            None
        };
        transactions.insert("create_accounts".to_string(), create_accounts);

        let issuing_key = issuing.public_key();
        let dist_key = dist.public_key();
        info!(issuing = %issuing_key, distribution = %dist_key, "Token accounts ready");

        let asset = Asset::credit(&input.asset_code, issuing_key)?;

        // trust the issuer for the full amount
        let trust_issuing = self
            .submit_single(
                &dist,
                Operation::change_trust(asset.clone(), input.num_of_tokens),
                "trust_issuing",
            )
            .await?;
        transactions.insert("trust_issuing".to_string(), Some(trust_issuing));

        let create_tokens = self
            .submit_single(
                &issuing,
                Operation::payment(dist_key, asset, input.num_of_tokens),
                "create_tokens",
            )
            .await?;
        transactions.insert("create_tokens".to_string(), Some(create_tokens));

        let limit_supply = if input.limit {
            info!(issuing = %issuing_key, "Locking issuing account, supply becomes fixed");
            let lock = Operation::from(OperationBody::SetOptions(SetOptions {
                master_weight: Some(0),
                low_threshold: Some(1),
                med_threshold: Some(1),
                high_threshold: Some(1),
                signer: None,
            }));
            Some(self.submit_single(&issuing, lock, "limit_supply").await?)
        } else {
            None
        };
        transactions.insert("limit_supply".to_string(), limit_supply);

        let issuing_balances = load_balances(self.ledger, &issuing_key).await?;
        let dist_balances = load_balances(self.ledger, &dist_key).await?;
        // shows whether the supply was locked
        let issuing_thresholds = load_thresholds(self.ledger, &issuing_key).await?;

        Ok(TokenReceipt {
            accounts: TokenAccounts {
                distribution: DistributionAccount {
                    keys: keypair_readable(&dist),
                    balances: dist_balances,
                },
                issuing: IssuingAccount {
                    keys: keypair_readable(&issuing),
                    balances: issuing_balances,
                    thresholds: issuing_thresholds,
                },
            },
            doc_template: DocTemplate::new(&input.asset_code),
            transactions,
            inputs: input,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        contracts::test_support::{funded, ledger},
        ledger::TransactionResultCode,
        transaction::base_fee,
    };

    use super::*;

    fn input(signer: &Keypair) -> TokenInput {
        TokenInput {
            asset_code: "FOO".to_string(),
            num_of_tokens: Decimal::from(1000),
            limit: false,
            issuing_account_key: None,
            dist_account_key: None,
            signer: signer.secret(),
        }
    }

    #[tokio::test]
    async fn issue_to_new_accounts() {
        let ledger = ledger();
        let signer = funded(&ledger, 200);

        let receipt = Token::new(&ledger).create(input(&signer)).await.unwrap();

        let issuing = receipt.accounts.issuing.keys.public_key;
        let dist = receipt.accounts.distribution.keys.public_key;
        assert_ne!(issuing, dist);
        let foo = Asset::credit("FOO", issuing).unwrap();

        let dist_account = ledger.load_account(&dist).await.unwrap();
        let line = dist_account.balance_of(&foo).unwrap();
        assert_eq!(line.balance, Decimal::from(1000));
        assert_eq!(line.limit, Some(Decimal::from(1000)));
        // each account paid the fee of the one transaction it sourced
        assert_eq!(
            dist_account.balances[0].balance,
            Decimal::from(DISTRIBUTION_STARTING_BALANCE) - base_fee()
        );
        let issuing_account = ledger.load_account(&issuing).await.unwrap();
        assert_eq!(
            issuing_account.balances[0].balance,
            Decimal::from(ISSUING_STARTING_BALANCE) - base_fee()
        );

        assert_eq!(receipt.accounts.distribution.balances.len(), 2);
        assert_eq!(receipt.accounts.issuing.thresholds, Thresholds::default());
        for step in ["create_accounts", "trust_issuing", "create_tokens"] {
            assert!(receipt.transactions[step].is_some(), "{step} not submitted");
        }
        assert_eq!(receipt.transactions["limit_supply"], None);
        assert_eq!(receipt.doc_template.name, "FOO token");
        assert_eq!(receipt.doc_template.description, "The FOO token ...");
    }

    #[tokio::test]
    async fn limit_locks_the_issuer() {
        let ledger = ledger();
        let signer = funded(&ledger, 200);
        let mut input = input(&signer);
        input.limit = true;

        let receipt = Token::new(&ledger).create(input).await.unwrap();
        assert!(receipt.transactions["limit_supply"].is_some());
        assert_eq!(
            receipt.accounts.issuing.thresholds,
            Thresholds {
                low: 1,
                med: 1,
                high: 1,
                master_weight: 0
            }
        );

        // no more tokens can be minted
        let issuing = Keypair::from_secret(&receipt.accounts.issuing.keys.secret).unwrap();
        let dist = receipt.accounts.distribution.keys.public_key;
        let foo = Asset::credit("FOO", issuing.public_key()).unwrap();
        let account = ledger.load_account(&issuing.public_key()).await.unwrap();
        let mut builder = TransactionBuilder::new(&account);
        builder.add_operation(Operation::payment(dist, foo, Decimal::ONE));
        let mut tx = builder.build(ledger.network_passphrase()).unwrap();
        tx.sign(&issuing);
        let err = ledger.submit_transaction(&tx).await.unwrap_err();
        let crate::ledger::LedgerError::Rejected(failure) = &err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(
            failure.result_codes.transaction,
            TransactionResultCode::TxBadAuth
        );
    }

    #[tokio::test]
    async fn reuse_provided_accounts() {
        let ledger = ledger();
        let issuing = funded(&ledger, 50);
        let dist = funded(&ledger, 50);
        let submissions = ledger.submissions();
        let mut input = input(&Keypair::random());
        // never parsed when both accounts are provided
        input.signer = "unused".to_string();
        input.issuing_account_key = Some(issuing.secret());
        input.dist_account_key = Some(dist.secret());

        let receipt = Token::new(&ledger).create(input).await.unwrap();

        assert_eq!(receipt.transactions["create_accounts"], None);
        assert_eq!(receipt.accounts.issuing.keys.public_key, issuing.public_key());
        assert_eq!(receipt.accounts.distribution.keys.public_key, dist.public_key());
        assert_eq!(ledger.submissions(), submissions + 2);
    }

    #[tokio::test]
    async fn failing_step_aborts_the_rest() {
        let ledger = ledger();
        // cannot fund both accounts
        let signer = funded(&ledger, 50);
        let submissions = ledger.submissions();

        let err = Token::new(&ledger).create(input(&signer)).await.unwrap_err();
        let ContractError::Submission(failure) = &err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(
            failure.result_codes.transaction,
            TransactionResultCode::TxFailed
        );
        // trust_issuing and create_tokens were never attempted
        assert_eq!(ledger.submissions(), submissions + 1);
    }
}
