//! Set up an existing account so that M of its N members must cosign.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    account::Thresholds,
    error::ContractError,
    keypair::{Keypair, PublicKey},
    ledger::{Ledger, SubmitResponse},
    receipt::submit,
    transaction::{Operation, TransactionBuilder},
};

use super::{Builder, member_count};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MOfNSignersInput {
    pub members: Vec<PublicKey>,
    pub signing_key: String,
    #[serde(default)]
    pub num_signers_low: Option<u8>,
    #[serde(default)]
    pub num_signers_med: Option<u8>,
    #[serde(default)]
    pub num_signers_high: Option<u8>,
}

pub struct MOfNSigners<'a, L> {
    ledger: &'a L,
}

impl<'a, L: Ledger> MOfNSigners<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl<L: Ledger> Builder for MOfNSigners<'_, L> {
    type Input = MOfNSignersInput;
    type Output = SubmitResponse;

    async fn create(&self, input: MOfNSignersInput) -> Result<SubmitResponse, ContractError> {
        let signing_keypair = Keypair::from_secret(&input.signing_key)?;
        let signing_key = signing_keypair.public_key();
        let n = member_count(input.members.len())?;
        info!(account = %signing_key, members = n, "Setting up M of N signers");

        let signing_account = self.ledger.load_account(&signing_key).await?;
        let mut builder = TransactionBuilder::new(&signing_account);
        for member in input.members.iter().filter(|m| **m != signing_key) {
            builder.add_operation(Operation::add_signer(*member, 1));
        }
        // unanimity unless relaxed explicitly
        builder.add_operation(Operation::set_thresholds(&Thresholds {
            low: input.num_signers_low.unwrap_or(n),
            med: input.num_signers_med.unwrap_or(n),
            high: input.num_signers_high.unwrap_or(n),
            master_weight: 1,
        }));

        let mut tx = builder.build(self.ledger.network_passphrase())?;
        tx.sign(&signing_keypair);
        submit(self.ledger, &tx, "create").await
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        contracts::test_support::{funded, ledger},
        ledger::TransactionResultCode,
    };

    use super::*;

    #[tokio::test]
    async fn unanimity_by_default() {
        let ledger = ledger();
        let owner = funded(&ledger, 100);
        let members = vec![Keypair::random().public_key(), Keypair::random().public_key()];

        let response = MOfNSigners::new(&ledger)
            .create(MOfNSignersInput {
                members: members.clone(),
                signing_key: owner.secret(),
                num_signers_low: None,
                num_signers_med: None,
                num_signers_high: None,
            })
            .await
            .unwrap();
        assert_eq!(response.operation_count, 3);

        let account = ledger.load_account(&owner.public_key()).await.unwrap();
        assert_eq!(
            account.thresholds,
            Thresholds {
                low: 2,
                med: 2,
                high: 2,
                master_weight: 1
            }
        );
        assert_eq!(account.signers.len(), 3);
    }

    #[tokio::test]
    async fn relaxed_thresholds_and_signer_skipped() {
        let ledger = ledger();
        let owner = funded(&ledger, 100);
        let other = Keypair::random().public_key();

        MOfNSigners::new(&ledger)
            .create(MOfNSignersInput {
                members: vec![owner.public_key(), other],
                signing_key: owner.secret(),
                num_signers_low: Some(1),
                num_signers_med: Some(1),
                num_signers_high: None,
            })
            .await
            .unwrap();

        let account = ledger.load_account(&owner.public_key()).await.unwrap();
        assert_eq!(account.thresholds.low, 1);
        assert_eq!(account.thresholds.med, 1);
        assert_eq!(account.thresholds.high, 2);
        // only the other member was added next to the master key
        assert_eq!(account.signers.len(), 2);
    }

    #[tokio::test]
    async fn ledger_rejection_is_passed_through() {
        let ledger = ledger();
        let owner = funded(&ledger, 100);
        let input = MOfNSignersInput {
            members: vec![Keypair::random().public_key(), Keypair::random().public_key()],
            signing_key: owner.secret(),
            num_signers_low: None,
            num_signers_med: None,
            num_signers_high: None,
        };
        MOfNSigners::new(&ledger).create(input.clone()).await.unwrap();

        // the owner alone no longer reaches the raised thresholds
        let err = MOfNSigners::new(&ledger).create(input).await.unwrap_err();
        let ContractError::Submission(failure) = &err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(
            failure.result_codes.transaction,
            TransactionResultCode::TxBadAuth
        );
    }

    #[tokio::test]
    async fn missing_signing_account_is_fatal() {
        let ledger = ledger();
        let err = MOfNSigners::new(&ledger)
            .create(MOfNSignersInput {
                members: vec![Keypair::random().public_key()],
                signing_key: Keypair::random().secret(),
                num_signers_low: None,
                num_signers_med: None,
                num_signers_high: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::Fatal(_)));
    }
}
