//! Joint account: any single member can make payments, while changing the
//! member list needs the cooperation of members up to the high threshold.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    account::{AccountEntry, Thresholds},
    error::ContractError,
    keypair::{Keypair, PublicKey},
    ledger::Ledger,
    receipt::{Transactions, submit},
    transaction::{Operation, TransactionBuilder},
    utils::{account_exists, fetch_base_reserve, min_account_balance, stamp_memo},
};

use super::{Builder, member_count};

fn default_weight() -> u8 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub public_key: PublicKey,
    #[serde(default = "default_weight")]
    pub weight: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointAccountInput {
    pub account_secret: String,
    pub members: Vec<Member>,
    pub signer_secret: String,
    #[serde(default)]
    pub thresholds: Option<Thresholds>,
}

#[derive(Debug, Serialize)]
pub struct JointAccountReceipt {
    pub joint_account: AccountEntry,
    pub transactions: Transactions,
    pub inputs: JointAccountInput,
}

/// Thresholds applied when the caller gives none: members act alone at low
/// and medium level, all of them are needed at high level. The joint
/// account's own key only counts when it is listed as a member.
pub fn default_thresholds(members: &[Member]) -> Result<Thresholds, ContractError> {
    Ok(Thresholds {
        low: 0,
        med: 0,
        high: member_count(members.len())?,
        master_weight: 1,
    })
}

pub struct JointAccount<'a, L> {
    ledger: &'a L,
}

impl<'a, L: Ledger> JointAccount<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    /// Lays out the operations configuring `joint`, funding it first when
    /// it does not exist yet.
    async fn operations(
        &self,
        builder: &mut TransactionBuilder,
        joint: PublicKey,
        input: &JointAccountInput,
    ) -> Result<(), ContractError> {
        if !account_exists(self.ledger, &joint).await? {
            let base_reserve = fetch_base_reserve(self.ledger).await?;
            let starting_balance = min_account_balance(input.members.len(), base_reserve);
            info!(%joint, %starting_balance, "Joint account does not exist, creating it");
            builder.add_operation(Operation::create_account(joint, starting_balance));
        }

        for member in input.members.iter().filter(|m| m.public_key != joint) {
            builder.add_operation(
                Operation::add_signer(member.public_key, member.weight).with_source(joint),
            );
        }

        let thresholds = match input.thresholds {
            Some(thresholds) => thresholds,
            None => default_thresholds(&input.members)?,
        };
        builder
            .add_operation(Operation::set_thresholds(&thresholds).with_source(joint))
            .add_memo(stamp_memo());
        Ok(())
    }
}

#[async_trait]
impl<L: Ledger> Builder for JointAccount<'_, L> {
    type Input = JointAccountInput;
    type Output = JointAccountReceipt;

    async fn create(&self, input: JointAccountInput) -> Result<JointAccountReceipt, ContractError> {
        let joint_keypair = Keypair::from_secret(&input.account_secret)?;
        let signer_keypair = Keypair::from_secret(&input.signer_secret)?;
        let joint = joint_keypair.public_key();
        info!(%joint, members = input.members.len(), "Creating joint account");

        let signer_account = self.ledger.load_account(&signer_keypair.public_key()).await?;
        let mut builder = TransactionBuilder::new(&signer_account);
        self.operations(&mut builder, joint, &input).await?;
        debug!(operations = builder.operations().len(), "Joint account transaction built");

        let mut tx = builder.build(self.ledger.network_passphrase())?;
        tx.sign(&signer_keypair);
        // the joint account authorizes its own first configuration
        tx.sign(&joint_keypair);

        let response = submit(self.ledger, &tx, "create_joint_account").await?;
        let joint_account = self.ledger.load_account(&joint).await?;

        Ok(JointAccountReceipt {
            joint_account,
            transactions: Transactions::from([(
                "create_joint_account".to_string(),
                Some(response),
            )]),
            inputs: input,
        })
    }
}
