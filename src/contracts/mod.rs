use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::ContractError, ledger::Ledger, ledger::SubmitResponse};

pub mod joint_account;
pub mod m_of_n_signers;
pub mod rosca_rotated_savings;
pub mod token;

use joint_account::{JointAccount, JointAccountInput, JointAccountReceipt};
use m_of_n_signers::{MOfNSigners, MOfNSignersInput};
use rosca_rotated_savings::{RoscaInput, RoscaReceipt, RoscaRotatedSavings};
use token::{Token, TokenInput, TokenReceipt};

/// A contract pattern that turns its input into submitted transactions.
#[async_trait]
pub trait Builder {
    type Input: Send;
    type Output;

    async fn create(&self, input: Self::Input) -> Result<Self::Output, ContractError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "contract", rename_all = "snake_case")]
pub enum ContractRequest {
    JointAccount(JointAccountInput),
    MOfNSigners(MOfNSignersInput),
    RoscaRotatedSavings(RoscaInput),
    Token(TokenInput),
}

#[derive(Debug, Serialize)]
#[serde(tag = "contract", rename_all = "snake_case")]
pub enum Receipt {
    JointAccount(JointAccountReceipt),
    MOfNSigners(SubmitResponse),
    RoscaRotatedSavings(RoscaReceipt),
    Token(TokenReceipt),
}

/// Hands out contract builders bound to one ledger.
pub struct Contracts<L> {
    ledger: L,
}

impl<L: Ledger> Contracts<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn joint_account(&self) -> JointAccount<'_, L> {
        JointAccount::new(&self.ledger)
    }

    pub fn m_of_n_signers(&self) -> MOfNSigners<'_, L> {
        MOfNSigners::new(&self.ledger)
    }

    pub fn rosca_rotated_savings(&self) -> RoscaRotatedSavings<'_, L> {
        RoscaRotatedSavings::new(&self.ledger)
    }

    pub fn token(&self) -> Token<'_, L> {
        Token::new(&self.ledger)
    }

    pub async fn create(&self, request: ContractRequest) -> Result<Receipt, ContractError> {
        match request {
            ContractRequest::JointAccount(input) => self
                .joint_account()
                .create(input)
                .await
                .map(Receipt::JointAccount),
            ContractRequest::MOfNSigners(input) => self
                .m_of_n_signers()
                .create(input)
                .await
                .map(Receipt::MOfNSigners),
            ContractRequest::RoscaRotatedSavings(input) => self
                .rosca_rotated_savings()
                .create(input)
                .await
                .map(Receipt::RoscaRotatedSavings),
            ContractRequest::Token(input) => {
                self.token().create(input).await.map(Receipt::Token)
            }
        }
    }
}

/// Weight or threshold value counting `len` members.
pub(crate) fn member_count(len: usize) -> Result<u8, ContractError> {
    u8::try_from(len).map_err(|_| {
        ContractError::InvalidInput(format!("{len} members exceed the maximum threshold of 255"))
    })
}
