use ed25519_dalek::Signature;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{
    account::{AccountEntry, Thresholds},
    keypair::{Keypair, PublicKey},
};

pub const MAX_OPERATIONS: usize = 100;
pub const MAX_MEMO_TEXT_LEN: usize = 28;
const MAX_ASSET_CODE_LEN: usize = 12;

/// Fee charged per operation, in native units (100 stroops).
pub fn base_fee() -> Decimal {
    Decimal::new(100, 7)
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Transaction must contain at least one operation")]
    NoOperations,
    #[error("Transaction cannot contain more than {MAX_OPERATIONS} operations, got {0}")]
    TooManyOperations(usize),
    #[error("Asset code `{0}` must be 1-12 alphanumeric characters")]
    InvalidAssetCode(String),
    #[error("Memo text is {0} bytes, at most {MAX_MEMO_TEXT_LEN} are allowed")]
    MemoTooLong(usize),
    #[error("Failed to encode transaction: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "asset_type", rename_all = "snake_case")]
pub enum Asset {
    Native,
    Credit { code: String, issuer: PublicKey },
}

impl Asset {
    pub fn credit(code: &str, issuer: PublicKey) -> Result<Self, BuildError> {
        let valid = !code.is_empty()
            && code.len() <= MAX_ASSET_CODE_LEN
            && code.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(BuildError::InvalidAssetCode(code.to_string()));
        }
        Ok(Self::Credit {
            code: code.to_string(),
            issuer,
        })
    }

    pub fn issuer(&self) -> Option<&PublicKey> {
        match self {
            Asset::Native => None,
            Asset::Credit { issuer, .. } => Some(issuer),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdCategory {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerUpdate {
    pub key: PublicKey,
    pub weight: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOptions {
    pub master_weight: Option<u8>,
    pub low_threshold: Option<u8>,
    pub med_threshold: Option<u8>,
    pub high_threshold: Option<u8>,
    pub signer: Option<SignerUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationBody {
    CreateAccount {
        destination: PublicKey,
        starting_balance: Decimal,
    },
    Payment {
        destination: PublicKey,
        asset: Asset,
        amount: Decimal,
    },
    ChangeTrust {
        asset: Asset,
        limit: Decimal,
    },
    SetOptions(SetOptions),
}

/// A single ledger instruction. Without an explicit source it acts on the
/// transaction's source account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub source: Option<PublicKey>,
    pub body: OperationBody,
}

impl Operation {
    pub fn create_account(destination: PublicKey, starting_balance: Decimal) -> Self {
        OperationBody::CreateAccount {
            destination,
            starting_balance,
        }
        .into()
    }

    pub fn payment(destination: PublicKey, asset: Asset, amount: Decimal) -> Self {
        OperationBody::Payment {
            destination,
            asset,
            amount,
        }
        .into()
    }

    pub fn change_trust(asset: Asset, limit: Decimal) -> Self {
        OperationBody::ChangeTrust { asset, limit }.into()
    }

    pub fn add_signer(key: PublicKey, weight: u8) -> Self {
        OperationBody::SetOptions(SetOptions {
            signer: Some(SignerUpdate { key, weight }),
            ..Default::default()
        })
        .into()
    }

    pub fn set_thresholds(thresholds: &Thresholds) -> Self {
        OperationBody::SetOptions(SetOptions {
            master_weight: Some(thresholds.master_weight),
            low_threshold: Some(thresholds.low),
            med_threshold: Some(thresholds.med),
            high_threshold: Some(thresholds.high),
            signer: None,
        })
        .into()
    }

    pub fn with_source(mut self, source: PublicKey) -> Self {
        self.source = Some(source);
        self
    }

    pub fn threshold_category(&self) -> ThresholdCategory {
        match &self.body {
            OperationBody::SetOptions(opts) => {
                let touches_auth = opts.master_weight.is_some()
                    || opts.low_threshold.is_some()
                    || opts.med_threshold.is_some()
                    || opts.high_threshold.is_some()
                    || opts.signer.is_some();
                if touches_auth {
                    ThresholdCategory::High
                } else {
                    ThresholdCategory::Medium
                }
            }
            _ => ThresholdCategory::Medium,
        }
    }
}

impl From<OperationBody> for Operation {
    fn from(body: OperationBody) -> Self {
        Self { source: None, body }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "memo_type", content = "memo", rename_all = "snake_case")]
pub enum Memo {
    #[default]
    None,
    Text(String),
}

impl Memo {
    pub fn text(text: &str) -> Result<Self, BuildError> {
        if text.len() > MAX_MEMO_TEXT_LEN {
            return Err(BuildError::MemoTooLong(text.len()));
        }
        Ok(Self::Text(text.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionBody {
    pub source: PublicKey,
    pub sequence: i64,
    pub fee: Decimal,
    pub memo: Memo,
    pub operations: Vec<Operation>,
}

impl TransactionBody {
    /// Hash signed by every key authorizing the transaction. Bound to the
    /// network so a transaction cannot be replayed on another one.
    pub fn hash(&self, network_passphrase: &str) -> Result<[u8; 32], BuildError> {
        let network_id = Sha256::digest(network_passphrase.as_bytes());
        let encoded = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(network_id);
        hasher.update(encoded);
        Ok(hasher.finalize().into())
    }
}

#[derive(Debug, Clone)]
pub struct DecoratedSignature {
    pub public_key: PublicKey,
    pub signature: Signature,
}

#[derive(Debug, Clone)]
pub struct Transaction {
    body: TransactionBody,
    hash: [u8; 32],
    signatures: Vec<DecoratedSignature>,
}

impl Transaction {
    pub fn body(&self) -> &TransactionBody {
        &self.body
    }

    pub fn operations(&self) -> &[Operation] {
        &self.body.operations
    }

    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn signatures(&self) -> &[DecoratedSignature] {
        &self.signatures
    }

    pub fn sign(&mut self, keypair: &Keypair) {
        self.signatures.push(DecoratedSignature {
            public_key: keypair.public_key(),
            signature: keypair.sign(&self.hash),
        });
    }
}

/// Ordered list of operations on top of a loaded source account.
/// Operations are kept in insertion order; the ledger applies them the same way.
#[derive(Debug)]
pub struct TransactionBuilder {
    source: PublicKey,
    sequence: i64,
    memo: Memo,
    operations: Vec<Operation>,
}

impl TransactionBuilder {
    pub fn new(source: &AccountEntry) -> Self {
        Self {
            source: source.id,
            sequence: source.sequence + 1,
            memo: Memo::None,
            operations: Vec::new(),
        }
    }

    pub fn add_operation(&mut self, operation: Operation) -> &mut Self {
        self.operations.push(operation);
        self
    }

    pub fn add_memo(&mut self, memo: Memo) -> &mut Self {
        self.memo = memo;
        self
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn build(self, network_passphrase: &str) -> Result<Transaction, BuildError> {
        match self.operations.len() {
            0 => return Err(BuildError::NoOperations),
            n if n > MAX_OPERATIONS => return Err(BuildError::TooManyOperations(n)),
            _ => {}
        }
        let body = TransactionBody {
            source: self.source,
            sequence: self.sequence,
            fee: base_fee() * Decimal::from(self.operations.len()),
            memo: self.memo,
            operations: self.operations,
        };
        let hash = body.hash(network_passphrase)?;
        Ok(Transaction {
            body,
            hash,
            signatures: Vec::new(),
        })
    }
}
