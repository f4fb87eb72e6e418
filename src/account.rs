use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    keypair::PublicKey,
    transaction::{Asset, SetOptions, ThresholdCategory},
    utils::min_account_balance,
};

pub const MAX_SIGNERS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: u8,
    pub med: u8,
    pub high: u8,
    pub master_weight: u8,
}

/// Thresholds of a freshly created account: the master key alone can do anything.
impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: 0,
            med: 0,
            high: 0,
            master_weight: 1,
        }
    }
}

impl Thresholds {
    /// Weight a set of signatures must reach, never less than one signature.
    pub fn required_weight(&self, category: ThresholdCategory) -> u32 {
        let threshold = match category {
            ThresholdCategory::Low => self.low,
            ThresholdCategory::Medium => self.med,
            ThresholdCategory::High => self.high,
        };
        u32::from(threshold).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    pub key: PublicKey,
    pub weight: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balance {
    #[serde(flatten)]
    pub asset: Asset,
    pub balance: Decimal,
    pub limit: Option<Decimal>,
}

/// Snapshot of an account as loaded from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountEntry {
    pub id: PublicKey,
    pub sequence: i64,
    /// Native balance first, then one entry per trust line.
    pub balances: Vec<Balance>,
    /// Master key first, carrying the master weight.
    pub signers: Vec<Signer>,
    pub thresholds: Thresholds,
}

impl AccountEntry {
    pub fn new(id: PublicKey, sequence: i64, native_balance: Decimal) -> Self {
        LedgerAccount::new(id, sequence, native_balance).to_entry()
    }

    pub fn balance_of(&self, asset: &Asset) -> Option<&Balance> {
        self.balances.iter().find(|b| &b.asset == asset)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("Insufficient funds")]
    Underfunded,
    #[error("Source account has no trust line for the asset")]
    SourceNoTrust,
    #[error("Destination account has no trust line for the asset")]
    NoTrust,
    #[error("Trust line limit would be exceeded")]
    LineFull,
    #[error("Trust line limit is below the current balance")]
    InvalidLimit,
    #[error("Malformed operation: {0}")]
    Malformed(&'static str),
    #[error("Account key cannot be added as its own signer")]
    BadSigner,
    #[error("Account already has {MAX_SIGNERS} signers")]
    TooManySigners,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    Debited { asset: Asset, amount: Decimal },
    Credited { asset: Asset, amount: Decimal },
    TrustLineChanged { asset: Asset, limit: Decimal },
    SignerChanged { key: PublicKey, weight: u8 },
    ThresholdsChanged(SetOptions),
    SequenceBumped,
}

#[derive(Debug, Clone, Copy, Default)]
struct TrustLine {
    balance: Decimal,
    limit: Decimal,
}

/// Account state kept by the sandbox ledger.
/// State is modified using events, which are created by handling operations.
#[derive(Debug, Clone)]
pub struct LedgerAccount {
    id: PublicKey,
    sequence: i64,
    native: Decimal,
    trust_lines: BTreeMap<Asset, TrustLine>,
    signers: BTreeMap<PublicKey, u8>,
    thresholds: Thresholds,
}

impl LedgerAccount {
    pub fn new(id: PublicKey, sequence: i64, native: Decimal) -> Self {
        Self {
            id,
            sequence,
            native,
            trust_lines: BTreeMap::new(),
            signers: BTreeMap::new(),
            thresholds: Thresholds::default(),
        }
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    pub fn native_balance(&self) -> Decimal {
        self.native
    }

    pub fn subentries(&self) -> usize {
        self.signers.len() + self.trust_lines.len()
    }

    pub fn min_balance(&self, base_reserve: Decimal) -> Decimal {
        min_account_balance(self.subentries(), base_reserve)
    }

    pub fn signature_weight(&self, signed: &HashSet<PublicKey>) -> u32 {
        let master = if signed.contains(&self.id) {
            u32::from(self.thresholds.master_weight)
        } else {
            0
        };
        self.signers
            .iter()
            .filter(|(key, _)| signed.contains(*key))
            .map(|(_, weight)| u32::from(*weight))
            .sum::<u32>()
            + master
    }

    pub fn authorizes(&self, category: ThresholdCategory, signed: &HashSet<PublicKey>) -> bool {
        self.signature_weight(signed) >= self.thresholds.required_weight(category)
    }

    pub fn apply(&mut self, event: &AccountEvent) {
        match event {
            AccountEvent::Debited { asset, amount } => match asset {
                Asset::Native => self.native -= *amount,
                Asset::Credit { issuer, .. } if *issuer == self.id => {}
                Asset::Credit { .. } => {
                    if let Some(line) = self.trust_lines.get_mut(asset) {
                        line.balance -= *amount;
                    }
                }
            },
            AccountEvent::Credited { asset, amount } => match asset {
                Asset::Native => self.native += *amount,
                Asset::Credit { issuer, .. } if *issuer == self.id => {}
                Asset::Credit { .. } => {
                    if let Some(line) = self.trust_lines.get_mut(asset) {
                        line.balance += *amount;
                    }
                }
            },
            AccountEvent::TrustLineChanged { asset, limit } => {
                if limit.is_zero() {
                    self.trust_lines.remove(asset);
                } else {
                    self.trust_lines.entry(asset.clone()).or_default().limit = *limit;
                }
            }
            AccountEvent::SignerChanged { key, weight } => {
                if *weight == 0 {
                    self.signers.remove(key);
                } else {
                    self.signers.insert(*key, *weight);
                }
            }
            AccountEvent::ThresholdsChanged(opts) => {
                if let Some(w) = opts.master_weight {
                    self.thresholds.master_weight = w;
                }
                if let Some(t) = opts.low_threshold {
                    self.thresholds.low = t;
                }
                if let Some(t) = opts.med_threshold {
                    self.thresholds.med = t;
                }
                if let Some(t) = opts.high_threshold {
                    self.thresholds.high = t;
                }
            }
            AccountEvent::SequenceBumped => {
                self.sequence += 1;
            }
        }
    }

    pub fn handle_debit(
        &self,
        asset: &Asset,
        amount: Decimal,
        base_reserve: Decimal,
    ) -> Result<AccountEvent, AccountError> {
        if amount <= Decimal::ZERO {
            return Err(AccountError::Malformed("amount must be positive"));
        }
        match asset {
            Asset::Native => {
                if self.native - amount < self.min_balance(base_reserve) {
                    return Err(AccountError::Underfunded);
                }
            }
            // issuers mint their own asset
            Asset::Credit { issuer, .. } if *issuer == self.id => {}
            Asset::Credit { .. } => {
                let line = self
                    .trust_lines
                    .get(asset)
                    .ok_or(AccountError::SourceNoTrust)?;
                if line.balance < amount {
                    return Err(AccountError::Underfunded);
                }
            }
        }
        Ok(AccountEvent::Debited {
            asset: asset.clone(),
            amount,
        })
    }

    pub fn handle_credit(
        &self,
        asset: &Asset,
        amount: Decimal,
    ) -> Result<AccountEvent, AccountError> {
        match asset {
            Asset::Native => {
                self.native
                    .checked_add(amount)
                    .ok_or(AccountError::LineFull)?;
            }
            Asset::Credit { issuer, .. } if *issuer == self.id => {}
            Asset::Credit { .. } => {
                let line = self.trust_lines.get(asset).ok_or(AccountError::NoTrust)?;
                match line.balance.checked_add(amount) {
                    Some(total) if total <= line.limit => {}
                    _ => return Err(AccountError::LineFull),
                }
            }
        }
        Ok(AccountEvent::Credited {
            asset: asset.clone(),
            amount,
        })
    }

    pub fn handle_change_trust(
        &self,
        asset: &Asset,
        limit: Decimal,
    ) -> Result<AccountEvent, AccountError> {
        match asset {
            Asset::Native => return Err(AccountError::Malformed("native asset needs no trust")),
            Asset::Credit { issuer, .. } if *issuer == self.id => {
                return Err(AccountError::Malformed("issuer cannot trust its own asset"));
            }
            Asset::Credit { .. } => {}
        }
        if limit < Decimal::ZERO {
            return Err(AccountError::Malformed("limit must not be negative"));
        }
        let balance = self
            .trust_lines
            .get(asset)
            .map(|line| line.balance)
            .unwrap_or_default();
        if limit < balance {
            return Err(AccountError::InvalidLimit);
        }
        Ok(AccountEvent::TrustLineChanged {
            asset: asset.clone(),
            limit,
        })
    }

    pub fn handle_set_options(&self, opts: &SetOptions) -> Result<Vec<AccountEvent>, AccountError> {
        let mut events = Vec::new();
        if let Some(signer) = opts.signer {
            if signer.key == self.id {
                return Err(AccountError::BadSigner);
            }
            let is_new = !self.signers.contains_key(&signer.key);
            if is_new && signer.weight > 0 && self.signers.len() >= MAX_SIGNERS {
                return Err(AccountError::TooManySigners);
            }
            events.push(AccountEvent::SignerChanged {
                key: signer.key,
                weight: signer.weight,
            });
        }
        let changes_thresholds = opts.master_weight.is_some()
            || opts.low_threshold.is_some()
            || opts.med_threshold.is_some()
            || opts.high_threshold.is_some();
        if changes_thresholds {
            events.push(AccountEvent::ThresholdsChanged(SetOptions {
                signer: None,
                ..opts.clone()
            }));
        }
        Ok(events)
    }

    pub fn to_entry(&self) -> AccountEntry {
        let native = Balance {
            asset: Asset::Native,
            balance: self.native,
            limit: None,
        };
        let lines = self.trust_lines.iter().map(|(asset, line)| Balance {
            asset: asset.clone(),
            balance: line.balance,
            limit: Some(line.limit),
        });
        let master = Signer {
            key: self.id,
            weight: self.thresholds.master_weight,
        };
        let signers = self
            .signers
            .iter()
            .map(|(key, weight)| Signer {
                key: *key,
                weight: *weight,
            });
        AccountEntry {
            id: self.id,
            sequence: self.sequence,
            balances: std::iter::once(native).chain(lines).collect(),
            signers: std::iter::once(master).chain(signers).collect(),
            thresholds: self.thresholds,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{keypair::Keypair, transaction::SignerUpdate};

    use super::*;

    fn account() -> LedgerAccount {
        LedgerAccount::new(Keypair::random().public_key(), 0, Decimal::from(10))
    }

    fn token(issuer: PublicKey) -> Asset {
        Asset::credit("FOO", issuer).unwrap()
    }

    #[test]
    fn apply_events() {
        let mut acc = account();
        let issuer = Keypair::random().public_key();
        let foo = token(issuer);

        acc.apply(&AccountEvent::Debited {
            asset: Asset::Native,
            amount: Decimal::from(3),
        });
        assert_eq!(acc.native_balance(), Decimal::from(7));

        acc.apply(&AccountEvent::TrustLineChanged {
            asset: foo.clone(),
            limit: Decimal::from(100),
        });
        acc.apply(&AccountEvent::Credited {
            asset: foo.clone(),
            amount: Decimal::from(40),
        });
        let entry = acc.to_entry();
        let line = entry.balance_of(&foo).unwrap();
        assert_eq!(line.balance, Decimal::from(40));
        assert_eq!(line.limit, Some(Decimal::from(100)));
        assert_eq!(acc.subentries(), 1);

        let member = Keypair::random().public_key();
        acc.apply(&AccountEvent::SignerChanged {
            key: member,
            weight: 2,
        });
        assert_eq!(acc.subentries(), 2);
        // removing a signer is a weight of zero
        acc.apply(&AccountEvent::SignerChanged {
            key: member,
            weight: 0,
        });
        assert_eq!(acc.subentries(), 1);

        acc.apply(&AccountEvent::SequenceBumped);
        assert_eq!(acc.sequence(), 1);
    }

    #[test]
    fn verify_min_balance() {
        let mut acc = account();
        let base_reserve = Decimal::new(5, 1);
        assert_eq!(acc.min_balance(base_reserve), Decimal::from(1));
        acc.apply(&AccountEvent::SignerChanged {
            key: Keypair::random().public_key(),
            weight: 1,
        });
        assert_eq!(acc.min_balance(base_reserve), Decimal::new(15, 1));
    }

    #[test]
    fn handle_debit() {
        let acc = account();
        let base_reserve = Decimal::new(5, 1);

        let evt = acc
            .handle_debit(&Asset::Native, Decimal::from(9), base_reserve)
            .unwrap();
        assert!(matches!(evt, AccountEvent::Debited { .. }));

        // would leave the account below its reserve
        let err = acc
            .handle_debit(&Asset::Native, Decimal::new(95, 1), base_reserve)
            .unwrap_err();
        assert_eq!(err, AccountError::Underfunded);

        let foreign = token(Keypair::random().public_key());
        let err = acc
            .handle_debit(&foreign, Decimal::ONE, base_reserve)
            .unwrap_err();
        assert_eq!(err, AccountError::SourceNoTrust);

        // issuer has unlimited supply of its own asset
        let own = token(acc.id);
        assert!(
            acc.handle_debit(&own, Decimal::from(1_000_000), base_reserve)
                .is_ok()
        );
    }

    #[test]
    fn handle_credit() {
        let mut acc = account();
        let foo = token(Keypair::random().public_key());

        let err = acc.handle_credit(&foo, Decimal::ONE).unwrap_err();
        assert_eq!(err, AccountError::NoTrust);

        let evt = acc.handle_change_trust(&foo, Decimal::from(10)).unwrap();
        acc.apply(&evt);
        let evt = acc.handle_credit(&foo, Decimal::from(10)).unwrap();
        acc.apply(&evt);

        let err = acc.handle_credit(&foo, Decimal::ONE).unwrap_err();
        assert_eq!(err, AccountError::LineFull);
    }

    #[test]
    fn credit_overflow_is_line_full() {
        let mut acc = account();
        let foo = token(Keypair::random().public_key());
        let evt = acc.handle_change_trust(&foo, Decimal::MAX).unwrap();
        acc.apply(&evt);
        let evt = acc.handle_credit(&foo, Decimal::MAX).unwrap();
        acc.apply(&evt);

        let err = acc.handle_credit(&foo, Decimal::ONE).unwrap_err();
        assert_eq!(err, AccountError::LineFull);
        let err = acc.handle_credit(&Asset::Native, Decimal::MAX).unwrap_err();
        assert_eq!(err, AccountError::LineFull);
    }

    #[test]
    fn handle_change_trust() {
        let mut acc = account();
        let foo = token(Keypair::random().public_key());

        let err = acc
            .handle_change_trust(&Asset::Native, Decimal::ONE)
            .unwrap_err();
        assert!(matches!(err, AccountError::Malformed(_)));

        let err = acc
            .handle_change_trust(&token(acc.id), Decimal::ONE)
            .unwrap_err();
        assert!(matches!(err, AccountError::Malformed(_)));

        acc.apply(&acc.handle_change_trust(&foo, Decimal::from(10)).unwrap());
        acc.apply(&acc.handle_credit(&foo, Decimal::from(5)).unwrap());
        let err = acc.handle_change_trust(&foo, Decimal::from(4)).unwrap_err();
        assert_eq!(err, AccountError::InvalidLimit);
    }

    #[test]
    fn handle_set_options() {
        let acc = account();
        let member = Keypair::random().public_key();

        let events = acc
            .handle_set_options(&SetOptions {
                master_weight: Some(1),
                high_threshold: Some(2),
                signer: Some(SignerUpdate {
                    key: member,
                    weight: 1,
                }),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            AccountEvent::SignerChanged {
                key: member,
                weight: 1
            }
        );

        let err = acc
            .handle_set_options(&SetOptions {
                signer: Some(SignerUpdate {
                    key: acc.id,
                    weight: 1,
                }),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, AccountError::BadSigner);
    }

    #[test]
    fn signer_limit() {
        let mut acc = account();
        for _ in 0..MAX_SIGNERS {
            acc.apply(&AccountEvent::SignerChanged {
                key: Keypair::random().public_key(),
                weight: 1,
            });
        }
        let err = acc
            .handle_set_options(&SetOptions {
                signer: Some(SignerUpdate {
                    key: Keypair::random().public_key(),
                    weight: 1,
                }),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, AccountError::TooManySigners);
    }

    #[test]
    fn signature_weight_and_authorization() {
        let owner = Keypair::random();
        let member = Keypair::random();
        let mut acc = LedgerAccount::new(owner.public_key(), 0, Decimal::from(10));
        acc.apply(&AccountEvent::SignerChanged {
            key: member.public_key(),
            weight: 1,
        });
        acc.apply(&AccountEvent::ThresholdsChanged(SetOptions {
            master_weight: Some(1),
            low_threshold: Some(0),
            med_threshold: Some(1),
            high_threshold: Some(2),
            signer: None,
        }));

        let only_member = HashSet::from([member.public_key()]);
        let both = HashSet::from([member.public_key(), owner.public_key()]);
        assert_eq!(acc.signature_weight(&only_member), 1);
        assert_eq!(acc.signature_weight(&both), 2);
        assert!(acc.authorizes(ThresholdCategory::Medium, &only_member));
        assert!(!acc.authorizes(ThresholdCategory::High, &only_member));
        assert!(acc.authorizes(ThresholdCategory::High, &both));
        assert!(!acc.authorizes(ThresholdCategory::Low, &HashSet::new()));

        let entry = acc.to_entry();
        assert_eq!(entry.signers[0].key, owner.public_key());
        assert_eq!(entry.signers.len(), 2);
        assert_eq!(entry.thresholds.high, 2);
    }
}
