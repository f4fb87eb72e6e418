use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    error::ContractError,
    keypair::{Keypair, PublicKey},
    ledger::{Ledger, LedgerError},
    transaction::Memo,
};

/// Memo attached to every transaction built by the contract builders.
pub const STAMP_MEMO: &str = "stellar-contracts";

/// Returns `false` when the ledger reports the account as missing; any other
/// load failure is returned unchanged.
pub async fn account_exists<L>(ledger: &L, id: &PublicKey) -> Result<bool, LedgerError>
where
    L: Ledger + ?Sized,
{
    match ledger.load_account(id).await {
        Ok(_) => Ok(true),
        Err(LedgerError::NotFound { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}

pub async fn fetch_base_reserve<L>(ledger: &L) -> Result<Decimal, ContractError>
where
    L: Ledger + ?Sized,
{
    Ok(ledger.fetch_base_reserve().await?)
}

/// Minimum balance of an account holding `num_entries` subentries
/// (signers, trust lines, ...): two base reserves for the account itself
/// plus one per entry.
pub fn min_account_balance(num_entries: usize, base_reserve: Decimal) -> Decimal {
    Decimal::from(2 + num_entries) * base_reserve
}

pub fn stamp_memo() -> Memo {
    Memo::Text(STAMP_MEMO.to_string())
}

/// Keypair in the shape handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeypairReadable {
    pub public_key: PublicKey,
    pub secret: String,
}

pub fn keypair_readable(keypair: &Keypair) -> KeypairReadable {
    KeypairReadable {
        public_key: keypair.public_key(),
        secret: keypair.secret(),
    }
}

#[cfg(test)]
mod tests {
    use crate::{ledger::in_memory_ledger::InMemoryLedger, transaction::MAX_MEMO_TEXT_LEN};

    use super::*;

    #[test]
    fn minimum_balance() {
        assert_eq!(
            min_account_balance(3, Decimal::new(5, 1)),
            Decimal::new(25, 1)
        );
        assert_eq!(
            min_account_balance(0, Decimal::new(5, 1)),
            Decimal::from(1)
        );
    }

    #[test]
    fn stamp_fits_in_a_memo() {
        assert!(STAMP_MEMO.len() <= MAX_MEMO_TEXT_LEN);
        assert_eq!(Memo::text(STAMP_MEMO).unwrap(), stamp_memo());
    }

    #[tokio::test]
    async fn account_exists_maps_not_found() {
        let ledger = InMemoryLedger::new("Sandbox Network", Decimal::new(5, 1));
        let present = Keypair::random().public_key();
        ledger.fund(present, Decimal::from(10));

        assert!(account_exists(&ledger, &present).await.unwrap());
        assert!(
            !account_exists(&ledger, &Keypair::random().public_key())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn account_exists_propagates_other_errors() {
        let ledger = InMemoryLedger::new("Sandbox Network", Decimal::new(5, 1));
        let id = Keypair::random().public_key();
        ledger.set_unreachable(id);

        let err = account_exists(&ledger, &id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
    }

    #[tokio::test]
    async fn base_reserve_comes_from_the_ledger() {
        let ledger = InMemoryLedger::new("Sandbox Network", Decimal::new(5, 1));
        assert_eq!(
            fetch_base_reserve(&ledger).await.unwrap(),
            Decimal::new(5, 1)
        );
    }
}
