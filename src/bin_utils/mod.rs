//! Bootstraps [`crate::contracts`] on a sandbox ledger for the binary and the
//! integration tests.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    config::NetworkConfig,
    contracts::{ContractRequest, Contracts},
    keypair::Keypair,
    ledger::in_memory_ledger::InMemoryLedger,
};
use csv_parser::CsvAccountParser;
pub mod csv_parser;

pub struct Service<'w, A, R, W: 'w> {
    /// Genesis accounts, CSV with `secret,balance` columns.
    pub accounts: A,
    /// One JSON encoded [`ContractRequest`].
    pub request: R,
    pub output: &'w mut W,
    pub config: NetworkConfig,
}

impl<'w, A, R, W> Service<'w, A, R, W>
where
    A: Read,
    R: Read,
    W: Write + 'w,
{
    pub async fn run(self) -> Result<()> {
        let ledger =
            InMemoryLedger::new(self.config.passphrase.as_str(), self.config.base_reserve);
        for (line, row) in CsvAccountParser::new(self.accounts) {
            let row = row.with_context(|| format!("Invalid account at line {line}"))?;
            let keypair = Keypair::from_secret(&row.secret)
                .with_context(|| format!("Invalid secret at line {line}"))?;
            debug!(
                account = %keypair.public_key(),
                balance = %row.balance,
                "Funding genesis account"
            );
            ledger.fund(keypair.public_key(), row.balance);
        }

        let request: ContractRequest =
            serde_json::from_reader(self.request).context("Failed to parse contract request")?;
        info!(network = ?self.config.network, "Running contract request");
        let receipt = Contracts::new(ledger)
            .create(request)
            .await
            .context("Contract creation failed")?;

        serde_json::to_writer_pretty(&mut *self.output, &receipt)
            .context("Failed to write receipt")?;
        writeln!(self.output).context("Failed to write receipt")?;
        Ok(())
    }
}
