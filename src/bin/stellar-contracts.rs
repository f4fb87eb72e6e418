use std::fs::File;

use anyhow::{Context, Result};
use stellar_contracts::{bin_utils::Service, config::NetworkConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let accounts_file = args
        .next()
        .context("Expected an accounts CSV file as the first argument")?;
    let request_file = args
        .next()
        .context("Expected a contract request JSON file as the second argument")?;
    let accounts = File::open(&accounts_file)
        .with_context(|| format!("Failed to open `{accounts_file}`"))?;
    let request =
        File::open(&request_file).with_context(|| format!("Failed to open `{request_file}`"))?;

    let service = Service {
        accounts,
        request,
        output: &mut std::io::stdout(),
        config: NetworkConfig::from_env().context("Invalid network configuration")?,
    };
    service.run().await
}
