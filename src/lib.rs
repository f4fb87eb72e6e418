/// Account state on the sandbox ledger: balances, trust lines, signers and
/// thresholds. State is modified using events, which are created by handling
/// operations.
pub mod account;

/// Ed25519 keys. Public keys double as account ids.
pub mod keypair;

/// Transaction model, builder and signing.
pub mod transaction;

/// Ledger interface, plus "in memory" sandbox implementation.
///
/// NOTE: contracts only talk to the [`ledger::Ledger`] trait, so a network
/// backed implementation can replace the sandbox.
pub mod ledger;

/// Account existence check, reserve math and small shared helpers.
pub mod utils;

/// Errors returned by the contract builders.
pub mod error;

/// Submits transactions and turns the outcome into receipts.
pub mod receipt;

/// Multisig contract recipes and the factory binding them to a ledger.
pub mod contracts;

/// Network presets selected from the environment.
pub mod config;

/// Ideally, this module should exists on its own crate, as a way to
/// bootstrap contracts from a binary. However, I want to use it for
/// integration test so I put it here.
pub mod bin_utils;
