use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NETWORK_VAR: &str = "STELLAR_NETWORK";
pub const HORIZON_URL_VAR: &str = "HORIZON_URL";
pub const BASE_RESERVE_VAR: &str = "STELLAR_BASE_RESERVE";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown network `{0}`, expected one of: public, test, local")]
    UnknownNetwork(String),
    #[error("Invalid base reserve `{0}`")]
    InvalidBaseReserve(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Public,
    #[default]
    Test,
    Local,
}

impl Network {
    pub fn horizon_url(self) -> &'static str {
        match self {
            Network::Public => "https://horizon.stellar.org",
            Network::Test => "https://horizon-testnet.stellar.org",
            Network::Local => "http://localhost:8000",
        }
    }

    pub fn passphrase(self) -> &'static str {
        match self {
            Network::Public => "Public Global Stellar Network ; September 2015",
            Network::Test => "Test SDF Network ; September 2015",
            Network::Local => "Standalone Network ; February 2017",
        }
    }

    pub fn allow_http(self) -> bool {
        matches!(self, Network::Local)
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Network::Public),
            "test" => Ok(Network::Test),
            "local" => Ok(Network::Local),
            _ => Err(ConfigError::UnknownNetwork(s.to_string())),
        }
    }
}

/// Where transactions go and which network they are signed for.
///
/// `horizon_url` and `allow_http` are meant for a network backed
/// implementation of [`crate::ledger::Ledger`]; the sandbox only needs the
/// passphrase and the base reserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkConfig {
    pub network: Network,
    pub horizon_url: String,
    pub passphrase: String,
    pub allow_http: bool,
    pub base_reserve: Decimal,
}

impl From<Network> for NetworkConfig {
    fn from(network: Network) -> Self {
        Self {
            network,
            horizon_url: network.horizon_url().to_string(),
            passphrase: network.passphrase().to_string(),
            allow_http: network.allow_http(),
            base_reserve: default_base_reserve(),
        }
    }
}

fn default_base_reserve() -> Decimal {
    Decimal::new(5, 1)
}

impl NetworkConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`NetworkConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network = match lookup(NETWORK_VAR) {
            Some(name) => name.parse()?,
            None => Network::default(),
        };
        let mut config = NetworkConfig::from(network);
        if let Some(url) = lookup(HORIZON_URL_VAR) {
            config.horizon_url = url;
        }
        if let Some(reserve) = lookup(BASE_RESERVE_VAR) {
            config.base_reserve = reserve
                .trim()
                .parse::<Decimal>()
                .ok()
                .filter(|r| *r > Decimal::ZERO)
                .ok_or(ConfigError::InvalidBaseReserve(reserve))?;
        }
        Ok(config)
    }
}
