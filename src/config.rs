//! Exporter configuration.

use alloy::primitives::Address;
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path};
use tracing::warn;

/// A wallet monitored by the balance and staking cadences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTarget {
    /// Wallet address. Accepts any casing, with or without the `0x` prefix;
    /// metric labels always use the checksummed form.
    pub address: Address,
    /// Free-form label attached to this wallet's metric series.
    #[serde(default)]
    pub tag: String,
}

/// Exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Wallets to monitor, processed in this order each cycle.
    #[serde(default)]
    pub wallets: Vec<WalletTarget>,
    /// Address of the staking contract.
    pub staking_contract: Address,
    /// Validator the monitored wallets delegate to.
    pub validator_id: u64,
}

impl ExporterConfig {
    /// Loads the configuration from a YAML file.
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open config file {}", path.display()))?;
        let config: Self = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file {}", path.display()))?;

        if config.wallets.is_empty() {
            warn!("No wallets configured; only the price cadence will produce samples");
        }

        Ok(config)
    }
}
