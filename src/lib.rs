//! # Staking Exporter
//!
//! Periodically samples a token's USD price, native wallet balances, and
//! delegator staking positions on a proof-of-stake contract, and republishes
//! them as Prometheus gauges over a pull endpoint.

pub mod chain;
pub mod config;
pub mod error;
pub mod metrics;
pub mod price;
pub mod scheduler;
pub mod staking;
