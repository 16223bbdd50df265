//! Metrics surface: gauge names, the injected gauge store, and the
//! Prometheus exporter.

use metrics::Label;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, time::Duration};
use tracing::info;

/// USD price of the monitored token.
pub const TOKEN_PRICE_USD: &str = "token_price_usd";
/// Native balance of a configured wallet, in wei.
pub const WALLET_BALANCE_WEI: &str = "wallet_balance_wei";
/// Active delegator stake, in wei.
pub const STAKING_STAKE_WEI: &str = "staking_stake_wei";
/// Accumulated delegator rewards, in wei.
pub const STAKING_REWARDS_WEI: &str = "staking_rewards_wei";

/// Labeled-gauge store written by the scheduler.
///
/// Writes are idempotent overwrites keyed by (name, label set); no history
/// is retained. The scheduler is the only writer.
pub trait MetricsStore: Send + Sync {
    /// Sets the gauge `name` with `labels` to `value`, replacing any prior
    /// sample for the same key.
    fn set_gauge(&self, name: &'static str, labels: Vec<Label>, value: f64);
}

/// Store backed by the process-wide recorder installed by
/// [`setup_exporter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusStore;

impl MetricsStore for PrometheusStore {
    fn set_gauge(&self, name: &'static str, labels: Vec<Label>, value: f64) {
        metrics::gauge!(name, labels).set(value);
    }
}

/// Builds the Prometheus exporter, installs it as the global recorder, and
/// serves the pull endpoint on `addr`.
///
/// The recorder performs upkeep every 5 seconds.
///
/// # Panics
///
/// Panics if a global metrics recorder is already installed.
pub fn setup_exporter(addr: SocketAddr) -> eyre::Result<()> {
    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .upkeep_timeout(Duration::from_secs(5))
        .build()?;

    metrics::set_global_recorder(recorder).expect("could not set metrics recorder");
    tokio::spawn(exporter);

    info!(%addr, "Started metrics exporter");

    Ok(())
}
