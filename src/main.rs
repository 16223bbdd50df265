//! # Staking Exporter
//!
//! A service that samples a token's USD price, wallet balances, and delegator
//! staking positions, and republishes them as Prometheus gauges.
use alloy::providers::ProviderBuilder;
use clap::Parser;
use staking_exporter::{
    chain::RpcChainClient,
    config::ExporterConfig,
    metrics::{PrometheusStore, setup_exporter},
    price::CoinMarketCap,
    scheduler::{Intervals, Scheduler},
};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use url::Url;

/// The staking exporter samples on-chain and off-chain state and republishes
/// it as pull-based metrics.
#[derive(Debug, Parser)]
#[command(author, about = "Staking exporter", long_about = None)]
struct Args {
    /// The configuration file listing wallets and the staking contract.
    #[arg(long, value_name = "CONFIG", env = "EXPORTER_CONFIG", default_value = "exporter.yaml")]
    config: PathBuf,
    /// The address to serve the metrics endpoint on.
    #[arg(long = "metrics.addr", value_name = "ADDR", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    metrics_addr: IpAddr,
    /// The port to serve the metrics endpoint on.
    #[arg(long = "metrics.port", value_name = "PORT", default_value_t = 9101)]
    metrics_port: u16,
    /// The RPC endpoint of the chain.
    ///
    /// Must be a valid HTTP or HTTPS URL pointing to a JSON-RPC endpoint.
    #[arg(long, value_name = "RPC_ENDPOINT")]
    rpc_url: Url,
    /// The CoinMarketCap API key.
    #[arg(long, value_name = "API_KEY", env = "CMC_API_KEY", hide_env_values = true)]
    api_key: String,
    /// The token symbol to quote in USD.
    #[arg(long, value_name = "SYMBOL", default_value = "MON")]
    symbol: String,
    /// How often to refresh the token price.
    #[arg(long, value_name = "SECONDS", value_parser = parse_interval_secs, default_value = "300")]
    price_interval: Duration,
    /// How often to refresh wallet balances.
    #[arg(long, value_name = "SECONDS", value_parser = parse_interval_secs, default_value = "120")]
    balance_interval: Duration,
    /// How often to refresh staking positions.
    #[arg(long, value_name = "SECONDS", value_parser = parse_interval_secs, default_value = "60")]
    staking_interval: Duration,
}

impl Args {
    /// Run the exporter service.
    async fn run(self) -> eyre::Result<()> {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();

        let config = ExporterConfig::load(&self.config)?;

        let metrics_addr = SocketAddr::new(self.metrics_addr, self.metrics_port);
        setup_exporter(metrics_addr)?;
        info!("Metrics url: http://{metrics_addr}/metrics");

        let provider = ProviderBuilder::new().connect_http(self.rpc_url);
        let price = CoinMarketCap::new(self.api_key, self.symbol)?;

        let scheduler = Scheduler::new(
            RpcChainClient::new(provider),
            price,
            PrometheusStore,
            config,
            Intervals {
                price: self.price_interval,
                balance: self.balance_interval,
                staking: self.staking_interval,
            },
        );

        tokio::select! {
            _ = scheduler.run() => {}
            _ = tokio::signal::ctrl_c() => info!("Shutting down"),
        }

        Ok(())
    }
}

/// Parses a string representing whole, non-zero seconds to a [`Duration`].
fn parse_interval_secs(arg: &str) -> Result<Duration, String> {
    let seconds: u64 = arg.parse().map_err(|err| format!("{err}"))?;
    if seconds == 0 {
        return Err("interval must be at least one second".to_string());
    }
    Ok(Duration::from_secs(seconds))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(err) = args.run().await {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
