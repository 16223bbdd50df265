//! Multi-cadence polling scheduler.
//!
//! Drives three independent refresh cycles (price, balance, staking) off a
//! single coarse tick, isolating failures per cadence and per wallet. A
//! cadence reschedules from its dispatch time, so a slow cycle lengthens the
//! effective interval instead of producing a catch-up burst.

use crate::{
    chain::ChainClient,
    config::{ExporterConfig, WalletTarget},
    metrics::{
        MetricsStore, STAKING_REWARDS_WEI, STAKING_STAKE_WEI, TOKEN_PRICE_USD, WALLET_BALANCE_WEI,
    },
    price::PriceSource,
    staking::DelegatorReader,
};
use metrics::Label;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info};

/// Granularity of the scheduler's due-time checks. Finer than any valid
/// cadence interval.
pub const TICK: Duration = Duration::from_secs(1);

/// Refresh intervals for the three cadences, in whole seconds.
#[derive(Debug, Clone, Copy)]
pub struct Intervals {
    /// Token price refresh interval.
    pub price: Duration,
    /// Wallet balance refresh interval.
    pub balance: Duration,
    /// Staking position refresh interval.
    pub staking: Duration,
}

/// Due-time state of one cadence.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    /// Time between dispatches.
    interval: Duration,
    /// Next instant at which the cadence should dispatch.
    next_due: Instant,
}

impl Cadence {
    /// Creates a cadence that is due immediately.
    pub const fn new(interval: Duration, now: Instant) -> Self {
        Self { interval, next_due: now }
    }

    /// Whether the cadence should dispatch at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Advances the due time by one interval from the dispatch instant,
    /// regardless of the dispatched cycle's outcome.
    pub fn advance(&mut self, dispatched_at: Instant) {
        self.next_due = dispatched_at + self.interval;
    }
}

/// Drives the three refresh cadences against the injected metrics store.
#[derive(Debug)]
pub struct Scheduler<C, P, M> {
    /// Chain access for balances and staking reads.
    chain: C,
    /// USD price source.
    price: P,
    /// Gauge store; every write is a synchronous last-write-wins overwrite.
    store: M,
    /// Wallets in configuration order.
    wallets: Vec<WalletTarget>,
    /// Delegator query parameters shared by all wallets.
    reader: DelegatorReader,
    price_cadence: Cadence,
    balance_cadence: Cadence,
    staking_cadence: Cadence,
}

impl<C, P, M> Scheduler<C, P, M>
where
    C: ChainClient,
    P: PriceSource,
    M: MetricsStore,
{
    /// Creates a scheduler with all three cadences due immediately.
    pub fn new(chain: C, price: P, store: M, config: ExporterConfig, intervals: Intervals) -> Self {
        let now = Instant::now();
        Self {
            chain,
            price,
            store,
            wallets: config.wallets,
            reader: DelegatorReader::new(config.staking_contract, config.validator_id),
            price_cadence: Cadence::new(intervals.price, now),
            balance_cadence: Cadence::new(intervals.balance, now),
            staking_cadence: Cadence::new(intervals.staking, now),
        }
    }

    /// Runs the polling loop until the enclosing task is dropped.
    ///
    /// Each tick reads the clock once and dispatches every cadence that is
    /// due. Cycles run to completion before the next due-time check; a
    /// cadence's next due time is taken from the tick that dispatched it.
    pub async fn run(mut self) {
        let mut tick = time::interval(TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            let now = Instant::now();

            if self.price_cadence.is_due(now) {
                self.run_price_cycle().await;
                self.price_cadence.advance(now);
            }
            if self.balance_cadence.is_due(now) {
                self.run_balance_cycle().await;
                self.balance_cadence.advance(now);
            }
            if self.staking_cadence.is_due(now) {
                self.run_staking_cycle().await;
                self.staking_cadence.advance(now);
            }
        }
    }

    /// One price cycle: a single fetch. The gauge keeps its last value on
    /// failure.
    pub async fn run_price_cycle(&self) {
        match self.price.fetch_usd().await {
            Ok(price) => {
                self.store.set_gauge(TOKEN_PRICE_USD, vec![Label::new("source", "cmc")], price);
                info!(price, "Updated token price");
            }
            Err(err) => error!(%err, "Price update failed"),
        }
    }

    /// One balance cycle over all wallets, in configuration order. A failing
    /// wallet is logged and skipped; the rest of the cycle proceeds and the
    /// failed wallet's gauge keeps its last value.
    pub async fn run_balance_cycle(&self) {
        for wallet in &self.wallets {
            match self.chain.native_balance(wallet.address).await {
                Ok(balance) => {
                    self.store.set_gauge(
                        WALLET_BALANCE_WEI,
                        wallet_labels(wallet),
                        f64::from(balance),
                    );
                    info!(tag = %wallet.tag, address = %wallet.address, "Updated balance");
                }
                Err(err) => {
                    error!(%err, tag = %wallet.tag, address = %wallet.address, "Balance update failed");
                }
            }
        }
    }

    /// One staking cycle over all wallets: two gauges per wallet on success,
    /// with per-wallet isolation identical to the balance cycle.
    pub async fn run_staking_cycle(&self) {
        for wallet in &self.wallets {
            match self.reader.fetch(&self.chain, wallet.address).await {
                Ok(record) => {
                    let labels = staking_labels(wallet, self.reader.validator_id);
                    self.store.set_gauge(
                        STAKING_STAKE_WEI,
                        labels.clone(),
                        f64::from(record.stake),
                    );
                    self.store.set_gauge(
                        STAKING_REWARDS_WEI,
                        labels,
                        f64::from(record.total_rewards),
                    );
                    info!(tag = %wallet.tag, address = %wallet.address, "Updated staking position");
                }
                Err(err) => {
                    error!(%err, tag = %wallet.tag, address = %wallet.address, "Staking update failed");
                }
            }
        }
    }
}

/// Labels shared by the balance series: checksummed address and tag.
fn wallet_labels(wallet: &WalletTarget) -> Vec<Label> {
    vec![
        Label::new("address", wallet.address.to_checksum(None)),
        Label::new("tag", wallet.tag.clone()),
    ]
}

/// Labels for the staking series: the wallet labels plus the validator id in
/// decimal form.
fn staking_labels(wallet: &WalletTarget, validator_id: u64) -> Vec<Label> {
    let mut labels = wallet_labels(wallet);
    labels.push(Label::new("validator_id", validator_id.to_string()));
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ExporterError,
        staking::{DELEGATOR_RESULT_LEN, GET_DELEGATOR_SELECTOR},
    };
    use alloy::{
        primitives::{Address, Bytes, U256, address},
        sol_types::SolValue,
        transports::TransportErrorKind,
    };
    use std::{
        collections::{HashMap, HashSet},
        sync::{Arc, Mutex},
    };

    const HOT: Address = address!("00000000219ab540356cBB839Cbe05303d7705Fa");
    const COLD: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");
    const WARM: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const CONTRACT: Address = address!("0000000000000000000000000000000000001000");

    /// Gauge store that records every write, newest last.
    #[derive(Debug, Clone, Default)]
    struct RecordingStore {
        samples: Arc<Mutex<Vec<(&'static str, Vec<Label>, f64)>>>,
    }

    impl RecordingStore {
        /// Last-write-wins value for the series carrying the given label.
        fn value(&self, name: &str, label: (&str, &str)) -> Option<f64> {
            self.samples
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(n, labels, _)| {
                    *n == name
                        && labels.iter().any(|l| l.key() == label.0 && l.value() == label.1)
                })
                .map(|(_, _, value)| *value)
        }

        fn count(&self, name: &str) -> usize {
            self.samples.lock().unwrap().iter().filter(|(n, _, _)| *n == name).count()
        }
    }

    impl MetricsStore for RecordingStore {
        fn set_gauge(&self, name: &'static str, labels: Vec<Label>, value: f64) {
            self.samples.lock().unwrap().push((name, labels, value));
        }
    }

    /// In-memory chain: balances and delegator records per address, with a
    /// set of addresses whose queries fail.
    #[derive(Debug, Default)]
    struct MockChain {
        balances: HashMap<Address, U256>,
        stakes: HashMap<Address, (U256, U256)>,
        failing: HashSet<Address>,
    }

    impl ChainClient for MockChain {
        async fn call_contract(
            &self,
            to: Address,
            calldata: Bytes,
        ) -> Result<Bytes, ExporterError> {
            assert_eq!(to, CONTRACT);
            assert_eq!(&calldata[..4], &GET_DELEGATOR_SELECTOR);
            // Delegator address is the tail of the second argument word.
            let delegator = Address::from_slice(&calldata[4 + 32 + 12..]);

            if self.failing.contains(&delegator) {
                return Err(TransportErrorKind::custom_str("node unavailable").into());
            }

            let (stake, rewards) = self.stakes[&delegator];
            let encoded = (stake, U256::ZERO, rewards, U256::ZERO, U256::ZERO, 0u64, 0u64)
                .abi_encode_params();
            assert_eq!(encoded.len(), DELEGATOR_RESULT_LEN);
            Ok(encoded.into())
        }

        async fn native_balance(&self, address: Address) -> Result<U256, ExporterError> {
            if self.failing.contains(&address) {
                return Err(TransportErrorKind::custom_str("node unavailable").into());
            }
            Ok(self.balances[&address])
        }
    }

    #[derive(Debug, Clone, Copy)]
    struct FixedPrice(f64);

    impl PriceSource for FixedPrice {
        async fn fetch_usd(&self) -> Result<f64, ExporterError> {
            Ok(self.0)
        }
    }

    #[derive(Debug, Clone, Copy)]
    struct FailingPrice;

    impl PriceSource for FailingPrice {
        async fn fetch_usd(&self) -> Result<f64, ExporterError> {
            Err(crate::error::UpstreamError::MissingQuote("MON".to_string()).into())
        }
    }

    fn wallet(address: Address, tag: &str) -> WalletTarget {
        WalletTarget { address, tag: tag.to_string() }
    }

    fn config(wallets: Vec<WalletTarget>) -> ExporterConfig {
        ExporterConfig { wallets, staking_contract: CONTRACT, validator_id: 42 }
    }

    fn intervals() -> Intervals {
        Intervals {
            price: Duration::from_secs(300),
            balance: Duration::from_secs(120),
            staking: Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cadence_advances_from_dispatch_time() {
        let start = Instant::now();
        let mut cadence = Cadence::new(Duration::from_secs(60), start);
        assert!(cadence.is_due(start));

        cadence.advance(start);
        assert!(!cadence.is_due(start + Duration::from_secs(59)));
        assert!(cadence.is_due(start + Duration::from_secs(60)));

        // A late dispatch reschedules from the tick that triggered it, not
        // from the previous due time.
        let late = start + Duration::from_secs(75);
        cadence.advance(late);
        assert!(!cadence.is_due(start + Duration::from_secs(120)));
        assert!(cadence.is_due(late + Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn balance_failure_is_isolated_per_wallet() {
        let chain = MockChain {
            balances: HashMap::from([
                (HOT, U256::from(1000u64)),
                (WARM, U256::from(3000u64)),
            ]),
            failing: HashSet::from([COLD]),
            ..Default::default()
        };
        let store = RecordingStore::default();
        // The failing wallet already has a sample from an earlier cycle.
        store.set_gauge(
            WALLET_BALANCE_WEI,
            wallet_labels(&wallet(COLD, "cold")),
            2000.0,
        );

        let scheduler = Scheduler::new(
            chain,
            FixedPrice(1.0),
            store.clone(),
            config(vec![wallet(HOT, "hot"), wallet(COLD, "cold"), wallet(WARM, "warm")]),
            intervals(),
        );
        scheduler.run_balance_cycle().await;

        let hot = HOT.to_checksum(None);
        let cold = COLD.to_checksum(None);
        let warm = WARM.to_checksum(None);
        assert_eq!(store.value(WALLET_BALANCE_WEI, ("address", &hot)), Some(1000.0));
        assert_eq!(store.value(WALLET_BALANCE_WEI, ("address", &warm)), Some(3000.0));
        // Wallet #2 keeps its stale value.
        assert_eq!(store.value(WALLET_BALANCE_WEI, ("address", &cold)), Some(2000.0));
        assert_eq!(store.count(WALLET_BALANCE_WEI), 3);
    }

    #[tokio::test]
    async fn staking_cycle_writes_two_gauges_per_wallet() {
        let chain = MockChain {
            stakes: HashMap::from([
                (HOT, (U256::from(5000u64), U256::from(77u64))),
                (COLD, (U256::from(9000u64), U256::from(11u64))),
            ]),
            ..Default::default()
        };
        let store = RecordingStore::default();

        let scheduler = Scheduler::new(
            chain,
            FixedPrice(1.0),
            store.clone(),
            config(vec![wallet(HOT, "hot"), wallet(COLD, "cold")]),
            intervals(),
        );
        scheduler.run_staking_cycle().await;

        let hot = HOT.to_checksum(None);
        assert_eq!(store.value(STAKING_STAKE_WEI, ("address", &hot)), Some(5000.0));
        assert_eq!(store.value(STAKING_REWARDS_WEI, ("address", &hot)), Some(77.0));
        assert_eq!(store.value(STAKING_STAKE_WEI, ("validator_id", "42")), Some(9000.0));
        assert_eq!(store.count(STAKING_STAKE_WEI), 2);
        assert_eq!(store.count(STAKING_REWARDS_WEI), 2);
    }

    #[tokio::test]
    async fn staking_failure_is_isolated_per_wallet() {
        let chain = MockChain {
            stakes: HashMap::from([
                (HOT, (U256::from(5000u64), U256::from(77u64))),
                (WARM, (U256::from(100u64), U256::from(2u64))),
            ]),
            failing: HashSet::from([COLD]),
            ..Default::default()
        };
        let store = RecordingStore::default();

        let scheduler = Scheduler::new(
            chain,
            FixedPrice(1.0),
            store.clone(),
            config(vec![wallet(HOT, "hot"), wallet(COLD, "cold"), wallet(WARM, "warm")]),
            intervals(),
        );
        scheduler.run_staking_cycle().await;

        let cold = COLD.to_checksum(None);
        assert_eq!(store.value(STAKING_STAKE_WEI, ("address", &cold)), None);
        assert_eq!(store.count(STAKING_STAKE_WEI), 2);
        assert_eq!(store.count(STAKING_REWARDS_WEI), 2);
    }

    #[tokio::test]
    async fn price_failure_leaves_gauge_untouched() {
        let store = RecordingStore::default();
        store.set_gauge(TOKEN_PRICE_USD, vec![Label::new("source", "cmc")], 0.5);

        let scheduler = Scheduler::new(
            MockChain::default(),
            FailingPrice,
            store.clone(),
            config(vec![]),
            intervals(),
        );
        scheduler.run_price_cycle().await;

        assert_eq!(store.value(TOKEN_PRICE_USD, ("source", "cmc")), Some(0.5));
        assert_eq!(store.count(TOKEN_PRICE_USD), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cadences_fire_on_schedule() {
        let chain = MockChain {
            balances: HashMap::from([(HOT, U256::from(1u64)), (COLD, U256::from(2u64))]),
            stakes: HashMap::from([
                (HOT, (U256::from(10u64), U256::from(1u64))),
                (COLD, (U256::from(20u64), U256::from(2u64))),
            ]),
            ..Default::default()
        };
        let store = RecordingStore::default();

        let scheduler = Scheduler::new(
            chain,
            FixedPrice(0.5),
            store.clone(),
            config(vec![wallet(HOT, "hot"), wallet(COLD, "cold")]),
            intervals(),
        );
        let handle = tokio::spawn(scheduler.run());

        // The first tick fires all three cadences once.
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.count(TOKEN_PRICE_USD), 1);
        assert_eq!(store.count(WALLET_BALANCE_WEI), 2);
        assert_eq!(store.count(STAKING_STAKE_WEI), 2);
        assert_eq!(store.count(STAKING_REWARDS_WEI), 2);

        // Just past the staking interval only the staking cadence has fired
        // again, updating the same four series in place.
        time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.count(TOKEN_PRICE_USD), 1);
        assert_eq!(store.count(WALLET_BALANCE_WEI), 2);
        assert_eq!(store.count(STAKING_STAKE_WEI), 4);
        assert_eq!(store.count(STAKING_REWARDS_WEI), 4);

        handle.abort();
    }
}
