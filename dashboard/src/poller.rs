use cache::Fetcher;
use log::{info, warn};
use market::HttpFetcher;
use market::coingecko::CoinGeckoClient;
use market::coingecko::models::CoinMarket;
use market::mempool::MempoolClient;
use market::mempool::models::{MempoolSummary, RecommendedFees};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Result of one poll round. Sources that failed are left empty and named in
/// `failures`.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub top_markets: Option<Vec<CoinMarket>>,
    pub tip_height: Option<u64>,
    pub fees: Option<RecommendedFees>,
    pub mempool: Option<MempoolSummary>,
    pub failures: Vec<String>,
}

pub struct Poller<C: Fetcher = HttpFetcher, M: Fetcher = HttpFetcher> {
    coingecko: Arc<CoinGeckoClient<C>>,
    mempool: Arc<MempoolClient<M>>,
    vs_currency: String,
    top_markets: u32,
}

impl<C: Fetcher, M: Fetcher> Poller<C, M> {
    pub fn new(
        coingecko: Arc<CoinGeckoClient<C>>,
        mempool: Arc<MempoolClient<M>>,
        vs_currency: &str,
        top_markets: u32,
    ) -> Self {
        Self {
            coingecko,
            mempool,
            vs_currency: vs_currency.to_string(),
            top_markets,
        }
    }

    pub async fn poll_once(&self) -> Snapshot {
        let (markets, tip_height, fees, mempool) = tokio::join!(
            self.coingecko.markets(&self.vs_currency, self.top_markets, 1),
            self.mempool.tip_height(),
            self.mempool.recommended_fees(),
            self.mempool.mempool_summary(),
        );

        let mut failures = Vec::new();
        let mut keep = |name: &str, err: market::MarketError| {
            warn!("poll {} failed: {}", name, err);
            failures.push(name.to_string());
        };
        let top_markets = markets.map_err(|e| keep("markets", e)).ok();
        let tip_height = tip_height.map_err(|e| keep("tip_height", e)).ok();
        let fees = fees.map_err(|e| keep("fees", e)).ok();
        let mempool = mempool.map_err(|e| keep("mempool", e)).ok();

        Snapshot {
            top_markets,
            tip_height,
            fees,
            mempool,
            failures,
        }
    }

    /// Polls every `interval` until `token` is cancelled.
    pub fn spawn(self: Arc<Self>, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let snapshot = self.poll_once().await;
                        log_snapshot(&snapshot, &self.vs_currency);
                    }
                }
            }
            info!("poller stopped");
        })
    }
}

fn log_snapshot(snapshot: &Snapshot, vs_currency: &str) {
    if let Some(markets) = &snapshot.top_markets {
        for coin in markets.iter().take(5) {
            match coin.current_price {
                Some(price) => info!(
                    "#{} {} {} {}",
                    coin.market_cap_rank.unwrap_or_default(),
                    coin.symbol.to_uppercase(),
                    price,
                    vs_currency
                ),
                None => info!("{} has no price", coin.symbol.to_uppercase()),
            }
        }
    }
    if let Some(height) = snapshot.tip_height {
        info!("bitcoin tip height: {}", height);
    }
    if let Some(fees) = &snapshot.fees {
        info!(
            "fees sat/vB fastest={} half_hour={} hour={} economy={}",
            fees.fastest_fee, fees.half_hour_fee, fees.hour_fee, fees.economy_fee
        );
    }
    if let Some(mempool) = &snapshot.mempool {
        info!("mempool: {} txs, {} vB", mempool.count, mempool.vsize);
    }
    if !snapshot.failures.is_empty() {
        warn!("unavailable this round: {}", snapshot.failures.join(", "));
    }
}
