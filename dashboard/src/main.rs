use dashboard::config::{Config, DashboardConfig};
use dashboard::errors::{DashboardError, Result};
use dashboard::poller::Poller;
use env_logger::Env;
use log::{error, info, warn};
use market::binance::models::PriceUpdate;
use market::binance::{LivePriceHub, PriceCallback};
use market::coingecko::CoinGeckoClient;
use market::mempool::MempoolClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_CONFIG_PATH: &str = "conf/dashboard.toml";

#[tokio::main]
pub async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    info!("dashboard starting with {}", config_path);

    if let Err(e) = run(&config_path).await {
        error!("dashboard exited with error: {}", e);
        std::process::exit(1);
    }
    info!("dashboard stopped");
}

async fn run(config_path: &str) -> Result<()> {
    let config = Config::from_toml(config_path).map_err(|e| DashboardError::config(e.to_string()))?;
    let dashboard_config = DashboardConfig::from_config(&config)?;
    let proxy_url = dashboard_config.proxy_url();

    let coingecko_config = &dashboard_config.coingecko;
    let coingecko = Arc::new(CoinGeckoClient::new(
        coingecko_config.base_url.as_deref(),
        proxy_url,
        coingecko_config.timeout(),
        &coingecko_config
            .cache_config_or(market::coingecko::consts::default_cache_config()),
    )?);
    let mempool_config = &dashboard_config.mempool;
    let mempool = Arc::new(MempoolClient::new(
        mempool_config.base_url.as_deref(),
        proxy_url,
        mempool_config.timeout(),
        &mempool_config.cache_config_or(market::mempool::consts::default_cache_config()),
    )?);

    let hub = LivePriceHub::binance(
        dashboard_config.binance.symbol_table(),
        dashboard_config.binance.hub_config(),
    );
    let mut subscriptions = Vec::new();
    for coin_id in &dashboard_config.watchlist {
        let callback = PriceCallback::new(|update: &PriceUpdate| {
            info!(
                "{} {} ({:.2}% 24h)",
                update.symbol, update.price, update.percent_change_24h
            );
        });
        if hub.subscribe(coin_id, &callback) {
            subscriptions.push((coin_id.clone(), callback));
        } else {
            warn!("{} has no live price stream, skipped", coin_id);
        }
    }

    let sweepers = vec![coingecko.spawn_sweeper(), mempool.spawn_sweeper()];
    let token = CancellationToken::new();
    let poller = Arc::new(Poller::new(
        coingecko.clone(),
        mempool.clone(),
        &dashboard_config.vs_currency,
        dashboard_config.top_markets,
    ));
    let poll_handle = poller.spawn(dashboard_config.poll_interval(), token.clone());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {}", e);
    }
    info!("shutting down");

    token.cancel();
    for (coin_id, callback) in &subscriptions {
        hub.unsubscribe(coin_id, callback);
    }
    hub.shutdown();
    coingecko.shutdown();
    mempool.shutdown();

    if let Err(e) = poll_handle.await {
        error!("poller join error: {}", e);
    }
    for sweeper in sweepers {
        if let Err(e) = sweeper.await {
            error!("sweeper join error: {}", e);
        }
    }
    Ok(())
}
