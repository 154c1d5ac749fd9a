use crate::config::Config;
use crate::errors::{DashboardError, Result};
use cache::CacheConfig;
use market::binance::HubConfig;
use market::binance::consts::{MAX_RECONNECT_ATTEMPTS, MINI_TICKER_STREAM_URL};
use market::binance::symbols::SymbolTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proxy {
    pub url: String,
}

fn default_timeout_milli_secs() -> u64 {
    30000
}

fn default_reconnect_delay_milli_secs() -> u64 {
    5000
}

fn default_max_reconnect_attempts() -> u32 {
    MAX_RECONNECT_ATTEMPTS
}

fn default_stream_url() -> String {
    MINI_TICKER_STREAM_URL.to_string()
}

fn default_watchlist() -> Vec<String> {
    vec!["bitcoin".to_string(), "ethereum".to_string()]
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

fn default_top_markets() -> u32 {
    10
}

fn default_poll_interval_secs() -> u64 {
    60
}

/// One REST data source. `cache` replaces the built-in cache policy as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestSourceConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_milli_secs")]
    pub timeout_milli_secs: u64,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

impl Default for RestSourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_milli_secs: default_timeout_milli_secs(),
            cache: None,
        }
    }
}

impl RestSourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milli_secs)
    }

    pub fn cache_config_or(&self, default: CacheConfig) -> CacheConfig {
        self.cache.clone().unwrap_or(default)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    #[serde(default = "default_reconnect_delay_milli_secs")]
    pub reconnect_delay_milli_secs: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    // 币种id -> 交易对，缺省使用内置映射表
    #[serde(default)]
    pub symbols: Option<HashMap<String, String>>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stream_url: default_stream_url(),
            reconnect_delay_milli_secs: default_reconnect_delay_milli_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            symbols: None,
        }
    }
}

impl StreamConfig {
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            stream_url: self.stream_url.clone(),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_milli_secs),
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }

    pub fn symbol_table(&self) -> SymbolTable {
        match &self.symbols {
            Some(symbols) => SymbolTable::from_pairs(symbols),
            None => SymbolTable::default(),
        }
    }
}

pub struct DashboardConfig {
    pub coingecko: RestSourceConfig,
    pub mempool: RestSourceConfig,
    pub binance: StreamConfig,
    pub proxy: Option<Proxy>,
    pub watchlist: Vec<String>,
    pub vs_currency: String,
    pub top_markets: u32,
    pub poll_interval_secs: u64,
}

impl DashboardConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        let dashboard_config = Self {
            coingecko: get_or(config, "coingecko", RestSourceConfig::default)?,
            mempool: get_or(config, "mempool", RestSourceConfig::default)?,
            binance: get_or(config, "binance", StreamConfig::default)?,
            proxy: get_or(config, "proxy", || None)?,
            watchlist: get_or(config, "watchlist", default_watchlist)?,
            vs_currency: get_or(config, "vs_currency", default_vs_currency)?,
            top_markets: get_or(config, "top_markets", default_top_markets)?,
            poll_interval_secs: get_or(config, "poll_interval_secs", default_poll_interval_secs)?,
        };
        if dashboard_config.poll_interval_secs == 0 {
            return Err(DashboardError::config("poll_interval_secs must be > 0"));
        }
        if dashboard_config.top_markets == 0 {
            return Err(DashboardError::config("top_markets must be > 0"));
        }
        Ok(dashboard_config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy.as_ref().map(|proxy| proxy.url.as_str())
    }
}

fn get_or<T, D>(config: &Config, key: &str, default: D) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    D: FnOnce() -> T,
{
    config
        .get_optional::<T>(key)
        .map(|value| value.unwrap_or_else(default))
        .map_err(|e| DashboardError::config(format!("get {} err: {}", key, e)))
}
