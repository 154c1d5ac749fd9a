use super::consts::BASE_URL;
use super::models::*;
use crate::errors::{MarketError, Result};
use crate::http::HttpFetcher;
use cache::{CacheConfig, CacheStats, Fetcher, RequestCache};
use std::time::Duration;
use tokio::task::JoinHandle;

/// CoinGecko REST market data behind a request cache.
pub struct CoinGeckoClient<F: Fetcher = HttpFetcher> {
    cache: RequestCache<F>,
}

impl CoinGeckoClient<HttpFetcher> {
    pub fn new(
        base_url: Option<&str>,
        proxy_url: Option<&str>,
        timeout: Duration,
        cache_config: &CacheConfig,
    ) -> Result<Self> {
        let fetcher = HttpFetcher::new(base_url.unwrap_or(BASE_URL), proxy_url, timeout)?;
        Self::with_fetcher(fetcher, cache_config)
    }
}

impl<F: Fetcher> CoinGeckoClient<F> {
    pub fn with_fetcher(fetcher: F, cache_config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            cache: RequestCache::new("coingecko", fetcher, cache_config)?,
        })
    }

    /// Top coins by market cap.
    pub async fn markets(
        &self,
        vs_currency: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<CoinMarket>> {
        if per_page == 0 || page == 0 {
            return Err(MarketError::parameters_invalid(
                "per_page and page must be > 0",
            ));
        }
        let params = [
            ("vs_currency", vs_currency.to_lowercase()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
            ("sparkline", "false".to_string()),
            ("price_change_percentage", "24h".to_string()),
        ];
        Ok(self.cache.get_as("coins/markets", &params).await?)
    }

    pub async fn simple_price(
        &self,
        ids: &[&str],
        vs_currencies: &[&str],
    ) -> Result<SimplePrices> {
        if ids.is_empty() || vs_currencies.is_empty() {
            return Err(MarketError::parameters_invalid(
                "ids and vs_currencies must not be empty",
            ));
        }
        // 排序后参数一致，命中同一缓存
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        let mut vs_currencies = vs_currencies.to_vec();
        vs_currencies.sort_unstable();
        let params = [
            ("ids", ids.join(",")),
            ("vs_currencies", vs_currencies.join(",").to_lowercase()),
            ("include_24hr_change", "true".to_string()),
        ];
        Ok(self.cache.get_as("simple/price", &params).await?)
    }

    pub async fn trending(&self) -> Result<Vec<TrendingCoin>> {
        let resp: TrendingResponse = self.cache.get_as("search/trending", &[]).await?;
        Ok(resp.coins.into_iter().map(|entry| entry.item).collect())
    }

    pub async fn search(&self, query: &str) -> Result<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResult::default());
        }
        Ok(self
            .cache
            .get_as("search", &[("query", query.to_lowercase())])
            .await?)
    }

    pub async fn market_chart(&self, id: &str, vs_currency: &str, days: u32) -> Result<MarketChart> {
        if id.is_empty() || id.contains('/') {
            return Err(MarketError::parameters_invalid(format!(
                "invalid coin id: {:?}",
                id
            )));
        }
        let params = [
            ("vs_currency", vs_currency.to_lowercase()),
            ("days", days.max(1).to_string()),
        ];
        Ok(self
            .cache
            .get_as(&format!("coins/{}/market_chart", id), &params)
            .await?)
    }

    pub async fn global(&self) -> Result<GlobalData> {
        let resp: GlobalResponse = self.cache.get_as("global", &[]).await?;
        Ok(resp.data)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.cache.spawn_sweeper()
    }

    pub fn shutdown(&self) {
        self.cache.shutdown();
    }
}
