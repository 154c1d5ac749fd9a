use super::consts::BASE_URL;
use super::models::*;
use crate::errors::Result;
use crate::http::HttpFetcher;
use cache::{CacheConfig, CacheStats, Fetcher, RequestCache};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Bitcoin chain statistics from mempool.space.
pub struct MempoolClient<F: Fetcher = HttpFetcher> {
    cache: RequestCache<F>,
}

impl MempoolClient<HttpFetcher> {
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

impl<F: Fetcher> MempoolClient<F> {
    pub fn with_fetcher(fetcher: F, cache_config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            cache: RequestCache::new("mempool", fetcher, cache_config)?,
        })
    }

    pub async fn tip_height(&self) -> Result<u64> {
        Ok(self.cache.get_as("blocks/tip/height", &[]).await?)
    }

    /// The ten most recent blocks, newest first.
    pub async fn recent_blocks(&self) -> Result<Vec<Block>> {
        Ok(self.cache.get_as("blocks", &[]).await?)
    }

    pub async fn recommended_fees(&self) -> Result<RecommendedFees> {
        Ok(self.cache.get_as("v1/fees/recommended", &[]).await?)
    }

    pub async fn mempool_summary(&self) -> Result<MempoolSummary> {
        Ok(self.cache.get_as("mempool", &[]).await?)
    }

    pub async fn difficulty_adjustment(&self) -> Result<DifficultyAdjustment> {
        Ok(self.cache.get_as("v1/difficulty-adjustment", &[]).await?)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mempool::consts::default_cache_config;
    use crate::test_util::StaticFetcher;
    use serde_json::json;
    use std::sync::Arc;

    fn client(fetcher: Arc<StaticFetcher>) -> MempoolClient<Arc<StaticFetcher>> {
        MempoolClient::with_fetcher(fetcher, &default_cache_config()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_stats() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with("blocks/tip/height", json!(840000))
                .with(
                    "blocks",
                    json!([{
                        "id": "0000000000000000000320283a032748cef8227873ff4872689bf23f1cda83a5",
                        "height": 840000, "version": 710926336, "timestamp": 1713571767,
                        "tx_count": 3050, "size": 2325617, "weight": 3993281,
                        "merkle_root": "031b417c3a1828ddf3d6527fc210daafcc9218e81f98257f88d4d43bd7a5894f",
                        "previousblockhash": "0000000000000000000172014ba58d66455762add0512355ad651207918494ab",
                        "mediantime": 1713570208, "nonce": 3932395645u64, "bits": 386089497,
                        "difficulty": 86388558925171.02
                    }]),
                )
                .with(
                    "v1/fees/recommended",
                    json!({ "fastestFee": 12, "halfHourFee": 10, "hourFee": 8, "economyFee": 4, "minimumFee": 2 }),
                )
                .with(
                    "mempool",
                    json!({ "count": 45210, "vsize": 30000000, "total_fee": 0.85, "fee_histogram": [[12.5, 50000], [8.0, 120000]] }),
                )
                .with(
                    "v1/difficulty-adjustment",
                    json!({ "progressPercent": 44.4, "difficultyChange": 1.2, "estimatedRetargetDate": 1714000000000u64,
                            "remainingBlocks": 1120, "remainingTime": 672000000, "previousRetarget": -1.5,
                            "nextRetargetHeight": 842688 }),
                ),
        );
        let client = client(fetcher.clone());

        assert_eq!(client.tip_height().await.unwrap(), 840000);
        let blocks = client.recent_blocks().await.unwrap();
        assert_eq!(blocks[0].height, 840000);
        assert_eq!(blocks[0].tx_count, 3050);

        let fees = client.recommended_fees().await.unwrap();
        assert_eq!(fees.fastest_fee, 12.0);
        assert_eq!(fees.minimum_fee, 2.0);

        let mempool = client.mempool_summary().await.unwrap();
        assert_eq!(mempool.count, 45210);
        assert_eq!(mempool.fee_histogram.len(), 2);

        let adjustment = client.difficulty_adjustment().await.unwrap();
        assert_eq!(adjustment.remaining_blocks, 1120);
        assert_eq!(adjustment.next_retarget_height, Some(842688));

        // 每类数据单独缓存，不互相淘汰
        client.tip_height().await.unwrap();
        client.recommended_fees().await.unwrap();
        assert_eq!(fetcher.requests().await.len(), 5);
        assert_eq!(client.stats().hits, 2);
    }
}
