use cache::{CacheConfig, EndpointPolicy};
use std::time::Duration;

pub const BASE_URL: &str = "https://api.coingecko.com/api/v3";

// 免费额度约30次/分钟
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1500);

pub fn default_cache_config() -> CacheConfig {
    CacheConfig {
        min_interval_milli_secs: MIN_REQUEST_INTERVAL.as_millis() as u64,
        policies: vec![
            EndpointPolicy::new("coins/markets", Duration::from_secs(60), 10),
            EndpointPolicy::new("simple/price", Duration::from_secs(30), 20),
            EndpointPolicy::new("search/trending", Duration::from_secs(300), 1),
            EndpointPolicy::new("search", Duration::from_secs(300), 20),
            EndpointPolicy::new("coins", Duration::from_secs(120), 30),
            EndpointPolicy::new("global", Duration::from_secs(120), 1),
        ],
        default_ttl_milli_secs: 60_000,
        default_max_entries: 50,
        sweep_interval_milli_secs: 60_000,
        max_age_milli_secs: 600_000,
        single_flight: true,
    }
}
