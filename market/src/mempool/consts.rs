use cache::{CacheConfig, EndpointPolicy};
use std::time::Duration;

pub const BASE_URL: &str = "https://mempool.space/api";

// 每类接口只保留最新一份数据，固定ttl，不限流
pub fn default_cache_config() -> CacheConfig {
    CacheConfig {
        min_interval_milli_secs: 0,
        policies: vec![
            EndpointPolicy::new("blocks/tip/height", Duration::from_secs(30), 1),
            EndpointPolicy::new("blocks", Duration::from_secs(60), 1),
            EndpointPolicy::new("v1/fees/recommended", Duration::from_secs(30), 1),
            EndpointPolicy::new("mempool", Duration::from_secs(30), 1),
            EndpointPolicy::new("v1/difficulty-adjustment", Duration::from_secs(300), 1),
        ],
        default_ttl_milli_secs: 30_000,
        default_max_entries: 1,
        sweep_interval_milli_secs: 60_000,
        max_age_milli_secs: 600_000,
        single_flight: true,
    }
}
