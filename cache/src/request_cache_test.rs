use crate::{
    CacheConfig, CacheError, EndpointPolicy, Fetcher, Freshness, RequestCache, Result,
};
use async_trait::async_trait;
use env_logger::Env;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, timeout};

// 记录每次请求的发出时间，可切换为失败
#[derive(Default)]
struct FakeFetcher {
    calls: Mutex<Vec<(String, Instant)>>,
    counter: AtomicU64,
    failing: AtomicBool,
    delay: Duration,
}

impl FakeFetcher {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    async fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().await.iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value> {
        self.calls
            .lock()
            .await
            .push((endpoint.to_string(), Instant::now()));
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::fetch_status(503, "service unavailable"));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "endpoint": endpoint, "params": params.len(), "call": n }))
    }
}

fn init_log() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .is_test(true)
        .try_init();
}

fn config(min_interval_ms: u64, policies: Vec<EndpointPolicy>) -> CacheConfig {
    CacheConfig {
        min_interval_milli_secs: min_interval_ms,
        policies,
        ..CacheConfig::default()
    }
}

fn new_cache(
    fetcher: Arc<FakeFetcher>,
    config: &CacheConfig,
) -> RequestCache<Arc<FakeFetcher>> {
    RequestCache::new("test", fetcher, config).unwrap()
}

fn coin(id: &str) -> Vec<(&'static str, String)> {
    vec![("id", id.to_string())]
}

#[tokio::test(start_paused = true)]
async fn test_hit_within_ttl_skips_network() {
    init_log();
    let fetcher = Arc::new(FakeFetcher::default());
    let cache = new_cache(
        fetcher.clone(),
        &config(
            1000,
            vec![EndpointPolicy::new("coins/markets", Duration::from_secs(60), 10)],
        ),
    );
    let params = [("vs_currency", "usd".to_string())];

    let first = cache.get_with_freshness("coins/markets", &params).await.unwrap();
    assert_eq!(first.freshness, Freshness::Fetched);

    sleep(Duration::from_secs(59)).await;
    let start = Instant::now();
    let second = cache.get_with_freshness("coins/markets", &params).await.unwrap();

    assert_eq!(second.freshness, Freshness::Hit);
    assert!(Arc::ptr_eq(&first.data, &second.data));
    assert_eq!(fetcher.call_count().await, 1);
    // 命中不经过限流
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().misses, 1);
}

#[tokio::test(start_paused = true)]
async fn test_refetch_after_ttl() {
    let fetcher = Arc::new(FakeFetcher::default());
    let cache = new_cache(
        fetcher.clone(),
        &config(
            0,
            vec![EndpointPolicy::new("simple/price", Duration::from_secs(30), 10)],
        ),
    );

    let first = cache.get("simple/price", &coin("bitcoin")).await.unwrap();
    sleep(Duration::from_secs(30)).await;
    let second = cache.get_with_freshness("simple/price", &coin("bitcoin")).await.unwrap();

    assert_eq!(second.freshness, Freshness::Fetched);
    assert_ne!(first, second.data);
    assert_eq!(fetcher.call_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_param_order_does_not_change_key() {
    let fetcher = Arc::new(FakeFetcher::default());
    let cache = new_cache(fetcher.clone(), &config(0, vec![]));

    cache
        .get(
            "simple/price",
            &[("ids", "bitcoin".to_string()), ("vs_currencies", "usd".to_string())],
        )
        .await
        .unwrap();
    let second = cache
        .get_with_freshness(
            "/simple/price",
            &[("vs_currencies", "usd".to_string()), ("ids", "bitcoin".to_string())],
        )
        .await
        .unwrap();

    assert_eq!(second.freshness, Freshness::Hit);
    assert_eq!(fetcher.call_count().await, 1);
    assert_eq!(
        cache.keys().await,
        vec!["simple/price?ids=bitcoin&vs_currencies=usd".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_is_global_across_endpoints() {
    init_log();
    let fetcher = Arc::new(FakeFetcher::default());
    let cache = new_cache(
        fetcher.clone(),
        &config(
            100,
            vec![
                EndpointPolicy::new("coins/markets", Duration::from_secs(60), 10),
                EndpointPolicy::new("search", Duration::from_secs(60), 10),
            ],
        ),
    );

    let mut handles = vec![];
    for i in 0..6 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let endpoint = if i % 2 == 0 { "coins/markets" } else { "search" };
            cache.get(endpoint, &[("page", i.to_string())]).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    let mut times = fetcher.call_times().await;
    assert_eq!(times.len(), 6);
    times.sort();
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(100));
    }
}

#[tokio::test(start_paused = true)]
async fn test_stale_served_when_refresh_fails() {
    init_log();
    let fetcher = Arc::new(FakeFetcher::default());
    let cache = new_cache(
        fetcher.clone(),
        &config(
            0,
            vec![EndpointPolicy::new("coins/markets", Duration::from_secs(60), 10)],
        ),
    );

    let first = cache.get("coins/markets", &[]).await.unwrap();
    sleep(Duration::from_secs(120)).await;
    fetcher.set_failing(true);

    let stale = cache.get_with_freshness("coins/markets", &[]).await.unwrap();
    assert!(stale.is_stale());
    assert!(Arc::ptr_eq(&first, &stale.data));
    assert_eq!(fetcher.call_count().await, 2);

    let stats = cache.stats();
    assert_eq!(stats.stale_served, 1);
    assert_eq!(stats.upstream_failures, 1);

    // 上游恢复后重新拉取
    fetcher.set_failing(false);
    let fresh = cache.get_with_freshness("coins/markets", &[]).await.unwrap();
    assert_eq!(fresh.freshness, Freshness::Fetched);
}

#[tokio::test(start_paused = true)]
async fn test_cold_failure_propagates() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.set_failing(true);
    let cache = new_cache(fetcher.clone(), &config(0, vec![]));

    let result = cache.get("trending", &[]).await;
    match result {
        Err(CacheError::UpstreamUnavailable { key, message }) => {
            assert_eq!(key, "trending");
            assert!(message.contains("service unavailable"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(cache.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_size_bound_keeps_most_recent() {
    let fetcher = Arc::new(FakeFetcher::default());
    let cache = new_cache(
        fetcher.clone(),
        &config(
            10,
            vec![
                EndpointPolicy::new("coins", Duration::from_secs(600), 3),
                EndpointPolicy::new("search", Duration::from_secs(600), 3),
            ],
        ),
    );

    cache.get("search", &[("query", "btc".to_string())]).await.unwrap();
    for id in ["a", "b", "c", "d", "e"] {
        cache.get(&format!("coins/{}", id), &[]).await.unwrap();
    }

    assert_eq!(
        cache.keys().await,
        vec![
            "coins/c".to_string(),
            "coins/d".to_string(),
            "coins/e".to_string(),
            "search?query=btc".to_string(),
        ]
    );
    assert_eq!(cache.stats().evictions, 2);
}

#[tokio::test(start_paused = true)]
async fn test_size_bound_without_time_advancing() {
    // 时钟不前进时按写入顺序淘汰
    let fetcher = Arc::new(FakeFetcher::default());
    let cache = new_cache(
        fetcher.clone(),
        &config(0, vec![EndpointPolicy::new("coins", Duration::from_secs(600), 2)]),
    );

    for id in ["a", "b", "c"] {
        cache.get("coins", &coin(id)).await.unwrap();
    }
    assert_eq!(
        cache.keys().await,
        vec!["coins?id=b".to_string(), "coins?id=c".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_ttl_and_size_bound_scenario() {
    let fetcher = Arc::new(FakeFetcher::default());
    let cache = new_cache(
        fetcher.clone(),
        &config(0, vec![EndpointPolicy::new("markets", Duration::from_secs(60), 2)]),
    );

    // t=0
    let a = cache.get("markets", &coin("A")).await.unwrap();
    // t=30s
    sleep(Duration::from_secs(30)).await;
    let a_again = cache.get_with_freshness("markets", &coin("A")).await.unwrap();
    assert_eq!(a_again.freshness, Freshness::Hit);
    assert!(Arc::ptr_eq(&a, &a_again.data));
    // t=31s, t=32s
    sleep(Duration::from_secs(1)).await;
    cache.get("markets", &coin("B")).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    cache.get("markets", &coin("C")).await.unwrap();

    assert_eq!(fetcher.call_count().await, 3);
    assert_eq!(
        cache.keys().await,
        vec!["markets?id=B".to_string(), "markets?id=C".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_single_entry_policy_per_domain() {
    let fetcher = Arc::new(FakeFetcher::default());
    let cache = new_cache(
        fetcher.clone(),
        &config(
            0,
            vec![
                EndpointPolicy::new("blocks/tip/height", Duration::from_secs(30), 1),
                EndpointPolicy::new("blocks", Duration::from_secs(60), 1),
                EndpointPolicy::new("v1/fees/recommended", Duration::from_secs(30), 1),
            ],
        ),
    );

    cache.get("blocks/tip/height", &[]).await.unwrap();
    cache.get("blocks", &[]).await.unwrap();
    cache.get("v1/fees/recommended", &[]).await.unwrap();
    cache.get("blocks/840000", &[]).await.unwrap();

    assert_eq!(
        cache.keys().await,
        vec![
            "blocks/840000".to_string(),
            "blocks/tip/height".to_string(),
            "v1/fees/recommended".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_sweep_removes_old_entries_regardless_of_ttl() {
    let fetcher = Arc::new(FakeFetcher::default());
    let mut config = config(
        0,
        vec![EndpointPolicy::new("coins", Duration::from_secs(3600), 10)],
    );
    config.max_age_milli_secs = 300_000;
    let cache = new_cache(fetcher.clone(), &config);

    cache.get("coins", &coin("old")).await.unwrap();
    sleep(Duration::from_secs(240)).await;
    cache.get("coins", &coin("new")).await.unwrap();
    sleep(Duration::from_secs(70)).await;

    assert_eq!(cache.sweep().await, 1);
    assert_eq!(cache.keys().await, vec!["coins?id=new".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_background_sweeper() {
    let fetcher = Arc::new(FakeFetcher::default());
    let mut config = config(0, vec![]);
    config.max_age_milli_secs = 120_000;
    config.sweep_interval_milli_secs = 60_000;
    let cache = new_cache(fetcher.clone(), &config);
    let sweeper = cache.spawn_sweeper();

    cache.get("global", &[]).await.unwrap();
    sleep(Duration::from_secs(100)).await;
    assert_eq!(cache.len().await, 1);

    sleep(Duration::from_secs(100)).await;
    assert!(cache.is_empty().await);

    cache.shutdown();
    sweeper.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_coalesces_concurrent_misses() {
    let fetcher = Arc::new(FakeFetcher::with_delay(Duration::from_millis(50)));
    let cache = new_cache(fetcher.clone(), &config(0, vec![]));

    let mut handles = vec![];
    for _ in 0..3 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.get("coins/markets", &[]).await
        }));
    }
    let mut results = vec![];
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(fetcher.call_count().await, 1);
    assert!(Arc::ptr_eq(&results[0], &results[1]));
    assert!(Arc::ptr_eq(&results[1], &results[2]));

    // 请求结束后不再占用in-flight槽位
    cache.invalidate("coins/markets", &[]).await;
    cache.get("coins/markets", &[]).await.unwrap();
    assert_eq!(fetcher.call_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_caller_does_not_pin_in_flight_fetch() {
    init_log();
    let fetcher = Arc::new(FakeFetcher::with_delay(Duration::from_secs(10)));
    let cache = new_cache(
        fetcher.clone(),
        &config(
            0,
            vec![EndpointPolicy::new("coins/markets", Duration::from_secs(60), 10)],
        ),
    );

    // 调用方超时放弃，请求仍在后台完成
    let abandoned = timeout(Duration::from_secs(1), cache.get("coins/markets", &[])).await;
    assert!(abandoned.is_err());

    sleep(Duration::from_secs(11)).await;
    let fetched = cache.get_with_freshness("coins/markets", &[]).await.unwrap();
    assert_eq!(fetched.freshness, Freshness::Hit);
    assert_eq!(fetcher.call_count().await, 1);

    // 过期后重新请求，而不是复用旧的共享结果
    sleep(Duration::from_secs(3600)).await;
    let started = Instant::now();
    let fetched = cache.get_with_freshness("coins/markets", &[]).await.unwrap();
    assert_eq!(fetched.freshness, Freshness::Fetched);
    assert_eq!(fetched.data["call"], 1);
    assert_eq!(fetcher.call_count().await, 2);
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_without_single_flight_each_miss_fetches() {
    let fetcher = Arc::new(FakeFetcher::with_delay(Duration::from_millis(50)));
    let mut config = config(0, vec![]);
    config.single_flight = false;
    let cache = new_cache(fetcher.clone(), &config);

    let mut handles = vec![];
    for _ in 0..3 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.get("coins/markets", &[]).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(fetcher.call_count().await, 3);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_and_clear() {
    let fetcher = Arc::new(FakeFetcher::default());
    let cache = new_cache(fetcher.clone(), &config(0, vec![]));

    cache.get("coins", &coin("a")).await.unwrap();
    cache.get("coins", &coin("b")).await.unwrap();

    assert!(cache.invalidate("coins", &coin("a")).await);
    assert!(!cache.invalidate("coins", &coin("a")).await);
    assert_eq!(cache.len().await, 1);

    cache.clear().await;
    assert!(cache.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_get_as_decodes_typed_payload() {
    #[derive(Deserialize)]
    struct Payload {
        endpoint: String,
        call: u64,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Wrong {
        missing: String,
    }

    let fetcher = Arc::new(FakeFetcher::default());
    let cache = new_cache(fetcher.clone(), &config(0, vec![]));

    let payload: Payload = cache.get_as("global", &[]).await.unwrap();
    assert_eq!(payload.endpoint, "global");
    assert_eq!(payload.call, 0);

    let wrong = cache.get_as::<Wrong>("global", &[]).await;
    assert!(matches!(wrong, Err(CacheError::Decode { .. })));
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = CacheConfig::default();
    config.default_max_entries = 0;
    let result = RequestCache::new("test", Arc::new(FakeFetcher::default()), &config);
    assert!(matches!(result, Err(CacheError::Config { .. })));
}
