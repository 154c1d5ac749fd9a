use crate::error::{CacheError, Result};
use crate::fetcher::{Fetcher, encode_params, sort_params};
use crate::policy::{CacheConfig, PolicyTable, ResolvedPolicy};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use log::{debug, error, info, warn};
use rate_limiter::IntervalLimiter;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use time::LatencyGuard;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Served from cache within its TTL.
    Hit,
    /// Fetched from upstream by this call.
    Fetched,
    /// Upstream failed; the last good response was served instead.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub data: Arc<Value>,
    pub freshness: Freshness,
}

impl Fetched {
    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_served: u64,
    pub upstream_failures: u64,
    pub evictions: u64,
}

struct CacheEntry {
    endpoint_type: String,
    data: Arc<Value>,
    fetched_at: Instant,
    // 同一时刻写入的条目按写入顺序淘汰
    seq: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_served: AtomicU64,
    upstream_failures: AtomicU64,
    evictions: AtomicU64,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Fetched>>>;

struct Inner<F: Fetcher> {
    name: String,
    fetcher: F,
    limiter: IntervalLimiter,
    policies: PolicyTable,
    single_flight: bool,
    sweep_interval: Duration,
    max_age: Duration,
    state: Mutex<CacheState>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
    counters: Counters,
    shutdown_token: CancellationToken,
}

/// TTL cache with a global request gate and stale-on-error fallback.
///
/// Cloning yields another handle to the same cache.
pub struct RequestCache<F: Fetcher> {
    inner: Arc<Inner<F>>,
}

impl<F: Fetcher> Clone for RequestCache<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: Fetcher> RequestCache<F> {
    pub fn new(name: &str, fetcher: F, config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        let policies = PolicyTable::from_config(config)?;
        Ok(Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                fetcher,
                limiter: IntervalLimiter::new(config.min_interval()),
                policies,
                single_flight: config.single_flight,
                sweep_interval: config.sweep_interval(),
                max_age: config.max_age(),
                state: Mutex::new(CacheState::default()),
                in_flight: Mutex::new(HashMap::new()),
                counters: Counters::default(),
                shutdown_token: CancellationToken::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Arc<Value>> {
        self.get_with_freshness(endpoint, params)
            .await
            .map(|fetched| fetched.data)
    }

    pub async fn get_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let data = self.get(endpoint, params).await?;
        T::deserialize(data.as_ref()).map_err(|e| CacheError::decode(endpoint, e))
    }

    pub async fn get_with_freshness(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Fetched> {
        let endpoint = endpoint.trim_matches('/').to_string();
        let params = sort_params(params);
        let key = cache_key(&endpoint, &params);
        let policy = self.inner.policies.resolve(&endpoint);

        if let Some(data) = self.inner.lookup_fresh(&key, policy.ttl).await {
            self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!("[{}] cache hit: {}", self.inner.name, key);
            return Ok(Fetched {
                data,
                freshness: Freshness::Hit,
            });
        }
        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);

        if !self.inner.single_flight {
            return Inner::refresh(self.inner.clone(), key, endpoint, params, policy).await;
        }

        let fut = {
            let mut in_flight = self.inner.in_flight.lock().await;
            match in_flight.get(&key) {
                Some(fut) => {
                    debug!("[{}] joining in-flight request: {}", self.inner.name, key);
                    fut.clone()
                }
                None => {
                    // 请求在独立任务中执行，调用方取消后仍会完成并移出in_flight
                    let inner = self.inner.clone();
                    let key1 = key.clone();
                    let handle = tokio::spawn(async move {
                        let result =
                            Inner::refresh(inner.clone(), key1.clone(), endpoint, params, policy)
                                .await;
                        inner.in_flight.lock().await.remove(&key1);
                        result
                    });
                    let inner = self.inner.clone();
                    let key2 = key.clone();
                    let fut = async move {
                        match handle.await {
                            Ok(result) => result,
                            Err(e) => {
                                error!("[{}] fetch task for {} failed: {}", inner.name, key2, e);
                                inner.in_flight.lock().await.remove(&key2);
                                Err(CacheError::fetch(format!("fetch task failed: {}", e)))
                            }
                        }
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, fut.clone());
                    fut
                }
            }
        };
        fut.await
    }

    pub async fn invalidate(&self, endpoint: &str, params: &[(&str, String)]) -> bool {
        let key = cache_key(endpoint.trim_matches('/'), &sort_params(params));
        self.inner.state.lock().await.entries.remove(&key).is_some()
    }

    pub async fn clear(&self) {
        self.inner.state.lock().await.entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Cached keys in ascending order.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .state
            .lock()
            .await
            .entries
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            stale_served: counters.stale_served.load(Ordering::Relaxed),
            upstream_failures: counters.upstream_failures.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Drops every entry older than the configured max age and returns how many went.
    pub async fn sweep(&self) -> usize {
        self.inner.sweep().await
    }

    // 后台定期清理，shutdown或cache被释放后退出
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let inner: Weak<Inner<F>> = Arc::downgrade(&self.inner);
        let shutdown_token = self.inner.shutdown_token.clone();
        let sweep_interval = self.inner.sweep_interval;
        let name = self.inner.name.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown_token.cancelled() => break,
                    _ = interval.tick() => {
                        match inner.upgrade() {
                            Some(inner) => {
                                inner.sweep().await;
                            }
                            None => break,
                        }
                    }
                }
            }
            debug!("[{}] sweeper stopped", name);
        })
    }

    pub fn shutdown(&self) {
        self.inner.shutdown_token.cancel();
    }
}

impl<F: Fetcher> Inner<F> {
    async fn lookup_fresh(&self, key: &str, ttl: Duration) -> Option<Arc<Value>> {
        let state = self.state.lock().await;
        state
            .entries
            .get(key)
            .filter(|entry| entry.fetched_at.elapsed() < ttl)
            .map(|entry| entry.data.clone())
    }

    async fn refresh(
        inner: Arc<Self>,
        key: String,
        endpoint: String,
        params: Vec<(String, String)>,
        policy: ResolvedPolicy,
    ) -> Result<Fetched> {
        let waited = inner.limiter.acquire().await;
        info!(
            "[{}] cache miss, fetching {} (waited {:?})",
            inner.name, key, waited
        );

        let result = {
            let _latency = LatencyGuard::new(format!("[{}] fetch {}", inner.name, key));
            inner.fetcher.fetch(&endpoint, &params).await
        };

        match result {
            Ok(value) => {
                let data = Arc::new(value);
                inner.store(key, &policy, data.clone()).await;
                Ok(Fetched {
                    data,
                    freshness: Freshness::Fetched,
                })
            }
            Err(e) => {
                inner
                    .counters
                    .upstream_failures
                    .fetch_add(1, Ordering::Relaxed);
                let state = inner.state.lock().await;
                match state.entries.get(&key) {
                    Some(entry) => {
                        inner.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            "[{}] upstream failed for {}, serving stale data aged {:?}: {}",
                            inner.name,
                            key,
                            entry.fetched_at.elapsed(),
                            e
                        );
                        Ok(Fetched {
                            data: entry.data.clone(),
                            freshness: Freshness::Stale,
                        })
                    }
                    None => {
                        error!(
                            "[{}] upstream failed for {} with nothing cached: {}",
                            inner.name, key, e
                        );
                        Err(CacheError::upstream_unavailable(&key, &e))
                    }
                }
            }
        }
    }

    async fn store(&self, key: String, policy: &ResolvedPolicy, data: Arc<Value>) {
        let mut state = self.state.lock().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key,
            CacheEntry {
                endpoint_type: policy.endpoint_type.clone(),
                data,
                fetched_at: Instant::now(),
                seq,
            },
        );

        let mut same_type: Vec<(Instant, u64, String)> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.endpoint_type == policy.endpoint_type)
            .map(|(key, entry)| (entry.fetched_at, entry.seq, key.clone()))
            .collect();
        if same_type.len() <= policy.max_entries {
            return;
        }

        same_type.sort();
        let excess = same_type.len() - policy.max_entries;
        for (_, _, key) in same_type.into_iter().take(excess) {
            state.entries.remove(&key);
            debug!("[{}] evicted {}", self.name, key);
        }
        self.counters
            .evictions
            .fetch_add(excess as u64, Ordering::Relaxed);
    }

    async fn sweep(&self) -> usize {
        let mut state = self.state.lock().await;
        let before = state.entries.len();
        let max_age = self.max_age;
        state
            .entries
            .retain(|_, entry| entry.fetched_at.elapsed() < max_age);
        let removed = before - state.entries.len();
        if removed > 0 {
            info!(
                "[{}] sweep removed {} entries older than {:?}",
                self.name, removed, max_age
            );
            self.counters
                .evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }
}

fn cache_key(endpoint: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        endpoint.to_string()
    } else {
        format!("{}?{}", endpoint, encode_params(params))
    }
}
