use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

fn default_min_interval_milli_secs() -> u64 {
    1500
}

fn default_ttl_milli_secs() -> u64 {
    60_000
}

fn default_max_entries() -> usize {
    50
}

fn default_sweep_interval_milli_secs() -> u64 {
    60_000
}

fn default_max_age_milli_secs() -> u64 {
    600_000
}

fn default_single_flight() -> bool {
    true
}

/// Caching rule for every endpoint whose path starts with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPolicy {
    pub prefix: String,
    pub ttl_milli_secs: u64,
    pub max_entries: usize,
}

impl EndpointPolicy {
    pub fn new(prefix: &str, ttl: Duration, max_entries: usize) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
            ttl_milli_secs: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            max_entries,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_milli_secs)
    }

    // 按路径段匹配: "simple/price" 匹配 "simple/price/x"，不匹配 "simple/pricex"
    fn matches(&self, endpoint: &str) -> bool {
        match endpoint.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_min_interval_milli_secs")]
    pub min_interval_milli_secs: u64, // 全局请求最小间隔

    #[serde(default)]
    pub policies: Vec<EndpointPolicy>,

    #[serde(default = "default_ttl_milli_secs")]
    pub default_ttl_milli_secs: u64,
    #[serde(default = "default_max_entries")]
    pub default_max_entries: usize,

    #[serde(default = "default_sweep_interval_milli_secs")]
    pub sweep_interval_milli_secs: u64,
    #[serde(default = "default_max_age_milli_secs")]
    pub max_age_milli_secs: u64, // 超过该时长的条目无论ttl都会被清理

    #[serde(default = "default_single_flight")]
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_interval_milli_secs: default_min_interval_milli_secs(),
            policies: Vec::new(),
            default_ttl_milli_secs: default_ttl_milli_secs(),
            default_max_entries: default_max_entries(),
            sweep_interval_milli_secs: default_sweep_interval_milli_secs(),
            max_age_milli_secs: default_max_age_milli_secs(),
            single_flight: default_single_flight(),
        }
    }
}

impl CacheConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_milli_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_milli_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_milli_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_max_entries == 0 {
            return Err(CacheError::config("default_max_entries must be > 0"));
        }
        if self.sweep_interval_milli_secs == 0 {
            return Err(CacheError::config("sweep_interval_milli_secs must be > 0"));
        }
        if self.max_age_milli_secs == 0 {
            return Err(CacheError::config("max_age_milli_secs must be > 0"));
        }
        Ok(())
    }
}

/// Policy chosen for one endpoint. Entries sharing `endpoint_type` share the
/// `max_entries` bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPolicy {
    pub endpoint_type: String,
    pub ttl: Duration,
    pub max_entries: usize,
}

#[derive(Debug, Clone)]
pub struct PolicyTable {
    // 按前缀长度降序，保证最长匹配优先
    policies: Vec<EndpointPolicy>,
    default_ttl: Duration,
    default_max_entries: usize,
}

impl PolicyTable {
    pub fn new(
        policies: Vec<EndpointPolicy>,
        default_ttl: Duration,
        default_max_entries: usize,
    ) -> Result<Self> {
        if default_max_entries == 0 {
            return Err(CacheError::config("default max_entries must be > 0"));
        }
        let mut seen = HashSet::new();
        let mut policies: Vec<EndpointPolicy> = policies
            .into_iter()
            .map(|p| EndpointPolicy::new(&p.prefix, p.ttl(), p.max_entries))
            .collect();
        for policy in &policies {
            if policy.prefix.is_empty() {
                return Err(CacheError::config("policy prefix must not be empty"));
            }
            if policy.max_entries == 0 {
                return Err(CacheError::config(format!(
                    "policy {} max_entries must be > 0",
                    policy.prefix
                )));
            }
            if !seen.insert(policy.prefix.clone()) {
                return Err(CacheError::config(format!(
                    "duplicated policy prefix: {}",
                    policy.prefix
                )));
            }
        }
        policies.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Ok(Self {
            policies,
            default_ttl,
            default_max_entries,
        })
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::new(
            config.policies.clone(),
            Duration::from_millis(config.default_ttl_milli_secs),
            config.default_max_entries,
        )
    }

    pub fn resolve(&self, endpoint: &str) -> ResolvedPolicy {
        let endpoint = endpoint.trim_matches('/');
        match self.policies.iter().find(|p| p.matches(endpoint)) {
            Some(policy) => ResolvedPolicy {
                endpoint_type: policy.prefix.clone(),
                ttl: policy.ttl(),
                max_entries: policy.max_entries,
            },
            None => ResolvedPolicy {
                endpoint_type: endpoint.split('/').next().unwrap_or_default().to_string(),
                ttl: self.default_ttl,
                max_entries: self.default_max_entries,
            },
        }
    }
}
