pub mod error;
pub mod fetcher;
pub mod policy;
pub mod request_cache;

pub use error::{CacheError, Result};
pub use fetcher::{Fetcher, encode_params};
pub use policy::{CacheConfig, EndpointPolicy, PolicyTable, ResolvedPolicy};
pub use request_cache::{CacheStats, Fetched, Freshness, RequestCache};

#[cfg(test)]
mod request_cache_test;
