use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Transport behind the cache. `params` arrive sorted by name.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value> {
        self.as_ref().fetch(endpoint, params).await
    }
}

pub fn sort_params(params: &[(&str, String)]) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    params.sort();
    params
}

pub fn encode_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<String>>()
        .join("&")
}
