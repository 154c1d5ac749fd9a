use crate::errors::{MarketError, Result};
use async_trait::async_trait;
use cache::{CacheError, Fetcher};
use log::error;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;

/// Plain JSON-over-HTTP GET transport for the request caches.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(base_url: &str, proxy_url: Option<&str>, timeout: Duration) -> Result<Self> {
        if base_url.is_empty() {
            return Err(MarketError::parameters_invalid("base url is empty"));
        }
        let client_builder = reqwest::Client::builder();
        let client_builder = match proxy_url {
            Some(proxy_url) => client_builder.proxy(reqwest::Proxy::all(proxy_url).map_err(|e| {
                MarketError::parameters_invalid(format!(
                    "proxy url invalid: {}, error: {}",
                    proxy_url, e
                ))
            })?),
            None => client_builder,
        };
        let client = client_builder.build().map_err(|e| {
            MarketError::parameters_invalid(format!("build client failed: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, endpoint: &str, params: &[(String, String)]) -> cache::Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let resp = self
            .client
            .get(&url)
            .query(params)
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!("Network error: {} {:?}", url, e);
                CacheError::fetch(format!("request {} failed: {}", url, e))
            })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            error!("Response error: {} status: {}, text: {}", url, status, text);
            return Err(CacheError::fetch_status(
                status.as_u16(),
                format!("status: {}, text: {}", status, text),
            ));
        }

        let text = resp.text().await.map_err(|e| {
            error!("Network error: {} {:?}", url, e);
            CacheError::fetch(format!("read body of {} failed: {}", url, e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            error!("Parse result: {:?} error: {:?}", text, e);
            CacheError::fetch(format!("invalid json from {}: {}", url, e))
        })
    }
}
