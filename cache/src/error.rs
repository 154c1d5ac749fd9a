use thiserror::Error;

// Clone: 同一个in-flight请求的结果会分发给所有等待者
#[derive(Debug, Error, Clone)]
pub enum CacheError {
    #[error("upstream unavailable for {key}: {message}")]
    UpstreamUnavailable { key: String, message: String },

    #[error("fetch failed: {message}")]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    #[error("decode error: {message}")]
    Decode { message: String },

    #[error("config error: {message}")]
    Config { message: String },
}

impl CacheError {
    pub fn fetch<S: Into<String>>(message: S) -> Self {
        Self::Fetch {
            status: None,
            message: message.into(),
        }
    }

    pub fn fetch_status<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Fetch {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn upstream_unavailable(key: &str, source: &CacheError) -> Self {
        Self::UpstreamUnavailable {
            key: key.to_string(),
            message: source.to_string(),
        }
    }

    pub fn decode(endpoint: &str, source: impl std::error::Error) -> Self {
        Self::Decode {
            message: format!("failed to decode response of {}: {}", endpoint, source),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
