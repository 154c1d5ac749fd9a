use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("connection error: {message}")]
    Connection { message: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("client error: {message}")]
    Client { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("handle error: {message}")]
    HandleError { message: String },
}

impl WsError {
    // 建立连接相关错误
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn connection_failed(url: &str, source: impl std::error::Error) -> Self {
        Self::connection(format!("failed to connect to {}: {}", url, source))
    }

    pub fn connection_timeout(url: &str, timeout: Duration) -> Self {
        Self::connection(format!("connection timeout after {:?} to {}", timeout, url))
    }

    /// 传输错误，含网络错误、关闭信号、内部channel错误等
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn send_failed(source: impl std::error::Error) -> Self {
        Self::transport(format!("failed to send websocket message: {}", source))
    }

    pub fn receive_failed(source: impl std::error::Error) -> Self {
        Self::transport(format!("failed to receive message: {}", source))
    }

    pub fn stream_ended() -> Self {
        Self::transport("websocket stream ended unexpectedly")
    }

    pub fn channel_closed(channel_type: &str, reason: String) -> Self {
        Self::transport(format!(
            "internal {} channel closed: {}",
            channel_type, reason
        ))
    }

    pub fn connection_closed(code: u16, reason: String) -> Self {
        Self::transport(format!(
            "connection closed by server: code={}, reason={}",
            code, reason
        ))
    }

    // 客户端错误
    pub fn client<S: Into<String>>(message: S) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    pub fn already_connected() -> Self {
        Self::client("client is already connected")
    }

    /// 配置错误
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn invalid_url(url: &str) -> Self {
        Self::config(format!("invalid WebSocket URL: {:?}", url))
    }

    pub fn invalid_timeout(field: &str) -> Self {
        Self::config(format!(
            "invalid timeout configuration: {} must be > 0",
            field
        ))
    }

    pub fn invalid_send_buf_size() -> Self {
        Self::config("invalid send buffer size configuration, must be > 0")
    }

    pub fn handle<S: Into<String>>(message: S) -> Self {
        Self::HandleError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WsError>;
