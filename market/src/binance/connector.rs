use crate::errors::{MarketError, Result};
use async_trait::async_trait;
use log::{debug, error};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use ws::RecvMsg;

/// Receives the text payload of each inbound frame.
pub type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// A live streaming connection.
#[async_trait]
pub trait StreamConnection: Send {
    /// Cancelled once the connection is gone, for whatever reason.
    fn closed_token(&self) -> CancellationToken;

    async fn close(&mut self);
}

#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        on_message: MessageHandler,
    ) -> Result<Box<dyn StreamConnection>>;
}

/// WebSocket transport backed by `ws::Client`.
pub struct WsConnector {
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(
        &self,
        url: &str,
        on_message: MessageHandler,
    ) -> Result<Box<dyn StreamConnection>> {
        let handle: ws::Handler = Arc::new(move |msg: RecvMsg| {
            match msg.as_text() {
                Some(text) => on_message(text),
                None => debug!("ignore non-text frame"),
            }
            Box::pin(async { Ok(()) })
        });
        let mut config = ws::Config::new(url.to_string(), handle);
        config.connect_timeout = self.connect_timeout;
        config.heartbeat_interval = self.heartbeat_interval;

        let mut client = ws::Client::new(config).map_err(|e| {
            error!("WebSocket client error: {:?}", e);
            MarketError::parameters_invalid(e.to_string())
        })?;
        client.connect().await.map_err(|e| {
            error!("WebSocket connect error: {:?}", e);
            MarketError::network(e.to_string())
        })?;
        Ok(Box::new(WsConnection { client }))
    }
}

struct WsConnection {
    client: ws::Client,
}

#[async_trait]
impl StreamConnection for WsConnection {
    fn closed_token(&self) -> CancellationToken {
        self.client.shutdown_token()
    }

    async fn close(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            error!("WebSocket disconnect error: {:?}", e);
        }
    }
}
