use crate::{Result, WsError};
use futures_util::SinkExt;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use log::{debug, error, info, warn};
use scopeguard::defer;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tokio::task::JoinHandle;
use tokio_tungstenite::{WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

// 只有心跳和Pong回复会主动发出
#[derive(Debug, Clone)]
enum SendMsg {
    Ping { data: Vec<u8> },
    Pong { data: Vec<u8> },
}

impl SendMsg {
    fn kind(&self) -> &'static str {
        match self {
            SendMsg::Ping { .. } => "ping",
            SendMsg::Pong { .. } => "pong",
        }
    }

    fn into_websocket_message(self) -> Message {
        match self {
            SendMsg::Ping { data } => Message::Ping(data.into()),
            SendMsg::Pong { data } => Message::Pong(data.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RecvMsg {
    Text { content: String },
    Binary { data: Vec<u8> },
    Ping { data: Vec<u8> },
    Pong { data: Vec<u8> },
    Close { code: Option<u16>, reason: Option<String> },
}

impl RecvMsg {
    pub fn from_websocket_message(msg: Message) -> Option<Self> {
        match msg {
            Message::Text(content) => Some(RecvMsg::Text {
                content: content.to_string(),
            }),
            Message::Binary(data) => Some(RecvMsg::Binary {
                data: data.to_vec(),
            }),
            Message::Ping(data) => Some(RecvMsg::Ping {
                data: data.to_vec(),
            }),
            Message::Pong(data) => Some(RecvMsg::Pong {
                data: data.to_vec(),
            }),
            Message::Close(close_frame) => {
                let (code, reason) = match close_frame {
                    Some(frame) => (Some(frame.code.into()), Some(frame.reason.to_string())),
                    None => (None, None),
                };
                Some(RecvMsg::Close { code, reason })
            }
            // tungstenite内部处理Frame消息
            Message::Frame(_) => None,
        }
    }

    /// Text payload of a data frame; binary frames are accepted when they are valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RecvMsg::Text { content } => Some(content.as_str()),
            RecvMsg::Binary { data } => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }
}

pub type Handler =
    Arc<dyn Fn(RecvMsg) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

pub struct Config {
    pub url: String,
    pub send_buf_size: usize,
    pub handle: Handler,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Config {
    // 默认配置。如果需要修改配置，可以直接修改返回的结构体字段
    pub fn new(url: String, handle: Handler) -> Self {
        Self {
            url,
            send_buf_size: 1024,
            handle,
            connect_timeout: Duration::from_millis(10000),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// One WebSocket connection. The shutdown token is cancelled when the
/// connection ends, whether requested through `disconnect` or not.
pub struct Client {
    config: Config,
    send_tx: Option<Sender<SendMsg>>,
    shutdown_token: CancellationToken,
    join_handles: Vec<JoinHandle<Result<()>>>,
}

impl Client {
    pub fn new(config: Config) -> Result<Self> {
        if config.url.is_empty() {
            return Err(WsError::invalid_url(&config.url));
        }
        if config.connect_timeout.is_zero() {
            return Err(WsError::invalid_timeout("connect_timeout"));
        }
        if config.heartbeat_interval.is_zero() {
            return Err(WsError::invalid_timeout("heartbeat_interval"));
        }
        if config.send_buf_size == 0 {
            return Err(WsError::invalid_send_buf_size());
        }
        Ok(Client {
            config,
            send_tx: None,
            shutdown_token: CancellationToken::new(),
            join_handles: Vec::new(),
        })
    }

    // 外部监控连接结束信号
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.send_tx.is_some() && !self.shutdown_token.is_cancelled()
    }

    pub async fn connect(&mut self) -> Result<()> {
        if self.send_tx.is_some() || self.shutdown_token.is_cancelled() {
            return Err(WsError::already_connected());
        }
        let connect_timeout = self.config.connect_timeout;
        let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(&self.config.url))
            .await
            .map_err(|_| WsError::connection_timeout(&self.config.url, connect_timeout))?
            .map_err(|e| WsError::connection_failed(&self.config.url, e))?;
        info!("WebSocket connected to {}", self.config.url);
        self.initialize_stream(ws_stream);
        Ok(())
    }

    fn initialize_stream<S>(&mut self, ws_stream: WebSocketStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, receiver) = ws_stream.split();

        let (send_tx, send_rx) = channel::<SendMsg>(self.config.send_buf_size);
        self.send_tx = Some(send_tx.clone());

        let shutdown_token1 = self.shutdown_token.clone();
        let send_loop_handle =
            tokio::spawn(async move { Self::send_loop(sender, send_rx, shutdown_token1).await });

        let handle = self.config.handle.clone();
        let shutdown_token2 = self.shutdown_token.clone();
        let send_tx1 = send_tx.clone();
        let recv_loop_handle = tokio::spawn(async move {
            Self::recv_loop(receiver, handle, send_tx1, shutdown_token2).await
        });

        let heartbeat_interval = self.config.heartbeat_interval;
        let shutdown_token3 = self.shutdown_token.clone();
        let heartbeat_handle = tokio::spawn(async move {
            Self::heartbeat(send_tx, heartbeat_interval, shutdown_token3).await
        });

        self.join_handles.push(send_loop_handle);
        self.join_handles.push(recv_loop_handle);
        self.join_handles.push(heartbeat_handle);
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.shutdown_token.cancel();
        self.send_tx = None;

        for handle in self.join_handles.drain(..) {
            match handle.await {
                Ok(Err(e)) => debug!("WebSocket task finished with: {}", e),
                Err(e) => error!("Task join error: {}", e),
                Ok(Ok(())) => {}
            }
        }

        Ok(())
    }

    async fn recv_loop<S>(
        mut receiver: SplitStream<WebSocketStream<S>>,
        handle: Handler,
        send_tx: Sender<SendMsg>,
        shutdown_token: CancellationToken,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        defer!(
            shutdown_token.cancel();
        );
        loop {
            let msg = tokio::select! {
                _ = shutdown_token.cancelled() => {
                    return Ok(());
                }
                msg = receiver.next() => msg,
            };
            let msg = match msg {
                None => {
                    warn!("WebSocket stream ended");
                    return Err(WsError::stream_ended());
                }
                Some(Err(e)) => {
                    error!("WebSocket receive error: {}", e);
                    return Err(WsError::receive_failed(e));
                }
                Some(Ok(msg)) => msg,
            };
            let recv_msg = match RecvMsg::from_websocket_message(msg) {
                Some(recv_msg) => recv_msg,
                None => continue,
            };
            match recv_msg {
                RecvMsg::Text { .. } | RecvMsg::Binary { .. } => {
                    // 单条消息处理失败不影响后续消息
                    if let Err(e) = handle(recv_msg).await {
                        error!("failed to handle message: {}", e);
                    }
                }
                RecvMsg::Ping { data } => {
                    debug!("Received Ping: {}", String::from_utf8_lossy(&data));
                    if let Err(e) = send_tx.send(SendMsg::Pong { data }).await {
                        error!("failed to send Pong: {}", e);
                        return Err(WsError::channel_closed("send_tx", e.to_string()));
                    }
                }
                RecvMsg::Pong { data } => {
                    debug!("Received Pong: {}", String::from_utf8_lossy(&data));
                }
                RecvMsg::Close { code, reason } => {
                    info!(
                        "WebSocket connection closed: code={:?}, reason={:?}",
                        code, reason
                    );
                    return Err(WsError::connection_closed(
                        code.unwrap_or(0),
                        reason.unwrap_or_default(),
                    ));
                }
            }
        }
    }

    async fn send_loop<S>(
        mut sender: SplitSink<WebSocketStream<S>, Message>,
        mut send_rx: Receiver<SendMsg>,
        shutdown_token: CancellationToken,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        defer!(
            shutdown_token.cancel();
        );
        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    send_rx.close();
                    if let Err(e) = sender.close().await {
                        debug!("WebSocket close error: {}", e);
                    }
                    return Ok(());
                }
                msg = send_rx.recv() => {
                    let msg = match msg {
                        Some(msg) => msg,
                        None => {
                            return Err(WsError::channel_closed("send_rx", "all senders dropped".to_string()));
                        }
                    };
                    let kind = msg.kind();
                    if let Err(e) = sender.send(msg.into_websocket_message()).await {
                        error!("WebSocket send {} error: {}", kind, e);
                        return Err(WsError::send_failed(e));
                    }
                }
            }
        }
    }

    async fn heartbeat(
        send_tx: Sender<SendMsg>,
        interval: Duration,
        shutdown_token: CancellationToken,
    ) -> Result<()> {
        let mut interval = tokio::time::interval(interval);
        // 第一次tick立即返回
        interval.tick().await;
        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    return Ok(());
                }
                _ = interval.tick() => {
                    let now_ts = time::get_current_milli_timestamp();
                    let heartbeat_msg = SendMsg::Ping {
                        data: now_ts.to_string().into_bytes(),
                    };
                    if let Err(e) = send_tx.send(heartbeat_msg).await {
                        error!("Failed to send heartbeat: {}", e);
                        shutdown_token.cancel();
                        return Err(WsError::channel_closed("send_tx", e.to_string()));
                    }
                }
            }
        }
    }
}
