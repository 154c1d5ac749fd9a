use super::connector::{MessageHandler, StreamConnector, WsConnector};
use super::consts::{MAX_RECONNECT_ATTEMPTS, MINI_TICKER_STREAM_URL, RECONNECT_DELAY};
use super::models::PriceUpdate;
use super::parser::parse_mini_ticker_batch;
use super::symbols::SymbolTable;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Subscriber handle. Two handles are the same subscriber only when they are
/// clones of one another, whatever the wrapped closures do.
#[derive(Clone)]
pub struct PriceCallback(Arc<dyn Fn(&PriceUpdate) + Send + Sync>);

impl PriceCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&PriceUpdate) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn same(&self, other: &PriceCallback) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn call(&self, update: &PriceUpdate) {
        (self.0)(update)
    }
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub stream_url: String,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            stream_url: MINI_TICKER_STREAM_URL.to_string(),
            reconnect_delay: RECONNECT_DELAY,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Reconnecting { attempt: u32 },
}

struct HubState {
    // 只保存有订阅者的交易对
    subscribers: HashMap<String, Vec<PriceCallback>>,
    connection: ConnectionState,
    // 当前连接会话，取消即关闭
    session: Option<CancellationToken>,
}

struct HubInner {
    symbols: SymbolTable,
    connector: Arc<dyn StreamConnector>,
    config: HubConfig,
    state: Mutex<HubState>,
}

/// Shares one streaming connection among per-symbol price subscribers.
///
/// The connection exists only while at least one symbol has a subscriber.
/// Unexpected closes are retried with a fixed delay a bounded number of
/// times; after that the hub stays disconnected until the next `subscribe`.
/// Opening the connection needs a tokio runtime: a `subscribe` that would
/// open it from outside one is rejected.
#[derive(Clone)]
pub struct LivePriceHub {
    inner: Arc<HubInner>,
}

impl LivePriceHub {
    pub fn new(symbols: SymbolTable, connector: Arc<dyn StreamConnector>, config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                symbols,
                connector,
                config,
                state: Mutex::new(HubState {
                    subscribers: HashMap::new(),
                    connection: ConnectionState::Disconnected,
                    session: None,
                }),
            }),
        }
    }

    /// Hub on the Binance all-market mini ticker stream.
    pub fn binance(symbols: SymbolTable, config: HubConfig) -> Self {
        Self::new(symbols, Arc::new(WsConnector::default()), config)
    }

    pub fn is_supported(&self, coin_id: &str) -> bool {
        self.inner.symbols.is_supported(coin_id)
    }

    pub fn subscribe(&self, coin_id: &str, callback: &PriceCallback) -> bool {
        let symbol = match self.inner.symbols.symbol_for(coin_id) {
            Some(symbol) => symbol.to_string(),
            None => {
                debug!("unsupported coin: {}", coin_id);
                return false;
            }
        };

        let mut state = self.inner.state.lock();
        // 需要建连时先确认处于tokio运行时中
        let runtime = if state.connection == ConnectionState::Disconnected {
            match Handle::try_current() {
                Ok(runtime) => Some(runtime),
                Err(e) => {
                    error!("cannot open price stream for {}: {}", coin_id, e);
                    return false;
                }
            }
        } else {
            None
        };

        let callbacks = state.subscribers.entry(symbol.clone()).or_default();
        if !callbacks.iter().any(|cb| cb.same(callback)) {
            callbacks.push(callback.clone());
            info!(
                "subscribed {} ({}), {} subscribers",
                coin_id,
                symbol,
                callbacks.len()
            );
        }
        if let Some(runtime) = runtime {
            HubInner::start_session(&self.inner, &mut state, &runtime);
        }
        true
    }

    /// Removes this exact handle. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, coin_id: &str, callback: &PriceCallback) -> bool {
        let symbol = match self.inner.symbols.symbol_for(coin_id) {
            Some(symbol) => symbol,
            None => return false,
        };

        let mut state = self.inner.state.lock();
        let callbacks = match state.subscribers.get_mut(symbol) {
            Some(callbacks) => callbacks,
            None => return false,
        };
        let pos = match callbacks.iter().position(|cb| cb.same(callback)) {
            Some(pos) => pos,
            None => return false,
        };
        callbacks.remove(pos);
        if callbacks.is_empty() {
            state.subscribers.remove(symbol);
            info!("no subscribers left for {}", symbol);
        }
        if state.subscribers.is_empty() {
            HubInner::stop_session(&mut state);
        }
        true
    }

    pub fn subscriber_count(&self, coin_id: &str) -> usize {
        let symbol = match self.inner.symbols.symbol_for(coin_id) {
            Some(symbol) => symbol,
            None => return 0,
        };
        self.inner
            .state
            .lock()
            .subscribers
            .get(symbol)
            .map_or(0, Vec::len)
    }

    /// Symbols with at least one subscriber, in ascending order.
    pub fn active_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.inner.state.lock().subscribers.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Drops every subscriber and closes the connection.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        state.subscribers.clear();
        HubInner::stop_session(&mut state);
    }

    pub(crate) fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().connection
    }
}

impl HubInner {
    fn start_session(inner: &Arc<HubInner>, state: &mut HubState, runtime: &Handle) {
        let token = CancellationToken::new();
        state.session = Some(token.clone());
        state.connection = ConnectionState::Connecting;
        info!("opening price stream {}", inner.config.stream_url);
        runtime.spawn(Self::run_session(inner.clone(), token));
    }

    fn stop_session(state: &mut HubState) {
        if let Some(token) = state.session.take() {
            token.cancel();
            info!("closing price stream");
        }
        state.connection = ConnectionState::Disconnected;
    }

    // 仅当会话未被取消时更新状态，取消与状态修改都在锁内完成
    fn transition(&self, token: &CancellationToken, next: ConnectionState) -> bool {
        let mut state = self.state.lock();
        if token.is_cancelled() {
            return false;
        }
        state.connection = next;
        true
    }

    async fn run_session(inner: Arc<HubInner>, token: CancellationToken) {
        let mut attempt = 0u32;
        loop {
            let on_message = Self::message_handler(&inner, token.clone());
            let connected = tokio::select! {
                _ = token.cancelled() => return,
                result = inner.connector.connect(&inner.config.stream_url, on_message) => result,
            };

            match connected {
                Ok(mut connection) => {
                    if !inner.transition(&token, ConnectionState::Open) {
                        connection.close().await;
                        return;
                    }
                    attempt = 0;
                    info!("price stream open");

                    let closed = connection.closed_token();
                    tokio::select! {
                        _ = token.cancelled() => {
                            connection.close().await;
                            info!("price stream closed");
                            return;
                        }
                        _ = closed.cancelled() => {
                            warn!("price stream closed unexpectedly");
                            connection.close().await;
                        }
                    }
                }
                Err(e) => warn!("price stream connect failed: {}", e),
            }

            attempt += 1;
            if attempt > inner.config.max_reconnect_attempts {
                error!(
                    "price stream gave up after {} reconnect attempts",
                    inner.config.max_reconnect_attempts
                );
                let mut state = inner.state.lock();
                if !token.is_cancelled() {
                    state.connection = ConnectionState::Disconnected;
                    state.session = None;
                }
                return;
            }
            if !inner.transition(&token, ConnectionState::Reconnecting { attempt }) {
                return;
            }
            warn!(
                "reconnecting price stream in {:?} (attempt {}/{})",
                inner.config.reconnect_delay, attempt, inner.config.max_reconnect_attempts
            );
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(inner.config.reconnect_delay) => {}
            }
            if !inner.transition(&token, ConnectionState::Connecting) {
                return;
            }
        }
    }

    fn message_handler(inner: &Arc<HubInner>, token: CancellationToken) -> MessageHandler {
        let hub = Arc::downgrade(inner);
        Arc::new(move |text: &str| {
            // 已关闭会话的残留消息直接丢弃
            if token.is_cancelled() {
                return;
            }
            if let Some(hub) = hub.upgrade() {
                hub.dispatch(text);
            }
        })
    }

    fn dispatch(&self, text: &str) {
        let updates = match parse_mini_ticker_batch(text) {
            Ok(updates) => updates,
            Err(e) => {
                warn!("drop malformed price message: {}", e);
                return;
            }
        };

        // 锁内只复制订阅者列表，回调在锁外执行
        let deliveries: Vec<(PriceUpdate, Vec<PriceCallback>)> = {
            let state = self.state.lock();
            updates
                .into_iter()
                .filter_map(|update| {
                    state
                        .subscribers
                        .get(&update.symbol)
                        .map(|callbacks| (update, callbacks.clone()))
                })
                .collect()
        };
        for (update, callbacks) in deliveries {
            for callback in callbacks {
                callback.call(&update);
            }
        }
    }
}
