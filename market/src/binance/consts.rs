use std::time::Duration;

pub const SPOT_WSS_URL: &str = "wss://stream.binance.com:9443";

// 全市场miniTicker，每秒推送一次所有变动的交易对
pub const MINI_TICKER_STREAM_URL: &str = "wss://stream.binance.com:9443/ws/!miniTicker@arr";

pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
