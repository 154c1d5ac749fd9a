use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price tick delivered to hub subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: Decimal,
    pub percent_change_24h: Decimal,
    pub timestamp: u64, // 事件时间，毫秒
}
