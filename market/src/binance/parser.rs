use super::models::PriceUpdate;
use crate::errors::{MarketError, Result};
use log::warn;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

#[allow(non_snake_case)]
#[derive(Debug, Deserialize)]
pub struct MiniTickerRaw {
    E: u64,     // 事件时间
    s: String,  // 交易对
    c: Decimal, // 最新成交价
    o: Decimal, // 24小时前开盘价
}

impl From<MiniTickerRaw> for PriceUpdate {
    fn from(raw: MiniTickerRaw) -> Self {
        PriceUpdate {
            percent_change_24h: percent_change(raw.o, raw.c),
            symbol: raw.s,
            price: raw.c,
            timestamp: raw.E,
        }
    }
}

fn percent_change(open: Decimal, close: Decimal) -> Decimal {
    if open.is_zero() {
        return Decimal::ZERO;
    }
    (close - open)
        .checked_div(open)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or_default()
}

/// Parses one `!miniTicker@arr` message. Malformed elements are skipped so the
/// rest of the batch still goes through.
pub fn parse_mini_ticker_batch(data: &str) -> Result<Vec<PriceUpdate>> {
    let values: Vec<Value> = serde_json::from_str(data)
        .map_err(|e| MarketError::parse(format!("mini ticker batch: {}", e)))?;
    let mut updates = Vec::with_capacity(values.len());
    for value in values {
        match MiniTickerRaw::deserialize(&value) {
            Ok(raw) => updates.push(raw.into()),
            Err(e) => warn!("skip malformed mini ticker {}: {}", value, e),
        }
    }
    Ok(updates)
}
