use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinMarket {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub current_price: Option<Decimal>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub high_24h: Option<Decimal>,
    #[serde(default)]
    pub low_24h: Option<Decimal>,
    #[serde(default)]
    pub price_change_24h: Option<Decimal>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<Decimal>,
    #[serde(default)]
    pub circulating_supply: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

// coin id -> (币种 或 "<币种>_24h_change") -> 数值
pub type SimplePrices = HashMap<String, HashMap<String, Option<Decimal>>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub score: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrendingEntry {
    pub item: TrendingCoin,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrendingResponse {
    pub coins: Vec<TrendingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub thumb: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub coins: Vec<SearchCoin>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketChart {
    // (毫秒时间戳, 数值)
    pub prices: Vec<(u64, Decimal)>,
    #[serde(default)]
    pub market_caps: Vec<(u64, f64)>,
    #[serde(default)]
    pub total_volumes: Vec<(u64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalData {
    pub active_cryptocurrencies: u64,
    pub markets: u64,
    pub total_market_cap: HashMap<String, f64>,
    pub total_volume: HashMap<String, f64>,
    pub market_cap_percentage: HashMap<String, f64>,
    #[serde(default)]
    pub market_cap_change_percentage_24h_usd: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GlobalResponse {
    pub data: GlobalData,
}
