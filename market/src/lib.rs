pub mod binance;
pub mod coingecko;
pub mod errors;
pub mod http;
pub mod mempool;

pub use errors::{MarketError, Result};
pub use http::HttpFetcher;

#[cfg(test)]
mod test_util;
