pub mod consts;
pub mod models;

mod client;
pub use client::CoinGeckoClient;
