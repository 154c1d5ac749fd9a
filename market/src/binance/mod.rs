pub mod consts;
pub mod models;
pub mod parser;
pub mod symbols;

mod connector;
mod price_hub;
pub use connector::{MessageHandler, StreamConnection, StreamConnector, WsConnector};
pub use price_hub::{HubConfig, LivePriceHub, PriceCallback};
