pub mod klines;
pub mod rest;

pub use klines::KlineQuery;
pub use rest::{usdt_wallet_balance, AccountAsset, BinanceFuturesClient};
