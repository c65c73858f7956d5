pub mod binance;

pub use binance::{usdt_wallet_balance, AccountAsset, BinanceFuturesClient, KlineQuery};
