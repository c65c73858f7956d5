use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One OHLCV bar as delivered by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base asset volume.
    pub volume: f64,
    pub close_time: DateTime<Utc>,
    pub quote_asset_volume: f64,
    pub trade_count: u64,
    pub taker_buy_base_volume: f64,
    pub taker_buy_quote_volume: f64,
}

/// Ordered candles for one (symbol, interval) pair plus derived indicator
/// columns.
///
/// Candles are strictly ascending by `open_time`. Every indicator column has
/// exactly one entry per candle; undefined values are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleSeries {
    symbol: String,
    interval: String,
    candles: Vec<Candle>,
    indicators: BTreeMap<String, Vec<Option<f64>>>,
}

impl CandleSeries {
    /// Build a series, rejecting unordered, duplicated or inverted candles.
    pub fn new(
        symbol: impl Into<String>,
        interval: impl Into<String>,
        candles: Vec<Candle>,
    ) -> Result<Self> {
        for (i, c) in candles.iter().enumerate() {
            if c.open_time >= c.close_time {
                return Err(Error::InvalidData(format!(
                    "candle {i} opens at {} but closes at {}",
                    c.open_time, c.close_time
                )));
            }
        }
        if let Some(i) = candles
            .windows(2)
            .position(|w| w[0].open_time >= w[1].open_time)
        {
            return Err(Error::InvalidData(format!(
                "candles out of order or duplicated at index {}",
                i + 1
            )));
        }

        Ok(Self {
            symbol: symbol.into(),
            interval: interval.into(),
            candles,
            indicators: BTreeMap::new(),
        })
    }

    /// A series with no candles and no indicators.
    pub fn empty(symbol: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            candles: Vec::new(),
            indicators: BTreeMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Close prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn indicator(&self, name: &str) -> Option<&[Option<f64>]> {
        self.indicators.get(name).map(Vec::as_slice)
    }

    pub fn indicator_names(&self) -> impl Iterator<Item = &str> {
        self.indicators.keys().map(String::as_str)
    }

    /// Attach (or replace) an indicator column. The column must line up with
    /// the candles one-to-one.
    pub fn insert_indicator(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<()> {
        let name = name.into();
        if values.len() != self.candles.len() {
            return Err(Error::InvalidData(format!(
                "indicator '{name}' has {} values for {} candles",
                values.len(),
                self.candles.len()
            )));
        }
        self.indicators.insert(name, values);
        Ok(())
    }
}
