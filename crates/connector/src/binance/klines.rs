use chrono::{DateTime, TimeZone, Utc};

use common::{Candle, CandleSeries, Error, Result};

/// Binance caps a single futures klines request at this many rows.
pub const MAX_KLINES_LIMIT: usize = 1500;

/// Parameters for `GET /fapi/v1/klines`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineQuery {
    pub symbol: String,
    pub interval: String,
    pub start_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
    pub limit: usize,
}

impl KlineQuery {
    /// The latest `limit` klines, no time bounds.
    pub fn latest(symbol: impl Into<String>, interval: impl Into<String>, limit: usize) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            start_time_ms: None,
            end_time_ms: None,
            limit,
        }
    }

    pub fn starting_at(mut self, start_time_ms: i64) -> Self {
        self.start_time_ms = Some(start_time_ms);
        self
    }

    pub fn ending_at(mut self, end_time_ms: i64) -> Self {
        self.end_time_ms = Some(end_time_ms);
        self
    }

    pub fn to_query(&self) -> String {
        let limit = self.limit.clamp(1, MAX_KLINES_LIMIT);
        let mut query = format!(
            "symbol={}&interval={}&limit={limit}",
            self.symbol, self.interval
        );
        if let Some(start) = self.start_time_ms {
            query.push_str(&format!("&startTime={start}"));
        }
        if let Some(end) = self.end_time_ms {
            query.push_str(&format!("&endTime={end}"));
        }
        query
    }
}

/// One row as Binance sends it:
/// `[open_time, open, high, low, close, volume, close_time, quote_volume,
///   trades, taker_buy_base, taker_buy_quote, ignore]`.
type RawKline = (
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    u64,
    String,
    String,
    serde_json::Value,
);

/// Parse a klines response body into a validated series.
pub fn parse_klines(symbol: &str, interval: &str, body: &str) -> Result<CandleSeries> {
    let rows: Vec<RawKline> = serde_json::from_str(body)?;
    let candles = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| parse_row(row).map_err(|e| Error::Exchange(format!("kline {i}: {e}"))))
        .collect::<Result<Vec<_>>>()?;
    CandleSeries::new(symbol, interval, candles)
}

fn parse_row(row: RawKline) -> Result<Candle> {
    let (
        open_time,
        open,
        high,
        low,
        close,
        volume,
        close_time,
        quote_volume,
        trades,
        taker_base,
        taker_quote,
        _ignore,
    ) = row;

    Ok(Candle {
        open_time: millis(open_time)?,
        open: number("open", &open)?,
        high: number("high", &high)?,
        low: number("low", &low)?,
        close: number("close", &close)?,
        volume: number("volume", &volume)?,
        close_time: millis(close_time)?,
        quote_asset_volume: number("quote_asset_volume", &quote_volume)?,
        trade_count: trades,
        taker_buy_base_volume: number("taker_buy_base_volume", &taker_base)?,
        taker_buy_quote_volume: number("taker_buy_quote_volume", &taker_quote)?,
    })
}

fn number(field: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|e| Error::InvalidData(format!("{field} '{raw}' is not numeric: {e}")))
}

fn millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::InvalidData(format!("timestamp {ms} out of range")))
}
