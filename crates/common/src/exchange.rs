use async_trait::async_trait;

use crate::{CandleSeries, Result};

/// Abstraction over wherever candles come from.
///
/// `BinanceFuturesClient` implements this for the live feed; tests use
/// in-memory sources. The strategy runner only ever sees this trait, never
/// the concrete exchange client.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch the most recent `limit` candles for `symbol` at `interval`,
    /// oldest first. No data is an empty series, not an error.
    async fn fetch_recent_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<CandleSeries>;

    /// Largest `limit` a single fetch can honour. `None` means unbounded.
    fn max_limit(&self) -> Option<usize> {
        None
    }
}
