pub mod config;
pub mod indicators;
pub mod observer;
pub mod runner;
pub mod sma_crossover;

use std::sync::Arc;

pub use config::{StrategyConfig, StrategyEntry, StrategyFileConfig};
pub use observer::{RecordingObserver, StrategyEvent, StrategyObserver, TracingObserver};
pub use runner::StrategyRunner;
pub use sma_crossover::SmaCrossoverStrategy;

use common::{CandleSeries, Signal};

/// Identity, configuration and latest data shared by every strategy.
pub struct StrategyBase {
    id: String,
    symbol: String,
    config: StrategyConfig,
    data: CandleSeries,
    observer: Arc<dyn StrategyObserver>,
}

impl StrategyBase {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, config: StrategyConfig) -> Self {
        let symbol = symbol.into();
        Self {
            id: id.into(),
            data: CandleSeries::empty(symbol.clone(), ""),
            symbol,
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn StrategyObserver>) {
        self.observer = observer;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// The series stored by the last `update_data` call.
    pub fn data(&self) -> &CandleSeries {
        &self.data
    }

    pub fn emit(&self, event: StrategyEvent) {
        self.observer.on_event(&self.id, &self.symbol, &event);
    }

    fn replace_data(&mut self, series: CandleSeries) {
        self.emit(StrategyEvent::DataUpdated { candles: series.len() });
        self.data = series;
    }
}

/// All strategy implementations must satisfy this trait.
///
/// A strategy turns a candle series into indicator columns, then turns the
/// decorated series into exactly one `Signal`. Neither step returns an error:
/// missing or malformed data resolves to an unchanged/empty series and a
/// NO_SIGNAL or HOLD signal with a `reason`.
pub trait Strategy: Send + Sync {
    fn base(&self) -> &StrategyBase;

    fn base_mut(&mut self) -> &mut StrategyBase;

    /// Candles worth fetching per evaluation, including lookback margin.
    fn required_candles(&self) -> usize;

    /// Fewest candles that can ever produce a BUY or SELL. A fetch limit
    /// below this leaves the strategy at NO_SIGNAL forever.
    fn min_candles(&self) -> usize;

    /// Return a copy of `series` with this strategy's indicator columns added.
    ///
    /// When `series` is too short for the indicators it is returned as-is,
    /// which callers must read as "indicators not ready".
    fn calculate_indicators(&self, series: &CandleSeries) -> CandleSeries;

    /// Decide on the latest candle of an already decorated series.
    fn generate_signal(&self, series: &CandleSeries) -> Signal;

    fn id(&self) -> &str {
        self.base().id()
    }

    fn symbol(&self) -> &str {
        self.base().symbol()
    }

    /// Replace the stored series. Nothing is merged with the previous one.
    fn update_data(&mut self, series: CandleSeries) {
        self.base_mut().replace_data(series);
    }

    /// Indicators then signal, over the stored series.
    fn run(&self) -> Signal {
        let decorated = self.calculate_indicators(self.base().data());
        self.generate_signal(&decorated)
    }
}
