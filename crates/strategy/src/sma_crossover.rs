use std::sync::Arc;

use common::{CandleSeries, Error, Result, Signal, SignalType};

use crate::indicators::SmaIndicator;
use crate::{Strategy, StrategyBase, StrategyConfig, StrategyEvent, StrategyObserver};

/// Simple Moving Average crossover.
///
/// Emits BUY when the short SMA crosses above the long SMA between the last
/// two candles and SELL when it crosses below. The previous side of the
/// comparison is inclusive (`<=` / `>=`) and the current side strict, so a
/// cross that touches equality on the way still fires exactly once, while two
/// equal readings in a row never fire.
pub struct SmaCrossoverStrategy {
    base: StrategyBase,
    short: SmaIndicator,
    long: SmaIndicator,
    short_column: String,
    long_column: String,
}

impl SmaCrossoverStrategy {
    pub const TYPE: &'static str = "sma_crossover";
    pub const DEFAULT_SHORT_WINDOW: usize = 20;
    pub const DEFAULT_LONG_WINDOW: usize = 50;

    const REASON_COLUMNS_MISSING: &'static str = "SMA columns missing";
    const REASON_TOO_FEW_ROWS: &'static str = "Insufficient rows for crossover check";
    const REASON_UNDEFINED_VALUES: &'static str = "Undefined SMA values at crossover points";
    const REASON_NO_CROSSOVER: &'static str = "No crossover event.";

    /// Reads `short_window` and `long_window` from `config`.
    ///
    /// Fails with `Error::Config` unless `1 <= short_window < long_window`.
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        config: StrategyConfig,
    ) -> Result<Self> {
        let short_window = config.usize_or("short_window", Self::DEFAULT_SHORT_WINDOW)?;
        let long_window = config.usize_or("long_window", Self::DEFAULT_LONG_WINDOW)?;

        if short_window == 0 {
            return Err(Error::Config("short window must be at least 1".into()));
        }
        if short_window >= long_window {
            return Err(Error::Config(format!(
                "short window ({short_window}) must be less than long window ({long_window}) for SMA crossover"
            )));
        }

        let base = StrategyBase::new(id, symbol, config);
        let strategy = Self {
            base,
            short: SmaIndicator::new(short_window),
            long: SmaIndicator::new(long_window),
            short_column: format!("sma_short_{short_window}"),
            long_column: format!("sma_long_{long_window}"),
        };
        strategy.announce();
        Ok(strategy)
    }

    /// Replace the default `tracing` observer.
    pub fn with_observer(mut self, observer: Arc<dyn StrategyObserver>) -> Self {
        self.base.set_observer(observer);
        self.announce();
        self
    }

    pub fn short_window(&self) -> usize {
        self.short.window
    }

    pub fn long_window(&self) -> usize {
        self.long.window
    }

    pub fn short_column(&self) -> &str {
        &self.short_column
    }

    pub fn long_column(&self) -> &str {
        &self.long_column
    }

    fn announce(&self) {
        self.base.emit(StrategyEvent::Initialized {
            params: format!(
                "short_window={}, long_window={}",
                self.short.window, self.long.window
            ),
        });
    }

    fn finish(&self, signal: Signal) -> Signal {
        self.base.emit(StrategyEvent::SignalGenerated {
            signal_type: signal.signal_type(),
            reason: signal.reason().unwrap_or_default().to_string(),
        });
        signal
    }

    fn no_signal(&self, reason: &str) -> Signal {
        self.finish(Signal::no_signal(self.base.symbol(), reason))
    }

    fn malformed(&self, series: &CandleSeries, reason: String) -> CandleSeries {
        self.base.emit(StrategyEvent::MalformedInput { reason });
        CandleSeries::empty(series.symbol(), series.interval())
    }
}

/// Treat non-finite values the same as undefined ones.
fn defined(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

impl Strategy for SmaCrossoverStrategy {
    fn base(&self) -> &StrategyBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StrategyBase {
        &mut self.base
    }

    fn required_candles(&self) -> usize {
        // One extra for the previous crossover point, one more as margin.
        self.long.window + 2
    }

    fn min_candles(&self) -> usize {
        // Two defined long SMA values: the crossover point and the one before.
        self.long.window + 1
    }

    fn calculate_indicators(&self, series: &CandleSeries) -> CandleSeries {
        if series.len() < self.long.window {
            self.base.emit(StrategyEvent::InsufficientData {
                available: series.len(),
                required: self.long.window,
            });
            return series.clone();
        }

        if let Some(i) = series.candles().iter().position(|c| !c.close.is_finite()) {
            return self.malformed(series, format!("close price at index {i} is not numeric"));
        }

        let closes = series.closes();
        let mut decorated = series.clone();
        for (column, indicator) in [
            (&self.short_column, &self.short),
            (&self.long_column, &self.long),
        ] {
            if let Err(e) = decorated.insert_indicator(column.clone(), indicator.compute(&closes)) {
                return self.malformed(series, e.to_string());
            }
        }

        let latest = [&self.short_column, &self.long_column]
            .into_iter()
            .map(|name| {
                let last = decorated.indicator(name).and_then(|col| col.last().copied().flatten());
                (name.clone(), last)
            })
            .collect();
        self.base.emit(StrategyEvent::IndicatorsCalculated { latest });

        decorated
    }

    fn generate_signal(&self, series: &CandleSeries) -> Signal {
        let (Some(short), Some(long)) = (
            series.indicator(&self.short_column),
            series.indicator(&self.long_column),
        ) else {
            return self.no_signal(Self::REASON_COLUMNS_MISSING);
        };

        let n = series.len();
        if n < 2 {
            return self.no_signal(Self::REASON_TOO_FEW_ROWS);
        }

        let (Some(prev_short), Some(prev_long), Some(curr_short), Some(curr_long)) = (
            defined(short[n - 2]),
            defined(long[n - 2]),
            defined(short[n - 1]),
            defined(long[n - 1]),
        ) else {
            return self.no_signal(Self::REASON_UNDEFINED_VALUES);
        };

        let price = series.candles()[n - 1].close;

        let (signal_type, reason) = if prev_short <= prev_long && curr_short > curr_long {
            (
                SignalType::Buy,
                format!(
                    "Bullish crossover: short SMA ({curr_short:.4}) crossed above long SMA ({curr_long:.4})"
                ),
            )
        } else if prev_short >= prev_long && curr_short < curr_long {
            (
                SignalType::Sell,
                format!(
                    "Bearish crossover: short SMA ({curr_short:.4}) crossed below long SMA ({curr_long:.4})"
                ),
            )
        } else {
            (SignalType::Hold, Self::REASON_NO_CROSSOVER.to_string())
        };

        self.finish(
            Signal::new(signal_type, self.base.symbol())
                .with_detail(Signal::REASON, reason)
                .with_detail(Signal::PRICE_AT_SIGNAL, price)
                .with_detail(Signal::SHORT_SMA, curr_short)
                .with_detail(Signal::LONG_SMA, curr_long),
        )
    }
}
