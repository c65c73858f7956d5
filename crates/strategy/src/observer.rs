use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use common::SignalType;

/// Something worth reporting during a strategy's lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyEvent {
    Initialized { params: String },
    DataUpdated { candles: usize },
    /// Not enough candles to compute indicators; the series was passed through.
    InsufficientData { available: usize, required: usize },
    /// Input could not be used; the indicator step returned an empty series.
    MalformedInput { reason: String },
    /// Latest value of each computed indicator column.
    IndicatorsCalculated { latest: Vec<(String, Option<f64>)> },
    SignalGenerated { signal_type: SignalType, reason: String },
}

/// Sink for strategy events, injected into every strategy instance.
pub trait StrategyObserver: Send + Sync {
    fn on_event(&self, strategy_id: &str, symbol: &str, event: &StrategyEvent);
}

/// Forwards events to `tracing`. Used unless another observer is injected.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StrategyObserver for TracingObserver {
    fn on_event(&self, strategy_id: &str, symbol: &str, event: &StrategyEvent) {
        match event {
            StrategyEvent::Initialized { params } => {
                info!(strategy = %strategy_id, symbol = %symbol, %params, "Strategy initialized");
            }
            StrategyEvent::DataUpdated { candles } => {
                debug!(strategy = %strategy_id, symbol = %symbol, candles, "Stored latest candles");
            }
            StrategyEvent::InsufficientData { available, required } => {
                warn!(
                    strategy = %strategy_id,
                    symbol = %symbol,
                    available,
                    required,
                    "Not enough data points to calculate indicators, skipping"
                );
            }
            StrategyEvent::MalformedInput { reason } => {
                error!(strategy = %strategy_id, symbol = %symbol, %reason, "Malformed candle input");
            }
            StrategyEvent::IndicatorsCalculated { latest } => {
                debug!(strategy = %strategy_id, symbol = %symbol, ?latest, "Indicators calculated");
            }
            StrategyEvent::SignalGenerated { signal_type, reason } => match signal_type {
                SignalType::Buy | SignalType::Sell => {
                    info!(strategy = %strategy_id, symbol = %symbol, signal = %signal_type, %reason, "Signal generated");
                }
                SignalType::NoSignal => {
                    warn!(strategy = %strategy_id, symbol = %symbol, %reason, "Cannot generate signal");
                }
                SignalType::Hold => {
                    debug!(strategy = %strategy_id, symbol = %symbol, %reason, "Hold");
                }
            },
        }
    }
}

/// Keeps every event in memory. Handy for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<StrategyEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<StrategyEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl StrategyObserver for RecordingObserver {
    fn on_event(&self, _strategy_id: &str, _symbol: &str, event: &StrategyEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
