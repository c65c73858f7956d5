use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use common::{CandleSource, Error, Result, Signal};

use crate::config::{StrategyEntry, StrategyFileConfig};
use crate::{SmaCrossoverStrategy, Strategy};

/// A registered strategy plus what to fetch for it each cycle.
struct StrategySlot {
    interval: String,
    limit: usize,
    /// Held for the whole fetch → update → run sequence of one cycle.
    strategy: Mutex<Box<dyn Strategy>>,
}

/// Drives all strategy instances: fetch latest candles, store them, evaluate.
///
/// Each strategy sits behind its own lock so `update_data` + `run` is atomic
/// per strategy. Different strategies share nothing and are evaluated
/// concurrently within a cycle.
pub struct StrategyRunner {
    source: Arc<dyn CandleSource>,
    slots: Vec<StrategySlot>,
}

impl StrategyRunner {
    pub fn new(source: Arc<dyn CandleSource>) -> Self {
        Self {
            source,
            slots: Vec::new(),
        }
    }

    /// Build the runner from config. Unknown types, invalid parameters and
    /// duplicate ids are configuration errors.
    pub fn from_config(file_cfg: &StrategyFileConfig, source: Arc<dyn CandleSource>) -> Result<Self> {
        let mut runner = Self::new(source);
        let mut seen = HashSet::new();

        for entry in &file_cfg.strategies {
            if !seen.insert(entry.id.as_str()) {
                return Err(Error::Config(format!("duplicate strategy id '{}'", entry.id)));
            }
            let strategy = build_strategy(entry)?;
            runner.register(strategy, entry.interval.clone(), entry.limit)?;
        }

        Ok(runner)
    }

    /// Add a strategy. `limit` defaults to the strategy's own requirement.
    ///
    /// A limit the strategy can never signal on, or one the source cannot
    /// serve in a single fetch, is a configuration error.
    pub fn register(
        &mut self,
        strategy: Box<dyn Strategy>,
        interval: impl Into<String>,
        limit: Option<usize>,
    ) -> Result<()> {
        let interval = interval.into();
        let limit = limit.unwrap_or_else(|| strategy.required_candles());

        let min = strategy.min_candles();
        if limit < min {
            return Err(Error::Config(format!(
                "strategy '{}': limit {limit} is below the {min} candles it needs to signal",
                strategy.id()
            )));
        }
        if let Some(max) = self.source.max_limit() {
            if limit > max {
                return Err(Error::Config(format!(
                    "strategy '{}': limit {limit} exceeds the source maximum of {max} candles",
                    strategy.id()
                )));
            }
        }

        info!(
            strategy = %strategy.id(),
            symbol = %strategy.symbol(),
            interval = %interval,
            limit,
            "Registered strategy"
        );
        self.slots.push(StrategySlot {
            interval,
            limit,
            strategy: Mutex::new(strategy),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Evaluate every strategy once. Strategies whose fetch failed are
    /// skipped for this cycle.
    pub async fn run_cycle(&self) -> Vec<Signal> {
        join_all(self.slots.iter().map(|slot| self.evaluate(slot)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn evaluate(&self, slot: &StrategySlot) -> Option<Signal> {
        let mut strategy = slot.strategy.lock().await;

        let series = match self
            .source
            .fetch_recent_candles(strategy.symbol(), &slot.interval, slot.limit)
            .await
        {
            Ok(series) => series,
            Err(e) => {
                warn!(
                    strategy = %strategy.id(),
                    symbol = %strategy.symbol(),
                    error = %e,
                    "Failed to fetch candles, skipping this cycle"
                );
                return None;
            }
        };

        strategy.update_data(series);
        Some(strategy.run())
    }

    /// Run the evaluation loop, pushing every signal to `signal_tx`.
    /// Returns when the signal channel closes.
    pub async fn run(self, poll_interval: Duration, signal_tx: mpsc::Sender<Signal>) {
        info!(strategies = self.slots.len(), every = ?poll_interval, "StrategyRunner running");
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            for signal in self.run_cycle().await {
                if signal_tx.send(signal).await.is_err() {
                    warn!("Signal channel closed — stopping strategy runner");
                    return;
                }
            }
        }
    }
}

// ─── Strategy builders ────────────────────────────────────────────────────────

fn build_strategy(entry: &StrategyEntry) -> Result<Box<dyn Strategy>> {
    match entry.strategy_type.as_str() {
        SmaCrossoverStrategy::TYPE => Ok(Box::new(SmaCrossoverStrategy::new(
            entry.id.clone(),
            entry.symbol.clone(),
            entry.params.clone(),
        )?)),
        other => Err(Error::Config(format!(
            "unknown strategy type '{other}' for '{}'",
            entry.id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use common::{Candle, CandleSeries, SignalType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves one fixed close sequence for every symbol and records limits.
    struct FixedSource {
        closes: Vec<f64>,
        calls: AtomicUsize,
        fail_for: Option<&'static str>,
        max_limit: Option<usize>,
    }

    impl FixedSource {
        fn new(closes: Vec<f64>) -> Self {
            Self {
                closes,
                calls: AtomicUsize::new(0),
                fail_for: None,
                max_limit: None,
            }
        }
    }

    #[async_trait]
    impl CandleSource for FixedSource {
        async fn fetch_recent_candles(
            &self,
            symbol: &str,
            interval: &str,
            limit: usize,
        ) -> Result<CandleSeries> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_for == Some(symbol) {
                return Err(Error::Http("connection reset".into()));
            }
            let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
            let skip = self.closes.len().saturating_sub(limit);
            let candles = self.closes[skip..]
                .iter()
                .enumerate()
                .map(|(i, &close)| {
                    let open_time = start + ChronoDuration::minutes(i as i64);
                    Candle {
                        open_time,
                        open: close,
                        high: close,
                        low: close,
                        close,
                        volume: 1.0,
                        close_time: open_time + ChronoDuration::milliseconds(59_999),
                        quote_asset_volume: close,
                        trade_count: 1,
                        taker_buy_base_volume: 0.5,
                        taker_buy_quote_volume: close / 2.0,
                    }
                })
                .collect();
            CandleSeries::new(symbol, interval, candles)
        }

        fn max_limit(&self) -> Option<usize> {
            self.max_limit
        }
    }

    fn file_config(toml: &str) -> StrategyFileConfig {
        StrategyFileConfig::from_toml_str(toml).unwrap()
    }

    const TWO_STRATEGIES: &str = r#"
        [[strategy]]
        type = "sma_crossover"
        id = "btc"
        symbol = "BTCUSDT"
        interval = "1m"
        [strategy.params]
        short_window = 2
        long_window = 4

        [[strategy]]
        type = "sma_crossover"
        id = "eth"
        symbol = "ETHUSDT"
        interval = "1m"
        limit = 5
        [strategy.params]
        short_window = 2
        long_window = 4
    "#;

    #[tokio::test]
    async fn cycle_evaluates_every_strategy() {
        let source = Arc::new(FixedSource::new(vec![10.0, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 5.0, 6.0]));
        let runner = StrategyRunner::from_config(&file_config(TWO_STRATEGIES), source.clone()).unwrap();
        assert_eq!(runner.len(), 2);

        let mut signals = runner.run_cycle().await;
        signals.sort_by(|a, b| a.symbol().cmp(b.symbol()));

        assert_eq!(signals.len(), 2);
        // BTC fetches long_window + 2 = 6 candles, enough to see the cross.
        assert_eq!(signals[0].symbol(), "BTCUSDT");
        assert_eq!(signals[0].signal_type(), SignalType::Buy);
        // ETH is capped at 5 candles, the fewest that can still cross.
        assert_eq!(signals[1].symbol(), "ETHUSDT");
        assert_eq!(signals[1].signal_type(), SignalType::Buy);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_skips_only_that_strategy() {
        let mut source = FixedSource::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        source.fail_for = Some("ETHUSDT");
        let runner = StrategyRunner::from_config(&file_config(TWO_STRATEGIES), Arc::new(source)).unwrap();

        let signals = runner.run_cycle().await;
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].symbol(), "BTCUSDT");
        assert_eq!(signals[0].signal_type(), SignalType::Hold);
    }

    #[tokio::test]
    async fn run_forwards_signals_until_channel_closes() {
        let source = Arc::new(FixedSource::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        let runner = StrategyRunner::from_config(&file_config(TWO_STRATEGIES), source).unwrap();
        let (signal_tx, mut signal_rx) = mpsc::channel(8);

        let handle = tokio::spawn(runner.run(Duration::from_millis(10), signal_tx));

        let first = tokio::time::timeout(Duration::from_secs(1), signal_rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");
        assert!(matches!(first.symbol(), "BTCUSDT" | "ETHUSDT"));

        drop(signal_rx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("runner did not stop")
            .unwrap();
    }

    #[test]
    fn unknown_type_is_config_error() {
        let cfg = file_config(
            r#"
            [[strategy]]
            type = "rsi"
            id = "x"
            symbol = "BTCUSDT"
            interval = "1m"
            "#,
        );
        let source = Arc::new(FixedSource::new(Vec::new()));
        assert!(matches!(StrategyRunner::from_config(&cfg, source), Err(Error::Config(_))));
    }

    #[test]
    fn invalid_windows_are_config_error() {
        let cfg = file_config(
            r#"
            [[strategy]]
            type = "sma_crossover"
            id = "x"
            symbol = "BTCUSDT"
            interval = "1m"
            [strategy.params]
            short_window = 10
            long_window = 5
            "#,
        );
        let source = Arc::new(FixedSource::new(Vec::new()));
        assert!(matches!(StrategyRunner::from_config(&cfg, source), Err(Error::Config(_))));
    }

    #[test]
    fn duplicate_ids_are_config_error() {
        let cfg = file_config(&TWO_STRATEGIES.replace("id = \"eth\"", "id = \"btc\""));
        let source = Arc::new(FixedSource::new(Vec::new()));
        assert!(matches!(StrategyRunner::from_config(&cfg, source), Err(Error::Config(_))));
    }

    #[test]
    fn sma_alias_is_not_a_strategy_type() {
        let cfg = file_config(&TWO_STRATEGIES.replacen("type = \"sma_crossover\"", "type = \"sma\"", 1));
        let source = Arc::new(FixedSource::new(Vec::new()));
        assert!(matches!(StrategyRunner::from_config(&cfg, source), Err(Error::Config(_))));
    }

    #[test]
    fn limit_below_signal_minimum_is_config_error() {
        // Windows 2/4 need 5 candles for two defined long SMA values.
        let cfg = file_config(&TWO_STRATEGIES.replace("limit = 5", "limit = 4"));
        let source = Arc::new(FixedSource::new(Vec::new()));
        assert!(matches!(StrategyRunner::from_config(&cfg, source), Err(Error::Config(_))));
    }

    #[test]
    fn limit_above_source_maximum_is_config_error() {
        let mut source = FixedSource::new(Vec::new());
        source.max_limit = Some(5);
        // BTC defaults to long_window + 2 = 6 candles.
        assert!(matches!(
            StrategyRunner::from_config(&file_config(TWO_STRATEGIES), Arc::new(source)),
            Err(Error::Config(_))
        ));

        let mut source = FixedSource::new(Vec::new());
        source.max_limit = Some(6);
        let runner = StrategyRunner::from_config(&file_config(TWO_STRATEGIES), Arc::new(source)).unwrap();
        assert_eq!(runner.len(), 2);
    }

    #[test]
    fn register_rejects_unreachable_limit() {
        let mut runner = StrategyRunner::new(Arc::new(FixedSource::new(Vec::new())));
        let strategy = SmaCrossoverStrategy::new(
            "x",
            "BTCUSDT",
            crate::StrategyConfig::new()
                .with("short_window", 2_i64)
                .with("long_window", 4_i64),
        )
        .unwrap();
        assert!(matches!(
            runner.register(Box::new(strategy), "1m", Some(4)),
            Err(Error::Config(_))
        ));
        assert!(runner.is_empty());
    }
}
