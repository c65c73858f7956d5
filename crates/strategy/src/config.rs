use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "sma_crossover"
/// id = "btc-sma-20-50"
/// symbol = "BTCUSDT"
/// interval = "1m"
///
/// [strategy.params]
/// short_window = 20
/// long_window = 50
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyEntry>,
}

/// One strategy instance to run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyEntry {
    /// Strategy type identifier. Only "sma_crossover" is known.
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Unique id shown in logs and notifications.
    pub id: String,
    /// Instrument, e.g. "BTCUSDT".
    pub symbol: String,
    /// Kline interval, e.g. "1m", "15m", "1h".
    pub interval: String,
    /// Candles to fetch per cycle. Defaults to what the strategy needs.
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub params: StrategyConfig,
}

/// Flat mapping of named strategy parameters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct StrategyConfig {
    params: BTreeMap<String, toml::Value>,
}

impl StrategyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.params.get(key)
    }

    /// Non-negative integer parameter, or `default` when absent.
    /// A present value of the wrong shape is a configuration error.
    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize> {
        match self.params.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_integer()
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| {
                    Error::Config(format!(
                        "parameter '{key}' must be a non-negative integer, got {v}"
                    ))
                }),
        }
    }
}

impl std::fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (k, v) in &self.params {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

impl StrategyFileConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read strategy config at '{path}': {e}"))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("strategy config at '{path}': {e}")))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }
}
