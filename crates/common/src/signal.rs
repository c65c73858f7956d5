use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The discrete decision a strategy reaches for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
    NoSignal,
}

impl SignalType {
    /// BUY and SELL are the only decisions worth acting on.
    pub fn is_actionable(self) -> bool {
        matches!(self, SignalType::Buy | SignalType::Sell)
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalType::Buy => write!(f, "BUY"),
            SignalType::Sell => write!(f, "SELL"),
            SignalType::Hold => write!(f, "HOLD"),
            SignalType::NoSignal => write!(f, "NO_SIGNAL"),
        }
    }
}

/// A single piece of supporting evidence attached to a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Evidence {
    Number(f64),
    Text(String),
}

impl From<f64> for Evidence {
    fn from(v: f64) -> Self {
        Evidence::Number(v)
    }
}

impl From<String> for Evidence {
    fn from(v: String) -> Self {
        Evidence::Text(v)
    }
}

impl From<&str> for Evidence {
    fn from(v: &str) -> Self {
        Evidence::Text(v.to_string())
    }
}

impl std::fmt::Display for Evidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Evidence::Number(v) => write!(f, "{v}"),
            Evidence::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Output of one strategy evaluation: a decision plus the evidence behind it.
///
/// Built once through the consuming `with_detail` chain and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    signal_type: SignalType,
    symbol: String,
    details: BTreeMap<String, Evidence>,
}

impl Signal {
    pub const REASON: &'static str = "reason";
    pub const PRICE_AT_SIGNAL: &'static str = "price_at_signal";
    pub const SHORT_SMA: &'static str = "short_sma";
    pub const LONG_SMA: &'static str = "long_sma";

    pub fn new(signal_type: SignalType, symbol: impl Into<String>) -> Self {
        Self {
            signal_type,
            symbol: symbol.into(),
            details: BTreeMap::new(),
        }
    }

    /// NO_SIGNAL carrying a diagnostic reason.
    pub fn no_signal(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(SignalType::NoSignal, symbol).with_detail(Self::REASON, reason.into())
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Evidence>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn signal_type(&self) -> SignalType {
        self.signal_type
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn details(&self) -> &BTreeMap<String, Evidence> {
        &self.details
    }

    pub fn reason(&self) -> Option<&str> {
        match self.details.get(Self::REASON) {
            Some(Evidence::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Numeric evidence under `key`, if present.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.details.get(key) {
            Some(Evidence::Number(v)) => Some(*v),
            _ => None,
        }
    }
}
