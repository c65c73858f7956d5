use std::time::Duration;

use url::Url;

use crate::{Error, Result};

pub const BINANCE_FUTURES_LIVE_URL: &str = "https://fapi.binance.com";
pub const BINANCE_FUTURES_TESTNET_URL: &str = "https://testnet.binancefuture.com";

/// All process configuration, loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_name: String,

    // Exchange credentials
    pub binance_api_key: String,
    pub binance_secret: String,
    pub binance_testnet: bool,
    /// Futures REST root, already resolved from the testnet flag or override.
    pub binance_futures_base_url: Url,

    // Telegram. Both optional: without them notifications are only logged.
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<i64>,

    // Strategy config file path
    pub strategy_config_path: String,
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from the environment, reading `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values (`KEY=` in .env) count as unset.
        let optional = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            optional(key).ok_or_else(|| {
                Error::Config(format!(
                    "Required environment variable '{key}' is not set. Check your .env file."
                ))
            })
        };

        let binance_testnet = match optional("BINANCE_TESTNET") {
            None => true,
            Some(v) => parse_bool(&v).ok_or_else(|| {
                Error::Config(format!("BINANCE_TESTNET must be true or false, got: '{v}'"))
            })?,
        };

        let base = optional("BINANCE_FUTURES_BASE_URL").unwrap_or_else(|| {
            if binance_testnet {
                BINANCE_FUTURES_TESTNET_URL.to_string()
            } else {
                BINANCE_FUTURES_LIVE_URL.to_string()
            }
        });
        let binance_futures_base_url = Url::parse(&base)
            .map_err(|e| Error::Config(format!("invalid BINANCE_FUTURES_BASE_URL '{base}': {e}")))?;

        let telegram_chat_id = match optional("TELEGRAM_CHAT_ID") {
            None => None,
            Some(v) => Some(v.trim().parse::<i64>().map_err(|_| {
                Error::Config(format!("TELEGRAM_CHAT_ID is not numeric: '{}'", v.trim()))
            })?),
        };

        let poll_secs = match optional("POLL_INTERVAL_SECS") {
            None => 60,
            Some(v) => match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(Error::Config(format!(
                        "POLL_INTERVAL_SECS must be a positive number of seconds, got: '{v}'"
                    )))
                }
            },
        };

        Ok(Config {
            project_name: optional("PROJECT_NAME").unwrap_or_else(|| "Arbix".to_string()),
            binance_api_key: required("BINANCE_API_KEY")?,
            binance_secret: required("BINANCE_SECRET")?,
            binance_testnet,
            binance_futures_base_url,
            telegram_token: optional("TELEGRAM_TOKEN"),
            telegram_chat_id,
            strategy_config_path: optional("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            poll_interval: Duration::from_secs(poll_secs),
        })
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let map = vars(pairs);
        Config::from_vars(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_to_testnet_with_minimal_vars() {
        let cfg = load(&[("BINANCE_API_KEY", "k"), ("BINANCE_SECRET", "s")]).unwrap();
        assert!(cfg.binance_testnet);
        assert_eq!(cfg.binance_futures_base_url.as_str(), "https://testnet.binancefuture.com/");
        assert_eq!(cfg.project_name, "Arbix");
        assert_eq!(cfg.strategy_config_path, "config/strategies.toml");
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
        assert!(cfg.telegram_token.is_none());
        assert!(cfg.telegram_chat_id.is_none());
    }

    #[test]
    fn live_mode_uses_live_url() {
        let cfg = load(&[
            ("BINANCE_API_KEY", "k"),
            ("BINANCE_SECRET", "s"),
            ("BINANCE_TESTNET", "false"),
        ])
        .unwrap();
        assert!(!cfg.binance_testnet);
        assert_eq!(cfg.binance_futures_base_url.as_str(), "https://fapi.binance.com/");
    }

    #[test]
    fn missing_credentials_is_config_error() {
        assert!(matches!(load(&[("BINANCE_API_KEY", "k")]), Err(Error::Config(_))));
        assert!(matches!(
            load(&[("BINANCE_API_KEY", " "), ("BINANCE_SECRET", "s")]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn rejects_bad_chat_id_and_url() {
        let base = [("BINANCE_API_KEY", "k"), ("BINANCE_SECRET", "s")];
        let mut with_chat = base.to_vec();
        with_chat.push(("TELEGRAM_CHAT_ID", "abc"));
        assert!(matches!(load(&with_chat), Err(Error::Config(_))));

        let mut with_url = base.to_vec();
        with_url.push(("BINANCE_FUTURES_BASE_URL", "not a url"));
        assert!(matches!(load(&with_url), Err(Error::Config(_))));
    }

    #[test]
    fn parses_telegram_and_poll_interval() {
        let cfg = load(&[
            ("BINANCE_API_KEY", "k"),
            ("BINANCE_SECRET", "s"),
            ("TELEGRAM_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "-100200"),
            ("POLL_INTERVAL_SECS", "15"),
        ])
        .unwrap();
        assert_eq!(cfg.telegram_token.as_deref(), Some("123:abc"));
        assert_eq!(cfg.telegram_chat_id, Some(-100200));
        assert_eq!(cfg.poll_interval, Duration::from_secs(15));
    }

    #[test]
    fn blank_optional_vars_fall_back_to_defaults() {
        let cfg = load(&[
            ("BINANCE_API_KEY", "k"),
            ("BINANCE_SECRET", "s"),
            ("TELEGRAM_TOKEN", ""),
            ("TELEGRAM_CHAT_ID", ""),
            ("PROJECT_NAME", " "),
            ("BINANCE_FUTURES_BASE_URL", ""),
            ("POLL_INTERVAL_SECS", ""),
        ])
        .unwrap();
        assert!(cfg.telegram_token.is_none());
        assert!(cfg.telegram_chat_id.is_none());
        assert_eq!(cfg.project_name, "Arbix");
        assert_eq!(cfg.binance_futures_base_url.as_str(), "https://testnet.binancefuture.com/");
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
    }

    #[test]
    fn invalid_poll_interval_is_config_error() {
        for bad in ["0", "-5", "soon"] {
            let res = load(&[
                ("BINANCE_API_KEY", "k"),
                ("BINANCE_SECRET", "s"),
                ("POLL_INTERVAL_SECS", bad),
            ]);
            assert!(matches!(res, Err(Error::Config(_))), "accepted {bad:?}");
        }
    }
}
