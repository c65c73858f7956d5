use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info};
use url::Url;

use common::{CandleSeries, CandleSource, Error, Result};

use super::klines::{parse_klines, KlineQuery, MAX_KLINES_LIMIT};

/// Receive window sent with signed account queries, in milliseconds.
const RECV_WINDOW_MS: u64 = 6000;

/// REST client for the Binance USD-M futures API. Used for klines and
/// account queries; never places orders.
pub struct BinanceFuturesClient {
    api_key: String,
    secret: String,
    base_url: String,
    http: Client,
}

/// One asset line of the futures account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountAsset {
    pub asset: String,
    pub wallet_balance: f64,
    pub available_balance: Option<f64>,
}

impl BinanceFuturesClient {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        base_url: &Url,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            secret: secret.into(),
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn sign(&self, query: &str) -> String {
        sign_query(&self.secret, query)
    }

    async fn get(&self, path: &str, query: &str) -> Result<String> {
        let url = if query.is_empty() {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}{path}?{query}", self.base_url)
        };
        debug!(%path, "Binance GET");

        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Exchange(describe_error(status.as_u16(), &body)));
        }
        Ok(body)
    }

    async fn signed_get(&self, path: &str, params: &str) -> Result<String> {
        let ts = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("timestamp={ts}")
        } else {
            format!("{params}&timestamp={ts}")
        };
        let signature = self.sign(&query);
        self.get(path, &format!("{query}&signature={signature}")).await
    }

    /// Connectivity check.
    pub async fn ping(&self) -> Result<()> {
        self.get("/fapi/v1/ping", "").await?;
        info!("Binance Futures API ping successful");
        Ok(())
    }

    /// Exchange server time in milliseconds since the epoch.
    pub async fn server_time(&self) -> Result<i64> {
        let body = self.get("/fapi/v1/time", "").await?;
        let time: ServerTime = serde_json::from_str(&body)?;
        info!(server_time = time.server_time, "Binance Futures server time");
        Ok(time.server_time)
    }

    /// Asset balances of the futures account.
    pub async fn account_assets(&self) -> Result<Vec<AccountAsset>> {
        let body = self
            .signed_get("/fapi/v2/account", &format!("recvWindow={RECV_WINDOW_MS}"))
            .await?;
        let account: AccountResponse = serde_json::from_str(&body)?;
        debug!(assets = account.assets.len(), "Fetched futures account details");

        account
            .assets
            .into_iter()
            .map(|a| {
                let wallet_balance = a.wallet_balance.parse::<f64>().map_err(|e| {
                    Error::Exchange(format!("{} walletBalance '{}': {e}", a.asset, a.wallet_balance))
                })?;
                let available_balance = a.available_balance.and_then(|v| v.parse::<f64>().ok());
                Ok(AccountAsset {
                    asset: a.asset,
                    wallet_balance,
                    available_balance,
                })
            })
            .collect()
    }

    /// Historical klines, oldest first. An empty answer is an empty series.
    pub async fn klines(&self, query: &KlineQuery) -> Result<CandleSeries> {
        let body = self.get("/fapi/v1/klines", &query.to_query()).await?;
        let series = parse_klines(&query.symbol, &query.interval, &body)?;
        if series.is_empty() {
            info!(symbol = %query.symbol, interval = %query.interval, "No klines returned");
        } else {
            debug!(
                symbol = %query.symbol,
                interval = %query.interval,
                count = series.len(),
                "Fetched klines"
            );
        }
        Ok(series)
    }
}

/// USDT wallet balance, if the account holds any.
pub fn usdt_wallet_balance(assets: &[AccountAsset]) -> Option<f64> {
    assets
        .iter()
        .find(|a| a.asset == "USDT")
        .map(|a| a.wallet_balance)
}

#[async_trait]
impl CandleSource for BinanceFuturesClient {
    async fn fetch_recent_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<CandleSeries> {
        self.klines(&KlineQuery::latest(symbol, interval, limit)).await
    }

    fn max_limit(&self) -> Option<usize> {
        Some(MAX_KLINES_LIMIT)
    }
}

/// HMAC-SHA256 of `query` keyed with `secret`, hex encoded.
fn sign_query(secret: &str, query: &str) -> String {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(query.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Prefer Binance's `{code, msg}` error body when there is one.
fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(err) => format!("HTTP {status}: {} (code {})", err.msg, err.code),
        Err(_) => format!("HTTP {status}: {body}"),
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerTime {
    server_time: i64,
}

#[derive(Deserialize)]
struct AccountResponse {
    #[serde(default)]
    assets: Vec<RawAsset>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAsset {
    asset: String,
    wallet_balance: String,
    #[serde(default)]
    available_balance: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}
