//! Binance REST adapter
//!
//! Lists tradable symbols for discovery and fetches point-in-time market
//! snapshots (ticker, depth, recent trades, klines) for the collect command.

use super::ExchangeAdapter;
use crate::timeframe::Timeframe;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Binance REST base URL
pub const BINANCE_API_URL: &str = "https://api.binance.com";

/// Binance adapter configuration (`[binance]` section)
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Order book levels per side
    #[serde(default = "default_depth")]
    pub order_book_depth: u32,
    /// Recent trades per request
    #[serde(default = "default_trades_limit")]
    pub trades_limit: u32,
    /// Candles per timeframe per request
    #[serde(default = "default_candles_limit")]
    pub candles_limit: u32,
    /// Seconds between snapshots
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_base_url() -> String {
    BINANCE_API_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_depth() -> u32 {
    20
}
fn default_trades_limit() -> u32 {
    50
}
fn default_candles_limit() -> u32 {
    2
}
fn default_poll_interval() -> u64 {
    60
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            order_book_depth: default_depth(),
            trades_limit: default_trades_limit(),
            candles_limit: default_candles_limit(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// exchangeInfo response (only the fields used)
#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    status: String,
    base_asset: String,
    quote_asset: String,
}

/// depth response
#[derive(Debug, Deserialize)]
struct DepthResponse {
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

/// One symbol's market state at a point in time
#[derive(Debug, Clone)]
pub struct BinanceSnapshot {
    /// Unified symbol, e.g. "BTC/USDT"
    pub symbol: String,
    /// Base currency, e.g. "BTC"
    pub cryptocurrency: String,
    /// 24h ticker body as returned by the venue
    pub ticker: Value,
    /// `[price, size]`, best first
    pub asks: Vec<[f64; 2]>,
    /// `[price, size]`, best first
    pub bids: Vec<[f64; 2]>,
    /// Raw trade entries
    pub trades: Vec<Value>,
    /// Closed candles `[open_time_ms, o, h, l, c, v]` per timeframe
    pub closed_candles: Vec<(Timeframe, Vec<[f64; 6]>)>,
    /// In-progress candle per timeframe
    pub open_candles: Vec<(Timeframe, [f64; 6])>,
}

/// REST client for Binance spot
pub struct BinanceAdapter {
    config: BinanceConfig,
    client: Client,
}

impl BinanceAdapter {
    /// Create an adapter with the given configuration
    pub fn new(config: BinanceConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Adapter configuration
    pub fn config(&self) -> &BinanceConfig {
        &self.config
    }

    /// Venue symbol for a unified symbol ("BTC/USDT" -> "BTCUSDT")
    pub fn venue_symbol(symbol: &str) -> String {
        symbol.replace('/', "").to_uppercase()
    }

    /// Venue interval identifier, `None` where Binance has no such interval
    pub fn venue_interval(timeframe: Timeframe) -> Option<&'static str> {
        match timeframe {
            Timeframe::ThreeHours => None,
            other => Some(other.as_str()),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let url = format!("{}{}", self.config.base_url, path);

        tracing::debug!(url = %url, "Binance request");

        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error: {} - {}", status, body);
        }

        Ok(response.json().await?)
    }

    /// Fetch the full snapshot for one symbol
    pub async fn fetch_snapshot(
        &self,
        symbol: &str,
        timeframes: &[Timeframe],
    ) -> anyhow::Result<BinanceSnapshot> {
        let venue = Self::venue_symbol(symbol);

        let ticker: Value = self
            .get_json("/api/v3/ticker/24hr", &[("symbol", venue.clone())])
            .await?;

        let depth: DepthResponse = self
            .get_json(
                "/api/v3/depth",
                &[
                    ("symbol", venue.clone()),
                    ("limit", self.config.order_book_depth.to_string()),
                ],
            )
            .await?;

        let trades: Vec<Value> = self
            .get_json(
                "/api/v3/trades",
                &[
                    ("symbol", venue.clone()),
                    ("limit", self.config.trades_limit.to_string()),
                ],
            )
            .await?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut closed_candles = Vec::new();
        let mut open_candles = Vec::new();

        for &timeframe in timeframes {
            let Some(interval) = Self::venue_interval(timeframe) else {
                tracing::debug!(%timeframe, "Timeframe not served by Binance, skipping");
                continue;
            };

            let raw: Vec<Vec<Value>> = self
                .get_json(
                    "/api/v3/klines",
                    &[
                        ("symbol", venue.clone()),
                        ("interval", interval.to_string()),
                        ("limit", self.config.candles_limit.to_string()),
                    ],
                )
                .await?;

            let (closed, open) = split_klines(&raw, now_ms)?;
            closed_candles.push((timeframe, closed));
            if let Some(candle) = open {
                open_candles.push((timeframe, candle));
            }
        }

        Ok(BinanceSnapshot {
            symbol: symbol.to_string(),
            cryptocurrency: base_currency(symbol),
            ticker,
            asks: parse_levels(&depth.asks)?,
            bids: parse_levels(&depth.bids)?,
            trades,
            closed_candles,
            open_candles,
        })
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn name(&self) -> &str {
        "binance"
    }

    async fn available_timeframes(&self) -> anyhow::Result<Vec<Timeframe>> {
        Ok(Timeframe::ALL
            .into_iter()
            .filter(|tf| Self::venue_interval(*tf).is_some())
            .collect())
    }

    async fn tradable_symbols(&self) -> anyhow::Result<Vec<String>> {
        let info: ExchangeInfo = self.get_json("/api/v3/exchangeInfo", &[]).await?;
        Ok(tradable_from_info(info))
    }
}

fn tradable_from_info(info: ExchangeInfo) -> Vec<String> {
    info.symbols
        .into_iter()
        .filter(|s| s.status == "TRADING")
        .map(|s| format!("{}/{}", s.base_asset, s.quote_asset))
        .collect()
}

/// Base currency of a unified symbol ("BTC/USDT" -> "BTC")
pub fn base_currency(symbol: &str) -> String {
    symbol.split('/').next().unwrap_or(symbol).to_string()
}

fn parse_levels(levels: &[(String, String)]) -> anyhow::Result<Vec<[f64; 2]>> {
    levels
        .iter()
        .map(|(price, size)| -> anyhow::Result<[f64; 2]> {
            Ok([price.parse()?, size.parse()?])
        })
        .collect()
}

fn number(value: &Value) -> anyhow::Result<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("Number out of range: {}", n)),
        Value::String(s) => Ok(s.parse()?),
        other => anyhow::bail!("Expected number, got {}", other),
    }
}

/// Split raw klines into closed candles and the in-progress one
///
/// Binance rows are `[open_time, o, h, l, c, v, close_time, ...]`; a row whose
/// close time is still ahead of `now_ms` is the open candle.
fn split_klines(
    raw: &[Vec<Value>],
    now_ms: i64,
) -> anyhow::Result<(Vec<[f64; 6]>, Option<[f64; 6]>)> {
    let mut closed = Vec::with_capacity(raw.len());
    let mut open = None;

    for row in raw {
        if row.len() < 7 {
            anyhow::bail!("Malformed kline row: {} fields", row.len());
        }
        let candle = [
            number(&row[0])?,
            number(&row[1])?,
            number(&row[2])?,
            number(&row[3])?,
            number(&row[4])?,
            number(&row[5])?,
        ];
        let close_time = number(&row[6])? as i64;
        if close_time > now_ms {
            open = Some(candle);
        } else {
            closed.push(candle);
        }
    }

    Ok((closed, open))
}
