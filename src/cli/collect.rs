//! Collect command implementation

use crate::collector::{CollectorContext, CollectorError, Session};
use crate::config::Config;
use crate::exchange::{BinanceAdapter, BinanceSnapshot, ExchangeAdapter};
use crate::store::{dataset_dir, ParquetStore, TimeSeriesStore};
use crate::telemetry;
use crate::timeframe::Timeframe;
use chrono::Utc;
use clap::Args;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Output directory for data sets (overrides data.output_dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stop after this many polling rounds; runs until Ctrl-C when absent
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,

    /// Seconds between polling rounds (overrides binance.poll_interval_secs)
    #[arg(long)]
    pub interval: Option<u64>,
}

/// Seconds since the Unix epoch
fn now_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

impl CollectArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| config.data.output_dir.clone());
        let dir = dataset_dir(&output, &config.collector.exchange, Utc::now());

        let adapter = Arc::new(BinanceAdapter::new(config.binance.clone())?);
        let dyn_adapter: Arc<dyn ExchangeAdapter> = adapter.clone();
        let mut session = Session::new(
            &config.collector,
            ParquetStore::new(&dir),
            Some(dyn_adapter),
            CollectorContext::shared(),
        );

        let report = session.initialize().await?;
        for warning in &report.warnings {
            warn!(%warning, "Initialization warning");
        }
        session.record_description().await?;

        info!(
            session = %report.session_id,
            dir = %dir.display(),
            symbols = session.symbols().len(),
            timeframes = report.timeframes.len(),
            "Collecting"
        );

        let period = self
            .interval
            .unwrap_or(config.binance.poll_interval_secs)
            .max(1);
        let mut ticker = tokio::time::interval(Duration::from_secs(period));
        let mut rounds = 0u64;
        let mut cursor = CandleCursor::default();

        let result = loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, closing session");
                    break Ok(());
                }
            }

            if let Err(e) = poll_round(&mut session, &adapter, &mut cursor).await {
                break Err(e);
            }

            rounds += 1;
            if self.iterations.is_some_and(|n| rounds >= n) {
                break Ok(());
            }
        };

        session.close().await?;
        info!(rounds, dir = %dir.display(), "Data set closed");
        println!("{}", dir.display());
        result
    }
}

/// Open time (ms) of the newest closed candle written per symbol and timeframe
///
/// The klines endpoint returns the same closed candles on every poll until a
/// newer one closes; only candles past the cursor are saved.
#[derive(Debug, Default)]
struct CandleCursor {
    last_open: HashMap<(String, Timeframe), f64>,
}

impl CandleCursor {
    fn unseen(&self, symbol: &str, timeframe: Timeframe, candles: &[[f64; 6]]) -> Vec<[f64; 6]> {
        let last = self.last_open.get(&(symbol.to_string(), timeframe)).copied();
        candles
            .iter()
            .filter(|c| last.map_or(true, |open| c[0] > open))
            .copied()
            .collect()
    }

    fn advance(&mut self, symbol: &str, timeframe: Timeframe, candles: &[[f64; 6]]) {
        if let Some(newest) = candles.iter().map(|c| c[0]).reduce(f64::max) {
            let entry = self
                .last_open
                .entry((symbol.to_string(), timeframe))
                .or_insert(newest);
            *entry = entry.max(newest);
        }
    }
}

/// Fetch every symbol concurrently and record the snapshots
async fn poll_round(
    session: &mut Session<ParquetStore>,
    adapter: &BinanceAdapter,
    cursor: &mut CandleCursor,
) -> anyhow::Result<()> {
    let symbols = session.symbols().to_vec();
    let timeframes = session.timeframes().to_vec();

    let snapshots = join_all(
        symbols
            .iter()
            .map(|symbol| adapter.fetch_snapshot(symbol, &timeframes)),
    )
    .await;

    for (symbol, snapshot) in symbols.iter().zip(snapshots) {
        match snapshot {
            Ok(snapshot) => {
                telemetry::record_snapshot(adapter.name());
                record_snapshot(session, &snapshot, cursor).await?;
            }
            Err(e) => warn!(%symbol, error = %e, "Snapshot fetch failed"),
        }
    }
    Ok(())
}

/// Fatal errors stop the loop; anything else is logged and skipped
fn settle(result: Result<usize, CollectorError>, symbol: &str) -> anyhow::Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(e) => {
            warn!(%symbol, error = %e, "Save failed");
            Ok(false)
        }
    }
}

/// Write one snapshot
async fn record_snapshot<S: TimeSeriesStore>(
    session: &mut Session<S>,
    snapshot: &BinanceSnapshot,
    cursor: &mut CandleCursor,
) -> anyhow::Result<()> {
    let now = now_seconds();
    let exchange = session.exchange_id().to_string();
    let crypto = snapshot.cryptocurrency.as_str();
    let symbol = snapshot.symbol.as_str();

    let result = session
        .save_ticker(now, &exchange, crypto, symbol, std::slice::from_ref(&snapshot.ticker))
        .await;
    settle(result, symbol)?;

    let result = session
        .save_order_book(
            now,
            &exchange,
            crypto,
            symbol,
            std::slice::from_ref(&snapshot.asks),
            std::slice::from_ref(&snapshot.bids),
        )
        .await;
    settle(result, symbol)?;

    let result = session
        .save_recent_trades(
            now,
            &exchange,
            crypto,
            symbol,
            std::slice::from_ref(&snapshot.trades),
        )
        .await;
    settle(result, symbol)?;

    for (timeframe, candles) in &snapshot.closed_candles {
        let fresh = cursor.unseen(symbol, *timeframe, candles);
        if fresh.is_empty() {
            continue;
        }
        let open_times: Vec<f64> = fresh.iter().map(|c| c[0] / 1000.0).collect();
        let result = session
            .save_ohlcv(open_times, &exchange, crypto, symbol, *timeframe, &fresh)
            .await;
        if settle(result, symbol)? {
            cursor.advance(symbol, *timeframe, &fresh);
        }
    }

    for (timeframe, candle) in &snapshot.open_candles {
        let result = session
            .save_kline(
                now,
                &exchange,
                crypto,
                symbol,
                *timeframe,
                std::slice::from_ref(candle),
            )
            .await;
        settle(result, symbol)?;
    }

    Ok(())
}
