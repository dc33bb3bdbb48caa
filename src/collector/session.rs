//! Collector session
//!
//! One session per exchange identity. It owns its store handle, resolves the
//! timeframes it collects, writes the description row once, then encodes and
//! appends market events.

use super::context::{ExchangeCoverage, SharedContext};
use super::description::{Description, SchemaVersion, SCHEMA_VERSION};
use super::types::{
    CollectorError, CollectorWarning, InitReport, Operation, SessionState, Timestamps,
};
use crate::codec;
use crate::config::CollectorConfig;
use crate::exchange::ExchangeAdapter;
use crate::store::{Row, Table, TimeSeriesStore};
use crate::telemetry;
use crate::timeframe::{ResolutionError, Timeframe, TimeframePolicy};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Seconds since the Unix epoch, microsecond precision
fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Keep first occurrence of each symbol
fn dedup_symbols(symbols: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if !out.contains(symbol) {
            out.push(symbol.clone());
        }
    }
    out
}

/// Collector bound to one exchange identity
pub struct Session<S: TimeSeriesStore> {
    id: Uuid,
    exchange_id: String,
    symbols: Vec<String>,
    policy: TimeframePolicy,
    timeframes: Vec<Timeframe>,
    require_adapter: bool,
    schema_version: SchemaVersion,
    store: S,
    adapter: Option<Arc<dyn ExchangeAdapter>>,
    context: SharedContext,
    state: SessionState,
    report: Option<InitReport>,
}

impl<S: TimeSeriesStore> Session<S> {
    /// Create a session; nothing is opened until `initialize`
    pub fn new(
        config: &CollectorConfig,
        store: S,
        adapter: Option<Arc<dyn ExchangeAdapter>>,
        context: SharedContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            exchange_id: config.exchange.clone(),
            symbols: dedup_symbols(&config.symbols),
            policy: TimeframePolicy::from_flag(
                config.use_all_available_timeframes,
                config.timeframes.clone(),
                config.on_empty_discovery,
            ),
            timeframes: Vec::new(),
            require_adapter: config.require_adapter,
            schema_version: SCHEMA_VERSION,
            store,
            adapter,
            context,
            state: SessionState::Created,
            report: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn exchange_id(&self) -> &str {
        &self.exchange_id
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Resolved timeframes; empty before `initialize`
    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.schema_version
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Read access to the owned store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back, e.g. to hand it to a reader
    pub fn into_store(self) -> S {
        self.store
    }

    fn invalid_state(&self, operation: Operation) -> CollectorError {
        CollectorError::InvalidState {
            exchange: self.exchange_id.clone(),
            operation,
            state: self.state,
        }
    }

    /// Mark the session failed and release the store
    async fn abort(&mut self, error: CollectorError) -> CollectorError {
        self.state = SessionState::Failed;
        if let Err(e) = self.store.close().await {
            tracing::error!(exchange = %self.exchange_id, error = %e, "Failed to release store");
        }
        telemetry::record_failure(error.operation());
        tracing::error!(exchange = %self.exchange_id, error = %error, "Session aborted");
        error
    }

    /// Open the store, resolve timeframes and publish coverage
    ///
    /// Repeating the call after success returns the first report.
    #[tracing::instrument(skip_all, fields(exchange = %self.exchange_id, session = %self.id))]
    pub async fn initialize(&mut self) -> Result<InitReport, CollectorError> {
        let operation = Operation::Initialize;
        match self.state {
            SessionState::Created => {}
            SessionState::Initialized | SessionState::Described => {
                if let Some(report) = &self.report {
                    return Ok(report.clone());
                }
            }
            SessionState::Failed | SessionState::Closed => {
                return Err(self.invalid_state(operation));
            }
        }

        if let Err(source) = self.store.initialize().await {
            let error = CollectorError::StoreInit {
                exchange: self.exchange_id.clone(),
                operation,
                source,
            };
            return Err(self.abort(error).await);
        }

        let mut warnings = Vec::new();

        if self.adapter.is_none() {
            if self.require_adapter || self.policy.needs_adapter() {
                let error = CollectorError::DependencyMissing {
                    exchange: self.exchange_id.clone(),
                    operation,
                    dependency: "exchange adapter".to_string(),
                };
                return Err(self.abort(error).await);
            }
            tracing::warn!("No exchange adapter, collecting raw data only");
            warnings.push(CollectorWarning::AdapterMissing);
        }

        let adapter = self.adapter.clone();
        let timeframes = match self.policy.resolve(adapter.as_deref()).await {
            Ok(timeframes) => timeframes,
            Err(ResolutionError::AdapterMissing) => {
                let error = CollectorError::DependencyMissing {
                    exchange: self.exchange_id.clone(),
                    operation,
                    dependency: "exchange adapter".to_string(),
                };
                return Err(self.abort(error).await);
            }
            Err(e) => {
                let error = CollectorError::NoTimeframesAvailable {
                    exchange: self.exchange_id.clone(),
                    operation,
                    reason: e.to_string(),
                };
                return Err(self.abort(error).await);
            }
        };
        if timeframes.is_empty() && self.policy.needs_adapter() {
            warnings.push(CollectorWarning::CandlesDisabled);
        }

        if let Some(adapter) = &adapter {
            match adapter.tradable_symbols().await {
                Ok(tradable) => {
                    let unknown: Vec<String> = self
                        .symbols
                        .iter()
                        .filter(|s| !tradable.contains(s))
                        .cloned()
                        .collect();
                    if !unknown.is_empty() {
                        tracing::warn!(symbols = ?unknown, "Symbols not tradable on venue");
                        warnings.push(CollectorWarning::UnknownSymbols(unknown));
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not verify symbols");
                    warnings.push(CollectorWarning::SymbolCheckFailed(e.to_string()));
                }
            }
        }

        self.timeframes = timeframes;
        self.context.write().await.publish(
            &self.exchange_id,
            ExchangeCoverage {
                symbols: self.symbols.clone(),
                timeframes: self.timeframes.clone(),
            },
        );

        let report = InitReport {
            session_id: self.id,
            timeframes: self.timeframes.clone(),
            warnings,
        };
        self.report = Some(report.clone());
        self.state = SessionState::Initialized;

        tracing::info!(
            symbols = self.symbols.len(),
            timeframes = ?self.timeframes,
            store = %self.store.location(),
            "Session initialized"
        );

        Ok(report)
    }

    /// Write the description row; exactly once, before any save
    #[tracing::instrument(skip_all, fields(exchange = %self.exchange_id, session = %self.id))]
    pub async fn record_description(&mut self) -> Result<Description, CollectorError> {
        let operation = Operation::RecordDescription;
        match self.state {
            SessionState::Initialized => {}
            SessionState::Described => {
                telemetry::record_failure(operation);
                return Err(CollectorError::DuplicateDescription {
                    exchange: self.exchange_id.clone(),
                    operation,
                });
            }
            _ => return Err(self.invalid_state(operation)),
        }

        let description = Description {
            written_at: now_seconds(),
            version: self.schema_version,
            exchange: self.exchange_id.clone(),
            symbols: self.symbols.clone(),
            timeframes: self.timeframes.clone(),
        };

        let row = description
            .to_row()
            .map_err(|source| CollectorError::Encoding {
                exchange: self.exchange_id.clone(),
                operation,
                source,
            })?;

        self.store
            .insert(Table::Description, row)
            .await
            .map_err(|source| CollectorError::Store {
                exchange: self.exchange_id.clone(),
                operation,
                source,
            })?;

        self.state = SessionState::Described;
        telemetry::record_rows_written(Table::Description, 1);
        tracing::info!(version = %self.schema_version, "Description recorded");

        Ok(description)
    }

    /// Checks shared by every save: state, identity, timeframe, arity
    ///
    /// Runs before any encoding so a rejected call writes nothing.
    fn prepare(
        &self,
        operation: Operation,
        timestamps: Timestamps,
        exchange_id: &str,
        timeframe: Option<Timeframe>,
        payloads: &[(&'static str, usize)],
    ) -> Result<Vec<f64>, CollectorError> {
        if self.state != SessionState::Described {
            return Err(self.invalid_state(operation));
        }

        if exchange_id != self.exchange_id {
            return Err(CollectorError::ExchangeMismatch {
                exchange: self.exchange_id.clone(),
                operation,
                actual: exchange_id.to_string(),
            });
        }

        if let Some(timeframe) = timeframe {
            if !self.timeframes.contains(&timeframe) {
                return Err(CollectorError::UnknownTimeframe {
                    exchange: self.exchange_id.clone(),
                    operation,
                    timeframe,
                });
            }
        }

        let arity = |field: &'static str, expected: usize, actual: usize| {
            CollectorError::BatchArityMismatch {
                exchange: self.exchange_id.clone(),
                operation,
                field,
                expected,
                actual,
            }
        };

        let (first_field, rows) = payloads.first().copied().unwrap_or(("payload", 0));
        if rows == 0 {
            return Err(arity(first_field, 1, 0));
        }
        if let Some((field, len)) = payloads.iter().find(|(_, len)| *len != rows) {
            return Err(arity(*field, rows, *len));
        }

        timestamps
            .expand(rows)
            .map_err(|actual| arity("timestamp", rows, actual))
    }

    fn encode<T: Serialize>(
        &self,
        operation: Operation,
        payloads: &[T],
    ) -> Result<Vec<String>, CollectorError> {
        codec::encode_all(payloads).map_err(|source| CollectorError::Encoding {
            exchange: self.exchange_id.clone(),
            operation,
            source,
        })
    }

    /// Build the rows and hand them to the store in one call
    async fn write(
        &mut self,
        operation: Operation,
        timestamps: Vec<f64>,
        cryptocurrency: &str,
        symbol: &str,
        timeframe: Option<Timeframe>,
        columns: Vec<(&'static str, Vec<String>)>,
    ) -> Result<usize, CollectorError> {
        let Some(table) = operation.table() else {
            return Err(self.invalid_state(operation));
        };

        let mut columns: Vec<_> = columns
            .into_iter()
            .map(|(name, values)| (name, values.into_iter()))
            .collect();

        let rows: Vec<Row> = timestamps
            .into_iter()
            .map(|ts| {
                let mut row = Row::new(ts)
                    .with("exchange_name", self.exchange_id.as_str())
                    .with("cryptocurrency", cryptocurrency)
                    .with("symbol", symbol);
                if let Some(tf) = timeframe {
                    row = row.with("time_frame", tf.as_str());
                }
                for (name, values) in columns.iter_mut() {
                    row = row.with(*name, values.next().unwrap_or_default());
                }
                row
            })
            .collect();

        let count = rows.len();
        let result = match <[Row; 1]>::try_from(rows) {
            Ok([row]) => self.store.insert(table, row).await,
            Err(rows) => self.store.insert_all(table, rows).await,
        };

        if let Err(source) = result {
            telemetry::record_failure(operation);
            return Err(CollectorError::Store {
                exchange: self.exchange_id.clone(),
                operation,
                source,
            });
        }

        telemetry::record_rows_written(table, count);
        tracing::trace!(table = %table, symbol, count, "Rows written");
        Ok(count)
    }

    fn reject(&self, error: CollectorError) -> CollectorError {
        telemetry::record_failure(error.operation());
        tracing::debug!(error = %error, "Save rejected");
        error
    }

    /// Save ticker snapshots; returns the number of rows written
    pub async fn save_ticker<T: Serialize>(
        &mut self,
        timestamps: impl Into<Timestamps>,
        exchange_id: &str,
        cryptocurrency: &str,
        symbol: &str,
        tickers: &[T],
    ) -> Result<usize, CollectorError> {
        let op = Operation::SaveTicker;
        let stamps = self
            .prepare(op, timestamps.into(), exchange_id, None, &[("ticker", tickers.len())])
            .map_err(|e| self.reject(e))?;
        let tickers = self.encode(op, tickers).map_err(|e| self.reject(e))?;

        self.write(op, stamps, cryptocurrency, symbol, None, vec![("ticker", tickers)])
            .await
    }

    /// Save order book snapshots; `asks[i]` and `bids[i]` form row `i`
    pub async fn save_order_book<A: Serialize, B: Serialize>(
        &mut self,
        timestamps: impl Into<Timestamps>,
        exchange_id: &str,
        cryptocurrency: &str,
        symbol: &str,
        asks: &[A],
        bids: &[B],
    ) -> Result<usize, CollectorError> {
        let op = Operation::SaveOrderBook;
        let stamps = self
            .prepare(
                op,
                timestamps.into(),
                exchange_id,
                None,
                &[("asks", asks.len()), ("bids", bids.len())],
            )
            .map_err(|e| self.reject(e))?;
        let asks = self.encode(op, asks).map_err(|e| self.reject(e))?;
        let bids = self.encode(op, bids).map_err(|e| self.reject(e))?;

        self.write(
            op,
            stamps,
            cryptocurrency,
            symbol,
            None,
            vec![("asks", asks), ("bids", bids)],
        )
        .await
    }

    /// Save recent-trade lists
    pub async fn save_recent_trades<T: Serialize>(
        &mut self,
        timestamps: impl Into<Timestamps>,
        exchange_id: &str,
        cryptocurrency: &str,
        symbol: &str,
        trades: &[T],
    ) -> Result<usize, CollectorError> {
        let op = Operation::SaveRecentTrades;
        let stamps = self
            .prepare(
                op,
                timestamps.into(),
                exchange_id,
                None,
                &[("recent_trades", trades.len())],
            )
            .map_err(|e| self.reject(e))?;
        let trades = self.encode(op, trades).map_err(|e| self.reject(e))?;

        self.write(
            op,
            stamps,
            cryptocurrency,
            symbol,
            None,
            vec![("recent_trades", trades)],
        )
        .await
    }

    /// Save closed OHLCV candles for one timeframe
    pub async fn save_ohlcv<T: Serialize>(
        &mut self,
        timestamps: impl Into<Timestamps>,
        exchange_id: &str,
        cryptocurrency: &str,
        symbol: &str,
        timeframe: Timeframe,
        candles: &[T],
    ) -> Result<usize, CollectorError> {
        let op = Operation::SaveOhlcv;
        let stamps = self
            .prepare(
                op,
                timestamps.into(),
                exchange_id,
                Some(timeframe),
                &[("candle", candles.len())],
            )
            .map_err(|e| self.reject(e))?;
        let candles = self.encode(op, candles).map_err(|e| self.reject(e))?;

        self.write(
            op,
            stamps,
            cryptocurrency,
            symbol,
            Some(timeframe),
            vec![("candle", candles)],
        )
        .await
    }

    /// Save in-progress candles for one timeframe
    pub async fn save_kline<T: Serialize>(
        &mut self,
        timestamps: impl Into<Timestamps>,
        exchange_id: &str,
        cryptocurrency: &str,
        symbol: &str,
        timeframe: Timeframe,
        klines: &[T],
    ) -> Result<usize, CollectorError> {
        let op = Operation::SaveKline;
        let stamps = self
            .prepare(
                op,
                timestamps.into(),
                exchange_id,
                Some(timeframe),
                &[("candle", klines.len())],
            )
            .map_err(|e| self.reject(e))?;
        let klines = self.encode(op, klines).map_err(|e| self.reject(e))?;

        self.write(
            op,
            stamps,
            cryptocurrency,
            symbol,
            Some(timeframe),
            vec![("candle", klines)],
        )
        .await
    }

    /// Release the store and withdraw published coverage; idempotent
    pub async fn close(&mut self) -> Result<(), CollectorError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let published = matches!(
            self.state,
            SessionState::Initialized | SessionState::Described
        );
        self.state = SessionState::Closed;

        if published {
            self.context.write().await.withdraw(&self.exchange_id);
        }

        self.store
            .close()
            .await
            .map_err(|source| CollectorError::Store {
                exchange: self.exchange_id.clone(),
                operation: Operation::Close,
                source,
            })?;

        tracing::info!(exchange = %self.exchange_id, session = %self.id, "Session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorContext;
    use crate::exchange::StaticAdapter;
    use crate::store::MemoryStore;
    use crate::timeframe::EmptyDiscoveryPolicy;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn config() -> CollectorConfig {
        CollectorConfig::new("X")
            .with_symbols(["BTC/USD"])
            .with_timeframes(vec![Timeframe::OneHour])
    }

    async fn described(config: &CollectorConfig) -> Session<MemoryStore> {
        let mut session = Session::new(config, MemoryStore::new(), None, CollectorContext::shared());
        session.initialize().await.unwrap();
        session.record_description().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_single_ohlcv_row() {
        let mut session = described(&config()).await;

        let written = session
            .save_ohlcv(
                1000.0,
                "X",
                "BTC",
                "BTC/USD",
                Timeframe::OneHour,
                &[[100, 110, 95, 105, 50]],
            )
            .await
            .unwrap();
        assert_eq!(written, 1);

        let rows = session.store().rows(Table::Ohlcv);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, 1000.0);
        assert_eq!(rows[0].get("time_frame"), Some("1h"));
        let candle = codec::decode(rows[0].get("candle").unwrap()).unwrap();
        assert_eq!(candle, json!([100, 110, 95, 105, 50]));
    }

    #[tokio::test]
    async fn test_batch_ticker_arity_mismatch() {
        let mut session = described(&config()).await;
        let tickers = vec![json!({"last": 1}), json!({"last": 2})];

        let err = session
            .save_ticker(vec![1.0, 2.0, 3.0], "X", "BTC", "BTC/USD", &tickers)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CollectorError::BatchArityMismatch {
                field: "timestamp",
                expected: 2,
                actual: 3,
                ..
            }
        ));
        assert!(session.store().rows(Table::Ticker).is_empty());
        assert_eq!(session.state(), SessionState::Described);
    }

    #[tokio::test]
    async fn test_order_book_side_mismatch() {
        let mut session = described(&config()).await;
        let asks = vec![json!([[1.0, 2.0]]), json!([[1.1, 2.0]])];
        let bids = vec![json!([[0.9, 1.0]])];

        let err = session
            .save_order_book(5.0, "X", "BTC", "BTC/USD", &asks, &bids)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CollectorError::BatchArityMismatch { field: "bids", .. }
        ));
        assert!(session.store().rows(Table::OrderBook).is_empty());
    }

    #[tokio::test]
    async fn test_scalar_timestamp_broadcast() {
        let mut session = described(&config()).await;
        let trades = vec![json!([{"id": 1}]), json!([{"id": 2}]), json!([])];

        let written = session
            .save_recent_trades(42.0, "X", "BTC", "BTC/USD", &trades)
            .await
            .unwrap();
        assert_eq!(written, 3);

        let rows = session.store().rows(Table::RecentTrades);
        assert!(rows.iter().all(|r| r.timestamp == 42.0));
        assert_eq!(rows[1].get("recent_trades"), Some(r#"[{"id":2}]"#));
    }

    #[tokio::test]
    async fn test_aligned_timestamps_keep_index_pairing() {
        let mut session = described(&config()).await;
        let klines = vec![json!([1]), json!([2]), json!([3])];

        session
            .save_kline(
                vec![30.0, 10.0, 20.0],
                "X",
                "BTC",
                "BTC/USD",
                Timeframe::OneHour,
                &klines,
            )
            .await
            .unwrap();

        let rows = session.store().rows(Table::Kline);
        let pairs: Vec<(f64, &str)> = rows
            .iter()
            .map(|r| (r.timestamp, r.get("candle").unwrap()))
            .collect();
        assert_eq!(pairs, vec![(30.0, "[1]"), (10.0, "[2]"), (20.0, "[3]")]);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let mut session = described(&config()).await;
        let err = session
            .save_ticker(1.0, "X", "BTC", "BTC/USD", &Vec::<Value>::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CollectorError::BatchArityMismatch {
                expected: 1,
                actual: 0,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_encoding_error_is_local() {
        let mut session = described(&config()).await;
        let mut bad = HashMap::new();
        bad.insert((1, 1), 1.0);

        let err = session
            .save_ticker(1.0, "X", "BTC", "BTC/USD", &[bad])
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Encoding { .. }));
        assert!(!err.is_fatal());

        let ok = session
            .save_ticker(2.0, "X", "BTC", "BTC/USD", &[json!({"last": 1})])
            .await
            .unwrap();
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn test_description_written_once() {
        let mut session = described(&config()).await;
        let err = session.record_description().await.unwrap_err();
        assert!(matches!(err, CollectorError::DuplicateDescription { .. }));
        assert_eq!(session.store().rows(Table::Description).len(), 1);
    }

    #[tokio::test]
    async fn test_description_contents() {
        let session = described(&config()).await;
        let rows = session.store().rows(Table::Description);
        let description = Description::from_row(&rows[0]).unwrap();
        assert_eq!(description.exchange, "X");
        assert_eq!(description.version, SCHEMA_VERSION);
        assert_eq!(description.symbols, vec!["BTC/USD".to_string()]);
        assert_eq!(description.timeframes, vec![Timeframe::OneHour]);
    }

    #[tokio::test]
    async fn test_save_before_description() {
        let mut session = Session::new(
            &config(),
            MemoryStore::new(),
            None,
            CollectorContext::shared(),
        );
        session.initialize().await.unwrap();

        let err = session
            .save_ticker(1.0, "X", "BTC", "BTC/USD", &[json!({})])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CollectorError::InvalidState {
                state: SessionState::Initialized,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_description_before_initialize() {
        let mut session = Session::new(
            &config(),
            MemoryStore::new(),
            None,
            CollectorContext::shared(),
        );
        let err = session.record_description().await.unwrap_err();
        assert!(matches!(err, CollectorError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_foreign_exchange_rejected() {
        let mut session = described(&config()).await;
        let err = session
            .save_ticker(1.0, "Y", "BTC", "BTC/USD", &[json!({})])
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::ExchangeMismatch { .. }));
        assert_eq!(err.exchange(), "X");
    }

    #[tokio::test]
    async fn test_uncollected_timeframe_rejected() {
        let mut session = described(&config()).await;
        let err = session
            .save_ohlcv(1.0, "X", "BTC", "BTC/USD", Timeframe::OneDay, &[[1, 2, 3, 4, 5]])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CollectorError::UnknownTimeframe {
                timeframe: Timeframe::OneDay,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let mut session = Session::new(
            &config(),
            MemoryStore::new(),
            None,
            CollectorContext::shared(),
        );
        let first = session.initialize().await.unwrap();
        let second = session.initialize().await.unwrap();
        assert_eq!(first.session_id, second.session_id);
        assert_eq!(first.warnings, vec![CollectorWarning::AdapterMissing]);
        assert_eq!(session.state(), SessionState::Initialized);
    }

    #[tokio::test]
    async fn test_store_init_failure_closes_store() {
        let mut session = Session::new(
            &config(),
            MemoryStore::unavailable("no disk"),
            None,
            CollectorContext::shared(),
        );
        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, CollectorError::StoreInit { .. }));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.store().is_closed());
    }

    #[tokio::test]
    async fn test_discover_without_adapter_is_fatal() {
        let config = CollectorConfig::new("X").discover_all_timeframes();
        let mut session = Session::new(&config, MemoryStore::new(), None, CollectorContext::shared());

        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, CollectorError::DependencyMissing { .. }));
        assert!(session.store().is_closed());
    }

    #[tokio::test]
    async fn test_required_adapter_missing() {
        let mut config = config();
        config.require_adapter = true;
        let mut session = Session::new(&config, MemoryStore::new(), None, CollectorContext::shared());

        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, CollectorError::DependencyMissing { .. }));
    }

    #[tokio::test]
    async fn test_discover_empty_aborts_session() {
        let config = CollectorConfig::new("X").discover_all_timeframes();
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(StaticAdapter::new("venue"));
        let mut session = Session::new(
            &config,
            MemoryStore::new(),
            Some(adapter),
            CollectorContext::shared(),
        );

        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, CollectorError::NoTimeframesAvailable { .. }));
        assert_eq!(session.state(), SessionState::Failed);

        let again = session.initialize().await.unwrap_err();
        assert!(matches!(again, CollectorError::InvalidState { .. }));
        assert!(session.record_description().await.is_err());
    }

    #[tokio::test]
    async fn test_discover_empty_can_disable_candles() {
        let mut config = CollectorConfig::new("X").discover_all_timeframes();
        config.on_empty_discovery = EmptyDiscoveryPolicy::DisableCandles;
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(StaticAdapter::new("venue"));
        let mut session = Session::new(
            &config,
            MemoryStore::new(),
            Some(adapter),
            CollectorContext::shared(),
        );

        let report = session.initialize().await.unwrap();
        assert!(report.warnings.contains(&CollectorWarning::CandlesDisabled));
        session.record_description().await.unwrap();

        assert!(session
            .save_ticker(1.0, "X", "BTC", "BTC/USD", &[json!({})])
            .await
            .is_ok());
        let err = session
            .save_kline(1.0, "X", "BTC", "BTC/USD", Timeframe::OneHour, &[[1]])
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::UnknownTimeframe { .. }));
    }

    #[tokio::test]
    async fn test_discover_replaces_configured_timeframes() {
        let config = config().discover_all_timeframes();
        let adapter: Arc<dyn ExchangeAdapter> = Arc::new(
            StaticAdapter::new("venue")
                .with_timeframes(vec![Timeframe::OneDay, Timeframe::FiveMinutes])
                .with_symbols(["BTC/USD"]),
        );
        let ctx = CollectorContext::shared();
        let mut session = Session::new(&config, MemoryStore::new(), Some(adapter), ctx.clone());

        let report = session.initialize().await.unwrap();
        assert_eq!(
            report.timeframes,
            vec![Timeframe::FiveMinutes, Timeframe::OneDay]
        );
        assert!(report.warnings.is_empty());
        assert_eq!(
            ctx.read().await.coverage("X").unwrap().timeframes,
            report.timeframes
        );
    }

    #[tokio::test]
    async fn test_unknown_symbols_warned() {
        let adapter: Arc<dyn ExchangeAdapter> =
            Arc::new(StaticAdapter::new("venue").with_symbols(["ETH/USD"]));
        let mut session = Session::new(
            &config(),
            MemoryStore::new(),
            Some(adapter),
            CollectorContext::shared(),
        );

        let report = session.initialize().await.unwrap();
        assert_eq!(
            report.warnings,
            vec![CollectorWarning::UnknownSymbols(vec!["BTC/USD".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_symbols_deduplicated_in_order() {
        let config = CollectorConfig::new("X").with_symbols(["B", "A", "B"]);
        let session = Session::new(&config, MemoryStore::new(), None, CollectorContext::shared());
        assert_eq!(session.symbols(), &["B".to_string(), "A".to_string()]);
    }

    #[tokio::test]
    async fn test_close_withdraws_and_releases() {
        let ctx = CollectorContext::shared();
        let mut session = Session::new(&config(), MemoryStore::new(), None, ctx.clone());
        session.initialize().await.unwrap();
        assert!(ctx.read().await.coverage("X").is_some());

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(ctx.read().await.coverage("X").is_none());
        assert!(session.store().is_closed());
        assert_eq!(session.state(), SessionState::Closed);
    }
}
