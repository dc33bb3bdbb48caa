//! Collector session integration tests

use serde_json::json;
use std::sync::Arc;
use tick_vault::collector::{CollectorContext, CollectorError, Session, SessionState};
use tick_vault::config::CollectorConfig;
use tick_vault::exchange::{ExchangeAdapter, StaticAdapter};
use tick_vault::store::{MemoryStore, ParquetStore, Table, TimeSeriesStore};
use tick_vault::timeframe::Timeframe;

const ROWS: usize = 1000;

async fn fill_tickers(session: &mut Session<MemoryStore>, exchange: &str) {
    for i in 0..ROWS {
        let ticker = json!({ "seq": i, "exchange": exchange });
        session
            .save_ticker(i as f64, exchange, "BTC", "BTC/USDT", &[ticker])
            .await
            .unwrap();
        if i % 100 == 0 {
            tokio::task::yield_now().await;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_sessions_stay_isolated() {
    let context = CollectorContext::shared();
    let mut sessions = Vec::new();
    for exchange in ["E1", "E2"] {
        let config = CollectorConfig::new(exchange)
            .with_symbols(["BTC/USDT"])
            .with_timeframes(vec![Timeframe::OneMinute]);
        let mut session = Session::new(&config, MemoryStore::new(), None, context.clone());
        session.initialize().await.unwrap();
        session.record_description().await.unwrap();
        sessions.push(session);
    }
    let mut second = sessions.pop().unwrap();
    let mut first = sessions.pop().unwrap();

    {
        let shared = context.read().await;
        let mut exchanges: Vec<&str> = shared.exchanges().collect();
        exchanges.sort();
        assert_eq!(exchanges, vec!["E1", "E2"]);
    }

    tokio::join!(fill_tickers(&mut first, "E1"), fill_tickers(&mut second, "E2"));

    for (session, exchange) in [(&first, "E1"), (&second, "E2")] {
        let rows = session.store().rows(Table::Ticker);
        assert_eq!(rows.len(), ROWS);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.timestamp, i as f64);
            assert_eq!(row.get("exchange_name"), Some(exchange));
            let ticker: serde_json::Value =
                serde_json::from_str(row.get("ticker").unwrap()).unwrap();
            assert_eq!(ticker["seq"], json!(i));
            assert_eq!(ticker["exchange"], json!(exchange));
        }
        assert_eq!(session.store().rows(Table::Description).len(), 1);
    }

    first.close().await.unwrap();
    second.close().await.unwrap();
    assert_eq!(context.read().await.exchanges().count(), 0);
}

#[tokio::test]
async fn test_parquet_session_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let adapter: Arc<dyn ExchangeAdapter> = Arc::new(
        StaticAdapter::new("binance")
            .with_timeframes(vec![Timeframe::OneHour, Timeframe::OneDay])
            .with_symbols(["BTC/USDT"]),
    );
    let config = CollectorConfig::new("binance")
        .with_symbols(["BTC/USDT"])
        .discover_all_timeframes();

    let mut session = Session::new(
        &config,
        ParquetStore::new(dir.path().join("set")),
        Some(adapter),
        CollectorContext::shared(),
    );
    let report = session.initialize().await.unwrap();
    assert!(report.warnings.is_empty());
    assert_eq!(
        session.timeframes(),
        &[Timeframe::OneHour, Timeframe::OneDay]
    );
    session.record_description().await.unwrap();

    let candles = [[1.0, 2.0, 0.5, 1.5, 10.0], [1.5, 3.0, 1.0, 2.5, 12.0]];
    let written = session
        .save_ohlcv(
            vec![3600.0, 7200.0],
            "binance",
            "BTC",
            "BTC/USDT",
            Timeframe::OneHour,
            &candles,
        )
        .await
        .unwrap();
    assert_eq!(written, 2);

    let err = session
        .save_kline(1.0, "binance", "BTC", "BTC/USDT", Timeframe::FiveMinutes, &[[0.0]])
        .await
        .unwrap_err();
    assert!(matches!(err, CollectorError::UnknownTimeframe { .. }));

    let rows = session.store().read_table(Table::Ohlcv).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("candle"), Some("[1.5,3.0,1.0,2.5,12.0]"));
    assert!(session.store().read_table(Table::Kline).await.unwrap().is_empty());

    session.close().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_unwritable_location_fails_initialize() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let config = CollectorConfig::new("binance").with_symbols(["BTC/USDT"]);
    let mut session = Session::new(
        &config,
        ParquetStore::new(blocker.join("set")),
        None,
        CollectorContext::shared(),
    );

    let err = session.initialize().await.unwrap_err();
    assert!(matches!(err, CollectorError::StoreInit { .. }));
    assert!(err.is_fatal());
    assert_eq!(session.state(), SessionState::Failed);
}
