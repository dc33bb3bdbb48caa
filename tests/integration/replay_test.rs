//! Collect-then-replay integration tests

use serde_json::json;
use tick_vault::collector::{CollectorContext, Session, SCHEMA_VERSION};
use tick_vault::config::CollectorConfig;
use tick_vault::replay::{DatasetImporter, EventBody, ImportError};
use tick_vault::store::{ParquetStore, Row, Table, TimeSeriesStore};
use tick_vault::timeframe::Timeframe;

fn config() -> CollectorConfig {
    CollectorConfig::new("binance")
        .with_symbols(["BTC/USDT", "ETH/USDT"])
        .with_timeframes(vec![Timeframe::OneHour])
}

#[tokio::test]
async fn test_collect_then_replay() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("binance_20240101_000000");

    let mut session = Session::new(
        &config(),
        ParquetStore::new(&root),
        None,
        CollectorContext::shared(),
    );
    session.initialize().await.unwrap();
    session.record_description().await.unwrap();

    session
        .save_ticker(20.0, "binance", "BTC", "BTC/USDT", &[json!({"last": 42000.5})])
        .await
        .unwrap();
    session
        .save_order_book(
            10.0,
            "binance",
            "ETH",
            "ETH/USDT",
            &[vec![[2001.0, 1.5]]],
            &[vec![[1999.0, 3.0]]],
        )
        .await
        .unwrap();
    session
        .save_ohlcv(
            vec![10.0, 20.0],
            "binance",
            "BTC",
            "BTC/USDT",
            Timeframe::OneHour,
            &[[1.0, 2.0, 0.5, 1.5, 7.0], [1.5, 2.5, 1.0, 2.0, 9.0]],
        )
        .await
        .unwrap();
    session.close().await.unwrap();

    let importer = DatasetImporter::open(ParquetStore::new(&root)).await.unwrap();
    let description = importer.description();
    assert_eq!(description.version, SCHEMA_VERSION);
    assert_eq!(description.exchange, "binance");
    assert_eq!(description.symbols, vec!["BTC/USDT", "ETH/USDT"]);
    assert_eq!(description.timeframes, vec![Timeframe::OneHour]);

    let events: Vec<_> = importer.events().await.unwrap().collect();
    let order: Vec<(f64, Table)> = events.iter().map(|e| (e.timestamp, e.table())).collect();
    assert_eq!(
        order,
        vec![
            (10.0, Table::OrderBook),
            (10.0, Table::Ohlcv),
            (20.0, Table::Ticker),
            (20.0, Table::Ohlcv),
        ]
    );

    assert_eq!(
        events[0].body,
        EventBody::OrderBook {
            asks: json!([[2001.0, 1.5]]),
            bids: json!([[1999.0, 3.0]]),
        }
    );
    assert_eq!(events[2].body, EventBody::Ticker(json!({"last": 42000.5})));
    assert_eq!(events[2].cryptocurrency, "BTC");
}

#[tokio::test]
async fn test_replay_rejects_newer_schema() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ParquetStore::new(dir.path());
    store.initialize().await.unwrap();
    store
        .insert(
            Table::Description,
            Row::new(1.0)
                .with("version", "2.0")
                .with("exchange", "binance")
                .with("symbols", "[]")
                .with("time_frames", "[]"),
        )
        .await
        .unwrap();
    store.close().await.unwrap();

    let result = DatasetImporter::open(ParquetStore::new(dir.path())).await;
    assert!(matches!(
        result,
        Err(ImportError::IncompatibleVersion { .. })
    ));
}

#[tokio::test]
async fn test_replay_missing_data_set() {
    let dir = tempfile::tempdir().unwrap();
    let result = DatasetImporter::open(ParquetStore::new(dir.path().join("absent"))).await;
    assert!(matches!(result, Err(ImportError::Store(_))));
}

#[tokio::test]
async fn test_replay_empty_data_set() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ParquetStore::new(dir.path());
    store.initialize().await.unwrap();

    let result = DatasetImporter::open(store).await;
    assert!(matches!(result, Err(ImportError::MissingDescription)));
}
