//! Configuration integration tests

use tick_vault::config::Config;
use tick_vault::telemetry::LogFormat;
use tick_vault::timeframe::{EmptyDiscoveryPolicy, Timeframe};

#[test]
fn test_config_example_parses() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();

    assert_eq!(config.collector.exchange, "binance");
    assert_eq!(config.collector.symbols, vec!["BTC/USDT", "ETH/USDT"]);
    assert_eq!(
        config.collector.timeframes,
        vec![Timeframe::OneHour, Timeframe::FourHours, Timeframe::OneDay]
    );
    assert_eq!(
        config.collector.on_empty_discovery,
        EmptyDiscoveryPolicy::Abort
    );
    assert!(config.collector.validate().is_ok());
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    assert!(config.telemetry.metrics_port.is_none());
    assert_eq!(config.binance.poll_interval_secs, 60);
}

#[test]
fn test_config_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        [collector]
        exchange = "binance"
        symbols = ["SOL/USDT"]
        use_all_available_timeframes = true
    "#,
    )
    .unwrap();

    let config = tokio_test::assert_ok!(Config::load(&path));
    assert!(config.collector.use_all_available_timeframes);
    assert_eq!(config.collector.symbols, vec!["SOL/USDT"]);
}

#[test]
fn test_config_load_rejects_empty_exchange() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[collector]\nexchange = \"\"\n").unwrap();

    tokio_test::assert_err!(Config::load(&path));
}
