//! tick-vault: Exchange market data collector for backtesting
//!
//! This library provides the core components for:
//! - Payload encoding of market events as JSON text
//! - Candle timeframes and timeframe resolution policies
//! - Append-only time-series stores (in-memory and Parquet)
//! - Exchange adapters for timeframe and symbol discovery (Binance REST)
//! - Collector sessions writing a description row and market events
//! - Data set import and ordered event replay
//! - Structured logging and Prometheus metrics

pub mod cli;
pub mod codec;
pub mod collector;
pub mod config;
pub mod exchange;
pub mod replay;
pub mod store;
pub mod telemetry;
pub mod timeframe;
