//! Exchange adapters
//!
//! The venue side of a collector: what can be traded and which candle
//! intervals the venue serves.

mod binance;
mod static_adapter;

pub use binance::{BinanceAdapter, BinanceConfig, BinanceSnapshot};
pub use static_adapter::StaticAdapter;

use crate::timeframe::Timeframe;
use async_trait::async_trait;

/// Trait for venue adapters consumed by a collector session
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Adapter / venue name, used in logs and errors
    fn name(&self) -> &str;
    /// Timeframes the venue currently supports
    async fn available_timeframes(&self) -> anyhow::Result<Vec<Timeframe>>;
    /// Symbols currently tradable on the venue
    async fn tradable_symbols(&self) -> anyhow::Result<Vec<String>>;
}
