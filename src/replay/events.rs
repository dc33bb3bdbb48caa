//! Typed market-event records decoded from store rows

use super::ImportError;
use crate::codec;
use crate::store::{Row, Table};
use crate::timeframe::Timeframe;
use serde_json::Value;

/// Kind-specific part of a market event
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    Ticker(Value),
    OrderBook { asks: Value, bids: Value },
    RecentTrades(Value),
    Ohlcv { timeframe: Timeframe, candle: Value },
    Kline { timeframe: Timeframe, candle: Value },
}

/// One recorded market event
#[derive(Debug, Clone, PartialEq)]
pub struct MarketEvent {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub exchange: String,
    pub cryptocurrency: String,
    pub symbol: String,
    pub body: EventBody,
}

fn payload(table: Table, row: &Row, column: &'static str) -> Result<Value, ImportError> {
    codec::decode(row.require(table, column)?).map_err(|source| ImportError::Payload {
        table,
        column,
        source,
    })
}

fn timeframe(table: Table, row: &Row) -> Result<Timeframe, ImportError> {
    let raw = row.require(table, "time_frame")?;
    raw.parse()
        .map_err(|_| ImportError::UnknownTimeframe(raw.to_string()))
}

impl MarketEvent {
    /// Decode a row read from one of the market-event tables
    pub fn from_row(table: Table, row: &Row) -> Result<Self, ImportError> {
        let body = match table {
            Table::Ticker => EventBody::Ticker(payload(table, row, "ticker")?),
            Table::OrderBook => EventBody::OrderBook {
                asks: payload(table, row, "asks")?,
                bids: payload(table, row, "bids")?,
            },
            Table::RecentTrades => EventBody::RecentTrades(payload(table, row, "recent_trades")?),
            Table::Ohlcv => EventBody::Ohlcv {
                timeframe: timeframe(table, row)?,
                candle: payload(table, row, "candle")?,
            },
            Table::Kline => EventBody::Kline {
                timeframe: timeframe(table, row)?,
                candle: payload(table, row, "candle")?,
            },
            Table::Description => return Err(ImportError::NotAnEventTable(table)),
        };

        Ok(Self {
            timestamp: row.timestamp,
            exchange: row.require(table, "exchange_name")?.to_string(),
            cryptocurrency: row.require(table, "cryptocurrency")?.to_string(),
            symbol: row.require(table, "symbol")?.to_string(),
            body,
        })
    }

    /// Table the event came from
    pub fn table(&self) -> Table {
        match self.body {
            EventBody::Ticker(_) => Table::Ticker,
            EventBody::OrderBook { .. } => Table::OrderBook,
            EventBody::RecentTrades(_) => Table::RecentTrades,
            EventBody::Ohlcv { .. } => Table::Ohlcv,
            EventBody::Kline { .. } => Table::Kline,
        }
    }
}
