//! Time-series store
//!
//! Append-only tables keyed by timestamp. A session owns exactly one store
//! handle; the store owns durability.

mod memory;
mod parquet;

pub use self::parquet::{dataset_dir, ParquetStore};
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Logical tables of a data set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Description,
    Ticker,
    OrderBook,
    RecentTrades,
    Ohlcv,
    Kline,
}

impl Table {
    /// Every table, description first
    pub const ALL: [Table; 6] = [
        Table::Description,
        Table::Ticker,
        Table::OrderBook,
        Table::RecentTrades,
        Table::Ohlcv,
        Table::Kline,
    ];

    /// Tables holding market events
    pub const MARKET_EVENTS: [Table; 5] = [
        Table::Ticker,
        Table::OrderBook,
        Table::RecentTrades,
        Table::Ohlcv,
        Table::Kline,
    ];

    /// Stable table name
    pub fn name(&self) -> &'static str {
        match self {
            Table::Description => "description",
            Table::Ticker => "ticker",
            Table::OrderBook => "order_book",
            Table::RecentTrades => "recent_trades",
            Table::Ohlcv => "ohlcv",
            Table::Kline => "kline",
        }
    }

    /// Column names besides `timestamp`, in storage order
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Description => &["version", "exchange", "symbols", "time_frames"],
            Table::Ticker => &["exchange_name", "cryptocurrency", "symbol", "ticker"],
            Table::OrderBook => &["exchange_name", "cryptocurrency", "symbol", "asks", "bids"],
            Table::RecentTrades => &["exchange_name", "cryptocurrency", "symbol", "recent_trades"],
            Table::Ohlcv | Table::Kline => &[
                "exchange_name",
                "cryptocurrency",
                "symbol",
                "time_frame",
                "candle",
            ],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One stored row: timestamp plus named string columns
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub fields: BTreeMap<String, String>,
}

impl Row {
    /// Create an empty row at `timestamp`
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// Add a column value
    pub fn with(mut self, column: &str, value: impl Into<String>) -> Self {
        self.fields.insert(column.to_string(), value.into());
        self
    }

    /// Column value
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Column value, or a schema error naming the table
    pub fn require(&self, table: Table, column: &str) -> Result<&str, StoreError> {
        self.get(column).ok_or_else(|| StoreError::Schema {
            table,
            reason: format!("missing column {}", column),
        })
    }

    /// Check that the row has exactly the table's columns
    pub fn validate(&self, table: Table) -> Result<(), StoreError> {
        if !self.timestamp.is_finite() {
            return Err(StoreError::Schema {
                table,
                reason: format!("non-finite timestamp {}", self.timestamp),
            });
        }
        let columns = table.columns();
        for column in columns {
            self.require(table, column)?;
        }
        if let Some(extra) = self
            .fields
            .keys()
            .find(|k| !columns.contains(&k.as_str()))
        {
            return Err(StoreError::Schema {
                table,
                reason: format!("unknown column {}", extra),
            });
        }
        Ok(())
    }
}

/// Store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable at {location}: {reason}")]
    Unavailable { location: String, reason: String },
    #[error("store not initialized")]
    NotInitialized,
    #[error("store closed")]
    Closed,
    #[error("schema mismatch in {table}: {reason}")]
    Schema { table: Table, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("background write task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Trait for time-series store implementations
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Open or create the backing resources
    async fn initialize(&mut self) -> Result<(), StoreError>;
    /// Append one row
    async fn insert(&mut self, table: Table, row: Row) -> Result<(), StoreError>;
    /// Append rows as one contiguous, all-or-nothing write
    async fn insert_all(&mut self, table: Table, rows: Vec<Row>) -> Result<(), StoreError>;
    /// Every row of a table in insertion order
    async fn read_table(&self, table: Table) -> Result<Vec<Row>, StoreError>;
    /// Release the backing resources; idempotent
    async fn close(&mut self) -> Result<(), StoreError>;
    /// Where the data lives, for logs and errors
    fn location(&self) -> String;
}
