//! Collector types and errors

use crate::codec::CodecError;
use crate::store::{StoreError, Table};
use crate::timeframe::Timeframe;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Session operations, named in errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Initialize,
    RecordDescription,
    SaveTicker,
    SaveOrderBook,
    SaveRecentTrades,
    SaveOhlcv,
    SaveKline,
    Close,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Initialize => "initialize",
            Operation::RecordDescription => "record_description",
            Operation::SaveTicker => "save_ticker",
            Operation::SaveOrderBook => "save_order_book",
            Operation::SaveRecentTrades => "save_recent_trades",
            Operation::SaveOhlcv => "save_ohlcv",
            Operation::SaveKline => "save_kline",
            Operation::Close => "close",
        }
    }

    /// Table written by a save operation
    pub fn table(&self) -> Option<Table> {
        match self {
            Operation::SaveTicker => Some(Table::Ticker),
            Operation::SaveOrderBook => Some(Table::OrderBook),
            Operation::SaveRecentTrades => Some(Table::RecentTrades),
            Operation::SaveOhlcv => Some(Table::Ohlcv),
            Operation::SaveKline => Some(Table::Kline),
            Operation::RecordDescription => Some(Table::Description),
            Operation::Initialize | Operation::Close => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, store not opened
    Created,
    /// Store open, timeframes resolved and published
    Initialized,
    /// Description written; saves allowed
    Described,
    /// A lifecycle error aborted the session
    Failed,
    /// Closed by the owner
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Created => "created",
            SessionState::Initialized => "initialized",
            SessionState::Described => "described",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Collector errors
///
/// Every variant names the exchange and the operation attempted so failures
/// from many concurrent sessions can be told apart.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("[{exchange}] {operation}: store unavailable: {source}")]
    StoreInit {
        exchange: String,
        operation: Operation,
        #[source]
        source: StoreError,
    },
    #[error("[{exchange}] {operation}: missing dependency: {dependency}")]
    DependencyMissing {
        exchange: String,
        operation: Operation,
        dependency: String,
    },
    #[error("[{exchange}] {operation}: description already recorded for this session")]
    DuplicateDescription {
        exchange: String,
        operation: Operation,
    },
    #[error("[{exchange}] {operation}: batch arity mismatch on {field}: expected {expected}, got {actual}")]
    BatchArityMismatch {
        exchange: String,
        operation: Operation,
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("[{exchange}] {operation}: no timeframes available: {reason}")]
    NoTimeframesAvailable {
        exchange: String,
        operation: Operation,
        reason: String,
    },
    #[error("[{exchange}] {operation}: {source}")]
    Encoding {
        exchange: String,
        operation: Operation,
        #[source]
        source: CodecError,
    },
    #[error("[{exchange}] {operation}: event for exchange {actual} does not belong to this session")]
    ExchangeMismatch {
        exchange: String,
        operation: Operation,
        actual: String,
    },
    #[error("[{exchange}] {operation}: timeframe {timeframe} not collected by this session")]
    UnknownTimeframe {
        exchange: String,
        operation: Operation,
        timeframe: Timeframe,
    },
    #[error("[{exchange}] {operation}: not allowed in state {state}")]
    InvalidState {
        exchange: String,
        operation: Operation,
        state: SessionState,
    },
    #[error("[{exchange}] {operation}: store write failed: {source}")]
    Store {
        exchange: String,
        operation: Operation,
        #[source]
        source: StoreError,
    },
}

impl CollectorError {
    /// Exchange identity of the failing session
    pub fn exchange(&self) -> &str {
        match self {
            CollectorError::StoreInit { exchange, .. }
            | CollectorError::DependencyMissing { exchange, .. }
            | CollectorError::DuplicateDescription { exchange, .. }
            | CollectorError::BatchArityMismatch { exchange, .. }
            | CollectorError::NoTimeframesAvailable { exchange, .. }
            | CollectorError::Encoding { exchange, .. }
            | CollectorError::ExchangeMismatch { exchange, .. }
            | CollectorError::UnknownTimeframe { exchange, .. }
            | CollectorError::InvalidState { exchange, .. }
            | CollectorError::Store { exchange, .. } => exchange,
        }
    }

    /// Operation that failed
    pub fn operation(&self) -> Operation {
        match self {
            CollectorError::StoreInit { operation, .. }
            | CollectorError::DependencyMissing { operation, .. }
            | CollectorError::DuplicateDescription { operation, .. }
            | CollectorError::BatchArityMismatch { operation, .. }
            | CollectorError::NoTimeframesAvailable { operation, .. }
            | CollectorError::Encoding { operation, .. }
            | CollectorError::ExchangeMismatch { operation, .. }
            | CollectorError::UnknownTimeframe { operation, .. }
            | CollectorError::InvalidState { operation, .. }
            | CollectorError::Store { operation, .. } => *operation,
        }
    }

    /// Whether the error ends the session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CollectorError::StoreInit { .. }
                | CollectorError::DependencyMissing { .. }
                | CollectorError::NoTimeframesAvailable { .. }
        )
    }
}

/// Non-fatal findings from `initialize`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorWarning {
    /// No adapter; symbols are not checked against the venue
    AdapterMissing,
    /// Configured symbols the venue does not list as tradable
    UnknownSymbols(Vec<String>),
    /// The venue could not be asked for its symbols
    SymbolCheckFailed(String),
    /// Discovery returned nothing; OHLCV and kline saves will be rejected
    CandlesDisabled,
}

impl fmt::Display for CollectorWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorWarning::AdapterMissing => {
                write!(f, "no exchange adapter, symbols not verified")
            }
            CollectorWarning::UnknownSymbols(symbols) => {
                write!(f, "symbols not tradable on venue: {}", symbols.join(", "))
            }
            CollectorWarning::SymbolCheckFailed(reason) => {
                write!(f, "could not verify symbols: {}", reason)
            }
            CollectorWarning::CandlesDisabled => {
                write!(f, "no timeframes available, candle collection disabled")
            }
        }
    }
}

/// Outcome of a successful `initialize`
#[derive(Debug, Clone)]
pub struct InitReport {
    pub session_id: Uuid,
    pub timeframes: Vec<Timeframe>,
    pub warnings: Vec<CollectorWarning>,
}

/// Timestamp argument of a save call
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamps {
    /// Same timestamp for every row
    Scalar(f64),
    /// One timestamp per row
    Aligned(Vec<f64>),
}

impl Timestamps {
    /// Expand to one timestamp per row, or report the aligned length
    pub fn expand(self, rows: usize) -> Result<Vec<f64>, usize> {
        match self {
            Timestamps::Scalar(ts) => Ok(vec![ts; rows]),
            Timestamps::Aligned(ts) if ts.len() == rows => Ok(ts),
            Timestamps::Aligned(ts) => Err(ts.len()),
        }
    }
}

impl From<f64> for Timestamps {
    fn from(ts: f64) -> Self {
        Timestamps::Scalar(ts)
    }
}

impl From<Vec<f64>> for Timestamps {
    fn from(ts: Vec<f64>) -> Self {
        Timestamps::Aligned(ts)
    }
}

impl From<&[f64]> for Timestamps {
    fn from(ts: &[f64]) -> Self {
        Timestamps::Aligned(ts.to_vec())
    }
}
