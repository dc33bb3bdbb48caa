//! Data set description record
//!
//! Written once per session before any market event. Replay reads it back to
//! decide whether it can interpret the data set at all.

use crate::codec::{self, CodecError};
use crate::store::{Row, StoreError, Table};
use crate::timeframe::Timeframe;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Schema version written by this collector
pub const SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Record layout version, `major.minor[.patch]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Can a reader at `self` interpret data written at `written`?
    ///
    /// Majors must match; the data may not use a newer minor than the reader.
    pub fn can_read(&self, written: &SchemaVersion) -> bool {
        self.major == written.major && written.minor <= self.minor
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

/// Malformed version string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid schema version: {0:?}")]
pub struct ParseVersionError(pub String);

impl FromStr for SchemaVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError(s.to_string());
        let parts = s
            .trim()
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| err()))
            .collect::<Result<Vec<_>, _>>()?;

        match parts.as_slice() {
            [major, minor] => Ok(Self::new(*major, *minor, 0)),
            [major, minor, patch] => Ok(Self::new(*major, *minor, *patch)),
            _ => Err(err()),
        }
    }
}

/// Description record failures on the read side
#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Version(#[from] ParseVersionError),
    #[error("bad {column} column: {source}")]
    Payload {
        column: &'static str,
        #[source]
        source: CodecError,
    },
}

/// The one-time metadata row of a data set
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    /// Seconds since the Unix epoch
    pub written_at: f64,
    pub version: SchemaVersion,
    pub exchange: String,
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
}

impl Description {
    /// Build the row stored in the description table
    pub fn to_row(&self) -> Result<Row, CodecError> {
        let timeframes: Vec<&str> = self.timeframes.iter().map(|tf| tf.as_str()).collect();
        Ok(Row::new(self.written_at)
            .with("version", self.version.to_string())
            .with("exchange", self.exchange.as_str())
            .with("symbols", codec::encode_payload(&self.symbols)?)
            .with("time_frames", codec::encode_payload(&timeframes)?))
    }

    /// Parse a stored description row
    pub fn from_row(row: &Row) -> Result<Self, DescriptionError> {
        let table = Table::Description;
        let version: SchemaVersion = row.require(table, "version")?.parse()?;
        let symbols: Vec<String> = codec::decode_payload(row.require(table, "symbols")?)
            .map_err(|source| DescriptionError::Payload {
                column: "symbols",
                source,
            })?;
        let timeframes: Vec<Timeframe> =
            codec::decode_payload(row.require(table, "time_frames")?).map_err(|source| {
                DescriptionError::Payload {
                    column: "time_frames",
                    source,
                }
            })?;

        Ok(Self {
            written_at: row.timestamp,
            version,
            exchange: row.require(table, "exchange")?.to_string(),
            symbols,
            timeframes,
        })
    }
}
