//! Replay-side reader
//!
//! Validates a data set's description against the schema versions this build
//! understands and yields its market events in deterministic order.

mod events;
mod importer;

pub use events::{EventBody, MarketEvent};
pub use importer::{DatasetImporter, EventStream};

use crate::codec::CodecError;
use crate::collector::{DescriptionError, SchemaVersion};
use crate::store::{StoreError, Table};
use thiserror::Error;

/// Data set import errors
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("data set has no description record")]
    MissingDescription,
    #[error("data set has {0} description records, expected exactly one")]
    DuplicateDescription(usize),
    #[error("data set schema {found} cannot be read by schema {supported}")]
    IncompatibleVersion {
        found: SchemaVersion,
        supported: SchemaVersion,
    },
    #[error("invalid description: {0}")]
    Description(#[from] DescriptionError),
    #[error("bad {column} payload in {table}: {source}")]
    Payload {
        table: Table,
        column: &'static str,
        #[source]
        source: CodecError,
    },
    #[error("unknown timeframe {0:?} in data set")]
    UnknownTimeframe(String),
    #[error("{0} does not hold market events")]
    NotAnEventTable(Table),
    #[error(transparent)]
    Store(#[from] StoreError),
}
