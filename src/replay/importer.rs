//! Data set import and ordered event replay

use super::{ImportError, MarketEvent};
use crate::collector::{Description, SchemaVersion, SCHEMA_VERSION};
use crate::store::{Table, TimeSeriesStore};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Opens a recorded data set for replay
///
/// Reading starts with the description row: a data set with zero or several
/// descriptions, or one written by an incompatible schema, is rejected before
/// any market event is decoded.
pub struct DatasetImporter<S: TimeSeriesStore> {
    store: S,
    description: Description,
}

impl<S: TimeSeriesStore> DatasetImporter<S> {
    /// Open with the schema version of this build
    pub async fn open(store: S) -> Result<Self, ImportError> {
        Self::open_with_reader(store, SCHEMA_VERSION).await
    }

    /// Open as a reader of schema `reader`
    pub async fn open_with_reader(store: S, reader: SchemaVersion) -> Result<Self, ImportError> {
        let rows = store.read_table(Table::Description).await?;
        let row = match rows.as_slice() {
            [] => return Err(ImportError::MissingDescription),
            [row] => row,
            _ => return Err(ImportError::DuplicateDescription(rows.len())),
        };

        let description = Description::from_row(row)?;
        if !reader.can_read(&description.version) {
            return Err(ImportError::IncompatibleVersion {
                found: description.version,
                supported: reader,
            });
        }

        info!(
            location = %store.location(),
            exchange = %description.exchange,
            version = %description.version,
            "Data set opened"
        );
        Ok(Self { store, description })
    }

    pub fn description(&self) -> &Description {
        &self.description
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decode every event of one table in insertion order
    pub async fn read(&self, table: Table) -> Result<Vec<MarketEvent>, ImportError> {
        let rows = self.store.read_table(table).await?;
        rows.iter()
            .map(|row| MarketEvent::from_row(table, row))
            .collect()
    }

    /// Row count per market-event table
    pub async fn counts(&self) -> Result<Vec<(Table, usize)>, ImportError> {
        let mut counts = Vec::with_capacity(Table::MARKET_EVENTS.len());
        for table in Table::MARKET_EVENTS {
            counts.push((table, self.store.read_table(table).await?.len()));
        }
        Ok(counts)
    }

    /// All market events merged into one ordered stream
    pub async fn events(&self) -> Result<EventStream, ImportError> {
        let mut events = Vec::new();
        for table in Table::MARKET_EVENTS {
            events.extend(self.read(table).await?);
        }
        debug!(events = events.len(), "Events loaded for replay");
        Ok(EventStream::new(events))
    }
}

/// Merges events from all tables and yields them in timestamp order
///
/// Equal timestamps keep table order (ticker, order book, recent trades,
/// ohlcv, kline) and then insertion order within a table.
#[derive(Debug)]
pub struct EventStream {
    events: std::vec::IntoIter<MarketEvent>,
}

fn table_rank(table: Table) -> usize {
    Table::MARKET_EVENTS
        .iter()
        .position(|t| *t == table)
        .unwrap_or(usize::MAX)
}

impl EventStream {
    /// Order `events`; input order breaks ties within one table
    pub fn new(mut events: Vec<MarketEvent>) -> Self {
        // stable sort keeps insertion order among equal keys
        events.sort_by(|a, b| match a.timestamp.total_cmp(&b.timestamp) {
            Ordering::Equal => table_rank(a.table()).cmp(&table_rank(b.table())),
            other => other,
        });
        Self {
            events: events.into_iter(),
        }
    }

    /// Keep only events inside `[start, end]`
    pub fn between(self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        let secs = |t: DateTime<Utc>| t.timestamp_millis() as f64 / 1000.0;
        let (start, end) = (start.map(secs), end.map(secs));
        let events: Vec<MarketEvent> = self
            .events
            .filter(|e| start.map_or(true, |s| e.timestamp >= s))
            .filter(|e| end.map_or(true, |t| e.timestamp <= t))
            .collect();
        Self {
            events: events.into_iter(),
        }
    }

    /// Events not yet yielded
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl Iterator for EventStream {
    type Item = MarketEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.events.size_hint()
    }
}
