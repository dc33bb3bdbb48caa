//! In-memory store

use super::{Row, StoreError, Table, TimeSeriesStore};
use async_trait::async_trait;
use std::collections::HashMap;

/// Store keeping every table in memory
///
/// Used for dry runs and tests. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<Table, Vec<Row>>,
    initialized: bool,
    closed: bool,
    unavailable: Option<String>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose initialization always fails
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Rows in a table without going through the async API
    pub fn rows(&self, table: Table) -> &[Row] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if !self.initialized {
            return Err(StoreError::NotInitialized);
        }
        Ok(())
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn initialize(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if let Some(reason) = &self.unavailable {
            return Err(StoreError::Unavailable {
                location: self.location(),
                reason: reason.clone(),
            });
        }
        self.initialized = true;
        Ok(())
    }

    async fn insert(&mut self, table: Table, row: Row) -> Result<(), StoreError> {
        self.insert_all(table, vec![row]).await
    }

    async fn insert_all(&mut self, table: Table, rows: Vec<Row>) -> Result<(), StoreError> {
        self.check_writable()?;
        for row in &rows {
            row.validate(table)?;
        }
        self.tables.entry(table).or_default().extend(rows);
        Ok(())
    }

    async fn read_table(&self, table: Table) -> Result<Vec<Row>, StoreError> {
        if !self.initialized {
            return Err(StoreError::NotInitialized);
        }
        Ok(self.rows(table).to_vec())
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
