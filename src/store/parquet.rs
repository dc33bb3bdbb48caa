//! Parquet-backed store
//!
//! One directory per data set, one sub-directory per table. Every insert call
//! lands as exactly one Snappy-compressed Parquet file, written to a
//! temporary name and linked into place so a batch is visible whole or not
//! at all. Existing data files are never replaced.

use super::{Row, StoreError, Table, TimeSeriesStore};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const EXTENSION: &str = "parquet";

/// Arrow schema for a table: `timestamp` then the table's string columns
pub fn table_schema(table: Table) -> Schema {
    let mut fields = vec![Field::new("timestamp", DataType::Float64, false)];
    fields.extend(
        table
            .columns()
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, false)),
    );
    Schema::new(fields)
}

/// Data set directory for an exchange started at `started_at`
pub fn dataset_dir(output_dir: &Path, exchange: &str, started_at: DateTime<Utc>) -> PathBuf {
    output_dir.join(format!(
        "{}_{}",
        exchange,
        started_at.format("%Y%m%d_%H%M%S")
    ))
}

/// Parquet store rooted at a data set directory
#[derive(Debug)]
pub struct ParquetStore {
    root: PathBuf,
    next_seq: HashMap<Table, u64>,
    initialized: bool,
    closed: bool,
}

impl ParquetStore {
    /// Create a store handle; nothing touches disk until `initialize`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_seq: HashMap::new(),
            initialized: false,
            closed: false,
        }
    }

    /// Data set directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a table's files
    pub fn table_dir(&self, table: Table) -> PathBuf {
        self.root.join(table.name())
    }

    /// File name for the `seq`-th write into `table`
    pub fn file_name(table: Table, seq: u64) -> String {
        format!("{}_{:010}.{}", table.name(), seq, EXTENSION)
    }

    fn parse_seq(table: Table, file_name: &str) -> Option<u64> {
        file_name
            .strip_prefix(table.name())?
            .strip_prefix('_')?
            .strip_suffix(EXTENSION)?
            .strip_suffix('.')?
            .parse()
            .ok()
    }

    /// Data files of a table, in write order
    fn table_files(dir: &Path, table: Table) -> Result<Vec<(u64, PathBuf)>, StoreError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let seq = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| Self::parse_seq(table, n));
            if let Some(seq) = seq {
                files.push((seq, path));
            }
        }
        files.sort_by_key(|(seq, _)| *seq);
        Ok(files)
    }

    fn prepare_dirs(&mut self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;

        // Catch read-only locations before the first real write
        let probe = self.root.join(".write_probe");
        File::create(&probe)?;
        fs::remove_file(&probe)?;

        for table in Table::ALL {
            let dir = self.table_dir(table);
            fs::create_dir_all(&dir)?;
            let next = Self::table_files(&dir, table)?
                .last()
                .map(|(seq, _)| seq + 1)
                .unwrap_or(0);
            self.next_seq.insert(table, next);
        }
        Ok(())
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

/// Write rows to `path` via a temporary file in the same directory
fn write_rows(path: &Path, table: Table, rows: &[Row]) -> Result<(), StoreError> {
    let schema = Arc::new(table_schema(table));

    let timestamps: Vec<f64> = rows.iter().map(|r| r.timestamp).collect();
    let mut columns: Vec<ArrayRef> = vec![Arc::new(Float64Array::from(timestamps))];
    for column in table.columns() {
        let values = rows
            .iter()
            .map(|r| r.require(table, column))
            .collect::<Result<Vec<&str>, _>>()?;
        columns.push(Arc::new(StringArray::from(values)));
    }

    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let tmp = path.with_extension("tmp");
    let written = write_batch(&tmp, schema, &batch).and_then(|()| {
        // hard_link refuses to replace an existing data file
        fs::hard_link(&tmp, path)?;
        Ok(())
    });
    match fs::remove_file(&tmp) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            tracing::warn!(path = ?tmp, error = %e, "Failed to remove temporary file");
        }
        _ => {}
    }
    written?;

    tracing::debug!(path = ?path, table = %table, count = rows.len(), "Wrote rows to Parquet");

    Ok(())
}

fn write_batch(tmp: &Path, schema: SchemaRef, batch: &RecordBatch) -> Result<(), StoreError> {
    let file = File::create(tmp)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(batch)?;
    let file = writer.into_inner()?;
    file.sync_all()?;
    Ok(())
}

fn string_column<'a>(
    batch: &'a RecordBatch,
    table: Table,
    name: &str,
) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StoreError::Schema {
            table,
            reason: format!("invalid {} column", name),
        })
}

/// Read every row of one file
fn read_rows(path: &Path, table: Table) -> Result<Vec<Row>, StoreError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;

        let timestamps = batch
            .column_by_name("timestamp")
            .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
            .ok_or_else(|| StoreError::Schema {
                table,
                reason: "invalid timestamp column".to_string(),
            })?;

        let columns = table
            .columns()
            .iter()
            .map(|name| string_column(&batch, table, name).map(|array| (*name, array)))
            .collect::<Result<Vec<_>, _>>()?;

        for i in 0..batch.num_rows() {
            let mut row = Row::new(timestamps.value(i));
            for (name, array) in &columns {
                if array.is_null(i) {
                    return Err(StoreError::Schema {
                        table,
                        reason: format!("null {} at row {}", name, i),
                    });
                }
                row = row.with(name, array.value(i));
            }
            rows.push(row);
        }
    }

    Ok(rows)
}

#[async_trait]
impl TimeSeriesStore for ParquetStore {
    async fn initialize(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if self.initialized {
            return Ok(());
        }

        self.prepare_dirs().map_err(|e| StoreError::Unavailable {
            location: self.location(),
            reason: e.to_string(),
        })?;
        self.initialized = true;

        tracing::info!(root = ?self.root, "Parquet store initialized");
        Ok(())
    }

    async fn insert(&mut self, table: Table, row: Row) -> Result<(), StoreError> {
        self.insert_all(table, vec![row]).await
    }

    async fn insert_all(&mut self, table: Table, rows: Vec<Row>) -> Result<(), StoreError> {
        self.check_writable()?;
        if rows.is_empty() {
            return Ok(());
        }
        for row in &rows {
            row.validate(table)?;
        }

        // Slot is taken even if the caller drops this future mid-write
        let seq = self.next_seq.get(&table).copied().unwrap_or(0);
        self.next_seq.insert(table, seq + 1);
        let path = self.table_dir(table).join(Self::file_name(table, seq));

        tokio::task::spawn_blocking(move || write_rows(&path, table, &rows)).await?
    }

    async fn read_table(&self, table: Table) -> Result<Vec<Row>, StoreError> {
        let dir = self.table_dir(table);
        if !dir.is_dir() {
            return Err(StoreError::NotInitialized);
        }

        tokio::task::spawn_blocking(move || -> Result<Vec<Row>, StoreError> {
            let mut rows = Vec::new();
            for (_, path) in ParquetStore::table_files(&dir, table)? {
                rows.extend(read_rows(&path, table)?);
            }
            Ok(rows)
        })
        .await?
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        if !self.closed {
            self.closed = true;
            tracing::debug!(root = ?self.root, "Parquet store closed");
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
