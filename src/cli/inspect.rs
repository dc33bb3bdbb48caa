//! Inspect command implementation

use crate::collector::SCHEMA_VERSION;
use crate::replay::DatasetImporter;
use crate::store::ParquetStore;
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Data set directory written by `collect`
    pub data_set: PathBuf,

    /// Print events from this time on (RFC 3339)
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,

    /// Print events up to this time (RFC 3339)
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,

    /// Print at most this many events
    #[arg(long, default_value = "0")]
    pub events: usize,
}

impl InspectArgs {
    pub async fn execute(&self) -> anyhow::Result<()> {
        tracing::info!("Inspecting {:?}", self.data_set);
        let importer = DatasetImporter::open(ParquetStore::new(&self.data_set)).await?;
        let description = importer.description();

        println!("Data set: {}", self.data_set.display());
        println!(
            "  Version: {} (readable by schema {})",
            description.version, SCHEMA_VERSION
        );
        println!("  Exchange: {}", description.exchange);
        println!("  Symbols: {}", description.symbols.join(", "));
        let timeframes: Vec<&str> = description.timeframes.iter().map(|t| t.as_str()).collect();
        println!("  Timeframes: {}", timeframes.join(", "));
        let written_ms = (description.written_at * 1000.0) as i64;
        if let Some(written) = DateTime::from_timestamp_millis(written_ms) {
            println!("  Written: {}", written.to_rfc3339());
        }

        println!("Rows:");
        for (table, count) in importer.counts().await? {
            println!("  {:<14} {}", table.name(), count);
        }

        if self.events > 0 {
            println!("Events:");
            let stream = importer.events().await?.between(self.start, self.end);
            for event in stream.take(self.events) {
                println!(
                    "  {:.3} {:<14} {} {}",
                    event.timestamp,
                    event.table().name(),
                    event.symbol,
                    event.exchange
                );
            }
        }

        Ok(())
    }
}
