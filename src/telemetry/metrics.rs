//! Prometheus metrics

use crate::collector::Operation;
use crate::store::Table;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Rows durably written, labelled by table
pub const ROWS_WRITTEN: &str = "tickvault_rows_written_total";
/// Rejected or failed session calls, labelled by operation
pub const FAILED_CALLS: &str = "tickvault_failed_calls_total";
/// Snapshots fetched by the collect loop, labelled by exchange
pub const SNAPSHOTS: &str = "tickvault_snapshots_total";

/// Count rows written to a table
pub fn record_rows_written(table: Table, rows: usize) {
    metrics::counter!(ROWS_WRITTEN, "table" => table.name()).increment(rows as u64);
}

/// Count a failed session call
pub fn record_failure(operation: Operation) {
    metrics::counter!(FAILED_CALLS, "operation" => operation.as_str()).increment(1);
}

/// Count a fetched venue snapshot
pub fn record_snapshot(exchange: &str) {
    metrics::counter!(SNAPSHOTS, "exchange" => exchange.to_string()).increment(1);
}

/// Serve metrics over HTTP on `port`
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}
