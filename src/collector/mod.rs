//! Collector module
//!
//! Session lifecycle, description record and per-kind event writes

mod context;
mod description;
mod session;
mod types;

pub use context::{CollectorContext, ExchangeCoverage, SharedContext};
pub use description::{
    Description, DescriptionError, ParseVersionError, SchemaVersion, SCHEMA_VERSION,
};
pub use session::Session;
pub use types::{
    CollectorError, CollectorWarning, InitReport, Operation, SessionState, Timestamps,
};
