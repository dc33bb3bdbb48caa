//! Shared collector configuration context
//!
//! Sessions publish what they collect here; event producers read it to know
//! which exchanges, symbols and timeframes to feed.

use crate::timeframe::Timeframe;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Handle shared between sessions and producers
pub type SharedContext = Arc<RwLock<CollectorContext>>;

/// What one exchange's session collects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeCoverage {
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
}

/// Published coverage keyed by exchange identity
#[derive(Debug, Clone, Default)]
pub struct CollectorContext {
    exchanges: BTreeMap<String, ExchangeCoverage>,
}

impl CollectorContext {
    /// Fresh shared handle
    pub fn shared() -> SharedContext {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Publish coverage for an exchange, replacing any previous entry
    pub fn publish(&mut self, exchange: &str, coverage: ExchangeCoverage) {
        if self
            .exchanges
            .insert(exchange.to_string(), coverage)
            .is_some()
        {
            tracing::warn!(exchange, "Replaced previously published coverage");
        }
    }

    /// Coverage for one exchange
    pub fn coverage(&self, exchange: &str) -> Option<&ExchangeCoverage> {
        self.exchanges.get(exchange)
    }

    /// Exchange identities with published coverage
    pub fn exchanges(&self) -> impl Iterator<Item = &str> {
        self.exchanges.keys().map(String::as_str)
    }

    /// Drop an exchange's entry, e.g. when its session closes
    pub fn withdraw(&mut self, exchange: &str) -> Option<ExchangeCoverage> {
        self.exchanges.remove(exchange)
    }
}
