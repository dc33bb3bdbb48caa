//! Timeframe resolution policy
//!
//! Decided once when a session initializes: either the configured set is
//! authoritative, or the venue is asked for everything it supports.

use super::{normalize, Timeframe};
use crate::exchange::ExchangeAdapter;
use serde::Deserialize;
use thiserror::Error;

/// What to do when discovery succeeds but returns no timeframes
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmptyDiscoveryPolicy {
    /// Fail initialization
    #[default]
    Abort,
    /// Keep collecting timeframe-independent data, reject candles
    DisableCandles,
}

/// Timeframe resolution failures
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// Discovery requested without an adapter to ask
    #[error("timeframe discovery requires an exchange adapter")]
    AdapterMissing,
    /// Adapter call failed
    #[error("adapter {adapter} failed to list timeframes: {source}")]
    Discovery {
        adapter: String,
        #[source]
        source: anyhow::Error,
    },
    /// Adapter answered with an empty set
    #[error("adapter {adapter} reported no available timeframes")]
    Empty { adapter: String },
}

/// Resolution state, fixed for the life of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeframePolicy {
    /// Caller-provided set is authoritative
    Explicit(Vec<Timeframe>),
    /// Venue-reported set is authoritative
    Discover { on_empty: EmptyDiscoveryPolicy },
}

impl TimeframePolicy {
    /// Pick the policy from the `use_all_available_timeframes` flag
    pub fn from_flag(
        use_all_available: bool,
        explicit: Vec<Timeframe>,
        on_empty: EmptyDiscoveryPolicy,
    ) -> Self {
        if use_all_available {
            TimeframePolicy::Discover { on_empty }
        } else {
            TimeframePolicy::Explicit(explicit)
        }
    }

    /// Whether this policy needs an adapter to resolve
    pub fn needs_adapter(&self) -> bool {
        matches!(self, TimeframePolicy::Discover { .. })
    }

    /// Resolve the authoritative timeframe set
    pub async fn resolve(
        &self,
        adapter: Option<&dyn ExchangeAdapter>,
    ) -> Result<Vec<Timeframe>, ResolutionError> {
        match self {
            TimeframePolicy::Explicit(timeframes) => Ok(normalize(timeframes.iter().copied())),
            TimeframePolicy::Discover { on_empty } => {
                let adapter = adapter.ok_or(ResolutionError::AdapterMissing)?;
                let discovered = adapter.available_timeframes().await.map_err(|source| {
                    ResolutionError::Discovery {
                        adapter: adapter.name().to_string(),
                        source,
                    }
                })?;
                let discovered = normalize(discovered);

                if discovered.is_empty() {
                    match on_empty {
                        EmptyDiscoveryPolicy::Abort => {
                            return Err(ResolutionError::Empty {
                                adapter: adapter.name().to_string(),
                            });
                        }
                        EmptyDiscoveryPolicy::DisableCandles => {
                            tracing::warn!(
                                adapter = adapter.name(),
                                "No timeframes discovered, candle collection disabled"
                            );
                        }
                    }
                } else {
                    tracing::debug!(
                        adapter = adapter.name(),
                        count = discovered.len(),
                        "Discovered timeframes"
                    );
                }

                Ok(discovered)
            }
        }
    }
}
