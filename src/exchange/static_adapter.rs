//! Fixed-list adapter for offline runs and tests

use super::ExchangeAdapter;
use crate::timeframe::Timeframe;
use async_trait::async_trait;

/// Adapter answering from fixed lists
#[derive(Debug, Clone, Default)]
pub struct StaticAdapter {
    name: String,
    timeframes: Vec<Timeframe>,
    symbols: Vec<String>,
    failure: Option<String>,
}

impl StaticAdapter {
    /// Create an adapter with empty lists
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the reported timeframes
    pub fn with_timeframes(mut self, timeframes: Vec<Timeframe>) -> Self {
        self.timeframes = timeframes;
        self
    }

    /// Set the reported symbols
    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Make every call fail with the given message
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    fn check(&self) -> anyhow::Result<()> {
        match &self.failure {
            Some(msg) => anyhow::bail!("{}: {}", self.name, msg),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for StaticAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn available_timeframes(&self) -> anyhow::Result<Vec<Timeframe>> {
        self.check()?;
        Ok(self.timeframes.clone())
    }

    async fn tradable_symbols(&self) -> anyhow::Result<Vec<String>> {
        self.check()?;
        Ok(self.symbols.clone())
    }
}
