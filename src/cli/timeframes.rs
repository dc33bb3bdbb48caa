//! Timeframes command implementation

use crate::config::Config;
use crate::exchange::{BinanceAdapter, ExchangeAdapter};
use crate::timeframe::{Timeframe, TimeframePolicy};
use clap::Args;

#[derive(Args, Debug)]
pub struct TimeframesArgs {
    /// Resolve against the venue instead of listing every known timeframe
    #[arg(long)]
    pub resolve: bool,
}

impl TimeframesArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        if !self.resolve {
            for timeframe in Timeframe::ALL {
                println!("{:<4} {:>10}s", timeframe.as_str(), timeframe.duration().as_secs());
            }
            return Ok(());
        }

        let collector = &config.collector;
        let policy = TimeframePolicy::from_flag(
            collector.use_all_available_timeframes,
            collector.timeframes.clone(),
            collector.on_empty_discovery,
        );
        let adapter = BinanceAdapter::new(config.binance.clone())?;
        let resolved = policy.resolve(Some(&adapter as &dyn ExchangeAdapter)).await?;

        let names: Vec<&str> = resolved.iter().map(|t| t.as_str()).collect();
        println!("{}: {}", collector.exchange, names.join(", "));
        Ok(())
    }
}
