//! CLI interface for tick-vault
//!
//! Provides subcommands for:
//! - `collect`: Record market snapshots into a new data set
//! - `inspect`: Validate a data set and summarize its contents
//! - `timeframes`: List known or venue-resolved timeframes
//! - `config`: Show the effective configuration

mod collect;
mod inspect;
mod timeframes;

pub use collect::CollectArgs;
pub use inspect::InspectArgs;
pub use timeframes::TimeframesArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tick-vault")]
#[command(about = "Exchange market data collector for backtesting data sets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record market snapshots into a new data set
    Collect(CollectArgs),
    /// Validate a data set and summarize its contents
    Inspect(InspectArgs),
    /// List timeframes
    Timeframes(TimeframesArgs),
    /// Show configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collect() {
        let cli = Cli::try_parse_from(["tick-vault", "collect", "-n", "3"]).unwrap();
        assert_eq!(cli.config, "config.toml");
        match cli.command {
            Commands::Collect(args) => {
                assert_eq!(args.iterations, Some(3));
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_inspect_window() {
        let cli = Cli::try_parse_from([
            "tick-vault",
            "--config",
            "alt.toml",
            "inspect",
            "data/binance_20240101_000000",
            "--start",
            "2024-01-01T00:00:00Z",
            "--events",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.config, "alt.toml");
        match cli.command {
            Commands::Inspect(args) => {
                assert_eq!(args.events, 10);
                assert!(args.start.is_some());
                assert!(args.end.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_inspect_requires_path() {
        assert!(Cli::try_parse_from(["tick-vault", "inspect"]).is_err());
    }
}
