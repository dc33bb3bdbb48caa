use clap::Parser;
use tick_vault::cli::{Cli, Commands};
use tick_vault::config::Config;

const DEFAULT_CONFIG: &str = include_str!("../config.toml.example");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(DEFAULT_CONFIG)?
        }
    };

    tick_vault::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Collect(args) => {
            tracing::info!("Starting data collection");
            args.execute(&config).await?;
        }
        Commands::Inspect(args) => {
            args.execute().await?;
        }
        Commands::Timeframes(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            let collector = &config.collector;
            let timeframes: Vec<&str> = collector.timeframes.iter().map(|t| t.as_str()).collect();
            println!("Current configuration:");
            println!("  Exchange: {}", collector.exchange);
            println!("  Symbols: {}", collector.symbols.join(", "));
            if collector.use_all_available_timeframes {
                println!(
                    "  Timeframes: all available (on empty: {:?})",
                    collector.on_empty_discovery
                );
            } else {
                println!("  Timeframes: {}", timeframes.join(", "));
            }
            println!("  Require adapter: {}", collector.require_adapter);
            println!("  Output: {}", config.data.output_dir.display());
            println!(
                "  Binance: {} (poll every {}s)",
                config.binance.base_url, config.binance.poll_interval_secs
            );
        }
    }

    Ok(())
}
