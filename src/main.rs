use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use macdbot::backtest::{BacktestRunner, MarketScenario, SyntheticDataGenerator};
use macdbot::config::{load_settings, DEFAULT_CONFIG_PATH};
use macdbot::execution::recover;
use macdbot::persistence::TradeJournal;
use macdbot::SignalEngine;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "MACD signal and position-risk engine for one spot pair")]
struct Cli {
    /// Settings file, extension optional
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a synthetic market through the engine and a paper account
    Backtest {
        /// uptrend, downtrend, sideways, volatile or flash-crash
        #[arg(short, long, default_value = "uptrend")]
        scenario: MarketScenario,

        #[arg(short = 'n', long, default_value_t = 600)]
        samples: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(short, long, default_value_t = 5)]
        interval_minutes: i64,

        /// Append every fill to this JSON trade journal
        #[arg(short, long)]
        journal: Option<String>,
    },

    /// Rebuild position and cooldown state from a trade journal
    Recover {
        #[arg(short, long)]
        trades: String,

        /// Pair to recover; defaults to the configured symbol
        #[arg(short, long)]
        symbol: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = load_settings(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config))?;

    match cli.command {
        Commands::Backtest {
            scenario,
            samples,
            seed,
            interval_minutes,
            journal,
        } => {
            tracing::info!("Backtesting {} on {} ({} samples, seed {})", settings.engine.symbol, scenario, samples, seed);

            let data = SyntheticDataGenerator::new(seed).generate(scenario, samples, interval_minutes);

            let mut runner = BacktestRunner::from_settings(&settings);
            if let Some(path) = journal {
                runner = runner.with_journal(TradeJournal::new(path));
            }

            let metrics = runner.run(&data)?;
            metrics.print_report();
        }
        Commands::Recover { trades, symbol } => {
            let symbol = symbol.unwrap_or_else(|| settings.engine.symbol.clone());
            let history = TradeJournal::new(&trades).load()?;
            let state = recover(&history, &symbol, settings.engine.recovery_dust_quantity)?;

            let mut engine_config = settings.engine.clone();
            engine_config.symbol = symbol.clone();
            let mut engine = SignalEngine::new(engine_config);
            engine.restore(&state)?;

            println!("\n=== RECOVERED STATE: {} ===\n", symbol);
            println!("  Trades in journal:     {}", history.len());
            match engine.position().as_open() {
                Some(open) => {
                    println!("  Position:              {:.8} @ ${:.2}", open.quantity, open.entry_price);
                    println!("  Entered:               {}", open.entry_time);
                    println!("  Stop / Target:         ${:.2} / ${:.2}", open.stop_loss, open.take_profit);
                }
                None => println!("  Position:              flat"),
            }
            match engine.cooldown().last_trade_time() {
                Some(at) => println!(
                    "  Last trade:            {} at {}",
                    engine.cooldown().last_trade_action().map(|a| a.to_string()).unwrap_or_default(),
                    at
                ),
                None => println!("  Last trade:            none"),
            }
            println!();
        }
    }

    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("macdbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
