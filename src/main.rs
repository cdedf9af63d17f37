//! PROPLINE: player-prop pick tracker
//!
//! Entry point. Loads configuration, initialises structured logging, opens
//! the workbook, picks a board provider and runs one pipeline command.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use propline::config::AppConfig;
use propline::engine::{Diagnostics, GenerateReport, Pipeline, SettlementReport};
use propline::platforms::prizepicks::PrizePicksClient;
use propline::platforms::sample::SampleBoard;
use propline::platforms::BoardProvider;
use propline::storage::{TabularStore, Workbook};
use propline::strategy::model::UniformModel;

const BANNER: &str = r#"
 ____  ____   ___  ____  _     ___ _   _ _____
|  _ \|  _ \ / _ \|  _ \| |   |_ _| \ | | ____|
| |_) | |_) | | | | |_) | |    | ||  \| |  _|
|  __/|  _ <| |_| |  __/| |___ | || |\  | |___
|_|   |_| \_\\___/|_|   |_____|___|_| \_|_____|

  Player-prop picks, parlays and bankroll
  v0.1.0
"#;

/// Daily pick tracker CLI.
#[derive(Parser, Debug)]
#[command(name = "propline")]
#[command(version = "0.1.0")]
#[command(about = "Player-prop pick tracker, parlay builder and bankroll settler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Hide the startup banner
    #[arg(long)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build and store the day's picks and combinations
    Generate {
        /// Pick date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Settle the day's picks and roll the bankroll forward
    Settle {
        /// Date to settle (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Print the current bankroll
    Bankroll {
        /// Balance as of this date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// External account balance and a board sample
    Diagnostics,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let cfg = AppConfig::load(&cli.config)?;

    init_logging();

    if !cli.quiet {
        println!("{BANNER}");
    }
    info!(
        tracker = %cfg.tracker.name,
        seed_balance = %cfg.tracker.seed_balance,
        currency = %cfg.tracker.currency,
        "PROPLINE starting up"
    );

    let today = chrono::Local::now().date_naive();
    let session = AppConfig::resolve_env(&cfg.board.session_env).ok();
    let mut pipeline = build_pipeline(&cfg, session.clone())?;

    match cli.command {
        Commands::Generate { date } => {
            let report = pipeline.generate(date.unwrap_or(today)).await?;
            print_generate(&report);
        }
        Commands::Settle { date } => {
            let report = pipeline.settle(date.unwrap_or(today)).await?;
            print_settlement(&report);
        }
        Commands::Bankroll { date } => {
            let date = date.unwrap_or(today);
            let balance = pipeline.current_balance(date)?;
            println!("Bankroll as of {date}: ${balance:.2} {}", cfg.tracker.currency);
        }
        Commands::Diagnostics => {
            let diag = pipeline.diagnostics().await;
            let bankroll = pipeline.current_balance(today)?;
            print_diagnostics(&diag, session.as_deref(), bankroll);
        }
    }

    Ok(())
}

/// Wire the store, board provider and model from configuration.
fn build_pipeline(cfg: &AppConfig, session: Option<String>) -> Result<Pipeline> {
    let store: Box<dyn TabularStore> = match &cfg.store.path {
        Some(path) => {
            info!(path = %path, "Opening workbook");
            Box::new(Workbook::open(path)?)
        }
        None => {
            warn!("No workbook path configured; nothing will be kept after exit");
            Box::new(Workbook::in_memory())
        }
    };

    let board: Box<dyn BoardProvider> = match session {
        Some(token) if !token.trim().is_empty() => {
            info!("Using PrizePicks board");
            Box::new(PrizePicksClient::new(&cfg.board, token)?)
        }
        _ => {
            warn!(
                env = %cfg.board.session_env,
                "No session token configured; using the sample board"
            );
            Box::new(SampleBoard::new())
        }
    };

    let model = UniformModel::new(&cfg.model).context("Invalid model configuration")?;

    Pipeline::new(cfg.clone(), store, board, Box::new(model))
}

fn print_generate(report: &GenerateReport) {
    println!(
        "{}: {} picks, {} combinations (bankroll ${:.2}, board {} props, {} rejected)",
        report.date,
        report.picks.len(),
        report.combinations.len(),
        report.bankroll,
        report.board_size,
        report.rejected,
    );
    for pick in &report.picks {
        println!("  {pick}");
    }
    for combo in &report.combinations {
        println!("  {combo}");
    }
}

fn print_settlement(report: &SettlementReport) {
    println!(
        "Settled: {} hit, {} miss, {} DNP ({} already settled, {} open, {} lookup failures)",
        report.hits,
        report.misses,
        report.dnps,
        report.already_settled,
        report.pending,
        report.lookup_failures,
    );
    println!(
        "Combinations: {} settled, {} open",
        report.combos_settled, report.combos_pending
    );
    println!(
        "Bankroll: ${:.2} -> ${:.2} (day delta ${:.2})",
        report.balance_before, report.balance_after, report.delta
    );
    if report.needs_retry() {
        println!("Some picks are still open; run settle again later.");
    }
}

fn print_diagnostics(diag: &Diagnostics, session: Option<&str>, bankroll: rust_decimal::Decimal) {
    let token = session
        .map(|t| format!("{}…", t.chars().take(8).collect::<String>()))
        .unwrap_or_else(|| "None".to_string());
    println!("Provider: {}", diag.provider);
    println!("Token:    {token}");
    match &diag.external_balance {
        Ok(balance) => println!("Balance:  ${balance:.2}"),
        Err(e) => println!("Balance error: {e}"),
    }
    println!("Bankroll: ${bankroll:.2}");
    match &diag.board_size {
        Ok(size) => {
            println!("Board:    {size} props");
            for prop in &diag.board_sample {
                println!("  {prop}");
            }
        }
        Err(e) => println!("Board error: {e}"),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("propline=info"));

    let json_logging = std::env::var("PROPLINE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
