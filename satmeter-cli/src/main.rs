//! Satmeter CLI - e-cash wallet and spend report
//!
//! Manages the wallet that funds metered runs and shows what they cost.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use satmeter::config::{IssueLevel, MeterConfig, config_path, init_config, load_config_from};
use satmeter::db::Database;
use satmeter::ledger::SqliteLedger;
use satmeter::mint::HttpMint;
use satmeter::provider::build_provider;
use satmeter::spend_log::{SharedSpendLog, SpendLog, SqliteSpendLog};
use satmeter::wallet::Wallet;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Satmeter - prepaid e-cash budgets for metered agent runs
#[derive(Parser)]
#[command(name = "satmeter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "SATMETER_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init(InitArgs),

    /// Show the wallet balance
    Balance,

    /// Credit an e-cash token to the wallet
    Receive {
        /// Encoded token (cashuA...)
        token: String,
    },

    /// Send sats out of the wallet as a token
    Send {
        /// Amount in sats
        amount: u64,
    },

    /// Show provider, wallet and configuration status
    Status,

    /// Top up the wallet over lightning
    Topup(TopupArgs),

    /// Show recent runs from the spend log
    Log(LogArgs),
}

/// Arguments for the init command
#[derive(Args)]
struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    force: bool,
}

/// Arguments for the topup command
#[derive(Args)]
struct TopupArgs {
    #[command(subcommand)]
    command: TopupCommands,
}

#[derive(Subcommand)]
enum TopupCommands {
    /// Request a lightning invoice for the amount
    Quote {
        /// Amount in sats
        amount: u64,
    },
    /// Mint the proofs for a paid quote
    Claim {
        /// Quote id returned by `topup quote`
        quote: String,
    },
}

/// Arguments for the log command
#[derive(Args)]
struct LogArgs {
    /// Number of most recent runs to show
    #[arg(short, long, default_value_t = 20)]
    limit: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "satmeter={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let config_file = cli.config.unwrap_or_else(config_path);
    match cli.command {
        Commands::Init(args) => cmd_init(args, &config_file).await,
        Commands::Balance => cmd_balance(&config_file).await,
        Commands::Receive { token } => cmd_receive(&config_file, &token).await,
        Commands::Send { amount } => cmd_send(&config_file, amount).await,
        Commands::Status => cmd_status(&config_file).await,
        Commands::Topup(args) => cmd_topup(args, &config_file).await,
        Commands::Log(args) => cmd_log(args, &config_file).await,
    }
}

/// Local time for a spend log timestamp.
fn format_timestamp(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map_or_else(
            || "-".to_owned(),
            |t| {
                t.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            },
        )
}

/// Wallet and spend log opened from one configuration.
struct Stack {
    config: MeterConfig,
    wallet: Arc<Wallet>,
    spend_log: SharedSpendLog,
}

async fn open_stack(config_file: &Path) -> Result<Stack> {
    let config = load_config_from(config_file)
        .await
        .with_context(|| format!("failed to load {}", config_file.display()))?;
    config.ensure_valid()?;

    let db = Database::open(config.ledger_path())
        .with_context(|| format!("failed to open {}", config.ledger_path().display()))?;
    let ledger = SqliteLedger::from_database(db.clone())?;
    let spend_log = SqliteSpendLog::from_database(db)?;
    let mint = HttpMint::with_config(&config.mint_http())?;

    let wallet = Wallet::new(Arc::new(ledger), Arc::new(mint), config.mint_url.clone());
    Ok(Stack {
        config,
        wallet: Arc::new(wallet),
        spend_log: Arc::new(spend_log),
    })
}

/// Initialize configuration.
async fn cmd_init(args: InitArgs, config_file: &Path) -> Result<()> {
    if config_file.exists() && !args.force {
        println!("Configuration already exists at: {}", config_file.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    let config = init_config(config_file)
        .await
        .context("failed to initialize config")?;

    println!("Configuration created: {}", config_file.display());
    println!("Wallet database:       {}", config.ledger_path().display());
    println!();
    println!("Next steps:");
    println!("  1. Set \"provider\": \"routstr\" in the config to meter runs");
    println!("  2. satmeter topup quote <amount>   or   satmeter receive <token>");
    Ok(())
}

async fn cmd_balance(config_file: &Path) -> Result<()> {
    let stack = open_stack(config_file).await?;
    let info = stack.wallet.info().await?;
    println!("{} sats ({} proofs)", info.balance_sats, info.proof_count);
    Ok(())
}

async fn cmd_receive(config_file: &Path, token: &str) -> Result<()> {
    let stack = open_stack(config_file).await?;
    let summary = stack.wallet.receive_token(token).await?;

    println!("Received: {} sats", summary.received_sats);
    if summary.rejected > 0 {
        println!("Rejected: {} proofs (invalid or already spent)", summary.rejected);
    }
    if summary.duplicates > 0 {
        println!("Skipped:  {} proofs already in the wallet", summary.duplicates);
    }
    if summary.received_sats == 0 {
        bail!("token credited nothing");
    }
    Ok(())
}

async fn cmd_send(config_file: &Path, amount: u64) -> Result<()> {
    let stack = open_stack(config_file).await?;
    let token = stack.wallet.send_token(amount).await?;
    println!("{token}");
    Ok(())
}

async fn cmd_status(config_file: &Path) -> Result<()> {
    println!("Satmeter Status\n");

    println!("Configuration:");
    println!("  Path:   {}", config_file.display());
    println!(
        "  Exists: {}",
        if config_file.exists() { "yes" } else { "no" }
    );

    let config = match load_config_from(config_file).await {
        Ok(config) => config,
        Err(e) => {
            println!("  Valid:  no ({e})");
            return Ok(());
        }
    };
    let issues = config.validate();
    for issue in &issues {
        println!("  {issue}");
    }
    if issues.iter().any(|i| i.level == IssueLevel::Error) {
        println!("  Valid:  no");
        return Ok(());
    }
    println!("  Valid:  yes");
    println!();

    let stack = open_stack(config_file).await?;
    let provider = build_provider(
        &stack.config,
        Arc::clone(&stack.wallet),
        Arc::clone(&stack.spend_log),
    )?;
    let status = provider.status().await?;
    let info = stack.wallet.info().await?;

    println!("Provider:");
    println!("  Name:    {}", status.provider);
    println!("  Gateway: {}", status.base_url.as_deref().unwrap_or("-"));
    println!("  Budget:  {} sats per run", stack.config.default_budget_sats);
    println!();
    println!("Wallet:");
    println!("  Mint:    {}", stack.wallet.mint_url());
    println!("  Balance: {} sats", info.balance_sats);
    println!("  Proofs:  {}", info.proof_count);
    println!("  Ledger:  {}", stack.config.ledger_path().display());
    Ok(())
}

async fn cmd_topup(args: TopupArgs, config_file: &Path) -> Result<()> {
    let stack = open_stack(config_file).await?;
    match args.command {
        TopupCommands::Quote { amount } => {
            let quote = stack.wallet.request_top_up(amount).await?;
            println!("Pay this invoice, then run `satmeter topup claim {}`:", quote.quote);
            println!();
            println!("{}", quote.request);
        }
        TopupCommands::Claim { quote } => {
            let minted = stack.wallet.claim_top_up(&quote).await?;
            println!("Minted {minted} sats");
        }
    }
    Ok(())
}

async fn cmd_log(args: LogArgs, config_file: &Path) -> Result<()> {
    let stack = open_stack(config_file).await?;
    let entries = stack.spend_log.entries(Some(args.limit)).await?;
    if entries.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    println!(
        "{:<20} {:<8} {:>8} {:>8} {:>8}  {:<3} {}",
        "time", "provider", "budget", "refund", "spent", "ok", "prompt"
    );
    for e in &entries {
        println!(
            "{:<20} {:<8} {:>8} {:>8} {:>8}  {:<3} {}",
            format_timestamp(e.timestamp),
            e.provider,
            e.budget_sats,
            e.refund_sats,
            e.spent_sats,
            if e.success { "yes" } else { "no" },
            e.prompt_prefix.as_deref().unwrap_or("")
        );
        if let Some(note) = &e.note {
            println!("{:<20} note: {note}", "");
        }
    }

    let summary = stack.spend_log.summary().await?;
    println!();
    println!(
        "Total: {} runs, {} sats spent of {} budgeted, {} refunded",
        summary.runs, summary.spent_sats, summary.budget_sats, summary.refund_sats
    );
    if summary.unreconciled > 0 {
        println!("       {} runs with unconfirmed refunds", summary.unreconciled);
    }
    Ok(())
}
