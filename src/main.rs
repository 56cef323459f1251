//! Meander CLI: validate config documents and dry-run scenarios.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use meander_cli::simulator::{self, SimulationOptions};
use meander_cli::WebsiteConfig;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "meander",
    version,
    about = "Scenario-driven, human-paced web interaction engine"
)]
struct Cli {
    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a website config document and report its structure
    Validate(ValidateArgs),
    /// Dry-run a scenario against an in-memory page
    Simulate(SimulateArgs),
}

#[derive(Args)]
struct ValidateArgs {
    /// Path to the website config JSON document
    file: PathBuf,
}

#[derive(Args)]
struct SimulateArgs {
    /// Path to the website config JSON document
    file: PathBuf,

    /// Scenario id to run
    #[arg(long)]
    scenario: String,

    /// Page type to start on (defaults to the first detectable page)
    #[arg(long)]
    page: Option<String>,

    /// Entropy seed for a deterministic run
    #[arg(long)]
    seed: Option<u64>,

    /// Double all resolved waits
    #[arg(long)]
    slow: bool,

    /// Wall-clock cap in seconds
    #[arg(long, default_value_t = 60)]
    max_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    info!(
        "meander v{} ({} {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_DATE")
    );

    let result = match cli.command {
        Commands::Validate(args) => cmd_validate(args),
        Commands::Simulate(args) => cmd_simulate(args).await,
    };

    if let Err(e) = result {
        error!("command failed: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

fn load_document(path: &PathBuf) -> Result<WebsiteConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    WebsiteConfig::load_str(&raw).context("config document rejected")
}

fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let config = load_document(&args.file)?;
    println!(
        "{} ({}) — {} scenario(s)",
        config.website.name, config.website.domain, config.scenarios.len()
    );
    let mut ids: Vec<&String> = config.scenarios.keys().collect();
    ids.sort();
    for id in ids {
        let scenario = &config.scenarios[id];
        let actions: usize = scenario
            .pages
            .values()
            .map(|p| p.actions.len())
            .sum();
        println!(
            "  {id}: \"{}\" — {} page(s), {} action(s), {} required metric(s)",
            scenario.name,
            scenario.pages.len(),
            actions,
            scenario.goals.required_metrics.len()
        );
    }
    Ok(())
}

async fn cmd_simulate(args: SimulateArgs) -> Result<()> {
    let config = load_document(&args.file)?;
    let report = simulator::run(
        &config,
        &SimulationOptions {
            scenario_id: args.scenario,
            start_page: args.page,
            seed: args.seed,
            slow_mode: args.slow,
            max_duration: Duration::from_secs(args.max_secs),
        },
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
