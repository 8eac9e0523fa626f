//! trickle — Command-line front end for the Trickle streaming ledger.
//!
//! Replays scenario scripts against an in-memory pool, prints per-step
//! outcomes and balances, and verifies that funds are conserved.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use trickle_core::traits::StreamingPool;
use trickle_sim::{Scenario, SimConfig, SimReport, Simulator};

/// Trickle streaming ledger simulator.
#[derive(Parser)]
#[command(name = "trickle")]
#[command(version, about = "Continuous fund streaming, one cycle at a time.")]
struct Cli {
    /// Config file (TOML, JSON or YAML). Environment: TRICKLE_*.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file and report outcomes.
    Run(RunArgs),
    /// Parse and validate a scenario file without running it.
    Check(CheckArgs),
    /// Print the reference scenario as JSON.
    Example,
    /// Run a random scenario and verify conservation.
    Fuzz(FuzzArgs),
    /// Query balances at a block after replaying a scenario.
    Query(QueryArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Path to the scenario JSON file.
    scenario: PathBuf,

    /// Override the cycle length in blocks.
    #[arg(long)]
    cycle_blocks: Option<u64>,

    /// Print the full report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CheckArgs {
    /// Path to the scenario JSON file.
    scenario: PathBuf,
}

#[derive(Args)]
struct FuzzArgs {
    /// RNG seed.
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Number of mutating steps.
    #[arg(long, default_value = "500")]
    steps: usize,

    /// Number of distinct senders.
    #[arg(long, default_value = "4")]
    senders: usize,

    /// Number of distinct receivers.
    #[arg(long, default_value = "8")]
    receivers: usize,
}

#[derive(Args)]
struct QueryArgs {
    /// Path to the scenario JSON file.
    scenario: PathBuf,

    /// Block to project balances at (default: last scenario block, or the
    /// latest applied block if later).
    #[arg(short, long)]
    block: Option<u64>,

    /// Sender label to report the withdrawable balance of.
    #[arg(long)]
    sender: Vec<String>,

    /// Receiver label to report the collectable balance of.
    #[arg(long)]
    receiver: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SimConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run(&config, args),
        Commands::Check(args) => check(args),
        Commands::Example => example(),
        Commands::Fuzz(args) => fuzz(&config, args),
        Commands::Query(args) => query(&config, args),
    }
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
    Scenario::from_json(&json).with_context(|| format!("Invalid scenario: {}", path.display()))
}

/// Replay a scenario file and print the outcome of every step.
fn run(config: &SimConfig, args: RunArgs) -> Result<()> {
    let mut scenario = load_scenario(&args.scenario)?;
    if let Some(cycle_blocks) = args.cycle_blocks {
        scenario.cycle_blocks = Some(cycle_blocks);
    }

    let mut sim = Simulator::new(config, &scenario).context("Failed to create simulator")?;
    let report = sim.run(&scenario).context("Scenario aborted")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.passed() {
        bail!(
            "scenario failed: {} mismatches, conservation {}",
            report.mismatches,
            if report.conservation.is_balanced() { "ok" } else { "BROKEN" }
        );
    }
    Ok(())
}

fn print_report(report: &SimReport) {
    println!("=== SCENARIO ({} blocks/cycle) ===", report.cycle_blocks);
    for outcome in &report.outcomes {
        let result = match (&outcome.amount, &outcome.error) {
            (Some(amount), _) => amount.to_string(),
            (None, Some(err)) => format!("rejected: {err}"),
            (None, None) => "-".to_string(),
        };
        let flag = match outcome.mismatch {
            Some(expected) => format!("  (expected {expected})"),
            None => String::new(),
        };
        println!("  #{:<8} {:<48} {}{}", outcome.block, outcome.action, result, flag);
    }

    println!("\nSenders (withdrawable):");
    for (label, amount) in &report.senders {
        println!("  {label:<24} {amount}");
    }
    println!("Receivers (collectable):");
    for (label, amount) in &report.receivers {
        println!("  {label:<24} {amount}");
    }

    let c = &report.conservation;
    println!("\nConservation (settled at block {}):", c.settled_at);
    println!("  topped up    {}", c.topped_up);
    println!("  withdrawn    {}", c.withdrawn);
    println!("  collected    {}", c.collected);
    println!("  unsent       {}", c.unsent);
    println!("  outstanding  {}", c.outstanding);
    println!("  balanced     {}", c.is_balanced());
}

/// Validate a scenario file.
fn check(args: CheckArgs) -> Result<()> {
    let scenario = load_scenario(&args.scenario)?;
    let queries = scenario.steps.iter().filter(|s| s.action.is_query()).count();
    println!(
        "{}: {} steps ({} queries), last block {}",
        args.scenario.display(),
        scenario.steps.len(),
        queries,
        scenario.last_block()
    );
    Ok(())
}

fn example() -> Result<()> {
    println!("{}", Scenario::example().to_json_pretty()?);
    Ok(())
}

/// Generate and run a random scenario; fail if funds are not conserved.
fn fuzz(config: &SimConfig, args: FuzzArgs) -> Result<()> {
    let scenario = Scenario::random(args.seed, args.senders, args.receivers, args.steps);
    let mut sim = Simulator::new(config, &scenario)?;
    let report = sim.run(&scenario)?;
    let c = &report.conservation;
    println!(
        "seed {} | {} steps | {} rejected | topped up {} | balanced {}",
        args.seed,
        report.outcomes.len(),
        report.rejected,
        c.topped_up,
        c.is_balanced()
    );
    if !c.is_balanced() {
        bail!("conservation violated for seed {}: {c:?}", args.seed);
    }
    Ok(())
}

/// Default projection block for `query`.
fn query_block(scenario: &Scenario, latest_block: u64) -> u64 {
    scenario.last_block().max(latest_block)
}

/// Replay a scenario, then project the requested balances at `--block`.
fn query(config: &SimConfig, args: QueryArgs) -> Result<()> {
    let scenario = load_scenario(&args.scenario)?;
    let mut sim = Simulator::new(config, &scenario)?;
    sim.run(&scenario)?;

    let pool = sim.pool();
    let block = args.block.unwrap_or(query_block(&scenario, pool.latest_block()));
    for label in &args.sender {
        let id = trickle_sim::scenario::account(label);
        let amount = pool
            .withdrawable(&id, block)
            .with_context(|| format!("withdrawable({label}) at block {block}"))?;
        println!("sender   {label:<24} withdrawable {amount}");
    }
    for label in &args.receiver {
        let id = trickle_sim::scenario::account(label);
        let amount = pool
            .collectable(&id, block)
            .with_context(|| format!("collectable({label}) at block {block}"))?;
        println!("receiver {label:<24} collectable  {amount}");
    }
    Ok(())
}
