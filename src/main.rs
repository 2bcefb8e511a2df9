use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crossover::{
    engine::EngineBuilder,
    scenario::{Scenario, ScenarioLoader},
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Border demography simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a scenario headless and print the final statistics
    Run(RunArgs),
    /// Run a scenario behind the read-only observer API
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct ScenarioArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/baseline.yaml")]
    scenario: PathBuf,

    /// Override the number of frames (uses scenario default when omitted)
    #[arg(long)]
    steps: Option<u64>,

    /// Override the scenario seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override snapshot interval in steps (0 disables snapshots)
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Pace frames to wall-clock time
    #[arg(long)]
    realtime: bool,
}

struct Prepared {
    scenario: Scenario,
    steps: u64,
    snapshot_dir: PathBuf,
}

fn prepare(args: &ScenarioArgs) -> Result<Prepared> {
    let loader = ScenarioLoader::new(".");
    let mut scenario = loader.load(&args.scenario)?;
    if let Some(seed) = args.seed {
        scenario.seed = seed;
    }
    if let Some(interval) = args.snapshot_interval {
        scenario.snapshot_interval_steps = interval;
    }
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| scenario.logging.level.clone());
    init_tracing(&level);

    Ok(Prepared {
        steps: scenario.steps(args.steps),
        snapshot_dir: args
            .snapshot_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("snapshots")),
        scenario,
    })
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(true)
        .init();
}

fn run(args: RunArgs) -> Result<()> {
    let Prepared {
        scenario,
        steps,
        snapshot_dir,
    } = prepare(&args.scenario)?;

    let mut engine = EngineBuilder::from_scenario(&scenario)
        .with_snapshot_dir(snapshot_dir)
        .build();
    engine.run_with_hook(steps, |stats, _| {
        info!(
            years = stats.years_passed,
            inside = stats.total_inside,
            percent_native = stats.percent_native,
            "stats"
        );
    })?;

    let stats = engine.current_stats();
    println!(
        "Scenario '{}' completed after {} steps ({:.1} simulated years).",
        scenario.name, steps, stats.elapsed_years
    );
    match stats.minority_year {
        Some(year) => println!("Natives became a minority in year {year}."),
        None => println!("Natives never became a minority."),
    }
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn serve(args: ServeArgs) -> Result<()> {
    let Prepared {
        scenario,
        steps,
        snapshot_dir,
    } = prepare(&args.scenario)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(web::run(WebServerConfig {
        scenario,
        frames: steps,
        snapshot_dir,
        host: args.host,
        port: args.port,
        realtime: args.realtime,
    }))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
        Command::Serve(args) => serve(args),
    }
}
