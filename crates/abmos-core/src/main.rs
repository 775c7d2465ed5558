//! ABMOS command line runner
//!
//! Builds a model from a TOML config (or defaults), runs it to completion and
//! saves the final layers, snapshot and run summary.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use abmos_core::output::{generate_snapshot, write_snapshot_to_dir, StatsCollector};
use abmos_core::{Config, ModelBuilder, Result, SimulationClock};

const DEFAULT_SAVEPATH: &str = "saved_models";

/// Command line arguments for a model run
#[derive(Parser, Debug)]
#[command(name = "abmos")]
#[command(version, about = "Multi-layer social opinion dynamics simulator")]
struct Args {
    /// Random seed; overrides the config
    seed: Option<u64>,

    /// Directory for the saved model and snapshots
    savepath: Option<PathBuf>,

    /// Model configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of iterations; overrides the config
    #[arg(long)]
    iterations: Option<u64>,

    /// Population size; overrides the config
    #[arg(long)]
    agents: Option<usize>,

    /// Do not save the final model after the run
    #[arg(long)]
    no_save: bool,

    /// Verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Minimal output
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize logging. `RUST_LOG` overrides the level picked from the flags.
fn init_logging(args: &Args) {
    let level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(iterations) = args.iterations {
        config.simulation.max_iterations = iterations;
    }
    if let Some(count) = args.agents {
        config.agents.count = count;
    }
    Ok(config)
}

/// Writes every layer, the final snapshot, the run summary and the
/// per-iteration statistics.
fn save_model(clock: &SimulationClock, stats: &StatsCollector, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    for layer in clock.layers().iter() {
        layer.save(dir.join(format!("{}.json", layer.name())))?;
    }
    let snapshot = generate_snapshot(&clock.view(), "final", "simulation_end");
    write_snapshot_to_dir(&snapshot, dir)?;
    fs::write(dir.join("summary.json"), clock.summary().to_json()?)?;
    stats.write_json(&dir.join("stats.json"))?;
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    tracing::info!(
        seed = config.simulation.seed,
        iterations = config.simulation.max_iterations,
        agents = config.agents.count,
        "ABMOS {}",
        env!("CARGO_PKG_VERSION")
    );

    let dir = args
        .savepath
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVEPATH));
    let mut builder = ModelBuilder::new(config)
        .verbose(args.verbose)
        .with_output_dir(&dir);
    if let Some(base) = args.config.as_deref().and_then(Path::parent) {
        builder = builder.with_base_dir(base);
    }
    let stats = Rc::new(RefCell::new(StatsCollector::new()));
    let mut clock = builder.build()?.with_observer(Rc::clone(&stats));

    let summary = clock.run()?;
    tracing::info!(
        run_id = %summary.run_id,
        finished = summary.finished,
        peak_radicalised = stats.borrow().peak_radicalised(),
        drift = stats.borrow().mean_opinion_drift(),
        "run complete"
    );
    if args.no_save {
        return Ok(());
    }

    save_model(&clock, &stats.borrow(), &dir)?;
    tracing::info!(path = %dir.display(), "saved model");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
