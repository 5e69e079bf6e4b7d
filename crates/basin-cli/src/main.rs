mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use basin_core::constants::SHORT_HASH_LEN;
use basin_core::{
    AnnealOptions, AnnealingExplorer, LatticeEngine, RandomWalk, RecoveryExperiment,
    RecoverySummary, TemperatureSchedule, WalkMode, short_hash, stability_radius,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::config::Settings;

#[derive(Parser)]
#[command(
    name = "basin",
    about = "Reversible permutation lattice: annealing and basin recovery experiments"
)]
struct Cli {
    /// TOML settings file ([schedule], [energy], [recovery] tables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Anneal one lattice and report the trace summary
    Anneal {
        /// Lattice edge length (odd, >= 3)
        #[arg(short, long)]
        n: Option<u32>,

        /// Number of proposals (defaults to the schedule window)
        #[arg(long)]
        steps: Option<usize>,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Start from a grid shuffled with this seed instead of the identity
        #[arg(long)]
        init_seed: Option<u64>,

        /// Stop as soon as this state hash is reached
        #[arg(long)]
        stop_hash: Option<String>,
    },

    /// Anneal, perturb and re-anneal; report per-trial recovery
    Recover {
        #[arg(short, long)]
        n: Option<u32>,

        #[arg(long)]
        trials: Option<usize>,

        #[arg(long)]
        perturb_steps: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        init_seed: Option<u64>,
    },

    /// Run the recovery protocol over several perturbation sizes
    Sweep {
        #[arg(short, long)]
        n: Option<u32>,

        #[arg(long)]
        trials: Option<usize>,

        /// Comma-separated perturbation sizes
        #[arg(long, value_delimiter = ',')]
        values: Option<Vec<usize>>,

        /// Minimum recovery rate for the stability radius
        #[arg(long)]
        threshold: Option<f64>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Energy-agnostic random walk from the identity state
    Walk {
        #[arg(short, long)]
        n: Option<u32>,

        #[arg(long, value_enum, default_value_t = WalkArg::Global)]
        mode: WalkArg,

        #[arg(long, default_value_t = 1000)]
        steps: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Print the state hash of the identity, a shuffled grid, or a grid file
    Hash {
        #[arg(short, long)]
        n: Option<u32>,

        /// Shuffle the grid with this seed first
        #[arg(long)]
        seed: Option<u64>,

        /// JSON array of N³ tokens
        #[arg(long, conflicts_with = "seed")]
        grid: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum WalkArg {
    Global,
    Mixed,
}

impl From<WalkArg> for WalkMode {
    fn from(arg: WalkArg) -> Self {
        match arg {
            WalkArg::Global => WalkMode::Global,
            WalkArg::Mixed => WalkMode::Mixed,
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = Settings::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Anneal {
            n,
            steps,
            seed,
            init_seed,
            stop_hash,
        } => cmd_anneal(
            &cli,
            &settings,
            n.unwrap_or(settings.recovery.n),
            steps.unwrap_or(settings.schedule.anneal_steps),
            *seed,
            *init_seed,
            stop_hash.clone(),
        ),
        Commands::Recover {
            n,
            trials,
            perturb_steps,
            seed,
            init_seed,
        } => {
            let mut settings = settings.clone();
            let r = &mut settings.recovery;
            r.n = n.unwrap_or(r.n);
            r.trials = trials.unwrap_or(r.trials);
            r.perturb_steps = perturb_steps.unwrap_or(r.perturb_steps);
            r.seed = seed.unwrap_or(r.seed);
            r.init_seed = init_seed.or(r.init_seed);
            cmd_recover(&cli, &settings)
        }
        Commands::Sweep {
            n,
            trials,
            values,
            threshold,
            seed,
        } => {
            let mut settings = settings.clone();
            let r = &mut settings.recovery;
            r.n = n.unwrap_or(r.n);
            r.trials = trials.unwrap_or(r.trials);
            r.seed = seed.unwrap_or(r.seed);
            r.threshold = threshold.unwrap_or(r.threshold);
            if let Some(values) = values {
                r.sweep = values.clone();
            }
            cmd_sweep(&cli, &settings)
        }
        Commands::Walk {
            n,
            mode,
            steps,
            seed,
        } => cmd_walk(
            &cli,
            n.unwrap_or(settings.recovery.n),
            (*mode).into(),
            *steps,
            *seed,
        ),
        Commands::Hash { n, seed, grid } => cmd_hash(
            n.unwrap_or(settings.recovery.n),
            *seed,
            grid.as_deref(),
        ),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn cmd_anneal(
    cli: &Cli,
    settings: &Settings,
    n: u32,
    steps: usize,
    seed: u64,
    init_seed: Option<u64>,
    stop_hash: Option<String>,
) -> Result<()> {
    let mut engine = LatticeEngine::new(n).context("failed to build lattice")?;
    if let Some(init_seed) = init_seed {
        engine.randomize(init_seed);
    }
    // Cool over the requested run length, not the configured window.
    let schedule = if steps == 0 {
        settings.schedule.build()
    } else {
        TemperatureSchedule::exponential(settings.schedule.t0, settings.schedule.tmin, steps)
    }
    .context("invalid schedule")?;
    let options = AnnealOptions {
        stop_hash,
        max_radius: settings.recovery.max_radius,
        ..AnnealOptions::new(steps, seed)
    };
    let trace = AnnealingExplorer::run(&mut engine, &settings.energy, &schedule, &options)
        .context("annealing failed")?;

    if cli.json {
        return print_json(&trace);
    }
    println!("N:               {n}");
    println!("steps:           {}/{}", trace.steps_run, trace.steps_requested);
    println!("initial energy:  {:.3}", trace.initial_energy);
    println!("final energy:    {:.3}", trace.final_energy);
    println!("best energy:     {:.3} (step {})", trace.best_energy, trace.best_step);
    println!(
        "accepted:        {}/{} ({:.1}%)",
        trace.accepted,
        trace.proposed,
        trace.acceptance_rate * 100.0
    );
    println!("unique states:   {}", trace.unique_state_count);
    if let Some(step) = trace.stopped_step {
        println!("stopped at:      step {step}");
    }
    println!("final hash:      {}", trace.final_hash);
    Ok(())
}

#[derive(Serialize)]
struct RecoverOutput<'a> {
    records: &'a [basin_core::RecoveryRecord],
    summary: RecoverySummary,
}

fn cmd_recover(cli: &Cli, settings: &Settings) -> Result<()> {
    let config = settings.recovery_config();
    let records = RecoveryExperiment::run(&config).context("recovery experiment failed")?;
    let summary = RecoverySummary::from_records(&records);

    if cli.json {
        return print_json(&RecoverOutput {
            records: &records,
            summary,
        });
    }
    for r in &records {
        let outcome = match r.recovery_time {
            Some(t) => format!("recovered in {t}"),
            None => format!("landed in {}", short_hash(&r.final_hash, SHORT_HASH_LEN)),
        };
        println!(
            "trial {:>3}  basin {}  E={:.3}  perturbed E={:.3}  overshoot {:.3}  {outcome}",
            r.trial,
            short_hash(&r.basin_hash, SHORT_HASH_LEN),
            r.basin_energy,
            r.perturbed_energy,
            r.energy_overshoot,
        );
    }
    println!(
        "recovered {}/{} ({:.1}%)",
        summary.recovered,
        summary.trials,
        summary.recovery_rate * 100.0
    );
    if let Some(t) = summary.recovery_time {
        println!("recovery time: mean={:.1}, median={:.1}", t.mean, t.median);
    }
    Ok(())
}

#[derive(Serialize)]
struct SweepRow {
    perturb_steps: usize,
    recovery_rate: f64,
    summary: RecoverySummary,
}

#[derive(Serialize)]
struct SweepOutput {
    threshold: f64,
    stability_radius: Option<usize>,
    points: Vec<SweepRow>,
}

fn cmd_sweep(cli: &Cli, settings: &Settings) -> Result<()> {
    let threshold = settings.recovery.threshold;
    if !(0.0..=1.0).contains(&threshold) {
        bail!("threshold must be within [0, 1], got {threshold}");
    }
    if settings.recovery.sweep.is_empty() {
        bail!("no perturbation sizes to sweep");
    }
    let points = RecoveryExperiment::sweep(&settings.recovery_config(), &settings.recovery.sweep)
        .context("sweep failed")?;
    let radius = stability_radius(&points, threshold);

    let output = SweepOutput {
        threshold,
        stability_radius: radius,
        points: points
            .iter()
            .map(|p| SweepRow {
                perturb_steps: p.perturb_steps,
                recovery_rate: p.recovery_rate,
                summary: RecoverySummary::from_records(&p.records),
            })
            .collect(),
    };
    if cli.json {
        return print_json(&output);
    }
    for row in &output.points {
        println!(
            "perturb {:>4}  recovery {:>5.1}%",
            row.perturb_steps,
            row.recovery_rate * 100.0
        );
    }
    match radius {
        Some(r) => println!("stability radius: {r} (threshold {threshold})"),
        None => println!("stability radius: none (threshold {threshold})"),
    }
    Ok(())
}

fn cmd_walk(cli: &Cli, n: u32, mode: WalkMode, steps: usize, seed: u64) -> Result<()> {
    let mut engine = LatticeEngine::new(n).context("failed to build lattice")?;
    let summary =
        RandomWalk::run(&mut engine, mode, steps, seed).context("random walk failed")?;
    if cli.json {
        return print_json(&summary);
    }
    println!("steps:         {}", summary.steps);
    println!(
        "moves:         {} global, {} local",
        summary.global_moves, summary.local_moves
    );
    println!("unique states: {}", summary.unique_states);
    match (summary.first_repeat_step, summary.cycle_length) {
        (Some(step), Some(len)) => println!("first repeat:  step {step} (cycle {len})"),
        _ => println!("first repeat:  none"),
    }
    println!("entropy:       {:.3} bits", summary.visit_entropy_bits);
    Ok(())
}

fn cmd_hash(n: u32, seed: Option<u64>, grid: Option<&Path>) -> Result<()> {
    let mut engine = LatticeEngine::new(n).context("failed to build lattice")?;
    if let Some(seed) = seed {
        engine.randomize(seed);
    }
    if let Some(path) = grid {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let tokens: Vec<u32> = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse grid {}", path.display()))?;
        engine.load_grid(&tokens).context("invalid grid")?;
    }
    println!("{}", engine.hash());
    Ok(())
}
