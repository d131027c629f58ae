//! QAMT simulator CLI
//!
//! Generates task sets and runs simulations over them, printing per-task
//! timing, aggregate metrics and device utilisation.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

use qamts::annealer::{ChimeraAnnealer, DEFAULT_PROGRAM_TIME};
use qamts::metrics::{resource_utilisation, TaskTiming};
use qamts::scheduler::{
    DynamicScheduler, NaiveScheduler, NextFitPreemptionScheduler, Scheduler, StaticScheduler,
    ToyScheduler,
};
use qamts::simulator::Simulator;
use qamts::task::Task;
use qamts::taskgen::{default_sample_range, random_tasks};

#[derive(Parser)]
#[command(name = "qamts")]
#[command(about = "Discrete-event simulator for quantum-annealing multi-task scheduling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random task set as JSON
    Generate {
        /// Number of tasks
        #[arg(short, long, default_value_t = 4)]
        num: usize,
        /// Random seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Shared anneal time per sample
        #[arg(long, default_value_t = 2000)]
        anneal_time: u64,
        /// Maximum embedding rows
        #[arg(long, default_value_t = 12)]
        rows: usize,
        /// Maximum embedding columns
        #[arg(long, default_value_t = 12)]
        cols: usize,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a simulation over a task file
    Run {
        /// Task set JSON file
        #[arg(short, long)]
        tasks: PathBuf,
        /// Scheduling policy
        #[arg(short, long, value_enum, default_value_t = SchedulerArg::Toy)]
        scheduler: SchedulerArg,
        /// Processor grid rows
        #[arg(long, default_value_t = 16)]
        grid_rows: usize,
        /// Processor grid columns
        #[arg(long, default_value_t = 16)]
        grid_cols: usize,
        /// Per-instruction programming latency
        #[arg(long, default_value_t = DEFAULT_PROGRAM_TIME)]
        program_time: u64,
        /// Per-batch sample cap for the dynamic scheduler
        #[arg(long)]
        n_samples: Option<u32>,
        /// Seed for the dynamic scheduler's random source
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Override every arrival to time zero
        #[arg(long)]
        static_arrivals: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SchedulerArg {
    Toy,
    Static,
    Naive,
    NextFitPreemption,
    Dynamic,
}

impl std::fmt::Display for SchedulerArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SchedulerArg::Toy => "toy",
                SchedulerArg::Static => "static",
                SchedulerArg::Naive => "naive",
                SchedulerArg::NextFitPreemption => "next-fit-preemption",
                SchedulerArg::Dynamic => "dynamic",
            }
        )
    }
}

fn build_scheduler(arg: SchedulerArg, n_samples: Option<u32>, seed: u64) -> Box<dyn Scheduler> {
    match arg {
        SchedulerArg::Toy => Box::new(ToyScheduler::new()),
        SchedulerArg::Static => Box::new(StaticScheduler::new()),
        SchedulerArg::Naive => Box::new(NaiveScheduler::new()),
        SchedulerArg::NextFitPreemption => Box::new(NextFitPreemptionScheduler::new()),
        SchedulerArg::Dynamic => {
            let cap = n_samples.or(Some(DynamicScheduler::DEFAULT_N_SAMPLES));
            Box::new(DynamicScheduler::new(cap, ChaCha8Rng::seed_from_u64(seed)))
        }
    }
}

fn generate(
    num: usize,
    seed: u64,
    anneal_time: u64,
    rows: usize,
    cols: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let specs = random_tasks(num, (rows, cols), anneal_time, &default_sample_range(), &mut rng);
    let json = serde_json::to_string_pretty(&specs)?;
    match output {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("wrote {} tasks to {}", num, path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run(
    tasks: PathBuf,
    scheduler: SchedulerArg,
    grid_rows: usize,
    grid_cols: usize,
    program_time: u64,
    n_samples: Option<u32>,
    seed: u64,
    static_arrivals: bool,
) -> Result<()> {
    let json = fs::read_to_string(&tasks).with_context(|| format!("reading {}", tasks.display()))?;
    let task_refs = Task::load_slice(&json).context("loading task set")?;
    let count = task_refs.len();

    let annealer = Box::new(ChimeraAnnealer::new(grid_rows, grid_cols, program_time));
    let scheduler = build_scheduler(scheduler, n_samples, seed);

    let mut sim = Simulator::with_options(task_refs, annealer, scheduler, static_arrivals);
    sim.run().context("simulation failed")?;

    println!(
        "{count} tasks, {} instructions, finished at t={}",
        sim.completed_instructions().len(),
        sim.time()
    );
    println!();
    println!("{:<12} {:>12} {:>12} {:>12}", "task", "arrive", "start", "end");
    let timing = TaskTiming::new(sim.completed_tasks());
    for row in timing.timing() {
        let fmt = |v: Option<u64>| v.map_or("-".to_string(), |x| x.to_string());
        println!(
            "{:<12} {:>12} {:>12} {:>12}",
            row.name,
            row.arrival,
            fmt(row.start),
            fmt(row.end)
        );
    }

    println!();
    let fmt_f = |v: Option<f64>| v.map_or("-".to_string(), |x| format!("{x:.1}"));
    let fmt_u = |v: Option<u64>| v.map_or("-".to_string(), |x| x.to_string());
    println!("ACET  {:>14}    WCET  {:>14}", fmt_f(timing.acet()), fmt_u(timing.wcet()));
    println!("ACRT  {:>14}    WCRT  {:>14}", fmt_f(timing.acrt()), fmt_u(timing.wcrt()));
    println!("ACIWT {:>14}    WCIWT {:>14}", fmt_f(timing.aciwt()), fmt_u(timing.wciwt()));
    if let Some(utilisation) = resource_utilisation(sim.completed_instructions()) {
        println!("utilisation {:.4}", utilisation);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate {
            num,
            seed,
            anneal_time,
            rows,
            cols,
            output,
        } => generate(num, seed, anneal_time, rows, cols, output),
        Commands::Run {
            tasks,
            scheduler,
            grid_rows,
            grid_cols,
            program_time,
            n_samples,
            seed,
            static_arrivals,
        } => run(
            tasks,
            scheduler,
            grid_rows,
            grid_cols,
            program_time,
            n_samples,
            seed,
            static_arrivals,
        ),
    }
}
