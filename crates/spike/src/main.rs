//! Command-line driver for the myxo routing substrate.
//!
//! Runs single experiments, parallel seed sweeps, and prints the default config.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use myxo_core::batch;
use myxo_core::{SimConfig, Simulation};

#[derive(Parser)]
#[command(name = "myxo")]
#[command(about = "Slime-mould style routing for automated guided vehicles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation and emit its summary as JSON.
    Run {
        /// Number of agents
        #[arg(short, long, default_value = "200")]
        agents: usize,
        /// Ticks to simulate
        #[arg(short, long, default_value = "5000")]
        steps: usize,
        /// Sample metrics every N ticks
        #[arg(long, default_value = "500")]
        sample_every: usize,
        /// Random seed (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,
        /// Diffusion coefficient (overrides the config file)
        #[arg(long)]
        diffusion: Option<f32>,
        /// Vein decay rate (overrides the config file)
        #[arg(long)]
        decay: Option<f32>,
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output file for the summary (JSON); stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run several seeds in parallel and report throughput per seed.
    Sweep {
        /// Number of agents
        #[arg(short, long, default_value = "200")]
        agents: usize,
        /// Ticks to simulate per seed
        #[arg(short, long, default_value = "5000")]
        steps: usize,
        /// Sample metrics every N ticks
        #[arg(long, default_value = "500")]
        sample_every: usize,
        /// Explicit seeds (comma-separated)
        #[arg(long, value_delimiter = ',')]
        seeds: Vec<u64>,
        /// Number of derived seeds when no explicit seeds are given
        #[arg(short, long, default_value = "8")]
        runs: usize,
        /// Seed used to derive per-run seeds
        #[arg(long, default_value = "42")]
        base_seed: u64,
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output file for all summaries (JSON array)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the default configuration as JSON.
    Config,
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => SimConfig::default(),
    };
    Ok(config)
}

fn write_json<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "summary written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn derive_seeds(base_seed: u64, runs: usize) -> Vec<u64> {
    let mut rng = ChaCha12Rng::seed_from_u64(base_seed);
    (0..runs).map(|_| rng.random()).collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            agents,
            steps,
            sample_every,
            seed,
            diffusion,
            decay,
            config,
            output,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if let Some(diffusion) = diffusion {
                config.diffusion = diffusion;
            }
            if let Some(decay) = decay {
                config.decay = decay;
            }
            let mut sim = Simulation::try_with_config(config, agents)?;
            let summary = sim.try_run_experiment(steps, sample_every)?;
            info!(
                seed = summary.seed,
                deliveries = summary.deliveries,
                throughput = summary.throughput_per_kilotick,
                "run finished"
            );
            write_json(&summary, output.as_deref())?;
        }

        Commands::Sweep {
            agents,
            steps,
            sample_every,
            seeds,
            runs,
            base_seed,
            config,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            let seeds = if seeds.is_empty() {
                derive_seeds(base_seed, runs)
            } else {
                seeds
            };
            if seeds.is_empty() {
                bail!("sweep needs at least one seed");
            }
            let summaries = batch::run_seeds(&config, agents, &seeds, steps, sample_every)?;
            for summary in &summaries {
                println!(
                    "seed={:<20} deliveries={:<6} per_1000_ticks={:.2}",
                    summary.seed, summary.deliveries, summary.throughput_per_kilotick
                );
            }
            let mean = summaries
                .iter()
                .map(|s| s.throughput_per_kilotick)
                .sum::<f64>()
                / summaries.len() as f64;
            println!("mean per_1000_ticks={mean:.2} over {} seeds", summaries.len());
            if let Some(path) = output {
                write_json(&summaries, Some(path.as_path()))?;
            }
        }

        Commands::Config => {
            write_json(&SimConfig::default(), None)?;
        }
    }

    Ok(())
}
