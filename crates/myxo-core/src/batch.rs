//! Independent runs over several seeds, one simulation per rayon task.

use crate::config::SimConfig;
use crate::simulation::{ExperimentError, RunSummary, Simulation, SimulationInitError};
use rayon::prelude::*;
use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    Init { seed: u64, source: SimulationInitError },
    Experiment { seed: u64, source: ExperimentError },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Init { seed, source } => write!(f, "seed {seed}: {source}"),
            BatchError::Experiment { seed, source } => write!(f, "seed {seed}: {source}"),
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BatchError::Init { source, .. } => Some(source),
            BatchError::Experiment { source, .. } => Some(source),
        }
    }
}

/// Run one experiment per seed in parallel. Summaries come back in the order
/// of `seeds`; the first failing seed aborts the batch.
pub fn run_seeds(
    config: &SimConfig,
    agent_count: usize,
    seeds: &[u64],
    steps: usize,
    sample_every: usize,
) -> Result<Vec<RunSummary>, BatchError> {
    tracing::info!(runs = seeds.len(), agent_count, steps, "starting seed sweep");
    seeds
        .par_iter()
        .map(|&seed| {
            let config = SimConfig {
                seed,
                ..config.clone()
            };
            let mut sim = Simulation::try_with_config(config, agent_count)
                .map_err(|source| BatchError::Init { seed, source })?;
            sim.try_run_experiment(steps, sample_every)
                .map_err(|source| BatchError::Experiment { seed, source })
        })
        .collect()
}
