use super::Simulation;
use crate::agent::AgentState;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

#[derive(Clone, Debug, Default)]
pub struct StepTimings {
    pub field_us: u64,
    pub agent_us: u64,
    pub total_us: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StepMetrics {
    pub step: usize,
    pub agent_count: usize,
    pub seek_pickup: usize,
    pub loading: usize,
    pub seek_delivery: usize,
    pub unloading: usize,
    pub deliveries: u32,
    pub delivered_total: u64,
    pub transitions: usize,
    pub vein_mass: f64,
    pub repulsion_mass: f64,
    /// Mean route length remembered by agents heading for delivery.
    pub mean_route_len: f32,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub seed: u64,
    pub steps: usize,
    pub sample_every: usize,
    pub agent_count: usize,
    /// Deliveries completed during this run.
    pub deliveries: u64,
    /// Delivered count of the simulation when the run ended.
    pub final_delivered_count: u64,
    /// Deliveries per 1000 ticks over the run.
    pub throughput_per_kilotick: f64,
    pub samples: Vec<StepMetrics>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentError {
    InvalidSampleEvery,
    TooManySteps { max: usize, actual: usize },
    TooManySamples { max: usize, actual: usize },
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentError::InvalidSampleEvery => write!(f, "sample_every must be positive"),
            ExperimentError::TooManySteps { max, actual } => {
                write!(f, "steps ({actual}) exceed supported maximum ({max})")
            }
            ExperimentError::TooManySamples { max, actual } => {
                write!(f, "sample count ({actual}) exceeds supported maximum ({max})")
            }
        }
    }
}

impl Error for ExperimentError {}

impl Simulation {
    pub const MAX_EXPERIMENT_STEPS: usize = 1_000_000;
    pub const MAX_EXPERIMENT_SAMPLES: usize = 50_000;

    pub(crate) fn collect_step_metrics(&self, step: usize) -> StepMetrics {
        let counts = self.state_counts();
        let seeking_delivery = counts[AgentState::SeekDelivery.code() as usize];
        let route_sum: usize = self
            .agents()
            .iter()
            .filter(|a| a.state == AgentState::SeekDelivery)
            .map(|a| a.route_len())
            .sum();

        StepMetrics {
            step,
            agent_count: self.agent_count(),
            seek_pickup: counts[0],
            loading: counts[1],
            seek_delivery: counts[2],
            unloading: counts[3],
            deliveries: self.deliveries_last_step,
            delivered_total: self.delivered_count,
            transitions: self.transitions_last_step,
            vein_mass: self.vein.total(),
            repulsion_mass: self.repulsion.total(),
            mean_route_len: route_sum as f32 / seeking_delivery.max(1) as f32,
        }
    }

    pub fn run_experiment(&mut self, steps: usize, sample_every: usize) -> RunSummary {
        self.try_run_experiment(steps, sample_every)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Run `steps` ticks, sampling metrics every `sample_every` ticks and on
    /// the final tick.
    pub fn try_run_experiment(
        &mut self,
        steps: usize,
        sample_every: usize,
    ) -> Result<RunSummary, ExperimentError> {
        if sample_every == 0 {
            return Err(ExperimentError::InvalidSampleEvery);
        }
        if steps > Self::MAX_EXPERIMENT_STEPS {
            return Err(ExperimentError::TooManySteps {
                max: Self::MAX_EXPERIMENT_STEPS,
                actual: steps,
            });
        }
        let estimated_samples = if steps == 0 {
            0
        } else {
            ((steps - 1) / sample_every) + 1
        };
        if estimated_samples > Self::MAX_EXPERIMENT_SAMPLES {
            return Err(ExperimentError::TooManySamples {
                max: Self::MAX_EXPERIMENT_SAMPLES,
                actual: estimated_samples,
            });
        }

        let delivered_before = self.delivered_count;
        let mut samples = Vec::with_capacity(estimated_samples);
        for step in 1..=steps {
            self.update();
            if step % sample_every == 0 || step == steps {
                samples.push(self.collect_step_metrics(step));
            }
        }
        let deliveries = self.delivered_count - delivered_before;
        let throughput_per_kilotick = if steps == 0 {
            0.0
        } else {
            deliveries as f64 * 1000.0 / steps as f64
        };
        tracing::debug!(steps, deliveries, throughput_per_kilotick, "experiment finished");

        Ok(RunSummary {
            schema_version: 1,
            seed: self.config.seed,
            steps,
            sample_every,
            agent_count: self.agent_count(),
            deliveries,
            final_delivered_count: self.delivered_count,
            throughput_per_kilotick,
            samples,
        })
    }
}
