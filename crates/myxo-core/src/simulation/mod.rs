pub mod metrics;
pub mod tick;
#[cfg(test)]
mod tests;

pub use metrics::*;

use crate::agent::{Agent, AgentState};
use crate::config::{SimConfig, SimConfigError};
use crate::field::{FieldKind, GridField};
use crate::map::MapLayout;
use crate::swarm::{SnapshotError, Swarm, SwarmError, AGENT_RECORD_LEN};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::{error::Error, fmt};

/// Owner of every piece of simulation state: the five fields, the swarm, the
/// tunable diffusion/decay parameters and the delivery counter.
///
/// Field views (`pickup_view` and friends) borrow from the simulation, so any
/// call that can replace a field or reallocate the swarm (`randomize_map`,
/// `resize_agents`) ends their lifetime.
pub struct Simulation {
    pub(crate) config: SimConfig,
    pub(crate) map: MapLayout,
    pub(crate) vein: GridField,
    pub(crate) repulsion: GridField,
    pub(crate) swarm: Swarm,
    pub(crate) rng: ChaCha12Rng,
    pub(crate) diffusion: f32,
    pub(crate) decay: f32,
    pub(crate) delivered_count: u64,
    pub(crate) step_index: usize,
    pub(crate) deliveries_last_step: u32,
    pub(crate) transitions_last_step: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationInitError {
    Config(SimConfigError),
    Swarm(SwarmError),
}

impl fmt::Display for SimulationInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationInitError::Config(e) => write!(f, "{}", e),
            SimulationInitError::Swarm(e) => write!(f, "{}", e),
        }
    }
}

impl From<SimConfigError> for SimulationInitError {
    fn from(err: SimConfigError) -> Self {
        SimulationInitError::Config(err)
    }
}

impl From<SwarmError> for SimulationInitError {
    fn from(err: SwarmError) -> Self {
        SimulationInitError::Swarm(err)
    }
}

impl Error for SimulationInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SimulationInitError::Config(e) => Some(e),
            SimulationInitError::Swarm(e) => Some(e),
        }
    }
}

/// Clamp a tunable into [0, max]. NaN leaves the current value in place.
fn sanitize_parameter(name: &str, value: f32, current: f32, max: f32) -> f32 {
    if value.is_nan() {
        tracing::warn!(parameter = name, "ignoring NaN parameter value");
        return current;
    }
    let clamped = value.clamp(0.0, max);
    if clamped != value {
        tracing::debug!(parameter = name, value, clamped, "parameter clamped");
    }
    clamped
}

impl Simulation {
    /// Default configuration with a freshly drawn seed.
    pub fn new(agent_count: usize) -> Self {
        let config = SimConfig {
            seed: rand::rng().random(),
            ..SimConfig::default()
        };
        Self::with_config(config, agent_count)
    }

    pub fn with_config(config: SimConfig, agent_count: usize) -> Self {
        Self::try_with_config(config, agent_count).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_with_config(
        config: SimConfig,
        agent_count: usize,
    ) -> Result<Self, SimulationInitError> {
        config.validate()?;
        let mut rng = ChaCha12Rng::seed_from_u64(config.seed);
        let map = MapLayout::generate(&config, &mut rng);
        let size = config.grid_size;
        let diffusion = sanitize_parameter("diffusion", config.diffusion, 0.0, SimConfig::MAX_DIFFUSION);
        let decay = sanitize_parameter("decay", config.decay, 0.0, SimConfig::MAX_DECAY);

        let mut sim = Self {
            map,
            vein: GridField::new(size),
            repulsion: GridField::new(size),
            swarm: Swarm::new(),
            rng,
            diffusion,
            decay,
            delivered_count: 0,
            step_index: 0,
            deliveries_last_step: 0,
            transitions_last_step: 0,
            config,
        };
        sim.try_resize_agents(agent_count)?;
        tracing::info!(
            seed = sim.config.seed,
            grid_size = size,
            agents = sim.swarm.len(),
            "simulation constructed"
        );
        Ok(sim)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn map(&self) -> &MapLayout {
        &self.map
    }

    pub fn grid_size(&self) -> usize {
        self.config.grid_size
    }

    pub fn diffusion(&self) -> f32 {
        self.diffusion
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    /// Takes effect on the next tick. Clamped to [0, `SimConfig::MAX_DIFFUSION`].
    pub fn set_diffusion(&mut self, value: f32) {
        self.diffusion =
            sanitize_parameter("diffusion", value, self.diffusion, SimConfig::MAX_DIFFUSION);
    }

    /// Takes effect on the next tick. Clamped to [0, `SimConfig::MAX_DECAY`].
    pub fn set_decay(&mut self, value: f32) {
        self.decay = sanitize_parameter("decay", value, self.decay, SimConfig::MAX_DECAY);
    }

    /// Replace the obstacle layout and demand fields and clear the vein and
    /// repulsion fields. Agents keep their state and heading; any agent left on
    /// an obstacle or in a pocket cut off from the hotspots is moved to the
    /// nearest open cell. The delivery counter is preserved.
    pub fn randomize_map(&mut self) {
        self.map = MapLayout::generate(&self.config, &mut self.rng);
        self.vein.clear();
        self.repulsion.clear();

        let mut displaced = 0usize;
        for agent in self.swarm.agents_mut() {
            agent.route.clear();
            agent.clamp_position(self.config.grid_size);
            let cx = agent.position[0].floor() as usize;
            let cy = agent.position[1].floor() as usize;
            if self.map.is_open(cx, cy) {
                continue;
            }
            let (nx, ny) = self.map.nearest_open_cell(cx, cy);
            agent.position = [nx as f64 + 0.5, ny as f64 + 0.5];
            displaced += 1;
        }
        tracing::info!(
            open_cells = self.map.open_cell_count(),
            fallback = self.map.used_fallback,
            displaced,
            "map randomized"
        );
    }

    /// Grow or shrink the swarm, clamping `count` to `SimConfig::MAX_AGENTS`.
    /// Panics if storage for new agents cannot be reserved.
    pub fn resize_agents(&mut self, count: usize) {
        self.try_resize_agents(count).unwrap_or_else(|e| panic!("{e}"));
    }

    /// Returns the resulting agent count.
    pub fn try_resize_agents(&mut self, count: usize) -> Result<usize, SwarmError> {
        let target = count.min(SimConfig::MAX_AGENTS);
        if target != count {
            tracing::warn!(requested = count, clamped = target, "agent count clamped");
        }
        let previous = self.swarm.len();
        let map = &self.map;
        let config = &self.config;
        let rng = &mut self.rng;
        self.swarm
            .try_resize_with(target, |id| Agent::spawn(id, map, config, rng))?;
        if previous != target {
            tracing::debug!(previous, current = target, "swarm resized");
        }
        Ok(target)
    }

    pub fn agents(&self) -> &[Agent] {
        self.swarm.agents()
    }

    pub fn agent_count(&self) -> usize {
        self.swarm.len()
    }

    pub fn state_counts(&self) -> [usize; 4] {
        self.swarm.state_counts()
    }

    pub fn count_in(&self, state: AgentState) -> usize {
        self.swarm.count_in(state)
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered_count
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn deliveries_last_step(&self) -> u32 {
        self.deliveries_last_step
    }

    pub fn transitions_last_step(&self) -> usize {
        self.transitions_last_step
    }

    pub fn field(&self, kind: FieldKind) -> &GridField {
        match kind {
            FieldKind::Pickup => &self.map.pickup,
            FieldKind::Delivery => &self.map.delivery,
            FieldKind::Repulsion => &self.repulsion,
            FieldKind::Vein => &self.vein,
            FieldKind::Obstacles => &self.map.obstacles,
        }
    }

    /// Row-major N×N view of a field, valid until the next mutating call.
    pub fn field_view(&self, kind: FieldKind) -> &[f32] {
        self.field(kind).data()
    }

    pub fn pickup_view(&self) -> &[f32] {
        self.field_view(FieldKind::Pickup)
    }

    pub fn delivery_view(&self) -> &[f32] {
        self.field_view(FieldKind::Delivery)
    }

    pub fn repulsion_view(&self) -> &[f32] {
        self.field_view(FieldKind::Repulsion)
    }

    pub fn vein_view(&self) -> &[f32] {
        self.field_view(FieldKind::Vein)
    }

    pub fn obstacles_view(&self) -> &[f32] {
        self.field_view(FieldKind::Obstacles)
    }

    /// Minimum buffer length accepted by `write_agents_flat`.
    pub fn agents_flat_len(&self) -> usize {
        self.swarm.len() * AGENT_RECORD_LEN
    }

    /// Copy `[x, y, state_code, heading]` per agent into `out`.
    pub fn try_write_agents_flat(&self, out: &mut [f32]) -> Result<usize, SnapshotError> {
        self.swarm.write_flat(out)
    }

    /// Like `try_write_agents_flat`, but an undersized buffer is a caller bug
    /// and panics.
    pub fn write_agents_flat(&self, out: &mut [f32]) -> usize {
        self.try_write_agents_flat(out)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Allocating convenience over `write_agents_flat`.
    pub fn agents_flat(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.agents_flat_len()];
        self.write_agents_flat(&mut out);
        out
    }
}
