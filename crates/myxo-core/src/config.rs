use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed for reproducible simulation runs.
    pub seed: u64,
    /// Width/height of the square grid in cells. Fixed for the lifetime of a simulation.
    pub grid_size: usize,
    /// Initial diffusion coefficient for the vein and repulsion fields.
    pub diffusion: f32,
    /// Initial per-tick decay rate of the vein field.
    pub decay: f32,
    /// Per-tick decay rate of the repulsion field.
    pub repulsion_decay: f32,
    /// Distance (cells) from the agent to each of its three sensors.
    pub sensor_distance: f64,
    /// Angular offset (radians) of the side sensors.
    pub sensor_angle: f64,
    /// Maximum steering turn per tick (radians).
    pub turn_rate: f64,
    /// Half-width of the uniform heading jitter applied every moving tick.
    pub turn_jitter: f64,
    /// Half-width of the random turn taken when the centre sensor is the worst.
    pub escape_turn: f64,
    /// Minimum step length per tick (cells).
    pub speed_min: f64,
    /// Random extra step length drawn once per agent.
    pub speed_spread: f64,
    /// Weight of the vein (trail) field in sensor attractiveness.
    pub vein_weight: f32,
    /// Weight of the repulsion field in sensor attractiveness.
    pub repulsion_weight: f32,
    /// Penalty applied to sensors that land on obstacles or off-grid.
    pub obstacle_penalty: f32,
    /// Vein deposit per moving tick.
    pub trail_deposit: f32,
    /// Repulsion deposit per moving tick.
    pub repulsion_deposit: f32,
    /// Repulsion deposit per dwelling (loading/unloading) tick.
    pub dwell_repulsion_deposit: f32,
    /// Vein deposit per remembered position when a delivery is reached.
    pub path_reinforcement: f32,
    /// Number of positions remembered while seeking a delivery zone.
    pub path_memory: usize,
    /// Pickup field value above which an agent starts loading.
    pub pickup_threshold: f32,
    /// Delivery field value above which an agent starts unloading.
    pub delivery_threshold: f32,
    /// Ticks spent in the loading state.
    pub load_ticks: u32,
    /// Ticks spent in the unloading state.
    pub unload_ticks: u32,
    /// Number of pickup hotspots placed per map.
    pub pickup_hotspots: usize,
    /// Number of delivery hotspots placed per map.
    pub delivery_hotspots: usize,
    /// Distance (cells) over which a demand bump falls off by a factor of e.
    pub hotspot_falloff: f32,
    /// Radius (cells) kept obstacle-free around each hotspot.
    pub hotspot_clearance: usize,
    /// Minimum number of rectangular obstacle blocks (inclusive).
    pub obstacle_blocks_min: usize,
    /// Maximum number of rectangular obstacle blocks (exclusive).
    pub obstacle_blocks_max: usize,
    /// Minimum block side length (inclusive).
    pub block_size_min: usize,
    /// Maximum block side length (exclusive).
    pub block_size_max: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            grid_size: 128,
            diffusion: 0.15,
            decay: 0.05,
            repulsion_decay: 0.15,
            sensor_distance: 6.0,
            sensor_angle: 0.6,
            turn_rate: 0.12,
            turn_jitter: 0.05,
            escape_turn: 0.75,
            speed_min: 0.4,
            speed_spread: 0.15,
            vein_weight: 0.3,
            repulsion_weight: 3.0,
            obstacle_penalty: 5.0,
            trail_deposit: 0.02,
            repulsion_deposit: 0.4,
            dwell_repulsion_deposit: 0.6,
            path_reinforcement: 0.35,
            path_memory: 300,
            pickup_threshold: 0.8,
            delivery_threshold: 0.8,
            load_ticks: 50,
            unload_ticks: 50,
            pickup_hotspots: 1,
            delivery_hotspots: 1,
            hotspot_falloff: 24.0,
            hotspot_clearance: 6,
            obstacle_blocks_min: 12,
            obstacle_blocks_max: 20,
            block_size_min: 5,
            block_size_max: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimConfigError {
    GridTooSmall { min: usize, actual: usize },
    GridTooLarge { max: usize, actual: usize },
    InvalidSensorGeometry,
    InvalidTurnParameters,
    InvalidSpeed,
    InvalidWeight,
    InvalidDeposit,
    InvalidThreshold,
    InvalidDwell,
    NoHotspots,
    InvalidHotspotFalloff,
    InvalidBlockRange,
}

impl fmt::Display for SimConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimConfigError::GridTooSmall { min, actual } => {
                write!(f, "grid_size ({actual}) is below supported minimum ({min})")
            }
            SimConfigError::GridTooLarge { max, actual } => {
                write!(f, "grid_size ({actual}) exceeds supported maximum ({max})")
            }
            SimConfigError::InvalidSensorGeometry => {
                write!(f, "sensor_distance must be positive and sensor_angle finite")
            }
            SimConfigError::InvalidTurnParameters => write!(
                f,
                "turn_rate, turn_jitter and escape_turn must be non-negative and finite"
            ),
            SimConfigError::InvalidSpeed => {
                write!(f, "speed_min must be positive and speed_spread non-negative")
            }
            SimConfigError::InvalidWeight => {
                write!(f, "sensor weights and penalties must be non-negative and finite")
            }
            SimConfigError::InvalidDeposit => {
                write!(f, "deposit amounts must lie in [0, 1]")
            }
            SimConfigError::InvalidThreshold => {
                write!(f, "pickup/delivery thresholds must lie in (0, 1)")
            }
            SimConfigError::InvalidDwell => {
                write!(f, "load_ticks and unload_ticks must be at least 1")
            }
            SimConfigError::NoHotspots => {
                write!(f, "at least one pickup and one delivery hotspot are required")
            }
            SimConfigError::InvalidHotspotFalloff => {
                write!(f, "hotspot_falloff must be positive and finite")
            }
            SimConfigError::InvalidBlockRange => {
                write!(f, "obstacle block ranges must be non-empty (min < max)")
            }
        }
    }
}

impl Error for SimConfigError {}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

fn unit_interval(v: f32) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

impl SimConfig {
    pub const MIN_GRID_SIZE: usize = 32;
    pub const MAX_GRID_SIZE: usize = 1024;
    /// Upper bound on the swarm size; larger requests are clamped.
    pub const MAX_AGENTS: usize = 10_000;
    pub const MAX_DIFFUSION: f32 = 0.3;
    pub const MAX_DECAY: f32 = 0.1;

    pub fn validate(&self) -> Result<(), SimConfigError> {
        if self.grid_size < Self::MIN_GRID_SIZE {
            return Err(SimConfigError::GridTooSmall {
                min: Self::MIN_GRID_SIZE,
                actual: self.grid_size,
            });
        }
        if self.grid_size > Self::MAX_GRID_SIZE {
            return Err(SimConfigError::GridTooLarge {
                max: Self::MAX_GRID_SIZE,
                actual: self.grid_size,
            });
        }
        if !(self.sensor_distance.is_finite() && self.sensor_distance > 0.0)
            || !self.sensor_angle.is_finite()
        {
            return Err(SimConfigError::InvalidSensorGeometry);
        }
        if !(non_negative(self.turn_rate)
            && non_negative(self.turn_jitter)
            && non_negative(self.escape_turn))
        {
            return Err(SimConfigError::InvalidTurnParameters);
        }
        if !(self.speed_min.is_finite() && self.speed_min > 0.0) || !non_negative(self.speed_spread)
        {
            return Err(SimConfigError::InvalidSpeed);
        }
        if ![self.vein_weight, self.repulsion_weight, self.obstacle_penalty]
            .iter()
            .all(|&w| non_negative(w as f64))
        {
            return Err(SimConfigError::InvalidWeight);
        }
        if ![
            self.trail_deposit,
            self.repulsion_deposit,
            self.dwell_repulsion_deposit,
            self.path_reinforcement,
            self.repulsion_decay,
        ]
        .iter()
        .all(|&d| unit_interval(d))
        {
            return Err(SimConfigError::InvalidDeposit);
        }
        if ![self.pickup_threshold, self.delivery_threshold]
            .iter()
            .all(|&t| t.is_finite() && t > 0.0 && t < 1.0)
        {
            return Err(SimConfigError::InvalidThreshold);
        }
        if self.load_ticks == 0 || self.unload_ticks == 0 {
            return Err(SimConfigError::InvalidDwell);
        }
        if self.pickup_hotspots == 0 || self.delivery_hotspots == 0 {
            return Err(SimConfigError::NoHotspots);
        }
        if !(self.hotspot_falloff.is_finite() && self.hotspot_falloff > 0.0) {
            return Err(SimConfigError::InvalidHotspotFalloff);
        }
        if self.obstacle_blocks_min >= self.obstacle_blocks_max
            || self.block_size_min == 0
            || self.block_size_min >= self.block_size_max
        {
            return Err(SimConfigError::InvalidBlockRange);
        }
        Ok(())
    }
}
