use crate::config::SimConfig;
use crate::field::{FieldKind, GridField};
use crate::map::MapLayout;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::{PI, TAU};

/// Keeps clamped positions strictly below the grid size.
const EDGE_EPSILON: f64 = 1e-3;

/// Task state of an AGV. The cycle is a ring:
/// SeekPickup → Loading → SeekDelivery → Unloading → SeekPickup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AgentState {
    SeekPickup = 0,
    Loading = 1,
    SeekDelivery = 2,
    Unloading = 3,
}

/// Per-state behaviour: which field steers the agent (moving states) or that
/// the agent dwells in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateProfile {
    pub target: Option<FieldKind>,
    pub moves: bool,
}

const PROFILES: [StateProfile; 4] = [
    StateProfile {
        target: Some(FieldKind::Pickup),
        moves: true,
    },
    StateProfile {
        target: None,
        moves: false,
    },
    StateProfile {
        target: Some(FieldKind::Delivery),
        moves: true,
    },
    StateProfile {
        target: None,
        moves: false,
    },
];

impl AgentState {
    pub const ALL: [AgentState; 4] = [
        AgentState::SeekPickup,
        AgentState::Loading,
        AgentState::SeekDelivery,
        AgentState::Unloading,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn profile(self) -> StateProfile {
        PROFILES[self as usize]
    }

    /// The only successor allowed by the task cycle.
    pub fn next(self) -> Self {
        match self {
            AgentState::SeekPickup => AgentState::Loading,
            AgentState::Loading => AgentState::SeekDelivery,
            AgentState::SeekDelivery => AgentState::Unloading,
            AgentState::Unloading => AgentState::SeekPickup,
        }
    }

    /// Field value at the agent's cell that ends a seeking state.
    fn arrival_threshold(self, config: &SimConfig) -> f32 {
        match self {
            AgentState::SeekPickup => config.pickup_threshold,
            _ => config.delivery_threshold,
        }
    }

    /// Ticks spent in a dwelling state.
    fn dwell_ticks(self, config: &SimConfig) -> u32 {
        match self {
            AgentState::Loading => config.load_ticks,
            _ => config.unload_ticks,
        }
    }
}

/// Fields an agent reads and writes during its tick.
pub(crate) struct Surroundings<'a> {
    pub map: &'a MapLayout,
    pub vein: &'a mut GridField,
    pub repulsion: &'a mut GridField,
}

impl Surroundings<'_> {
    fn target(&self, kind: FieldKind) -> &GridField {
        match kind {
            FieldKind::Pickup => &self.map.pickup,
            FieldKind::Delivery => &self.map.delivery,
            FieldKind::Repulsion => &*self.repulsion,
            FieldKind::Vein => &*self.vein,
            FieldKind::Obstacles => &self.map.obstacles,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: AgentState,
    pub to: AgentState,
}

impl Transition {
    pub fn completes_delivery(self) -> bool {
        self.from == AgentState::Unloading && self.to == AgentState::SeekPickup
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    pub id: u32,
    pub position: [f64; 2],
    /// Heading in radians, kept in [0, 2π).
    pub heading: f64,
    pub state: AgentState,
    /// Ticks spent in the current dwelling state.
    pub dwell: u32,
    /// Step length per moving tick.
    pub speed: f64,
    /// Recent positions while seeking a delivery zone.
    pub(crate) route: VecDeque<[f64; 2]>,
}

impl Agent {
    pub fn new(id: u32, position: [f64; 2], heading: f64, speed: f64) -> Self {
        Self {
            id,
            position,
            heading: heading.rem_euclid(TAU),
            state: AgentState::SeekPickup,
            dwell: 0,
            speed,
            route: VecDeque::new(),
        }
    }

    /// A fresh SeekPickup agent at a random open cell with random heading and speed.
    pub fn spawn<R: Rng + ?Sized>(
        id: u32,
        map: &MapLayout,
        config: &SimConfig,
        rng: &mut R,
    ) -> Self {
        let (x, y) = map.random_open_position(rng);
        let heading = rng.random::<f64>() * TAU;
        let speed = config.speed_min + rng.random::<f64>() * config.speed_spread;
        Self::new(id, [x, y], heading, speed)
    }

    pub fn route_len(&self) -> usize {
        self.route.len()
    }

    /// Clamp position into [0, size) and replace non-finite coordinates.
    pub(crate) fn clamp_position(&mut self, size: usize) {
        let max = size as f64 - EDGE_EPSILON;
        for v in &mut self.position {
            if !v.is_finite() {
                *v = size as f64 * 0.5;
            }
            *v = v.clamp(0.0, max);
        }
        if !self.heading.is_finite() {
            self.heading = 0.0;
        }
    }

    /// Advance one tick: steer and move (seeking states) or dwell, then apply at
    /// most one state transition.
    pub(crate) fn advance<R: Rng + ?Sized>(
        &mut self,
        env: &mut Surroundings<'_>,
        config: &SimConfig,
        rng: &mut R,
    ) -> Option<Transition> {
        self.clamp_position(config.grid_size);
        let profile = self.state.profile();

        let done = match profile.target {
            Some(target) if profile.moves => {
                self.steer(env, target, config, rng);
                let moved = self.try_move(env.map, config, rng);
                let [x, y] = self.position;
                env.repulsion.deposit(x, y, config.repulsion_deposit);
                if moved {
                    env.vein.deposit(x, y, config.trail_deposit);
                    if self.state == AgentState::SeekDelivery {
                        self.remember(config.path_memory);
                    }
                }
                env.target(target).sample(x, y) > self.state.arrival_threshold(config)
            }
            _ => {
                let [x, y] = self.position;
                env.repulsion.deposit(x, y, config.dwell_repulsion_deposit);
                self.dwell = self.dwell.saturating_add(1);
                self.dwell >= self.state.dwell_ticks(config)
            }
        };

        if !done {
            return None;
        }
        let transition = Transition {
            from: self.state,
            to: self.state.next(),
        };
        self.enter(transition.to, env, config);
        Some(transition)
    }

    fn enter(&mut self, state: AgentState, env: &mut Surroundings<'_>, config: &SimConfig) {
        match state {
            AgentState::Unloading => {
                for &[x, y] in &self.route {
                    env.vein.deposit(x, y, config.path_reinforcement);
                }
                self.route.clear();
            }
            AgentState::Loading => self.route.clear(),
            AgentState::SeekPickup | AgentState::SeekDelivery => {}
        }
        self.state = state;
        self.dwell = 0;
    }

    fn remember(&mut self, capacity: usize) {
        if capacity == 0 {
            return;
        }
        while self.route.len() >= capacity {
            self.route.pop_front();
        }
        self.route.push_back(self.position);
    }

    /// Score of a sensor placed at (x, y). Off-grid sensors score as obstacles.
    fn attractiveness(
        env: &Surroundings<'_>,
        target: FieldKind,
        x: f64,
        y: f64,
        config: &SimConfig,
    ) -> f32 {
        let size = config.grid_size as f64;
        if !(x >= 0.0 && y >= 0.0 && x < size && y < size) {
            return -config.obstacle_penalty;
        }
        env.target(target).sample(x, y) + config.vein_weight * env.vein.sample(x, y)
            - config.repulsion_weight * env.repulsion.sample(x, y)
            - config.obstacle_penalty * env.map.obstacles.sample(x, y)
    }

    fn steer<R: Rng + ?Sized>(
        &mut self,
        env: &Surroundings<'_>,
        target: FieldKind,
        config: &SimConfig,
        rng: &mut R,
    ) {
        let [x, y] = self.position;
        let sense = |angle: f64| {
            let (sin, cos) = angle.sin_cos();
            Self::attractiveness(
                env,
                target,
                x + cos * config.sensor_distance,
                y + sin * config.sensor_distance,
                config,
            )
        };
        let left = sense(self.heading - config.sensor_angle);
        let centre = sense(self.heading);
        let right = sense(self.heading + config.sensor_angle);

        if centre < left && centre < right {
            self.heading += rng.random_range(-config.escape_turn..=config.escape_turn);
        } else if left > centre && left >= right {
            self.heading -= config.turn_rate;
        } else if right > centre && right > left {
            self.heading += config.turn_rate;
        }
        self.heading += rng.random_range(-config.turn_jitter..=config.turn_jitter);
        self.heading = self.heading.rem_euclid(TAU);
    }

    /// Step forward unless the next position is off-grid or occupied, in which
    /// case the agent only turns away.
    fn try_move<R: Rng + ?Sized>(&mut self, map: &MapLayout, config: &SimConfig, rng: &mut R) -> bool {
        let size = config.grid_size as f64;
        let (sin, cos) = self.heading.sin_cos();
        let nx = self.position[0] + cos * self.speed;
        let ny = self.position[1] + sin * self.speed;

        let inside = nx >= 0.0 && ny >= 0.0 && nx < size && ny < size;
        if inside && !map.obstacles.is_occupied(nx, ny) {
            self.position = [nx, ny];
            self.clamp_position(config.grid_size);
            true
        } else {
            self.heading = (self.heading + PI * rng.random_range(0.4..0.6)).rem_euclid(TAU);
            false
        }
    }
}
