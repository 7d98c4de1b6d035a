pub mod agent;
pub mod batch;
pub mod config;
pub mod field;
pub mod map;
pub mod simulation;
pub mod swarm;

pub use agent::{Agent, AgentState};
pub use config::{SimConfig, SimConfigError};
pub use field::{FieldKind, GridField};
pub use simulation::{
    ExperimentError, RunSummary, Simulation, SimulationInitError, StepMetrics, StepTimings,
};
pub use swarm::{SnapshotError, SwarmError, AGENT_RECORD_LEN};
