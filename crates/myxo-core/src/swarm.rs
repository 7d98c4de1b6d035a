use crate::agent::{Agent, AgentState};
use std::{error::Error, fmt};

/// Floats per agent record in a flat snapshot: x, y, state code, heading.
pub const AGENT_RECORD_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwarmError {
    /// Growing the swarm could not reserve storage; the swarm is unchanged.
    Allocation { requested: usize },
}

impl fmt::Display for SwarmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwarmError::Allocation { requested } => {
                write!(f, "failed to reserve storage for {requested} agents")
            }
        }
    }
}

impl Error for SwarmError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    BufferTooSmall { required: usize, actual: usize },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::BufferTooSmall { required, actual } => write!(
                f,
                "agent snapshot buffer holds {actual} floats but {required} are required"
            ),
        }
    }
}

impl Error for SnapshotError {}

/// Ordered agent collection. Growth appends, shrinking trims the tail, so a
/// retained agent keeps its index.
#[derive(Clone, Debug, Default)]
pub struct Swarm {
    agents: Vec<Agent>,
    next_agent_id: u32,
}

impl Swarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub(crate) fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    /// Resize to `count` agents. New agents come from `spawn`, which receives
    /// the next agent id. Storage is reserved before any agent is created, so a
    /// failed reservation leaves the swarm untouched.
    pub fn try_resize_with<F>(&mut self, count: usize, mut spawn: F) -> Result<(), SwarmError>
    where
        F: FnMut(u32) -> Agent,
    {
        if count <= self.agents.len() {
            self.agents.truncate(count);
            return Ok(());
        }
        let additional = count - self.agents.len();
        self.agents
            .try_reserve_exact(additional)
            .map_err(|_| SwarmError::Allocation { requested: count })?;
        for _ in 0..additional {
            let id = self.next_agent_id;
            self.next_agent_id = self.next_agent_id.wrapping_add(1);
            self.agents.push(spawn(id));
        }
        Ok(())
    }

    pub fn state_counts(&self) -> [usize; 4] {
        let mut counts = [0usize; 4];
        for agent in &self.agents {
            counts[agent.state.code() as usize] += 1;
        }
        counts
    }

    pub fn count_in(&self, state: AgentState) -> usize {
        self.state_counts()[state.code() as usize]
    }

    /// Write one `[x, y, state_code, heading]` record per agent into `out`.
    /// Returns the number of floats written.
    pub fn write_flat(&self, out: &mut [f32]) -> Result<usize, SnapshotError> {
        let required = self.agents.len() * AGENT_RECORD_LEN;
        if out.len() < required {
            return Err(SnapshotError::BufferTooSmall {
                required,
                actual: out.len(),
            });
        }
        for (record, agent) in out.chunks_exact_mut(AGENT_RECORD_LEN).zip(&self.agents) {
            record[0] = agent.position[0] as f32;
            record[1] = agent.position[1] as f32;
            record[2] = agent.state.code() as f32;
            record[3] = agent.heading as f32;
        }
        Ok(required)
    }
}
