use super::metrics::StepTimings;
use super::Simulation;
use crate::agent::Surroundings;
use std::time::Instant;

impl Simulation {
    fn step_field_phase(&mut self) {
        self.vein.diffuse_and_decay(self.diffusion, self.decay);
        self.repulsion
            .diffuse_and_decay(self.diffusion, self.config.repulsion_decay);
    }

    /// Advance every agent in index order. Returns the number of completed
    /// deliveries and the number of state transitions.
    fn step_agent_phase(&mut self) -> (u32, usize) {
        let mut env = Surroundings {
            map: &self.map,
            vein: &mut self.vein,
            repulsion: &mut self.repulsion,
        };
        let config = &self.config;
        let rng = &mut self.rng;

        let mut deliveries = 0u32;
        let mut transitions = 0usize;
        for agent in self.swarm.agents_mut() {
            if let Some(transition) = agent.advance(&mut env, config, rng) {
                transitions += 1;
                if transition.completes_delivery() {
                    deliveries += 1;
                }
            }
        }
        (deliveries, transitions)
    }

    /// One tick: fields diffuse and decay, then agents sense, move and
    /// transition, then counters are updated.
    pub fn update(&mut self) -> StepTimings {
        let total_start = Instant::now();
        self.step_index = self.step_index.saturating_add(1);

        let t0 = Instant::now();
        self.step_field_phase();
        let field_us = t0.elapsed().as_micros() as u64;

        let t1 = Instant::now();
        let (deliveries, transitions) = self.step_agent_phase();
        let agent_us = t1.elapsed().as_micros() as u64;

        self.deliveries_last_step = deliveries;
        self.transitions_last_step = transitions;
        self.delivered_count = self.delivered_count.saturating_add(u64::from(deliveries));
        if deliveries > 0 {
            tracing::trace!(
                step = self.step_index,
                deliveries,
                total = self.delivered_count,
                "deliveries completed"
            );
        }

        StepTimings {
            field_us,
            agent_us,
            total_us: total_start.elapsed().as_micros() as u64,
        }
    }
}
