use myxo_core::{SimConfig, Simulation};
use std::time::{Duration, Instant};

fn main() {
    let steps = 2_000;
    let swarm_sizes = [100, 1_000, 5_000, SimConfig::MAX_AGENTS];
    println!("Benchmarking {} ticks per swarm size on the default map", steps);

    for &agents in &swarm_sizes {
        let config = SimConfig {
            seed: 42,
            ..SimConfig::default()
        };
        let mut sim = Simulation::with_config(config, agents);

        let mut field_time = Duration::ZERO;
        let mut agent_time = Duration::ZERO;
        let start = Instant::now();
        for _ in 0..steps {
            let timings = sim.update();
            field_time += Duration::from_micros(timings.field_us);
            agent_time += Duration::from_micros(timings.agent_us);
        }
        let elapsed = start.elapsed();

        println!(
            "agents={:<6} total={:?} per_tick={:?} field={:?} agents_phase={:?} deliveries={}",
            agents,
            elapsed,
            elapsed / steps as u32,
            field_time / steps as u32,
            agent_time / steps as u32,
            sim.delivered_count()
        );
    }

    // Metrics sampling overhead on a mid-sized swarm.
    let mut plain = Simulation::with_config(SimConfig::default(), 1_000);
    let mut sampled = Simulation::with_config(SimConfig::default(), 1_000);

    let start = Instant::now();
    for _ in 0..steps {
        plain.update();
    }
    let duration_plain = start.elapsed();

    let start = Instant::now();
    sampled.run_experiment(steps, 1);
    let duration_sampled = start.elapsed();

    let diff = duration_sampled.saturating_sub(duration_plain);
    println!("Time for {} ticks without sampling: {:?}", steps, duration_plain);
    println!("Time for {} ticks sampling every tick: {:?}", steps, duration_sampled);
    println!("Avg sampling overhead per tick: {:?}", diff / steps as u32);
}
