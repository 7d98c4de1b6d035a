use super::*;
use crate::agent::AgentState;

fn seeded(seed: u64, agents: usize) -> Simulation {
    let config = SimConfig {
        seed,
        ..SimConfig::default()
    };
    Simulation::with_config(config, agents)
}

fn fields_in_bounds(sim: &Simulation) -> bool {
    FieldKind::ALL.iter().all(|&kind| {
        sim.field_view(kind)
            .iter()
            .all(|v| (GridField::MIN_VALUE..=GridField::MAX_VALUE).contains(v))
    })
}

#[test]
fn fields_stay_within_bounds_across_ticks() {
    let mut sim = seeded(3, 400);
    sim.set_diffusion(SimConfig::MAX_DIFFUSION);
    for _ in 0..300 {
        sim.update();
        assert!(fields_in_bounds(&sim), "step {}", sim.step_index());
    }
}

#[test]
fn views_are_grid_sized() {
    let sim = seeded(4, 5);
    let n = sim.grid_size();
    for kind in FieldKind::ALL {
        assert_eq!(sim.field_view(kind).len(), n * n, "{}", kind.name());
    }
    assert_eq!(sim.pickup_view().len(), n * n);
    assert_eq!(sim.obstacles_view().len(), n * n);
}

#[test]
fn agent_positions_stay_on_grid() {
    let mut sim = seeded(5, 300);
    let n = sim.grid_size() as f64;
    for _ in 0..500 {
        sim.update();
        for agent in sim.agents() {
            let [x, y] = agent.position;
            assert!((0.0..n).contains(&x) && (0.0..n).contains(&y), "{:?}", agent);
        }
    }
}

#[test]
fn agents_spawn_seeking_pickup_on_open_cells() {
    let sim = seeded(6, 200);
    for agent in sim.agents() {
        assert_eq!(agent.state, AgentState::SeekPickup);
        let [x, y] = agent.position;
        assert!(sim.map().is_open(x as usize, y as usize));
    }
}

#[test]
fn transitions_follow_the_cycle_and_deliveries_are_counted() {
    let config = SimConfig {
        seed: 7,
        load_ticks: 5,
        unload_ticks: 5,
        ..SimConfig::default()
    };
    let mut sim = Simulation::with_config(config, 150);
    let mut previous: Vec<AgentState> = sim.agents().iter().map(|a| a.state).collect();
    let mut observed_deliveries = 0u64;
    let mut last_count = sim.delivered_count();

    for _ in 0..3_000 {
        sim.update();
        let mut deliveries_this_step = 0u32;
        for (agent, prev) in sim.agents().iter().zip(previous.iter_mut()) {
            if agent.state != *prev {
                assert_eq!(agent.state, prev.next(), "agent {} skipped a state", agent.id);
                if *prev == AgentState::Unloading {
                    deliveries_this_step += 1;
                }
                *prev = agent.state;
            }
        }
        observed_deliveries += u64::from(deliveries_this_step);
        assert_eq!(sim.deliveries_last_step(), deliveries_this_step);
        assert!(sim.delivered_count() >= last_count);
        last_count = sim.delivered_count();
        assert_eq!(sim.delivered_count(), observed_deliveries);
    }
}

#[test]
fn dwelling_agents_do_not_move() {
    let mut sim = seeded(8, 200);
    for _ in 0..1_500 {
        let before: Vec<(AgentState, [f64; 2])> =
            sim.agents().iter().map(|a| (a.state, a.position)).collect();
        sim.update();
        for ((state, pos), agent) in before.iter().zip(sim.agents()) {
            if !state.profile().moves {
                assert_eq!(*pos, agent.position);
            }
        }
    }
}

#[test]
fn single_agent_delivers_within_budget() {
    let mut sim = seeded(42, 1);
    assert_eq!(sim.diffusion(), 0.15);
    assert_eq!(sim.decay(), 0.05);
    for _ in 0..100_000 {
        sim.update();
        if sim.delivered_count() >= 1 {
            break;
        }
    }
    assert!(sim.delivered_count() >= 1, "no delivery after {} ticks", sim.step_index());
}

#[test]
fn empty_swarm_runs_and_never_delivers() {
    let mut sim = seeded(9, 0);
    let mut out: [f32; 0] = [];
    assert_eq!(sim.write_agents_flat(&mut out), 0);
    for _ in 0..500 {
        sim.update();
    }
    assert_eq!(sim.delivered_count(), 0);
    assert_eq!(sim.vein.total(), 0.0);
    assert!(sim.agents_flat().is_empty());
}

#[test]
fn setters_clamp_and_are_idempotent() {
    let mut sim = seeded(10, 1);
    sim.set_diffusion(0.2);
    sim.set_diffusion(0.2);
    assert_eq!(sim.diffusion(), 0.2);
    sim.set_decay(0.01);
    sim.set_decay(0.01);
    assert_eq!(sim.decay(), 0.01);

    sim.set_diffusion(5.0);
    assert_eq!(sim.diffusion(), SimConfig::MAX_DIFFUSION);
    sim.set_decay(-1.0);
    assert_eq!(sim.decay(), 0.0);
    sim.set_decay(f32::NAN);
    assert_eq!(sim.decay(), 0.0);
    sim.set_diffusion(f32::NAN);
    assert_eq!(sim.diffusion(), SimConfig::MAX_DIFFUSION);
}

#[test]
fn parameter_changes_keep_delivered_count() {
    let mut sim = seeded(11, 10);
    sim.delivered_count = 17;
    sim.set_diffusion(0.05);
    sim.set_decay(0.08);
    assert_eq!(sim.delivered_count(), 17);
}

#[test]
fn resize_round_trip_preserves_prefix() {
    let mut sim = seeded(12, 40);
    for _ in 0..50 {
        sim.update();
    }
    let before = sim.agents().to_vec();
    sim.resize_agents(15);
    assert_eq!(sim.agents(), &before[..15]);
    sim.resize_agents(40);
    assert_eq!(sim.agent_count(), 40);
    assert_eq!(&sim.agents()[..15], &before[..15]);
    assert!(sim.agents()[15..]
        .iter()
        .all(|a| a.state == AgentState::SeekPickup));
}

#[test]
fn growing_adds_fresh_seekers() {
    let mut sim = seeded(13, 30);
    for _ in 0..200 {
        sim.update();
    }
    let before = sim.agents().to_vec();
    sim.resize_agents(200);
    assert_eq!(sim.agent_count(), 200);
    assert_eq!(&sim.agents()[..30], before.as_slice());
    let added = &sim.agents()[30..];
    assert_eq!(added.len(), 170);
    assert!(added.iter().all(|a| a.state == AgentState::SeekPickup && a.dwell == 0));
}

#[test]
fn agent_count_is_clamped() {
    let mut sim = seeded(14, 0);
    assert_eq!(
        sim.try_resize_agents(SimConfig::MAX_AGENTS + 5),
        Ok(SimConfig::MAX_AGENTS)
    );
    assert_eq!(sim.agent_count(), SimConfig::MAX_AGENTS);
    sim.resize_agents(0);
    assert!(sim.agents().is_empty());
}

#[test]
fn vein_mass_is_conserved_without_decay() {
    let mut sim = seeded(15, 0);
    sim.set_decay(0.0);
    let c = sim.grid_size() as f64 / 2.0 + 0.5;
    sim.vein.deposit(c, c, 1.0);
    for _ in 0..50 {
        sim.update();
        assert!((sim.vein.total() - 1.0).abs() < 1e-4, "{}", sim.vein.total());
    }
}

#[test]
fn vein_mass_decreases_with_decay() {
    let mut sim = seeded(16, 0);
    sim.set_decay(0.05);
    let c = sim.grid_size() as f64 / 2.0 + 0.5;
    sim.vein.deposit(c, c, 1.0);
    let mut last = sim.vein.total();
    for _ in 0..50 {
        sim.update();
        let total = sim.vein.total();
        assert!(total < last);
        last = total;
    }
}

#[test]
fn flat_snapshot_matches_agents() {
    let mut sim = seeded(17, 25);
    for _ in 0..100 {
        sim.update();
    }
    let mut out = vec![0.0f32; sim.agents_flat_len() + 3];
    assert_eq!(sim.write_agents_flat(&mut out), 100);
    for (record, agent) in out.chunks_exact(4).zip(sim.agents()) {
        assert_eq!(record[0], agent.position[0] as f32);
        assert_eq!(record[1], agent.position[1] as f32);
        assert_eq!(record[2], agent.state.code() as f32);
        assert_eq!(record[3], agent.heading as f32);
    }
}

#[test]
fn undersized_snapshot_buffer_is_an_error() {
    let sim = seeded(18, 3);
    let mut out = vec![0.0f32; 11];
    assert_eq!(
        sim.try_write_agents_flat(&mut out),
        Err(SnapshotError::BufferTooSmall {
            required: 12,
            actual: 11
        })
    );
}

#[test]
#[should_panic(expected = "agent snapshot buffer")]
fn write_agents_flat_panics_on_undersized_buffer() {
    let sim = seeded(19, 3);
    let mut out = vec![0.0f32; 4];
    sim.write_agents_flat(&mut out);
}

#[test]
fn randomize_keeps_agents_and_delivered_count() {
    let mut sim = seeded(20, 120);
    for _ in 0..200 {
        sim.update();
    }
    sim.delivered_count = 9;
    let states: Vec<AgentState> = sim.agents().iter().map(|a| a.state).collect();
    let obstacles_before = sim.obstacles_view().to_vec();

    sim.randomize_map();

    assert_eq!(sim.delivered_count(), 9);
    assert_eq!(sim.agent_count(), 120);
    assert_ne!(sim.obstacles_view(), obstacles_before.as_slice());
    assert_eq!(sim.vein.total(), 0.0);
    assert_eq!(sim.repulsion.total(), 0.0);
    for (agent, state) in sim.agents().iter().zip(&states) {
        assert_eq!(agent.state, *state);
        assert_eq!(agent.route_len(), 0);
        let [x, y] = agent.position;
        assert!(sim.map().is_open(x as usize, y as usize), "{:?}", agent);
    }
    for _ in 0..100 {
        sim.update();
    }
    assert!(fields_in_bounds(&sim));
}

#[test]
fn same_seed_gives_identical_runs() {
    let mut a = seeded(21, 60);
    let mut b = seeded(21, 60);
    for _ in 0..300 {
        a.update();
        b.update();
    }
    assert_eq!(a.agents(), b.agents());
    assert_eq!(a.vein_view(), b.vein_view());
    assert_eq!(a.delivered_count(), b.delivered_count());
}

#[test]
fn invalid_config_is_rejected() {
    let config = SimConfig {
        grid_size: 4,
        ..SimConfig::default()
    };
    assert!(matches!(
        Simulation::try_with_config(config, 10),
        Err(SimulationInitError::Config(SimConfigError::GridTooSmall { .. }))
    ));
}

#[test]
fn out_of_range_initial_parameters_are_clamped() {
    let config = SimConfig {
        diffusion: 2.0,
        decay: f32::NAN,
        ..SimConfig::default()
    };
    let sim = Simulation::with_config(config, 0);
    assert_eq!(sim.diffusion(), SimConfig::MAX_DIFFUSION);
    assert_eq!(sim.decay(), 0.0);
}

#[test]
fn experiment_rejects_invalid_arguments() {
    let mut sim = seeded(22, 1);
    assert_eq!(
        sim.try_run_experiment(10, 0).unwrap_err(),
        ExperimentError::InvalidSampleEvery
    );
    assert_eq!(
        sim.try_run_experiment(Simulation::MAX_EXPERIMENT_STEPS + 1, 1)
            .unwrap_err(),
        ExperimentError::TooManySteps {
            max: Simulation::MAX_EXPERIMENT_STEPS,
            actual: Simulation::MAX_EXPERIMENT_STEPS + 1
        }
    );
    assert!(matches!(
        sim.try_run_experiment(Simulation::MAX_EXPERIMENT_SAMPLES + 1, 1),
        Err(ExperimentError::TooManySamples { .. })
    ));
    assert_eq!(sim.step_index(), 0);
}

#[test]
fn experiment_samples_include_final_step() {
    let mut sim = seeded(23, 50);
    let summary = sim.run_experiment(105, 25);
    let steps: Vec<usize> = summary.samples.iter().map(|s| s.step).collect();
    assert_eq!(steps, vec![25, 50, 75, 100, 105]);
    assert_eq!(summary.final_delivered_count, sim.delivered_count());
    assert_eq!(summary.agent_count, 50);
    assert_eq!(sim.step_index(), 105);
    for sample in &summary.samples {
        let counted = sample.seek_pickup + sample.loading + sample.seek_delivery + sample.unloading;
        assert_eq!(counted, sample.agent_count);
    }
}

#[test]
fn run_summary_serializes_with_schema_version() {
    let mut sim = seeded(24, 5);
    let summary = sim.run_experiment(10, 5);
    let json = serde_json::to_string(&summary).unwrap();
    let decoded: RunSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded.schema_version, 1);
    assert_eq!(decoded.samples.len(), 2);
    assert_eq!(decoded.samples, summary.samples);
}
