use myxo_core::{FieldKind, SimConfig, Simulation};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn value_error(err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn parse_config(seed: Option<u64>, config_json: Option<&str>) -> PyResult<SimConfig> {
    let mut config = match config_json {
        Some(json) => serde_json::from_str::<SimConfig>(json).map_err(value_error)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = seed {
        config.seed = seed;
    }
    Ok(config)
}

/// Python handle on one simulation. Field and agent accessors return copies.
#[pyclass(name = "Simulation")]
struct PySimulation {
    inner: Simulation,
}

#[pymethods]
impl PySimulation {
    /// Create a simulation. With neither `seed` nor `config_json` a fresh
    /// seed is drawn.
    #[new]
    #[pyo3(signature = (agent_count, seed=None, config_json=None))]
    fn new(agent_count: usize, seed: Option<u64>, config_json: Option<&str>) -> PyResult<Self> {
        let inner = if seed.is_none() && config_json.is_none() {
            Simulation::new(agent_count)
        } else {
            let config = parse_config(seed, config_json)?;
            Simulation::try_with_config(config, agent_count).map_err(value_error)?
        };
        Ok(Self { inner })
    }

    /// Advance `steps` ticks with the GIL released.
    #[pyo3(signature = (steps=1))]
    fn update(&mut self, py: Python<'_>, steps: usize) {
        let inner = &mut self.inner;
        py.detach(|| {
            for _ in 0..steps {
                inner.update();
            }
        });
    }

    fn set_diffusion(&mut self, value: f32) {
        self.inner.set_diffusion(value);
    }

    fn set_decay(&mut self, value: f32) {
        self.inner.set_decay(value);
    }

    fn randomize_map(&mut self) {
        self.inner.randomize_map();
    }

    /// Returns the agent count after clamping.
    fn resize_agents(&mut self, count: usize) -> PyResult<usize> {
        self.inner.try_resize_agents(count).map_err(value_error)
    }

    #[getter]
    fn diffusion(&self) -> f32 {
        self.inner.diffusion()
    }

    #[getter]
    fn decay(&self) -> f32 {
        self.inner.decay()
    }

    #[getter]
    fn grid_size(&self) -> usize {
        self.inner.grid_size()
    }

    #[getter]
    fn agent_count(&self) -> usize {
        self.inner.agent_count()
    }

    #[getter]
    fn delivered_count(&self) -> u64 {
        self.inner.delivered_count()
    }

    #[getter]
    fn step_index(&self) -> usize {
        self.inner.step_index()
    }

    fn state_counts(&self) -> Vec<usize> {
        self.inner.state_counts().to_vec()
    }

    /// Copy of a field by name: pickup, delivery, repulsion, vein or obstacles.
    fn field(&self, name: &str) -> PyResult<Vec<f32>> {
        let kind = FieldKind::from_name(name)
            .ok_or_else(|| PyValueError::new_err(format!("unknown field '{name}'")))?;
        Ok(self.inner.field_view(kind).to_vec())
    }

    fn pickup_view(&self) -> Vec<f32> {
        self.inner.pickup_view().to_vec()
    }

    fn delivery_view(&self) -> Vec<f32> {
        self.inner.delivery_view().to_vec()
    }

    fn repulsion_view(&self) -> Vec<f32> {
        self.inner.repulsion_view().to_vec()
    }

    fn vein_view(&self) -> Vec<f32> {
        self.inner.vein_view().to_vec()
    }

    fn obstacles_view(&self) -> Vec<f32> {
        self.inner.obstacles_view().to_vec()
    }

    /// Flat `[x, y, state_code, heading]` records, one per agent.
    fn agents_flat(&self) -> Vec<f32> {
        self.inner.agents_flat()
    }

    /// Run an experiment and return the summary as JSON.
    #[pyo3(signature = (steps, sample_every=100))]
    fn run_experiment(
        &mut self,
        py: Python<'_>,
        steps: usize,
        sample_every: usize,
    ) -> PyResult<String> {
        let inner = &mut self.inner;
        let summary = py
            .detach(|| inner.try_run_experiment(steps, sample_every))
            .map_err(value_error)?;
        serde_json::to_string(&summary).map_err(value_error)
    }

    fn config_json(&self) -> PyResult<String> {
        serde_json::to_string(self.inner.config()).map_err(value_error)
    }
}

#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pyfunction]
fn default_config_json() -> PyResult<String> {
    serde_json::to_string_pretty(&SimConfig::default()).map_err(value_error)
}

/// Run `steps` ticks with `agent_count` agents and return the delivered count.
#[pyfunction]
#[pyo3(signature = (steps, agent_count, seed=None))]
fn run_simulation_bench(
    py: Python<'_>,
    steps: usize,
    agent_count: usize,
    seed: Option<u64>,
) -> PyResult<u64> {
    let mut sim = match seed {
        Some(seed) => Simulation::try_with_config(
            SimConfig {
                seed,
                ..SimConfig::default()
            },
            agent_count,
        )
        .map_err(value_error)?,
        None => Simulation::new(agent_count),
    };
    Ok(py.detach(|| {
        for _ in 0..steps {
            sim.update();
        }
        sim.delivered_count()
    }))
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySimulation>()?;
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(default_config_json, m)?)?;
    m.add_function(wrap_pyfunction!(run_simulation_bench, m)?)?;
    Ok(())
}
