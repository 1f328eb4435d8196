// depgraph_env/src/lib.rs
//
// Python bindings for the depgraph greedy RL environments.
//
// Gym-style gateway for training external agents:
// - DefenderEnv / AttackerEnv: reset(seed) -> obs, step(action) -> flat
//   vector (observation ‖ reward ‖ done), render() -> str
//
// All operations are deterministic given seeds.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use depgraph::loader::{load_attacker_mixed_strategy, load_defender_mixed_strategy};
use depgraph::{
    load_graph, load_spec, GameSimulation, GreedyAttackerEnv, GreedyDefenderEnv, GreedyEnvConfig,
    StepResult,
};

fn to_py_err(err: depgraph::Error) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Flatten a step result: observation, then reward, then done as 0/1.
fn flatten(result: StepResult) -> Vec<f64> {
    let mut out = result.observation;
    out.push(result.reward);
    out.push(if result.done { 1.0 } else { 0.0 });
    out
}

/// Defender-side greedy environment.
///
/// Actions 1..=N add a node to the pending protect set; N + 1 commits.
/// The attacker opponent is drawn per episode from a mixed strategy file.
#[pyclass]
pub struct DefenderEnv {
    inner: GreedyDefenderEnv,
}

#[pymethods]
impl DefenderEnv {
    /// Build the environment from a graph file, a simulation spec file,
    /// and an attacker mixed-strategy file.
    #[new]
    #[pyo3(signature = (
        graph_path,
        spec_path,
        att_mixed_strat_path,
        prob_greedy_selection_cutoff = 0.1,
        lose_if_repeat = false,
    ))]
    fn new(
        graph_path: &str,
        spec_path: &str,
        att_mixed_strat_path: &str,
        prob_greedy_selection_cutoff: f64,
        lose_if_repeat: bool,
    ) -> PyResult<Self> {
        let spec = load_spec(spec_path).map_err(to_py_err)?;
        let graph = load_graph(graph_path).map_err(to_py_err)?;
        let opponents =
            load_attacker_mixed_strategy(att_mixed_strat_path, spec.disc_fact).map_err(to_py_err)?;
        let sim = GameSimulation::new(graph, spec.num_time_step, spec.disc_fact, 0)
            .map_err(to_py_err)?;
        let inner = GreedyDefenderEnv::new(
            sim,
            opponents,
            GreedyEnvConfig {
                prob_greedy_selection_cutoff,
                lose_if_repeat,
            },
        )
        .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Reset the episode; returns the dense observation vector.
    #[pyo3(signature = (seed = None))]
    fn reset(&mut self, seed: Option<u64>) -> Vec<f64> {
        self.inner.reset(seed)
    }

    /// Take one micro-step; returns observation ‖ reward ‖ done.
    fn step(&mut self, action: usize) -> Vec<f64> {
        flatten(self.inner.step(action))
    }

    /// Human-readable game state snapshot.
    fn render(&self) -> String {
        self.inner.render()
    }

    #[getter]
    fn num_actions(&self) -> usize {
        self.inner.num_actions()
    }

    #[getter]
    fn observation_len(&self) -> usize {
        self.inner.observation_len()
    }

    #[getter]
    fn pass_action(&self) -> usize {
        self.inner.pass_action()
    }
}

/// Attacker-side greedy environment.
///
/// Actions 1..=|AND| map to AND nodes, the next |E_OR| to edges into OR
/// nodes, and the last action commits. The defender opponent is drawn per
/// episode from a mixed strategy file.
#[pyclass]
pub struct AttackerEnv {
    inner: GreedyAttackerEnv,
}

#[pymethods]
impl AttackerEnv {
    /// Build the environment from a graph file, a simulation spec file,
    /// and a defender mixed-strategy file.
    #[new]
    #[pyo3(signature = (
        graph_path,
        spec_path,
        def_mixed_strat_path,
        prob_greedy_selection_cutoff = 0.1,
        lose_if_repeat = false,
    ))]
    fn new(
        graph_path: &str,
        spec_path: &str,
        def_mixed_strat_path: &str,
        prob_greedy_selection_cutoff: f64,
        lose_if_repeat: bool,
    ) -> PyResult<Self> {
        let spec = load_spec(spec_path).map_err(to_py_err)?;
        let graph = load_graph(graph_path).map_err(to_py_err)?;
        let opponents =
            load_defender_mixed_strategy(def_mixed_strat_path, spec.disc_fact).map_err(to_py_err)?;
        let sim = GameSimulation::new(graph, spec.num_time_step, spec.disc_fact, 0)
            .map_err(to_py_err)?;
        let inner = GreedyAttackerEnv::new(
            sim,
            opponents,
            GreedyEnvConfig {
                prob_greedy_selection_cutoff,
                lose_if_repeat,
            },
        )
        .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Reset the episode; returns the dense observation vector.
    #[pyo3(signature = (seed = None))]
    fn reset(&mut self, seed: Option<u64>) -> Vec<f64> {
        self.inner.reset(seed)
    }

    /// Take one micro-step; returns observation ‖ reward ‖ done.
    fn step(&mut self, action: usize) -> Vec<f64> {
        flatten(self.inner.step(action))
    }

    /// Human-readable game state snapshot.
    fn render(&self) -> String {
        self.inner.render()
    }

    #[getter]
    fn num_actions(&self) -> usize {
        self.inner.num_actions()
    }

    #[getter]
    fn observation_len(&self) -> usize {
        self.inner.observation_len()
    }

    #[getter]
    fn pass_action(&self) -> usize {
        self.inner.pass_action()
    }
}

/// Python module definition.
#[pymodule]
fn depgraph_env(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<DefenderEnv>()?;
    m.add_class::<AttackerEnv>()?;
    Ok(())
}
