// src/agent/min_cut.rs
//
// Defender that concentrates protection on the graph's vertex min-cut.

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::rng::GameRng;
use crate::state::DefenderAction;

use super::{is_prob, sample_distinct_uniform, select_count};

/// Same `(min, max, ratio)` clamping as the uniform defender, but the
/// candidate set is the precomputed min-cut node set.
#[derive(Debug, Clone)]
pub struct MinCutDefender {
    max_num_res: usize,
    min_num_res: usize,
    res_ratio: f64,
}

impl MinCutDefender {
    pub fn new(max_num_res: f64, min_num_res: f64, res_ratio: f64) -> Result<Self> {
        if max_num_res < 1.0 || min_num_res > max_num_res || !is_prob(res_ratio) {
            return Err(Error::invalid_config(
                "min-cut defender requires 1 <= max, min <= max and ratio in [0, 1]",
            ));
        }
        Ok(Self {
            max_num_res: max_num_res as usize,
            min_num_res: min_num_res.max(0.0) as usize,
            res_ratio,
        })
    }

    pub fn sample_action(&self, graph: &DependencyGraph, rng: &mut GameRng) -> DefenderAction {
        let candidates = graph.min_cut();
        let total = candidates.len();
        if total == 0 {
            return DefenderAction::new();
        }
        let goal = total as f64 * self.res_ratio;
        let count = select_count(self.min_num_res, self.max_num_res, total, goal);
        if count == 0 {
            return DefenderAction::new();
        }
        let indices = sample_distinct_uniform(rng, total, count);
        DefenderAction::from_ids(indices.into_iter().map(|idx| candidates[idx]))
    }
}
