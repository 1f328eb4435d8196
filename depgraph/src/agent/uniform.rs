// src/agent/uniform.rs
//
// Uniform-random baselines for both players.

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::rng::GameRng;
use crate::state::{AttackerAction, DefenderAction, GameState};

use super::{
    action_from_indices, is_prob, sample_distinct_uniform, select_candidate, select_count,
};

/// Attacker that strikes `k` uniformly chosen legal units per step, where
/// `k = clamp(ceil(ratio * |C|), min, max)` over the candidate set `C`.
#[derive(Debug, Clone)]
pub struct UniformAttacker {
    max_num_select: usize,
    min_num_select: usize,
    select_ratio: f64,
}

impl UniformAttacker {
    pub fn new(max_num_select: f64, min_num_select: f64, select_ratio: f64) -> Result<Self> {
        if min_num_select < 0.0 || max_num_select < min_num_select || !is_prob(select_ratio) {
            return Err(Error::invalid_config(
                "uniform attacker requires 0 <= min <= max and ratio in [0, 1]",
            ));
        }
        Ok(Self {
            max_num_select: max_num_select as usize,
            min_num_select: min_num_select as usize,
            select_ratio,
        })
    }

    pub fn sample_action(
        &self,
        graph: &DependencyGraph,
        state: &GameState,
        rng: &mut GameRng,
    ) -> AttackerAction {
        let candidate = select_candidate(graph, state);
        if candidate.is_empty() {
            return AttackerAction::new();
        }
        let total = candidate.total();
        let goal = total as f64 * self.select_ratio;
        let count = select_count(self.min_num_select, self.max_num_select, total, goal);
        if count == 0 {
            return AttackerAction::new();
        }
        let indices = sample_distinct_uniform(rng, total, count);
        action_from_indices(graph, &candidate, &indices)
    }
}

/// Defender that protects `k` uniformly chosen nodes per step, drawn from
/// the whole node set.
#[derive(Debug, Clone)]
pub struct UniformDefender {
    max_num_res: usize,
    min_num_res: usize,
    res_ratio: f64,
}

impl UniformDefender {
    pub fn new(max_num_res: f64, min_num_res: f64, res_ratio: f64) -> Result<Self> {
        if max_num_res < 1.0 || min_num_res > max_num_res || !is_prob(res_ratio) {
            return Err(Error::invalid_config(
                "uniform defender requires 1 <= max, min <= max and ratio in [0, 1]",
            ));
        }
        Ok(Self {
            max_num_res: max_num_res as usize,
            min_num_res: min_num_res.max(0.0) as usize,
            res_ratio,
        })
    }

    pub fn sample_action(&self, graph: &DependencyGraph, rng: &mut GameRng) -> DefenderAction {
        let total = graph.node_count();
        let goal = total as f64 * self.res_ratio;
        let count = select_count(self.min_num_res, self.max_num_res, total, goal);
        if count == 0 {
            return DefenderAction::new();
        }
        let indices = sample_distinct_uniform(rng, total, count);
        DefenderAction::from_ids(indices.into_iter().map(|idx| idx + 1))
    }
}
