// src/agent/value_propagation.rs
//
// Value-propagation attacker: scores each candidate unit by the discounted
// expected reward it can still unlock, then samples a quantal-response
// distribution over the scores.
//
// The scoring walks the DAG in reverse topological order, filling a table
// r[t][h][i]: the value node i carries toward inactive target t when the
// target is reached in exactly h further steps. With `USE_MAX_ONLY` the
// table keeps the best propagation path; the sum variant (disabled) adds
// positive contributions instead.

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::rng::GameRng;
use crate::state::{AttackerAction, GameState};
use crate::types::{ActivationType, NodeId};

use super::{
    action_from_indices, is_prob, sample_distinct_weighted, select_candidate, select_count,
    AttackCandidate,
};

/// Damps AND-node propagation by the count of still-inactive prerequisites.
const PROPAGATION_PARAM: f64 = 0.5;

/// Keep only the best propagation path per (target, horizon, node). The
/// sum variant accumulates positive contributions instead; it is disabled
/// and kept only so the accumulation rule stays documented in code.
const USE_MAX_ONLY: bool = true;

#[derive(Debug, Clone)]
pub struct ValuePropagationAttacker {
    max_num_select: usize,
    min_num_select: usize,
    select_ratio: f64,
    qr_param: f64,
    disc_fact: f64,
    num_cand_stdev: f64,
}

impl ValuePropagationAttacker {
    pub fn new(
        max_num_select: f64,
        min_num_select: f64,
        select_ratio: f64,
        qr_param: f64,
        disc_fact: f64,
        num_cand_stdev: f64,
    ) -> Result<Self> {
        if min_num_select < 1.0
            || max_num_select < min_num_select
            || !is_prob(select_ratio)
            || num_cand_stdev < 0.0
            || qr_param < 0.0
        {
            return Err(Error::invalid_config(
                "value-propagation attacker requires 1 <= min <= max, ratio in [0, 1], \
                 qrParam >= 0 and numCandStdev >= 0",
            ));
        }
        if disc_fact <= 0.0 || disc_fact > 1.0 {
            return Err(Error::invalid_config("discFact must be in (0, 1]"));
        }
        Ok(Self {
            max_num_select: max_num_select as usize,
            min_num_select: min_num_select as usize,
            select_ratio,
            qr_param,
            disc_fact,
            num_cand_stdev,
        })
    }

    pub fn sample_action(
        &self,
        graph: &DependencyGraph,
        state: &GameState,
        cur_time_step: usize,
        num_time_step: usize,
        rng: &mut GameRng,
    ) -> AttackerAction {
        assert!(
            cur_time_step >= 1 && num_time_step >= cur_time_step,
            "time step out of range"
        );
        let candidate = select_candidate(graph, state);
        if candidate.is_empty() {
            return AttackerAction::new();
        }

        let values = self.candidate_values(graph, state, &candidate, cur_time_step, num_time_step);
        let total = candidate.total();

        let noise = rng.normal(0.0, self.num_cand_stdev);
        let goal = total as f64 * self.select_ratio + noise;
        let count = select_count(self.min_num_select, self.max_num_select, total, goal);
        if count == 0 {
            return AttackerAction::new();
        }

        let probs = quantal_response_probs(&values, self.qr_param);
        let indices = sample_distinct_weighted(rng, &probs, count);
        action_from_indices(graph, &candidate, &indices)
    }

    /// Score every candidate: `γ^(curTimeStep-1) · (cost + actProb · S)`,
    /// where `S` is the propagated value at the candidate's target node.
    pub fn candidate_values(
        &self,
        graph: &DependencyGraph,
        state: &GameState,
        candidate: &AttackCandidate,
        cur_time_step: usize,
        num_time_step: usize,
    ) -> Vec<f64> {
        let propagated = propagate_values(
            graph,
            state,
            cur_time_step,
            num_time_step,
            self.disc_fact,
            PROPAGATION_PARAM,
            USE_MAX_ONLY,
        );
        let discount = self.disc_fact.powi(cur_time_step as i32 - 1);

        let mut values = Vec::with_capacity(candidate.total());
        for &eid in candidate.edge_candidates() {
            let edge = graph.edge(eid);
            values.push(discount * (edge.a_cost + edge.act_prob * propagated[edge.target - 1]));
        }
        for &node_id in candidate.node_candidates() {
            let node = graph.node(node_id);
            values.push(discount * (node.a_cost + node.act_prob * propagated[node_id - 1]));
        }
        values
    }
}

/// Run the reverse-topological propagation and collapse over targets and
/// horizons. Returns one score per node, indexed by `node_id - 1`.
pub(crate) fn propagate_values(
    graph: &DependencyGraph,
    state: &GameState,
    cur_time_step: usize,
    num_time_step: usize,
    disc_fact: f64,
    propagation_param: f64,
    use_max_only: bool,
) -> Vec<f64> {
    let n = graph.node_count();
    let horizon = num_time_step - cur_time_step;

    let inactive_targets: Vec<NodeId> = graph
        .target_set()
        .iter()
        .copied()
        .filter(|&target| !state.is_active(target))
        .collect();

    // r[t][h][i]: value of node i toward inactive target t at horizon h.
    let mut r = vec![vec![vec![0.0f64; n]; horizon + 1]; inactive_targets.len()];
    for (t_index, &target) in inactive_targets.iter().enumerate() {
        r[t_index][0][target - 1] = graph.node(target).a_reward;
    }

    let topo = graph.topo_order();
    for &cur_id in topo.iter().rev() {
        if state.is_active(cur_id) {
            continue;
        }
        for &eid in graph.outgoing_edges_of(cur_id) {
            let edge = graph.edge(eid);
            let child = graph.node(edge.target);
            if state.is_active(child.id) {
                continue;
            }
            let inactive_in_edges = graph
                .incoming_edges_of(child.id)
                .iter()
                .filter(|&&in_eid| !state.is_active(graph.edge(in_eid).source))
                .count()
                .max(1);
            for t_index in 0..inactive_targets.len() {
                for h in 1..=horizon {
                    let r_hat = match child.activation_type {
                        ActivationType::Or => {
                            r[t_index][h - 1][child.id - 1] * edge.act_prob + edge.a_cost
                        }
                        ActivationType::And => {
                            let raw =
                                r[t_index][h - 1][child.id - 1] * child.act_prob + child.a_cost;
                            raw / (inactive_in_edges as f64).powf(propagation_param)
                        }
                    };
                    if use_max_only {
                        let cell = &mut r[t_index][h][cur_id - 1];
                        if *cell < disc_fact * r_hat {
                            *cell = disc_fact * r_hat;
                        }
                    } else if r_hat > 0.0 {
                        r[t_index][h][cur_id - 1] += disc_fact * r_hat;
                    }
                }
            }
        }
    }

    // Collapse over (target, horizon).
    let mut collapsed = vec![0.0f64; n];
    for target_table in &r {
        for horizon_row in target_table {
            for (i, &value) in horizon_row.iter().enumerate() {
                if use_max_only {
                    if collapsed[i] < value {
                        collapsed[i] = value;
                    }
                } else if value > 0.0 {
                    collapsed[i] += value;
                }
            }
        }
    }
    collapsed
}

/// Min-max normalize in place; a constant vector maps to all zeros, which
/// makes the quantal response uniform.
fn min_max_normalize(values: &mut [f64]) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        values.iter_mut().for_each(|v| *v = 0.0);
    } else {
        values.iter_mut().for_each(|v| *v = (*v - min) / (max - min));
    }
}

/// Quantal-response distribution over candidate values:
/// `p_i ∝ exp(qrParam · v̄_i)` with `v̄` min-max normalized to [0, 1].
pub fn quantal_response_probs(values: &[f64], qr_param: f64) -> Vec<f64> {
    assert!(!values.is_empty() && qr_param >= 0.0);
    let mut normalized = values.to_vec();
    min_max_normalize(&mut normalized);

    let mut probs: Vec<f64> = normalized.iter().map(|&v| (qr_param * v).exp()).collect();
    let total: f64 = probs.iter().sum();
    probs.iter_mut().for_each(|p| *p /= total);

    debug_assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-4);
    debug_assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    probs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::{edge, node};
    use crate::graph::DependencyGraph;
    use crate::types::{NodeState, NodeType};

    fn policy(qr_param: f64, disc_fact: f64) -> ValuePropagationAttacker {
        ValuePropagationAttacker::new(3.0, 1.0, 0.5, qr_param, disc_fact, 0.0).unwrap()
    }

    /// Two OR nodes, foothold -> target, reward 10, edge prob 0.5, cost -1.
    fn foothold_target() -> DependencyGraph {
        let mut nodes = vec![
            node(1, 0, ActivationType::Or, NodeType::NonTarget),
            node(2, 1, ActivationType::Or, NodeType::Target),
        ];
        nodes[0].initial_state = NodeState::Active;
        nodes[1].a_reward = 10.0;
        let edges = vec![edge(1, 1, 2, -1.0, 0.5)];
        DependencyGraph::new(nodes, edges, None).unwrap()
    }

    /// Chain 1 -> 2 -> 3, all OR, 3 a target with reward 10; both edges
    /// prob 0.5, cost -1.
    fn or_chain_three() -> DependencyGraph {
        let mut nodes = vec![
            node(1, 0, ActivationType::Or, NodeType::NonTarget),
            node(2, 1, ActivationType::Or, NodeType::NonTarget),
            node(3, 2, ActivationType::Or, NodeType::Target),
        ];
        nodes[2].a_reward = 10.0;
        let edges = vec![edge(1, 1, 2, -1.0, 0.5), edge(2, 2, 3, -1.0, 0.5)];
        DependencyGraph::new(nodes, edges, None).unwrap()
    }

    #[test]
    fn single_edge_candidate_scores_expected_value() {
        // One step of lookahead: value = 1 * (-1 + 0.5 * 10) = 4, and with
        // qrParam = 0 the single candidate gets probability 1.
        let graph = foothold_target();
        let state = GameState::initial(&graph);
        let attacker = policy(0.0, 1.0);
        let candidate = select_candidate(&graph, &state);
        assert_eq!(candidate.edge_candidates(), &[1]);

        let values = attacker.candidate_values(&graph, &state, &candidate, 1, 2);
        assert!((values[0] - 4.0).abs() < 1e-12);

        let probs = quantal_response_probs(&values, 0.0);
        assert_eq!(probs, vec![1.0]);
    }

    #[test]
    fn chain_propagation_matches_hand_computation() {
        // Horizon 2, nothing active: the table gives node 2 the one-step
        // value 4 and node 1 the two-step value 0.5 * 4 - 1 = 1.
        let graph = or_chain_three();
        let state = GameState::empty();
        let propagated = propagate_values(&graph, &state, 1, 3, 1.0, PROPAGATION_PARAM, true);
        assert!((propagated[2] - 10.0).abs() < 1e-12);
        assert!((propagated[1] - 4.0).abs() < 1e-12);
        assert!((propagated[0] - 1.0).abs() < 1e-12);

        let attacker = policy(0.0, 1.0);
        let candidate = AttackCandidate::from_parts(vec![1, 2], vec![]);
        let values = attacker.candidate_values(&graph, &state, &candidate, 1, 3);
        // Edge (1,2) unlocks node 2's value; edge (2,3) unlocks the target.
        assert!((values[0] - 1.0).abs() < 1e-12);
        assert!((values[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn candidate_toward_active_target_scores_pure_cost() {
        // Node 2 already ACTIVE: no reward can propagate through it, so a
        // forced strike on edge (1,2) is worth its discounted cost alone.
        let graph = or_chain_three();
        let state = GameState::with_active([2].into_iter().collect());
        let attacker = policy(0.0, 1.0);
        let candidate = AttackCandidate::from_parts(vec![1], vec![]);
        let values = attacker.candidate_values(&graph, &state, &candidate, 1, 3);
        assert!((values[0] - (-1.0)).abs() < 1e-12);
    }

    #[test]
    fn and_child_value_is_damped_by_inactive_prerequisites() {
        // 1, 2 OR footholds feed AND target 3 (act_prob 1, cost -1,
        // reward 8). With only node 1 active, node 2's propagated value is
        // (8 * 1 - 1) / sqrt(1) = 7 at horizon 1 (node 2 is the only
        // inactive prerequisite).
        let mut nodes = vec![
            node(1, 0, ActivationType::Or, NodeType::NonTarget),
            node(2, 1, ActivationType::Or, NodeType::NonTarget),
            node(3, 2, ActivationType::And, NodeType::Target),
        ];
        nodes[0].initial_state = NodeState::Active;
        nodes[2].a_reward = 8.0;
        nodes[2].a_cost = -1.0;
        let edges = vec![edge(1, 1, 3, -0.5, 1.0), edge(2, 2, 3, -0.5, 1.0)];
        let graph = DependencyGraph::new(nodes, edges, None).unwrap();

        let state = GameState::initial(&graph);
        let propagated = propagate_values(&graph, &state, 1, 3, 1.0, PROPAGATION_PARAM, true);
        assert!((propagated[1] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn discount_applies_per_elapsed_step() {
        let graph = foothold_target();
        let state = GameState::initial(&graph);
        let attacker = policy(0.0, 0.5);
        let candidate = select_candidate(&graph, &state);
        // At curTimeStep 2 the same unit is worth gamma^1 times the base
        // score computed with gamma-discounted propagation.
        let values = attacker.candidate_values(&graph, &state, &candidate, 2, 3);
        assert!((values[0] - 0.5 * (-1.0 + 0.5 * 10.0)).abs() < 1e-12);
    }

    #[test]
    fn quantal_response_is_normalized_and_bounded() {
        let probs = quantal_response_probs(&[3.0, -1.0, 0.5, 2.0], 2.0);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-4);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn zero_qr_param_is_uniform() {
        let probs = quantal_response_probs(&[3.0, -1.0, 0.5], 0.0);
        for &p in &probs {
            assert!((p - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn equal_values_are_uniform_at_any_qr() {
        let probs = quantal_response_probs(&[2.0, 2.0, 2.0, 2.0], 50.0);
        for &p in &probs {
            assert!((p - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn high_qr_param_prefers_the_best_candidate() {
        let probs = quantal_response_probs(&[5.0, 1.0], 20.0);
        assert!(probs[0] > 0.99);
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        assert!(ValuePropagationAttacker::new(3.0, 0.0, 0.5, 1.0, 0.9, 0.0).is_err());
        assert!(ValuePropagationAttacker::new(1.0, 2.0, 0.5, 1.0, 0.9, 0.0).is_err());
        assert!(ValuePropagationAttacker::new(3.0, 1.0, 1.5, 1.0, 0.9, 0.0).is_err());
        assert!(ValuePropagationAttacker::new(3.0, 1.0, 0.5, -1.0, 0.9, 0.0).is_err());
        assert!(ValuePropagationAttacker::new(3.0, 1.0, 0.5, 1.0, 0.0, 0.0).is_err());
        assert!(ValuePropagationAttacker::new(3.0, 1.0, 0.5, 1.0, 0.9, -0.1).is_err());
    }

    #[test]
    fn empty_candidate_set_yields_empty_action() {
        let graph = foothold_target();
        let state = GameState::with_active([1, 2].into_iter().collect());
        let attacker = policy(1.0, 0.9);
        let mut rng = GameRng::seed_from_u64(0);
        let action = attacker.sample_action(&graph, &state, 1, 2, &mut rng);
        assert!(action.is_empty());
    }

    #[test]
    fn sampled_action_respects_count_bounds() {
        let graph = or_chain_three();
        let state = GameState::with_active([1].into_iter().collect());
        let attacker = ValuePropagationAttacker::new(1.0, 1.0, 1.0, 5.0, 0.9, 0.0).unwrap();
        let mut rng = GameRng::seed_from_u64(3);
        let action = attacker.sample_action(&graph, &state, 1, 4, &mut rng);
        let strikes =
            action.attacked_and_node_ids().len() + action.attacked_edge_to_or_node_ids().len();
        assert_eq!(strikes, 1);
    }
}
