// src/agent/mod.rs
//
// Attacker and defender policies.
//
// Each side is a sum type with one `sample_action` entry point; a factory
// builds variants from string descriptors (name + parameter map).

pub mod min_cut;
pub mod uniform;
pub mod value_propagation;

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::rng::GameRng;
use crate::state::{AttackerAction, DefenderAction, GameState};
use crate::types::{ActivationType, EdgeId, NodeId};

pub use min_cut::MinCutDefender;
pub use uniform::{UniformAttacker, UniformDefender};
pub use value_propagation::ValuePropagationAttacker;

/// An attacker policy variant.
#[derive(Debug, Clone)]
pub enum AttackerPolicy {
    Uniform(UniformAttacker),
    ValuePropagation(ValuePropagationAttacker),
}

impl AttackerPolicy {
    pub fn sample_action(
        &self,
        graph: &DependencyGraph,
        state: &GameState,
        cur_time_step: usize,
        num_time_step: usize,
        rng: &mut GameRng,
    ) -> AttackerAction {
        match self {
            AttackerPolicy::Uniform(policy) => policy.sample_action(graph, state, rng),
            AttackerPolicy::ValuePropagation(policy) => {
                policy.sample_action(graph, state, cur_time_step, num_time_step, rng)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttackerPolicy::Uniform(_) => "uniform",
            AttackerPolicy::ValuePropagation(_) => "valuePropagation",
        }
    }
}

/// A defender policy variant.
#[derive(Debug, Clone)]
pub enum DefenderPolicy {
    Uniform(UniformDefender),
    MinCut(MinCutDefender),
}

impl DefenderPolicy {
    pub fn sample_action(&self, graph: &DependencyGraph, rng: &mut GameRng) -> DefenderAction {
        match self {
            DefenderPolicy::Uniform(policy) => policy.sample_action(graph, rng),
            DefenderPolicy::MinCut(policy) => policy.sample_action(graph, rng),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DefenderPolicy::Uniform(_) => "uniform",
            DefenderPolicy::MinCut(_) => "minCut",
        }
    }
}

/// Build an attacker from a descriptor name + parameter map. `disc_fact`
/// comes from the simulation spec.
pub fn create_attacker(
    name: &str,
    params: &BTreeMap<String, f64>,
    disc_fact: f64,
) -> Result<AttackerPolicy> {
    match name {
        _ if name.eq_ignore_ascii_case("uniform") => Ok(AttackerPolicy::Uniform(
            UniformAttacker::new(
                param(params, "maxNumSelectCandidate")?,
                param(params, "minNumSelectCandidate")?,
                param(params, "numSelectCandidateRatio")?,
            )?,
        )),
        _ if name.eq_ignore_ascii_case("valuePropagation") => Ok(AttackerPolicy::ValuePropagation(
            ValuePropagationAttacker::new(
                param(params, "maxNumSelectCandidate")?,
                param(params, "minNumSelectCandidate")?,
                param(params, "numSelectCandidateRatio")?,
                param(params, "qrParam")?,
                disc_fact,
                param(params, "numCandStdev")?,
            )?,
        )),
        _ => Err(Error::invalid_config(format!(
            "unknown attacker policy: {name}"
        ))),
    }
}

/// Build a defender from a descriptor name + parameter map.
pub fn create_defender(
    name: &str,
    params: &BTreeMap<String, f64>,
    _disc_fact: f64,
) -> Result<DefenderPolicy> {
    match name {
        _ if name.eq_ignore_ascii_case("uniform") => {
            Ok(DefenderPolicy::Uniform(UniformDefender::new(
                param(params, "maxNumRes")?,
                param(params, "minNumRes")?,
                param(params, "numResRatio")?,
            )?))
        }
        _ if name.eq_ignore_ascii_case("minCut") => {
            Ok(DefenderPolicy::MinCut(MinCutDefender::new(
                param(params, "maxNumRes")?,
                param(params, "minNumRes")?,
                param(params, "numResRatio")?,
            )?))
        }
        _ => Err(Error::invalid_config(format!(
            "unknown defender policy: {name}"
        ))),
    }
}

fn param(params: &BTreeMap<String, f64>, key: &str) -> Result<f64> {
    params
        .get(key)
        .copied()
        .ok_or_else(|| Error::invalid_config(format!("missing parameter: {key}")))
}

/// The attacker's legal one-unit moves at a given state: edge strikes into
/// OR nodes first, then AND node strikes, both ascending by id. This
/// ordering is the index space shared by value tables and samplers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttackCandidate {
    edge_candidates: Vec<EdgeId>,
    node_candidates: Vec<NodeId>,
}

impl AttackCandidate {
    /// Assemble a candidate set directly. `select_candidate` is the normal
    /// path; this is for scoring hand-picked units.
    pub fn from_parts(mut edge_candidates: Vec<EdgeId>, mut node_candidates: Vec<NodeId>) -> Self {
        edge_candidates.sort_unstable();
        node_candidates.sort_unstable();
        Self {
            edge_candidates,
            node_candidates,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edge_candidates.is_empty() && self.node_candidates.is_empty()
    }

    pub fn total(&self) -> usize {
        self.edge_candidates.len() + self.node_candidates.len()
    }

    pub fn edge_candidates(&self) -> &[EdgeId] {
        &self.edge_candidates
    }

    pub fn node_candidates(&self) -> &[NodeId] {
        &self.node_candidates
    }
}

/// Compute the attacker's candidate set:
/// - an INACTIVE AND node with every in-edge source ACTIVE is a node
///   candidate;
/// - every in-edge of an INACTIVE OR node whose source is ACTIVE is an
///   edge candidate.
/// If every target is already ACTIVE the set is empty: there is nothing
/// left worth attacking.
pub fn select_candidate(graph: &DependencyGraph, state: &GameState) -> AttackCandidate {
    let all_targets_active = graph
        .target_set()
        .iter()
        .all(|&target| state.is_active(target));
    if all_targets_active {
        return AttackCandidate::default();
    }

    let mut candidate = AttackCandidate::default();
    for node in graph.nodes() {
        if state.is_active(node.id) {
            continue;
        }
        match node.activation_type {
            ActivationType::And => {
                let parents_active = graph
                    .incoming_edges_of(node.id)
                    .iter()
                    .all(|&eid| state.is_active(graph.edge(eid).source));
                if parents_active {
                    candidate.node_candidates.push(node.id);
                }
            }
            ActivationType::Or => {
                for &eid in graph.incoming_edges_of(node.id) {
                    if state.is_active(graph.edge(eid).source) {
                        candidate.edge_candidates.push(eid);
                    }
                }
            }
        }
    }
    candidate.edge_candidates.sort_unstable();
    candidate
}

/// Number of units to select: `|C|` when below the minimum, otherwise the
/// goal clamped into `[min, max]` and capped at `|C|` so distinct sampling
/// always terminates.
pub(crate) fn select_count(min_num: usize, max_num: usize, total: usize, goal: f64) -> usize {
    if total < min_num {
        return total;
    }
    let goal = goal.ceil().max(0.0) as usize;
    goal.clamp(min_num, max_num).min(total)
}

/// Draw `k` distinct indices from `{0, ..., total-1}` uniformly, by
/// rejection of repeats.
pub(crate) fn sample_distinct_uniform(rng: &mut GameRng, total: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= total);
    let mut chosen = vec![false; total];
    let mut picked = Vec::with_capacity(k);
    while picked.len() < k {
        let idx = rng.below(total);
        if !chosen[idx] {
            chosen[idx] = true;
            picked.push(idx);
        }
    }
    picked
}

/// Draw `k` distinct indices from the categorical distribution `probs`, by
/// rejection of repeats. Every entry must be strictly positive (quantal
/// response guarantees this).
pub(crate) fn sample_distinct_weighted(rng: &mut GameRng, probs: &[f64], k: usize) -> Vec<usize> {
    debug_assert!(k <= probs.len());
    let mut chosen = vec![false; probs.len()];
    let mut picked = Vec::with_capacity(k);
    while picked.len() < k {
        let idx = categorical_draw(rng, probs);
        if !chosen[idx] {
            chosen[idx] = true;
            picked.push(idx);
        }
    }
    picked
}

fn categorical_draw(rng: &mut GameRng, probs: &[f64]) -> usize {
    let draw = rng.unit();
    let mut total = 0.0;
    for (idx, &p) in probs.iter().enumerate() {
        total += p;
        if draw <= total {
            return idx;
        }
    }
    probs.len() - 1
}

/// Turn chosen candidate indices into an `AttackerAction`. Indices below
/// the edge-candidate count are edge strikes; the rest are AND strikes.
pub(crate) fn action_from_indices(
    graph: &DependencyGraph,
    candidate: &AttackCandidate,
    indices: &[usize],
) -> AttackerAction {
    let mut action = AttackerAction::new();
    let edge_count = candidate.edge_candidates.len();
    for &idx in indices {
        if idx < edge_count {
            let eid = candidate.edge_candidates[idx];
            action.add_or_node_attack(graph.edge(eid).target, eid);
        } else {
            action.add_and_node_attack(candidate.node_candidates[idx - edge_count]);
        }
    }
    action
}

pub(crate) fn is_prob(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}
