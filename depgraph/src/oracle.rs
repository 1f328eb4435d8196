// src/oracle.rs
//
// Stochastic game oracle: the joint state transition and the defender's
// noisy observation. Both are pure functions of (graph, state, actions,
// rng); all episode bookkeeping lives in the engine.

use std::collections::BTreeSet;

use crate::graph::DependencyGraph;
use crate::rng::GameRng;
use crate::state::{AttackerAction, DefenderAction, DefenderObservation, GameState};
use crate::types::NodeId;

/// Sample the post-step state.
///
/// Per-node rules, independent across nodes:
/// - a protected node ends the step INACTIVE with certainty, and is immune
///   to activation this step (protection is per-step, not persistent);
/// - an already-ACTIVE unprotected node stays ACTIVE;
/// - a struck AND node activates with its `act_prob` iff every in-edge
///   source is ACTIVE in the pre-step state;
/// - each struck edge into an OR node is an independent trial with the
///   edge's `act_prob`, counted only when its source is ACTIVE; the node
///   activates if any trial succeeds.
pub fn sample_next_state(
    graph: &DependencyGraph,
    state: &GameState,
    att_action: &AttackerAction,
    def_action: &DefenderAction,
    rng: &mut GameRng,
) -> GameState {
    let mut next: BTreeSet<NodeId> = state
        .enabled_ids()
        .filter(|&id| !def_action.is_protected(id))
        .collect();

    for (&node_id, edge_ids) in att_action.strikes() {
        if def_action.is_protected(node_id) {
            continue;
        }
        if edge_ids.is_empty() {
            // AND strike on the node itself.
            let node = graph.node(node_id);
            let parents_active = graph
                .incoming_edges_of(node_id)
                .iter()
                .all(|&eid| state.is_active(graph.edge(eid).source));
            if parents_active && rng.unit() < node.act_prob {
                next.insert(node_id);
            }
        } else {
            // OR strikes, one trial per attacked in-edge.
            for &eid in edge_ids {
                let edge = graph.edge(eid);
                if state.is_active(edge.source) && rng.unit() < edge.act_prob {
                    next.insert(node_id);
                }
            }
        }
    }

    GameState::with_active(next)
}

/// Sample the defender's noisy observation of `state`.
///
/// Each node reports "observed ACTIVE" with its `p_active` rate when truly
/// ACTIVE and its `p_inactive` rate when truly INACTIVE.
pub fn sample_defender_observation(
    graph: &DependencyGraph,
    state: &GameState,
    rng: &mut GameRng,
    time_steps_left: usize,
) -> DefenderObservation {
    let mut observed = BTreeSet::new();
    for node in graph.nodes() {
        let rate = if state.is_active(node.id) {
            node.p_active
        } else {
            node.p_inactive
        };
        if rng.unit() < rate {
            observed.insert(node.id);
        }
    }
    DefenderObservation::new(observed, time_steps_left)
}
