// src/rl/observation.rs
//
// Dense numeric encodings of the raw observations, consumed by external
// learners. Layouts are fixed and documented per player; ordering is
// deterministic (ascending ids, most recent history frame first).

use std::collections::BTreeSet;

use crate::engine::GameSimulation;
use crate::state::ATTACKER_OBS_LENGTH;
use crate::types::{EdgeId, NodeId};

/// Defender vector length: `4N`.
pub fn defender_observation_len(node_count: usize) -> usize {
    4 * node_count
}

/// Attacker vector length:
/// `2(|AND| + |E_OR|) + N * ATTACKER_OBS_LENGTH + 1`.
pub fn attacker_observation_len(
    and_node_count: usize,
    edge_to_or_count: usize,
    node_count: usize,
) -> usize {
    2 * (and_node_count + edge_to_or_count) + node_count * ATTACKER_OBS_LENGTH + 1
}

/// Defender encoding, in blocks of `N`:
/// 1. observed-ACTIVE indicator from the latest noisy observation,
/// 2. protected-last-step indicator,
/// 3. currently-pending indicator,
/// 4. `timeStepsLeft` copies.
pub fn encode_defender_observation(
    sim: &GameSimulation,
    pending: &BTreeSet<NodeId>,
) -> Vec<f64> {
    let node_count = sim.node_count();
    let mut out = Vec::with_capacity(defender_observation_len(node_count));

    let obs = sim.defender_observation();
    for id in 1..=node_count {
        out.push(indicator(obs.is_observed_active(id)));
    }
    for id in 1..=node_count {
        let defended = sim
            .last_defender_action()
            .map(|action| action.is_protected(id))
            .unwrap_or(false);
        out.push(indicator(defended));
    }
    for id in 1..=node_count {
        out.push(indicator(pending.contains(&id)));
    }
    let time_steps_left = obs.time_steps_left() as f64;
    for _ in 0..node_count {
        out.push(time_steps_left);
    }
    out
}

/// Attacker encoding:
/// 1. pending indicators over AND nodes then edges-to-OR (ascending ids),
/// 2. legality indicators over the same id spaces,
/// 3. `ATTACKER_OBS_LENGTH` frames of per-node ACTIVE indicators, most
///    recent first, zero-padded where history is short,
/// 4. `timeStepsLeft`.
pub fn encode_attacker_observation(
    sim: &GameSimulation,
    pending_nodes: &BTreeSet<NodeId>,
    pending_edges: &BTreeSet<EdgeId>,
) -> Vec<f64> {
    let node_count = sim.node_count();
    let obs = sim.attacker_observation();
    let mut out = Vec::with_capacity(attacker_observation_len(
        sim.and_node_ids().len(),
        sim.edge_to_or_node_ids().len(),
        node_count,
    ));

    for id in sim.and_node_ids() {
        out.push(indicator(pending_nodes.contains(id)));
    }
    for id in sim.edge_to_or_node_ids() {
        out.push(indicator(pending_edges.contains(id)));
    }

    for id in sim.and_node_ids() {
        out.push(indicator(obs.legal_and_node_ids().contains(id)));
    }
    for id in sim.edge_to_or_node_ids() {
        out.push(indicator(obs.legal_edge_ids().contains(id)));
    }

    // History frames, most recent first.
    let history = obs.active_node_ids_history();
    for frame in history.iter().rev() {
        for id in 1..=node_count {
            out.push(indicator(frame.contains(&id)));
        }
    }

    out.push(obs.time_steps_left() as f64);
    out
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GameSimulation;
    use crate::graph::testing::or_chain;

    fn sim() -> GameSimulation {
        GameSimulation::new(or_chain(4, 10.0, -1.0, 1.0), 3, 0.9, 5).unwrap()
    }

    #[test]
    fn defender_vector_has_documented_layout() {
        let sim = sim();
        let pending: BTreeSet<NodeId> = [2, 4].into_iter().collect();
        let obs = encode_defender_observation(&sim, &pending);
        assert_eq!(obs.len(), defender_observation_len(4));
        // No steps taken: nothing observed, nothing defended.
        assert_eq!(&obs[0..4], &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(&obs[4..8], &[0.0, 0.0, 0.0, 0.0]);
        // Pending indicators for nodes 2 and 4.
        assert_eq!(&obs[8..12], &[0.0, 1.0, 0.0, 1.0]);
        // Full clock.
        assert_eq!(&obs[12..16], &[3.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn attacker_vector_has_documented_layout() {
        let sim = sim();
        // or_chain has no AND nodes; 3 edges all target OR nodes.
        assert!(sim.and_node_ids().is_empty());
        assert_eq!(sim.edge_to_or_node_ids().len(), 3);

        let pending_edges: BTreeSet<EdgeId> = [2].into_iter().collect();
        let obs = encode_attacker_observation(&sim, &BTreeSet::new(), &pending_edges);
        assert_eq!(obs.len(), attacker_observation_len(0, 3, 4));

        // Pending block: edge 2 only.
        assert_eq!(&obs[0..3], &[0.0, 1.0, 0.0]);
        // Legality block: only edge 1 is attackable off the foothold.
        assert_eq!(&obs[3..6], &[1.0, 0.0, 0.0]);
        // Newest history frame is all-zero at reset (history frames record
        // post-step states; none exist yet).
        assert_eq!(&obs[6..10], &[0.0, 0.0, 0.0, 0.0]);
        // Clock.
        assert_eq!(obs[obs.len() - 1], 3.0);
    }

    #[test]
    fn history_frames_shift_after_steps() {
        let mut sim = sim();
        sim.step(
            &BTreeSet::new(),
            &BTreeSet::new(),
            &[1].into_iter().collect(),
        )
        .unwrap();
        let obs = encode_attacker_observation(&sim, &BTreeSet::new(), &BTreeSet::new());
        // Most recent frame marks nodes 1 and 2 active.
        assert_eq!(&obs[6..10], &[1.0, 1.0, 0.0, 0.0]);
        // Second frame is the zero padding.
        assert_eq!(&obs[10..14], &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(obs[obs.len() - 1], 2.0);
    }
}
