// src/state.rs
//
// Per-step value objects: game state, player actions, observations.
//
// All of these are created per step and owned by the engine's episode
// history. Sets are BTree-backed so iteration order (and therefore every
// derived encoding and hash) is deterministic.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{EdgeId, NodeId};

/// How many historical active-set frames the attacker observes.
pub const ATTACKER_OBS_LENGTH: usize = 3;

/// FNV-1a over a byte stream; used for cheap content-hash identities.
fn fnv1a64(bytes: impl IntoIterator<Item = u8>) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut h = FNV_OFFSET;
    for b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// The set of ACTIVE (compromised) nodes, with a stable content hash.
///
/// Two states with equal active sets share the same identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    active: BTreeSet<NodeId>,
    id: u64,
}

impl GameState {
    /// Fresh state with nothing compromised.
    pub fn empty() -> Self {
        Self::with_active(BTreeSet::new())
    }

    /// Episode-start state: the nodes the graph file marks ACTIVE (the
    /// attacker's initial footholds).
    pub fn initial(graph: &crate::graph::DependencyGraph) -> Self {
        Self::with_active(
            graph
                .nodes()
                .iter()
                .filter(|node| node.initial_state.is_active())
                .map(|node| node.id)
                .collect(),
        )
    }

    pub fn with_active(active: BTreeSet<NodeId>) -> Self {
        let id = fnv1a64(
            active
                .iter()
                .flat_map(|&node_id| (node_id as u64).to_le_bytes()),
        );
        Self { active, id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self, id: NodeId) -> bool {
        self.active.contains(&id)
    }

    /// Active node ids, ascending.
    pub fn enabled_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.active.iter().copied()
    }

    pub fn enabled_count(&self) -> usize {
        self.active.len()
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enabled nodes: [")?;
        for (i, id) in self.active.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{id}")?;
        }
        write!(f, "]")
    }
}

/// One committed attacker move: a mapping from struck node to the edges
/// used to strike it. AND strikes carry an empty edge set (the node itself
/// is struck); OR strikes carry one edge per entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttackerAction {
    strikes: BTreeMap<NodeId, BTreeSet<EdgeId>>,
}

impl AttackerAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strike an AND node directly.
    pub fn add_and_node_attack(&mut self, node: NodeId) {
        self.strikes.entry(node).or_default();
    }

    /// Strike one edge into an OR node. Multiple edges into the same node
    /// accumulate as independent trials.
    pub fn add_or_node_attack(&mut self, node: NodeId, edge: EdgeId) {
        self.strikes.entry(node).or_default().insert(edge);
    }

    pub fn is_empty(&self) -> bool {
        self.strikes.is_empty()
    }

    pub fn strikes(&self) -> &BTreeMap<NodeId, BTreeSet<EdgeId>> {
        &self.strikes
    }

    /// Struck AND node ids (entries with no edges), ascending.
    pub fn attacked_and_node_ids(&self) -> Vec<NodeId> {
        self.strikes
            .iter()
            .filter(|(_, edges)| edges.is_empty())
            .map(|(&node, _)| node)
            .collect()
    }

    /// Struck edge ids into OR nodes, ascending.
    pub fn attacked_edge_to_or_node_ids(&self) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = self
            .strikes
            .values()
            .flat_map(|edges| edges.iter().copied())
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// One committed defender move: the set of nodes protected this step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefenderAction {
    protected: BTreeSet<NodeId>,
}

impl DefenderAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            protected: ids.into_iter().collect(),
        }
    }

    pub fn add_node_to_protect(&mut self, node: NodeId) {
        self.protected.insert(node);
    }

    pub fn is_protected(&self, node: NodeId) -> bool {
        self.protected.contains(&node)
    }

    pub fn protected_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.protected.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.protected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protected.is_empty()
    }
}

/// The defender's noisy view after a step: which nodes looked ACTIVE, and
/// how many steps remain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenderObservation {
    observed_active: BTreeSet<NodeId>,
    time_steps_left: usize,
}

impl DefenderObservation {
    /// The initial "nothing observed" view at episode start.
    pub fn initial(time_steps_left: usize) -> Self {
        Self {
            observed_active: BTreeSet::new(),
            time_steps_left,
        }
    }

    pub fn new(observed_active: BTreeSet<NodeId>, time_steps_left: usize) -> Self {
        Self {
            observed_active,
            time_steps_left,
        }
    }

    pub fn is_observed_active(&self, node: NodeId) -> bool {
        self.observed_active.contains(&node)
    }

    pub fn observed_active_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.observed_active.iter().copied()
    }

    pub fn time_steps_left(&self) -> usize {
        self.time_steps_left
    }
}

impl fmt::Display for DefenderObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.observed_active.iter().map(|id| id.to_string()).collect();
        write!(
            f,
            "observed active: [{}], {} remaining",
            ids.join(", "),
            self.time_steps_left
        )
    }
}

/// The attacker's view after a step: what it struck, what is legal now, a
/// bounded history of true active sets, and the fixed id universes its
/// action space is built over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackerRawObservation {
    attacked_and_node_ids: Vec<NodeId>,
    attacked_edge_ids: Vec<EdgeId>,
    legal_and_node_ids: Vec<NodeId>,
    legal_edge_ids: Vec<EdgeId>,
    /// Exactly `ATTACKER_OBS_LENGTH` frames, oldest first; short histories
    /// are left-padded with empty frames.
    active_node_ids_history: VecDeque<Vec<NodeId>>,
    time_steps_left: usize,
    and_node_ids: Vec<NodeId>,
    edge_to_or_node_ids: Vec<EdgeId>,
}

impl AttackerRawObservation {
    /// Episode-start observation: nothing struck, nothing active yet.
    pub fn initial(
        legal_and_node_ids: Vec<NodeId>,
        legal_edge_ids: Vec<EdgeId>,
        and_node_ids: Vec<NodeId>,
        edge_to_or_node_ids: Vec<EdgeId>,
        time_steps_left: usize,
    ) -> Self {
        let mut history = VecDeque::with_capacity(ATTACKER_OBS_LENGTH);
        for _ in 0..ATTACKER_OBS_LENGTH {
            history.push_back(Vec::new());
        }
        Self {
            attacked_and_node_ids: Vec::new(),
            attacked_edge_ids: Vec::new(),
            legal_and_node_ids,
            legal_edge_ids,
            active_node_ids_history: history,
            time_steps_left,
            and_node_ids,
            edge_to_or_node_ids,
        }
    }

    /// Successor observation: append the newest active frame, dropping the
    /// oldest so the window stays at `ATTACKER_OBS_LENGTH`.
    #[allow(clippy::too_many_arguments)]
    pub fn next(
        previous: &AttackerRawObservation,
        attacked_and_node_ids: Vec<NodeId>,
        attacked_edge_ids: Vec<EdgeId>,
        legal_and_node_ids: Vec<NodeId>,
        legal_edge_ids: Vec<EdgeId>,
        active_node_ids: Vec<NodeId>,
        time_steps_left: usize,
    ) -> Self {
        let mut history = previous.active_node_ids_history.clone();
        history.pop_front();
        history.push_back(active_node_ids);
        Self {
            attacked_and_node_ids,
            attacked_edge_ids,
            legal_and_node_ids,
            legal_edge_ids,
            active_node_ids_history: history,
            time_steps_left,
            and_node_ids: previous.and_node_ids.clone(),
            edge_to_or_node_ids: previous.edge_to_or_node_ids.clone(),
        }
    }

    pub fn attacked_and_node_ids(&self) -> &[NodeId] {
        &self.attacked_and_node_ids
    }

    pub fn attacked_edge_ids(&self) -> &[EdgeId] {
        &self.attacked_edge_ids
    }

    pub fn legal_and_node_ids(&self) -> &[NodeId] {
        &self.legal_and_node_ids
    }

    pub fn legal_edge_ids(&self) -> &[EdgeId] {
        &self.legal_edge_ids
    }

    /// Frames oldest-first; always `ATTACKER_OBS_LENGTH` of them.
    pub fn active_node_ids_history(&self) -> &VecDeque<Vec<NodeId>> {
        &self.active_node_ids_history
    }

    pub fn time_steps_left(&self) -> usize {
        self.time_steps_left
    }

    pub fn and_node_ids(&self) -> &[NodeId] {
        &self.and_node_ids
    }

    pub fn edge_to_or_node_ids(&self) -> &[EdgeId] {
        &self.edge_to_or_node_ids
    }
}

impl fmt::Display for AttackerRawObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "attacked nodes: {:?}", self.attacked_and_node_ids)?;
        writeln!(f, "attacked edges: {:?}", self.attacked_edge_ids)?;
        writeln!(f, "legal nodes: {:?}", self.legal_and_node_ids)?;
        writeln!(f, "legal edges: {:?}", self.legal_edge_ids)?;
        let newest = self
            .active_node_ids_history
            .back()
            .cloned()
            .unwrap_or_default();
        writeln!(f, "active now: {newest:?}")?;
        write!(f, "{} remaining", self.time_steps_left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_active_sets_share_identity() {
        let a = GameState::with_active([3, 1, 7].into_iter().collect());
        let b = GameState::with_active([7, 3, 1].into_iter().collect());
        assert_eq!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn different_active_sets_differ() {
        let a = GameState::with_active([1, 2].into_iter().collect());
        let b = GameState::with_active([1, 3].into_iter().collect());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn attacker_action_views_split_and_from_or() {
        let mut action = AttackerAction::new();
        action.add_and_node_attack(4);
        action.add_or_node_attack(7, 12);
        action.add_or_node_attack(7, 9);
        assert_eq!(action.attacked_and_node_ids(), vec![4]);
        assert_eq!(action.attacked_edge_to_or_node_ids(), vec![9, 12]);
    }

    #[test]
    fn attacker_history_is_bounded_and_left_padded() {
        let initial = AttackerRawObservation::initial(vec![1], vec![], vec![1], vec![], 5);
        assert_eq!(initial.active_node_ids_history().len(), ATTACKER_OBS_LENGTH);
        assert!(initial.active_node_ids_history().iter().all(Vec::is_empty));

        let next = AttackerRawObservation::next(
            &initial,
            vec![1],
            vec![],
            vec![1],
            vec![],
            vec![1],
            4,
        );
        assert_eq!(next.active_node_ids_history().len(), ATTACKER_OBS_LENGTH);
        assert_eq!(next.active_node_ids_history().back().unwrap(), &vec![1]);
        assert!(next.active_node_ids_history().front().unwrap().is_empty());
    }
}
