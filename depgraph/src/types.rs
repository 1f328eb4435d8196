// src/types.rs
//
// Common shared types for the dependency-graph game.

use serde::{Deserialize, Serialize};

/// Stable node identifier, in `{1, ..., node_count}`.
pub type NodeId = usize;

/// Stable edge identifier, in `{1, ..., edge_count}`.
pub type EdgeId = usize;

/// How a node becomes ACTIVE when struck.
/// - `And`  = one trial governed by the node's `act_prob`, requires every
///   in-edge source to be ACTIVE
/// - `Or`   = per-edge trials governed by each attacked edge's `act_prob`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationType {
    And,
    Or,
}

/// Whether activating the node pays the attacker / penalizes the defender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Target,
    NonTarget,
}

/// Compromise state of a node within one episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    Active,
    Inactive,
}

impl NodeState {
    pub fn is_active(self) -> bool {
        self == NodeState::Active
    }
}
