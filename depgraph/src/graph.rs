// src/graph.rs
//
// Typed DAG over the attack surface.
//
// The graph is immutable once built: validation runs in the constructor and
// every accessor hands out references. Per-episode compromise state lives in
// `GameState`, never on the graph itself, so independent engines can share
// one loaded graph across threads.

use crate::error::{Error, Result};
use crate::mincut;
use crate::types::{ActivationType, EdgeId, NodeId, NodeState, NodeType};

/// A single node of the dependency graph.
///
/// Costs and penalties are non-positive by convention (they subtract from
/// payoff); `act_prob` is only meaningful for AND nodes, where it governs
/// the single activation trial when the node is struck.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Unique position in a topological order of the DAG, in `{0, ..., N-1}`.
    pub topo_position: usize,
    pub activation_type: ActivationType,
    pub node_type: NodeType,
    /// State recorded in the graph file; ACTIVE marks an initial foothold.
    /// Episode resets seed the active set from these.
    pub initial_state: NodeState,
    /// Attacker reward when this target becomes ACTIVE.
    pub a_reward: f64,
    /// Defender penalty while this target is ACTIVE (<= 0).
    pub d_penalty: f64,
    /// Attacker cost to strike this node for AND activation (<= 0).
    pub a_cost: f64,
    /// Defender cost to protect this node (<= 0).
    pub d_cost: f64,
    /// AND activation probability.
    pub act_prob: f64,
    /// Probability the defender observes this node when it is ACTIVE.
    pub p_active: f64,
    /// Probability the defender observes this node when it is INACTIVE.
    pub p_inactive: f64,
}

impl Node {
    pub fn is_target(&self) -> bool {
        self.node_type == NodeType::Target
    }
}

/// A directed edge. `act_prob` governs the per-edge activation trial when
/// the edge is struck toward an OR node.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Attacker cost to strike this edge (<= 0).
    pub a_cost: f64,
    pub act_prob: f64,
}

/// Immutable, validated dependency graph.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// Incoming edge ids per node, ascending. Indexed by `node_id - 1`.
    incoming: Vec<Vec<EdgeId>>,
    /// Outgoing edge ids per node, ascending. Indexed by `node_id - 1`.
    outgoing: Vec<Vec<EdgeId>>,
    /// Target node ids, ascending.
    targets: Vec<NodeId>,
    /// Vertex min-cut separating targets from the entry nodes, ascending.
    min_cut: Vec<NodeId>,
}

impl DependencyGraph {
    /// Build and validate a graph. `min_cut` may come precomputed from the
    /// graph file; otherwise it is derived here, once.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>, min_cut: Option<Vec<NodeId>>) -> Result<Self> {
        validate_ids(&nodes, &edges)?;

        let n = nodes.len();
        let mut incoming = vec![Vec::new(); n];
        let mut outgoing = vec![Vec::new(); n];
        for edge in &edges {
            incoming[edge.target - 1].push(edge.id);
            outgoing[edge.source - 1].push(edge.id);
        }

        let targets: Vec<NodeId> = nodes
            .iter()
            .filter(|node| node.is_target())
            .map(|node| node.id)
            .collect();

        let mut graph = Self {
            nodes,
            edges,
            incoming,
            outgoing,
            targets,
            min_cut: Vec::new(),
        };
        graph.validate()?;

        graph.min_cut = match min_cut {
            Some(mut ids) => {
                ids.sort_unstable();
                ids.dedup();
                for &id in &ids {
                    if !graph.has_node(id) {
                        return Err(Error::invalid_graph(format!(
                            "minCut references unknown node {id}"
                        )));
                    }
                }
                ids
            }
            None => mincut::vertex_min_cut(&graph),
        };
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        id >= 1 && id <= self.nodes.len()
    }

    pub fn has_edge(&self, id: EdgeId) -> bool {
        id >= 1 && id <= self.edges.len()
    }

    /// Node lookup by stable id. Panics on an unknown id; callers at the
    /// public boundary go through `has_node` first.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id - 1]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id - 1]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn incoming_edges_of(&self, id: NodeId) -> &[EdgeId] {
        &self.incoming[id - 1]
    }

    pub fn outgoing_edges_of(&self, id: NodeId) -> &[EdgeId] {
        &self.outgoing[id - 1]
    }

    /// Target node ids, ascending.
    pub fn target_set(&self) -> &[NodeId] {
        &self.targets
    }

    /// Precomputed vertex min-cut, ascending.
    pub fn min_cut(&self) -> &[NodeId] {
        &self.min_cut
    }

    /// Entry nodes: no incoming edges.
    pub fn root_ids(&self) -> Vec<NodeId> {
        (1..=self.node_count())
            .filter(|&id| self.incoming[id - 1].is_empty())
            .collect()
    }

    /// Nodes arranged by `topo_position`, parents strictly before children.
    ///
    /// The positions were validated at construction, so this is a plain
    /// scatter into a vector.
    pub fn topo_order(&self) -> Vec<NodeId> {
        let mut order = vec![0; self.node_count()];
        for node in &self.nodes {
            order[node.topo_position] = node.id;
        }
        order
    }

    /// Re-run the structural checks. True for every graph built through
    /// `new`; exposed for callers that mutate a clone before reloading.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn validate(&self) -> Result<()> {
        let n = self.node_count();
        if n == 0 {
            return Err(Error::invalid_graph("graph has no nodes"));
        }

        // Topological positions form a permutation of {0, ..., N-1}.
        let mut seen = vec![false; n];
        for node in &self.nodes {
            if node.topo_position >= n || seen[node.topo_position] {
                return Err(Error::invalid_graph(format!(
                    "topoPosition {} of node {} is out of range or duplicated",
                    node.topo_position, node.id
                )));
            }
            seen[node.topo_position] = true;
        }

        // Edges respect the topological order (parent strictly before
        // child). A consistent labeling also rules out cycles.
        for edge in &self.edges {
            let src = self.node(edge.source);
            let dst = self.node(edge.target);
            if src.topo_position >= dst.topo_position {
                return Err(Error::invalid_graph(format!(
                    "edge {} violates topological order ({} -> {})",
                    edge.id, edge.source, edge.target
                )));
            }
        }

        // Weakly connected.
        if n > 1 {
            let mut visited = vec![false; n];
            let mut stack = vec![1];
            visited[0] = true;
            while let Some(id) = stack.pop() {
                for &eid in self
                    .incoming_edges_of(id)
                    .iter()
                    .chain(self.outgoing_edges_of(id))
                {
                    let edge = self.edge(eid);
                    for next in [edge.source, edge.target] {
                        if !visited[next - 1] {
                            visited[next - 1] = true;
                            stack.push(next);
                        }
                    }
                }
            }
            if let Some(pos) = visited.iter().position(|&v| !v) {
                return Err(Error::invalid_graph(format!(
                    "node {} is disconnected",
                    pos + 1
                )));
            }
        }

        // Every AND node needs at least one in-edge; entry nodes (no
        // in-edges) are OR nodes whose file state marks the attacker's
        // initial footholds. In-edges of OR nodes carry a positive
        // activation probability.
        for node in &self.nodes {
            match node.activation_type {
                ActivationType::And => {
                    if self.incoming_edges_of(node.id).is_empty() {
                        return Err(Error::invalid_graph(format!(
                            "AND node {} has no incoming edges",
                            node.id
                        )));
                    }
                }
                ActivationType::Or => {
                    for &eid in self.incoming_edges_of(node.id) {
                        if self.edge(eid).act_prob <= 0.0 {
                            return Err(Error::invalid_graph(format!(
                                "edge {} into OR node {} has non-positive actProb",
                                eid, node.id
                            )));
                        }
                    }
                }
            }
        }

        // Probability ranges.
        for node in &self.nodes {
            if !(0.0..=1.0).contains(&node.act_prob)
                || !(0.0..=1.0).contains(&node.p_active)
                || !(0.0..=1.0).contains(&node.p_inactive)
            {
                return Err(Error::invalid_graph(format!(
                    "node {} has a probability outside [0, 1]",
                    node.id
                )));
            }
        }
        for edge in &self.edges {
            if !(0.0..=1.0).contains(&edge.act_prob) {
                return Err(Error::invalid_graph(format!(
                    "edge {} has actProb outside [0, 1]",
                    edge.id
                )));
            }
        }

        // Every target is reachable from some entry node.
        let mut reachable = vec![false; n];
        let mut stack: Vec<NodeId> = (1..=n)
            .filter(|&id| self.incoming[id - 1].is_empty())
            .collect();
        for &id in &stack {
            reachable[id - 1] = true;
        }
        while let Some(id) = stack.pop() {
            for &eid in self.outgoing_edges_of(id) {
                let next = self.edge(eid).target;
                if !reachable[next - 1] {
                    reachable[next - 1] = true;
                    stack.push(next);
                }
            }
        }
        for &target in &self.targets {
            if !reachable[target - 1] {
                return Err(Error::invalid_graph(format!(
                    "target {} is unreachable from entry nodes",
                    target
                )));
            }
        }

        Ok(())
    }
}

fn validate_ids(nodes: &[Node], edges: &[Edge]) -> Result<()> {
    let n = nodes.len();
    for (index, node) in nodes.iter().enumerate() {
        if node.id != index + 1 {
            return Err(Error::invalid_graph(format!(
                "node ids must be contiguous from 1; found {} at index {}",
                node.id, index
            )));
        }
    }
    for (index, edge) in edges.iter().enumerate() {
        if edge.id != index + 1 {
            return Err(Error::invalid_graph(format!(
                "edge ids must be contiguous from 1; found {} at index {}",
                edge.id, index
            )));
        }
        if edge.source < 1 || edge.source > n || edge.target < 1 || edge.target > n {
            return Err(Error::invalid_graph(format!(
                "edge {} has a dangling endpoint ({} -> {})",
                edge.id, edge.source, edge.target
            )));
        }
        if edge.source == edge.target {
            return Err(Error::invalid_graph(format!(
                "edge {} is a self-loop on node {}",
                edge.id, edge.source
            )));
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::{edge, node, or_chain};
    use super::*;

    #[test]
    fn topo_order_respects_edges() {
        let graph = or_chain(4, 10.0, -1.0, 0.5);
        let order = graph.topo_order();
        assert_eq!(order, vec![1, 2, 3, 4]);
        for e in graph.edges() {
            let src_pos = graph.node(e.source).topo_position;
            let dst_pos = graph.node(e.target).topo_position;
            assert!(src_pos < dst_pos);
        }
    }

    #[test]
    fn rejects_and_node_without_in_edges() {
        let nodes = vec![
            node(1, 0, ActivationType::And, NodeType::NonTarget),
            node(2, 1, ActivationType::Or, NodeType::Target),
        ];
        let edges = vec![edge(1, 1, 2, -1.0, 0.5)];
        let err = DependencyGraph::new(nodes, edges, None).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph { .. }));
    }

    #[test]
    fn accepts_or_root_foothold() {
        let graph = or_chain(2, 5.0, -1.0, 0.5);
        assert_eq!(graph.root_ids(), vec![1]);
        assert_eq!(graph.node(1).initial_state, NodeState::Active);
    }

    #[test]
    fn rejects_topo_inversion() {
        let mut nodes = vec![
            node(1, 1, ActivationType::Or, NodeType::NonTarget),
            node(2, 0, ActivationType::Or, NodeType::Target),
        ];
        nodes[1].a_reward = 5.0;
        let edges = vec![edge(1, 1, 2, -1.0, 0.5)];
        let err = DependencyGraph::new(nodes, edges, None).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph { .. }));
    }

    #[test]
    fn rejects_dangling_edge() {
        let nodes = vec![node(1, 0, ActivationType::Or, NodeType::Target)];
        let edges = vec![edge(1, 1, 3, -1.0, 0.5)];
        let err = DependencyGraph::new(nodes, edges, None).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph { .. }));
    }

    #[test]
    fn embedded_min_cut_is_kept() {
        let nodes = vec![
            node(1, 0, ActivationType::Or, NodeType::NonTarget),
            {
                let mut t = node(2, 1, ActivationType::Or, NodeType::Target);
                t.a_reward = 5.0;
                t
            },
        ];
        let edges = vec![edge(1, 1, 2, -1.0, 0.5)];
        let graph = DependencyGraph::new(nodes, edges, Some(vec![2])).unwrap();
        assert_eq!(graph.min_cut(), &[2]);
    }

    #[test]
    fn target_set_ascending() {
        let graph = or_chain(5, 3.0, -0.5, 0.9);
        assert_eq!(graph.target_set(), &[5]);
    }
}
