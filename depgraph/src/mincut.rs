// src/mincut.rs
//
// Vertex min-cut between the attacker's entry nodes and the target set,
// computed once at graph-load time.
//
// Standard node-splitting reduction: every node v becomes an arc
// v_in -> v_out with unit capacity, graph edges become infinite-capacity
// arcs between the split halves, a virtual source feeds every entry node
// and every target drains into a virtual sink. After max-flow, the cut is
// the set of nodes whose internal arc crosses the residual reachability
// frontier. Protecting all of them disconnects every target from its
// inactive ancestors.

use std::collections::VecDeque;

use crate::graph::DependencyGraph;
use crate::types::NodeId;

const INF: i64 = i64::MAX / 4;

struct FlowArc {
    to: usize,
    cap: i64,
    /// Index of the reverse arc in `arcs[to]`.
    rev: usize,
}

struct FlowNetwork {
    arcs: Vec<Vec<FlowArc>>,
}

impl FlowNetwork {
    fn new(vertex_count: usize) -> Self {
        Self {
            arcs: (0..vertex_count).map(|_| Vec::new()).collect(),
        }
    }

    fn add_arc(&mut self, from: usize, to: usize, cap: i64) {
        let rev_from = self.arcs[to].len();
        let rev_to = self.arcs[from].len();
        self.arcs[from].push(FlowArc {
            to,
            cap,
            rev: rev_from,
        });
        self.arcs[to].push(FlowArc {
            to: from,
            cap: 0,
            rev: rev_to,
        });
    }

    /// Edmonds-Karp: repeatedly augment along shortest residual paths.
    /// Capacities here are bounded by the node count, so this stays cheap.
    fn max_flow(&mut self, source: usize, sink: usize) -> i64 {
        let mut total = 0;
        loop {
            // parent[v] = (vertex, arc index) used to reach v
            let mut parent: Vec<Option<(usize, usize)>> = vec![None; self.arcs.len()];
            let mut queue = VecDeque::new();
            queue.push_back(source);
            parent[source] = Some((source, usize::MAX));
            while let Some(v) = queue.pop_front() {
                if v == sink {
                    break;
                }
                for (i, arc) in self.arcs[v].iter().enumerate() {
                    if arc.cap > 0 && parent[arc.to].is_none() {
                        parent[arc.to] = Some((v, i));
                        queue.push_back(arc.to);
                    }
                }
            }
            if parent[sink].is_none() {
                return total;
            }

            // Bottleneck along the path.
            let mut bottleneck = INF;
            let mut v = sink;
            while v != source {
                let (prev, arc_index) = parent[v].unwrap();
                bottleneck = bottleneck.min(self.arcs[prev][arc_index].cap);
                v = prev;
            }

            // Apply.
            let mut v = sink;
            while v != source {
                let (prev, arc_index) = parent[v].unwrap();
                let rev = self.arcs[prev][arc_index].rev;
                self.arcs[prev][arc_index].cap -= bottleneck;
                self.arcs[v][rev].cap += bottleneck;
                v = prev;
            }
            total += bottleneck;
        }
    }

    /// Vertices reachable from `source` in the residual network.
    fn residual_reachable(&self, source: usize) -> Vec<bool> {
        let mut seen = vec![false; self.arcs.len()];
        let mut stack = vec![source];
        seen[source] = true;
        while let Some(v) = stack.pop() {
            for arc in &self.arcs[v] {
                if arc.cap > 0 && !seen[arc.to] {
                    seen[arc.to] = true;
                    stack.push(arc.to);
                }
            }
        }
        seen
    }
}

/// Compute the vertex min-cut node set for a validated graph, ascending.
pub fn vertex_min_cut(graph: &DependencyGraph) -> Vec<NodeId> {
    let n = graph.node_count();
    let node_in = |id: NodeId| 2 * (id - 1);
    let node_out = |id: NodeId| 2 * (id - 1) + 1;
    let source = 2 * n;
    let sink = 2 * n + 1;

    let mut network = FlowNetwork::new(2 * n + 2);
    for id in 1..=n {
        network.add_arc(node_in(id), node_out(id), 1);
    }
    for edge in graph.edges() {
        network.add_arc(node_out(edge.source), node_in(edge.target), INF);
    }
    for root in graph.root_ids() {
        network.add_arc(source, node_in(root), INF);
    }
    for &target in graph.target_set() {
        network.add_arc(node_out(target), sink, INF);
    }

    network.max_flow(source, sink);

    let reachable = network.residual_reachable(source);
    (1..=n)
        .filter(|&id| reachable[node_in(id)] && !reachable[node_out(id)])
        .collect()
}
