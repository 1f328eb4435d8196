// src/loader.rs
//
// External interfaces: graph files, the simulation spec, strategy
// descriptor strings, and mixed-strategy files.
//
// Graph and spec files are JSON with camelCase keys. A strategy
// descriptor is "Name:key1=val1,key2=val2"; a mixed-strategy file holds
// one "<descriptor>\t<weight>" record per line.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agent::{create_attacker, create_defender, AttackerPolicy, DefenderPolicy};
use crate::error::{Error, Result};
use crate::graph::{DependencyGraph, Edge, Node};
use crate::rl::MixedStrategy;
use crate::types::{ActivationType, NodeState, NodeType};

// ----- graph files ---------------------------------------------------------

fn default_p_active() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRecord {
    id: usize,
    topo_position: usize,
    activation_type: ActivationType,
    node_type: NodeType,
    state: NodeState,
    a_reward: f64,
    d_penalty: f64,
    a_cost: f64,
    d_cost: f64,
    act_prob: f64,
    /// Observation rates; missing fields mean perfect observation.
    #[serde(default = "default_p_active")]
    p_active: f64,
    #[serde(default)]
    p_inactive: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EdgeRecord {
    id: usize,
    source_id: usize,
    target_id: usize,
    a_cost: f64,
    act_prob: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecord {
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_cut: Option<Vec<usize>>,
}

/// Parse and validate a graph from JSON text.
pub fn graph_from_json(text: &str) -> Result<DependencyGraph> {
    let record: GraphRecord = serde_json::from_str(text)?;
    let nodes = record
        .nodes
        .into_iter()
        .map(|n| Node {
            id: n.id,
            topo_position: n.topo_position,
            activation_type: n.activation_type,
            node_type: n.node_type,
            initial_state: n.state,
            a_reward: n.a_reward,
            d_penalty: n.d_penalty,
            a_cost: n.a_cost,
            d_cost: n.d_cost,
            act_prob: n.act_prob,
            p_active: n.p_active,
            p_inactive: n.p_inactive,
        })
        .collect();
    let edges = record
        .edges
        .into_iter()
        .map(|e| Edge {
            id: e.id,
            source: e.source_id,
            target: e.target_id,
            a_cost: e.a_cost,
            act_prob: e.act_prob,
        })
        .collect();
    DependencyGraph::new(nodes, edges, record.min_cut)
}

/// Serialize a graph back to the file format (min-cut embedded).
pub fn graph_to_json(graph: &DependencyGraph) -> Result<String> {
    let record = GraphRecord {
        nodes: graph
            .nodes()
            .iter()
            .map(|n| NodeRecord {
                id: n.id,
                topo_position: n.topo_position,
                activation_type: n.activation_type,
                node_type: n.node_type,
                state: n.initial_state,
                a_reward: n.a_reward,
                d_penalty: n.d_penalty,
                a_cost: n.a_cost,
                d_cost: n.d_cost,
                act_prob: n.act_prob,
                p_active: n.p_active,
                p_inactive: n.p_inactive,
            })
            .collect(),
        edges: graph
            .edges()
            .iter()
            .map(|e| EdgeRecord {
                id: e.id,
                source_id: e.source,
                target_id: e.target,
                a_cost: e.a_cost,
                act_prob: e.act_prob,
            })
            .collect(),
        min_cut: Some(graph.min_cut().to_vec()),
    };
    Ok(serde_json::to_string_pretty(&record)?)
}

pub fn load_graph(path: impl AsRef<Path>) -> Result<DependencyGraph> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        operation: format!("read graph file {}", path.display()),
        source,
    })?;
    graph_from_json(&text)
}

pub fn save_graph(path: impl AsRef<Path>, graph: &DependencyGraph) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, graph_to_json(graph)?).map_err(|source| Error::Io {
        operation: format!("write graph file {}", path.display()),
        source,
    })
}

// ----- simulation spec -----------------------------------------------------

/// The simulation spec file: graph shape, episode length, discounting and
/// the two players' strategy strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSimulationSpec {
    pub num_node: usize,
    pub num_edge: usize,
    pub num_target: usize,
    #[serde(rename = "graphID")]
    pub graph_id: usize,
    pub num_time_step: usize,
    pub disc_fact: f64,
    pub defender_string: String,
    pub attacker_string: String,
}

impl GameSimulationSpec {
    /// Conventional graph file name for this spec.
    pub fn graph_file_name(&self) -> String {
        format!(
            "RandomGraph{}N{}E{}T{}.json",
            self.num_node, self.num_edge, self.num_target, self.graph_id
        )
    }
}

pub fn spec_from_json(text: &str) -> Result<GameSimulationSpec> {
    let spec: GameSimulationSpec = serde_json::from_str(text)?;
    if spec.num_time_step < 1 {
        return Err(Error::invalid_config("numTimeStep must be at least 1"));
    }
    if spec.disc_fact <= 0.0 || spec.disc_fact > 1.0 {
        return Err(Error::invalid_config("discFact must be in (0, 1]"));
    }
    Ok(spec)
}

pub fn load_spec(path: impl AsRef<Path>) -> Result<GameSimulationSpec> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        operation: format!("read spec file {}", path.display()),
        source,
    })?;
    spec_from_json(&text)
}

// ----- strategy descriptors ------------------------------------------------

/// Parsed strategy string: a policy name plus numeric parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyDescriptor {
    pub name: String,
    pub params: BTreeMap<String, f64>,
}

/// Parse `"Name:key1=val1,key2=val2"`. A bare `"Name"` has no parameters.
pub fn parse_strategy_descriptor(text: &str) -> Result<StrategyDescriptor> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::invalid_config("empty strategy string"));
    }
    let (name, param_text) = match text.split_once(':') {
        Some((name, params)) => (name, params),
        None => (text, ""),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::invalid_config(format!(
            "strategy string has no name: {text}"
        )));
    }

    let mut params = BTreeMap::new();
    for pair in param_text.split(',').filter(|p| !p.trim().is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            Error::invalid_config(format!("malformed parameter {pair:?} in {text:?}"))
        })?;
        let value: f64 = value.trim().parse().map_err(|_| {
            Error::invalid_config(format!("non-numeric value in parameter {pair:?}"))
        })?;
        params.insert(key.trim().to_string(), value);
    }
    Ok(StrategyDescriptor {
        name: name.to_string(),
        params,
    })
}

/// Build an attacker from a strategy string.
pub fn attacker_from_string(text: &str, disc_fact: f64) -> Result<AttackerPolicy> {
    let descriptor = parse_strategy_descriptor(text)?;
    create_attacker(&descriptor.name, &descriptor.params, disc_fact)
}

/// Build a defender from a strategy string.
pub fn defender_from_string(text: &str, disc_fact: f64) -> Result<DefenderPolicy> {
    let descriptor = parse_strategy_descriptor(text)?;
    create_defender(&descriptor.name, &descriptor.params, disc_fact)
}

// ----- mixed-strategy files ------------------------------------------------

/// Parse newline-delimited `"<descriptor>\t<weight>"` records. Blank
/// lines are skipped; weight validation happens in `MixedStrategy::new`.
pub fn parse_mixed_records(text: &str) -> Result<Vec<(StrategyDescriptor, f64)>> {
    let mut records = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (descriptor_text, weight_text) = line.split_once('\t').ok_or_else(|| {
            Error::invalid_config(format!("mixed-strategy line has no tab: {line:?}"))
        })?;
        let weight: f64 = weight_text.trim().parse().map_err(|_| {
            Error::invalid_config(format!("non-numeric weight in line {line:?}"))
        })?;
        records.push((parse_strategy_descriptor(descriptor_text)?, weight));
    }
    Ok(records)
}

pub fn attacker_mixed_strategy_from_text(
    text: &str,
    disc_fact: f64,
) -> Result<MixedStrategy<AttackerPolicy>> {
    let mut entries = Vec::new();
    for (descriptor, weight) in parse_mixed_records(text)? {
        entries.push((
            create_attacker(&descriptor.name, &descriptor.params, disc_fact)?,
            weight,
        ));
    }
    MixedStrategy::new(entries)
}

pub fn defender_mixed_strategy_from_text(
    text: &str,
    disc_fact: f64,
) -> Result<MixedStrategy<DefenderPolicy>> {
    let mut entries = Vec::new();
    for (descriptor, weight) in parse_mixed_records(text)? {
        entries.push((
            create_defender(&descriptor.name, &descriptor.params, disc_fact)?,
            weight,
        ));
    }
    MixedStrategy::new(entries)
}

pub fn load_attacker_mixed_strategy(
    path: impl AsRef<Path>,
    disc_fact: f64,
) -> Result<MixedStrategy<AttackerPolicy>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        operation: format!("read mixed-strategy file {}", path.display()),
        source,
    })?;
    attacker_mixed_strategy_from_text(&text, disc_fact)
}

pub fn load_defender_mixed_strategy(
    path: impl AsRef<Path>,
    disc_fact: f64,
) -> Result<MixedStrategy<DefenderPolicy>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        operation: format!("read mixed-strategy file {}", path.display()),
        source,
    })?;
    defender_mixed_strategy_from_text(&text, disc_fact)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN_JSON: &str = r#"{
        "nodes": [
            {"id": 1, "topoPosition": 0, "activationType": "OR",
             "nodeType": "NON_TARGET", "state": "ACTIVE",
             "aReward": 0.0, "dPenalty": 0.0, "aCost": 0.0, "dCost": -2.0,
             "actProb": 1.0, "pActive": 0.9, "pInactive": 0.05},
            {"id": 2, "topoPosition": 1, "activationType": "OR",
             "nodeType": "TARGET", "state": "INACTIVE",
             "aReward": 10.0, "dPenalty": -9.0, "aCost": 0.0, "dCost": -2.0,
             "actProb": 1.0}
        ],
        "edges": [
            {"id": 1, "sourceId": 1, "targetId": 2, "aCost": -1.0, "actProb": 0.5}
        ]
    }"#;

    #[test]
    fn parses_graph_with_observation_rate_defaults() {
        let graph = graph_from_json(CHAIN_JSON).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node(1).p_active, 0.9);
        // Missing rates mean perfect observation.
        assert_eq!(graph.node(2).p_active, 1.0);
        assert_eq!(graph.node(2).p_inactive, 0.0);
        assert_eq!(graph.node(1).initial_state, NodeState::Active);
        // Min cut was computed at load.
        assert_eq!(graph.min_cut().len(), 1);
    }

    #[test]
    fn graph_round_trip_preserves_fields_and_order() {
        let graph = graph_from_json(CHAIN_JSON).unwrap();
        let reparsed = graph_from_json(&graph_to_json(&graph).unwrap()).unwrap();
        assert_eq!(graph.nodes(), reparsed.nodes());
        assert_eq!(graph.edges(), reparsed.edges());
        assert_eq!(graph.topo_order(), reparsed.topo_order());
        assert_eq!(graph.min_cut(), reparsed.min_cut());
    }

    #[test]
    fn rejects_invalid_graph_json() {
        assert!(graph_from_json("{").is_err());
        // Edge with a dangling endpoint.
        let bad = CHAIN_JSON.replace("\"targetId\": 2", "\"targetId\": 7");
        assert!(matches!(
            graph_from_json(&bad).unwrap_err(),
            Error::InvalidGraph { .. }
        ));
    }

    #[test]
    fn parses_simulation_spec() {
        let text = r#"{
            "numNode": 30, "numEdge": 100, "numTarget": 2, "graphID": 1,
            "numTimeStep": 10, "discFact": 0.9,
            "defenderString": "uniform:maxNumRes=5,minNumRes=1,numResRatio=0.3",
            "attackerString": "valuePropagation:maxNumSelectCandidate=5,minNumSelectCandidate=1,numSelectCandidateRatio=0.3,qrParam=5.0,numCandStdev=1.0"
        }"#;
        let spec = spec_from_json(text).unwrap();
        assert_eq!(spec.num_time_step, 10);
        assert_eq!(spec.graph_file_name(), "RandomGraph30N100E2T1.json");

        let defender = defender_from_string(&spec.defender_string, spec.disc_fact).unwrap();
        assert_eq!(defender.name(), "uniform");
        let attacker = attacker_from_string(&spec.attacker_string, spec.disc_fact).unwrap();
        assert_eq!(attacker.name(), "valuePropagation");
    }

    #[test]
    fn rejects_spec_with_bad_discount() {
        let text = r#"{
            "numNode": 2, "numEdge": 1, "numTarget": 1, "graphID": 0,
            "numTimeStep": 5, "discFact": 1.5,
            "defenderString": "uniform:maxNumRes=1,minNumRes=1,numResRatio=0.5",
            "attackerString": "uniform:maxNumSelectCandidate=1,minNumSelectCandidate=1,numSelectCandidateRatio=0.5"
        }"#;
        assert!(spec_from_json(text).is_err());
    }

    #[test]
    fn parses_strategy_descriptors() {
        let descriptor =
            parse_strategy_descriptor("minCut:maxNumRes=4,minNumRes=2,numResRatio=0.5").unwrap();
        assert_eq!(descriptor.name, "minCut");
        assert_eq!(descriptor.params.len(), 3);
        assert_eq!(descriptor.params["maxNumRes"], 4.0);

        let bare = parse_strategy_descriptor("uniform").unwrap();
        assert!(bare.params.is_empty());

        assert!(parse_strategy_descriptor("").is_err());
        assert!(parse_strategy_descriptor("uniform:oops").is_err());
        assert!(parse_strategy_descriptor("uniform:k=abc").is_err());
    }

    #[test]
    fn parses_mixed_strategy_text() {
        let text = "uniform:maxNumRes=3,minNumRes=1,numResRatio=0.2\t0.25\n\
                    minCut:maxNumRes=3,minNumRes=1,numResRatio=0.2\t0.75\n";
        let mix = defender_mixed_strategy_from_text(text, 0.9).unwrap();
        assert_eq!(mix.len(), 2);
    }

    #[test]
    fn mixed_strategy_weights_must_sum_to_one() {
        let text = "uniform:maxNumRes=3,minNumRes=1,numResRatio=0.2\t0.4\n\
                    minCut:maxNumRes=3,minNumRes=1,numResRatio=0.2\t0.4\n";
        assert!(matches!(
            defender_mixed_strategy_from_text(text, 0.9).unwrap_err(),
            Error::InvalidConfig { .. }
        ));
    }

    #[test]
    fn mixed_strategy_requires_tab_separator() {
        let text = "uniform:maxNumRes=3,minNumRes=1,numResRatio=0.2 1.0\n";
        assert!(parse_mixed_records(text).is_err());
    }
}
