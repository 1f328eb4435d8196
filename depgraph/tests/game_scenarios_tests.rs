// tests/game_scenarios_tests.rs
//
// End-to-end scenarios exercising the public API: candidate valuation,
// sampler clamping, oracle guarantees, and the greedy environments.

use std::collections::BTreeSet;

use depgraph::{
    select_candidate, ActivationType, AttackCandidate, AttackerPolicy, DefenderPolicy,
    DependencyGraph, Edge, GameSimulation, GameState, GreedyAttackerEnv, GreedyDefenderEnv,
    GreedyEnvConfig, MixedStrategy, Node, NodeState, NodeType, UniformAttacker, UniformDefender,
    ValuePropagationAttacker,
};

fn or_node(id: usize, topo: usize, target: bool, reward: f64) -> Node {
    Node {
        id,
        topo_position: topo,
        activation_type: ActivationType::Or,
        node_type: if target {
            NodeType::Target
        } else {
            NodeType::NonTarget
        },
        initial_state: NodeState::Inactive,
        a_reward: reward,
        d_penalty: if target { -reward } else { 0.0 },
        a_cost: 0.0,
        d_cost: -1.0,
        act_prob: 1.0,
        p_active: 1.0,
        p_inactive: 0.0,
    }
}

fn or_edge(id: usize, source: usize, target: usize, a_cost: f64, act_prob: f64) -> Edge {
    Edge {
        id,
        source,
        target,
        a_cost,
        act_prob,
    }
}

/// Chain 1 -> 2 -> ... -> n, all OR, foothold 1 ACTIVE, node n a target.
fn chain(n: usize, reward: f64, edge_cost: f64, edge_prob: f64) -> DependencyGraph {
    let mut nodes: Vec<Node> = (1..=n)
        .map(|id| or_node(id, id - 1, id == n, if id == n { reward } else { 0.0 }))
        .collect();
    nodes[0].initial_state = NodeState::Active;
    let edges: Vec<Edge> = (1..n)
        .map(|id| or_edge(id, id, id + 1, edge_cost, edge_prob))
        .collect();
    DependencyGraph::new(nodes, edges, None).unwrap()
}

/// Scenario: two OR nodes, foothold -> target with reward 10 over a
/// half-probability edge costing 1. One step of lookahead values the edge
/// at -1 + 0.5 * 10 = 4; a zero quantal-response parameter makes the
/// single-candidate distribution trivially [1.0].
#[test]
fn single_edge_lookahead_value() {
    let graph = chain(2, 10.0, -1.0, 0.5);
    let state = GameState::initial(&graph);
    let attacker = ValuePropagationAttacker::new(3.0, 1.0, 0.5, 0.0, 1.0, 0.0).unwrap();

    let candidate = select_candidate(&graph, &state);
    assert_eq!(candidate.edge_candidates(), &[1]);

    let values = attacker.candidate_values(&graph, &state, &candidate, 1, 2);
    assert_eq!(values.len(), 1);
    assert!((values[0] - 4.0).abs() < 1e-12);

    let probs = depgraph::agent::value_propagation::quantal_response_probs(&values, 0.0);
    assert_eq!(probs, vec![1.0]);
}

/// Scenario: uniform defender clamping. min=2, max=5, ratio=0.3 over 10
/// candidates selects 3; a single candidate below the minimum selects 1.
#[test]
fn uniform_defender_count_clamping() {
    let defender = UniformDefender::new(5.0, 2.0, 0.3).unwrap();
    let mut rng = depgraph::GameRng::seed_from_u64(1);

    let ten = chain(10, 10.0, -1.0, 0.5);
    for _ in 0..10 {
        assert_eq!(defender.sample_action(&ten, &mut rng).len(), 3);
    }

    let single = DependencyGraph::new(
        vec![{
            let mut n = or_node(1, 0, true, 5.0);
            n.initial_state = NodeState::Active;
            n
        }],
        vec![],
        None,
    )
    .unwrap();
    assert_eq!(defender.sample_action(&single, &mut rng).len(), 1);
}

/// Scenario: a protected node under certain attack stays INACTIVE.
#[test]
fn protection_beats_certain_attack() {
    let graph = chain(2, 10.0, -1.0, 1.0);
    let mut sim = GameSimulation::new(graph, 5, 1.0, 13).unwrap();
    for _ in 0..5 {
        sim.step(
            &[2].into_iter().collect(),
            &BTreeSet::new(),
            &[1].into_iter().collect(),
        )
        .unwrap();
        assert!(!sim.game_state().is_active(2));
    }
}

/// Scenario: greedy defender wrapper with cutoff 0 and repeats allowed.
/// The sequence [3, 7, pass] grows the pending set twice, then commits:
/// rewards [0, 0, marginal] and one tick off the clock.
#[test]
fn greedy_defender_builds_action_unit_by_unit() {
    let sim = GameSimulation::new(chain(10, 10.0, -1.0, 1.0), 4, 0.9, 3).unwrap();
    let attacker = AttackerPolicy::Uniform(UniformAttacker::new(2.0, 1.0, 0.5).unwrap());
    let mut env = GreedyDefenderEnv::new(
        sim,
        MixedStrategy::pure(attacker),
        GreedyEnvConfig {
            prob_greedy_selection_cutoff: 0.0,
            lose_if_repeat: false,
        },
    )
    .unwrap();

    env.reset(Some(8));
    assert_eq!(env.pass_action(), 11);

    let r1 = env.step(3);
    assert_eq!((r1.reward, r1.done), (0.0, false));
    assert_eq!(env.sim().time_steps_left(), 4);
    let r2 = env.step(7);
    assert_eq!((r2.reward, r2.done), (0.0, false));

    let r3 = env.step(11);
    assert_eq!(env.sim().time_steps_left(), 3);
    assert!(!r3.done);
    assert!((r3.reward - env.sim().defender_marginal_payoff()).abs() < 1e-12);
    // The committed protection shows up in the next observation block.
    assert_eq!(r3.observation[10 + 2], 1.0);
    assert_eq!(r3.observation[10 + 6], 1.0);
}

/// Scenario: greedy attacker wrapper, immediate pass with empty pending.
/// The empty strike is legal; the step returns a finite reward.
#[test]
fn greedy_attacker_pass_on_first_step() {
    let sim = GameSimulation::new(chain(5, 10.0, -1.0, 1.0), 3, 0.9, 3).unwrap();
    let defender = DefenderPolicy::Uniform(UniformDefender::new(2.0, 1.0, 0.2).unwrap());
    let mut env = GreedyAttackerEnv::new(
        sim,
        MixedStrategy::pure(defender),
        GreedyEnvConfig {
            prob_greedy_selection_cutoff: 0.0,
            lose_if_repeat: false,
        },
    )
    .unwrap();

    env.reset(Some(4));
    let pass = env.pass_action();
    let result = env.step(pass);
    assert!(result.reward.is_finite());
    assert!(!result.done);
    assert_eq!(env.sim().time_steps_left(), 2);
}

/// Scenario: three-node OR chain with horizon 2. The propagated scores
/// are 4 for the edge adjacent to the target and 0.5 * 4 - 1 = 1 for the
/// edge one step further out.
#[test]
fn chain_value_propagation_scores() {
    let mut graph_nodes = vec![
        or_node(1, 0, false, 0.0),
        or_node(2, 1, false, 0.0),
        or_node(3, 2, true, 10.0),
    ];
    // No footholds: this scenario scores units in the abstract.
    graph_nodes[0].initial_state = NodeState::Inactive;
    let graph = DependencyGraph::new(
        graph_nodes,
        vec![or_edge(1, 1, 2, -1.0, 0.5), or_edge(2, 2, 3, -1.0, 0.5)],
        None,
    )
    .unwrap();
    let state = GameState::empty();

    let attacker = ValuePropagationAttacker::new(3.0, 1.0, 0.5, 0.0, 1.0, 0.0).unwrap();
    let candidate = AttackCandidate::from_parts(vec![1, 2], vec![]);
    let values = attacker.candidate_values(&graph, &state, &candidate, 1, 3);
    assert!((values[0] - 1.0).abs() < 1e-12);
    assert!((values[1] - 4.0).abs() < 1e-12);
}

/// Summed marginal rewards across a completed greedy episode equal the
/// engine's total payoff, for both wrappers.
#[test]
fn marginal_rewards_sum_to_totals() {
    let sim = GameSimulation::new(chain(6, 10.0, -1.0, 0.7), 5, 0.9, 17).unwrap();
    let attacker = AttackerPolicy::Uniform(UniformAttacker::new(2.0, 1.0, 0.5).unwrap());
    let mut env = GreedyDefenderEnv::new(
        sim,
        MixedStrategy::pure(attacker),
        GreedyEnvConfig::default(),
    )
    .unwrap();
    env.reset(Some(5));
    let mut total = 0.0;
    loop {
        let result = env.step(env.pass_action());
        total += result.reward;
        if result.done {
            break;
        }
    }
    assert!((total - env.sim().defender_total_payoff()).abs() < 1e-12);

    let sim = GameSimulation::new(chain(6, 10.0, -1.0, 0.7), 5, 0.9, 17).unwrap();
    let defender = DefenderPolicy::Uniform(UniformDefender::new(2.0, 1.0, 0.2).unwrap());
    let mut env = GreedyAttackerEnv::new(
        sim,
        MixedStrategy::pure(defender),
        GreedyEnvConfig::default(),
    )
    .unwrap();
    env.reset(Some(5));
    let mut total = 0.0;
    loop {
        // Alternate between trying the first legal unit and passing.
        let result = env.step(env.pass_action());
        total += result.reward;
        if result.done {
            break;
        }
    }
    assert!((total - env.sim().attacker_total_payoff()).abs() < 1e-12);
}

/// Value-propagation attacker drives the whole episode loop.
#[test]
fn value_propagation_attacker_plays_full_episodes() {
    let graph = chain(6, 10.0, -1.0, 0.8);
    let mut sim = GameSimulation::new(graph, 6, 0.9, 23).unwrap();
    let attacker = AttackerPolicy::ValuePropagation(
        ValuePropagationAttacker::new(3.0, 1.0, 0.5, 5.0, 0.9, 1.0).unwrap(),
    );
    let defender = DefenderPolicy::Uniform(UniformDefender::new(2.0, 1.0, 0.2).unwrap());

    let summary = sim.run_episode(&attacker, &defender).unwrap();
    assert_eq!(summary.steps, 6);
    assert!(summary.attacker_payoff.is_finite());
    assert!(summary.defender_payoff.is_finite());
}
