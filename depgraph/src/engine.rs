// src/engine.rs
//
// Episode engine for the dependency-graph game.
//
// Owns the per-episode mutable state (active set, clock, payoffs,
// histories) and the RNG; the loaded graph stays immutable. One commit per
// time step: both players' actions go through the oracle together, then
// payoffs and observations are recorded.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::agent::{AttackerPolicy, DefenderPolicy};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::oracle;
use crate::rng::GameRng;
use crate::state::{
    AttackerAction, AttackerRawObservation, DefenderAction, DefenderObservation, GameState,
};
use crate::types::{ActivationType, EdgeId, NodeId};

/// Outcome of one full episode run from policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub attacker_payoff: f64,
    pub defender_payoff: f64,
    pub steps: usize,
}

/// The game engine: one episode at a time, strict step sequence.
#[derive(Debug)]
pub struct GameSimulation {
    graph: DependencyGraph,
    num_time_step: usize,
    disc_fact: f64,
    rng: GameRng,
    game_state: GameState,
    time_steps_left: usize,
    def_observations: Vec<DefenderObservation>,
    att_observations: Vec<AttackerRawObservation>,
    def_actions: Vec<DefenderAction>,
    att_actions: Vec<AttackerAction>,
    defender_total_payoff: f64,
    defender_marginal_payoff: f64,
    attacker_total_payoff: f64,
    attacker_marginal_payoff: f64,
    /// Worst one-step defender reward: sum over nodes of
    /// min(dPenalty, dCost).
    worst_defender_reward: f64,
    /// Worst one-step attacker reward: total node + edge strike cost.
    worst_attacker_reward: f64,
    /// AND node ids, ascending.
    and_node_ids: Vec<NodeId>,
    /// Ids of edges into OR nodes, ascending.
    edge_to_or_node_ids: Vec<EdgeId>,
}

impl GameSimulation {
    pub fn new(
        graph: DependencyGraph,
        num_time_step: usize,
        disc_fact: f64,
        seed: u64,
    ) -> Result<Self> {
        if num_time_step < 1 {
            return Err(Error::invalid_config("numTimeStep must be at least 1"));
        }
        if disc_fact <= 0.0 || disc_fact > 1.0 {
            return Err(Error::invalid_config("discFact must be in (0, 1]"));
        }
        if !graph.is_valid() {
            return Err(Error::invalid_graph("graph failed validation"));
        }

        let worst_defender_reward = graph
            .nodes()
            .iter()
            .map(|node| node.d_penalty.min(node.d_cost))
            .sum();
        let worst_attacker_reward = graph.nodes().iter().map(|node| node.a_cost).sum::<f64>()
            + graph.edges().iter().map(|edge| edge.a_cost).sum::<f64>();

        let and_node_ids: Vec<NodeId> = graph
            .nodes()
            .iter()
            .filter(|node| node.activation_type == ActivationType::And)
            .map(|node| node.id)
            .collect();
        let edge_to_or_node_ids: Vec<EdgeId> = graph
            .edges()
            .iter()
            .filter(|edge| graph.node(edge.target).activation_type == ActivationType::Or)
            .map(|edge| edge.id)
            .collect();

        let mut sim = Self {
            graph,
            num_time_step,
            disc_fact,
            rng: GameRng::seed_from_u64(seed),
            game_state: GameState::empty(),
            time_steps_left: num_time_step,
            def_observations: Vec::new(),
            att_observations: Vec::new(),
            def_actions: Vec::new(),
            att_actions: Vec::new(),
            defender_total_payoff: 0.0,
            defender_marginal_payoff: 0.0,
            attacker_total_payoff: 0.0,
            attacker_marginal_payoff: 0.0,
            worst_defender_reward,
            worst_attacker_reward,
            and_node_ids,
            edge_to_or_node_ids,
        };
        sim.reset();
        Ok(sim)
    }

    /// Return to the initial state: footholds active, clock full, payoffs
    /// zeroed, histories seeded with the empty observations.
    pub fn reset(&mut self) {
        self.game_state = GameState::initial(&self.graph);
        self.time_steps_left = self.num_time_step;
        self.defender_total_payoff = 0.0;
        self.defender_marginal_payoff = 0.0;
        self.attacker_total_payoff = 0.0;
        self.attacker_marginal_payoff = 0.0;
        self.def_actions.clear();
        self.att_actions.clear();
        self.def_observations.clear();
        self.def_observations
            .push(DefenderObservation::initial(self.num_time_step));
        self.att_observations.clear();
        let initial_obs = AttackerRawObservation::initial(
            self.legal_to_attack_node_ids(),
            self.legal_to_attack_edge_ids(),
            self.and_node_ids.clone(),
            self.edge_to_or_node_ids.clone(),
            self.num_time_step,
        );
        self.att_observations.push(initial_obs);
    }

    /// Replace the RNG stream. Used by environments on seeded resets.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = GameRng::seed_from_u64(seed);
    }

    // ----- accessors -------------------------------------------------------

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_time_step(&self) -> usize {
        self.num_time_step
    }

    pub fn time_steps_left(&self) -> usize {
        self.time_steps_left
    }

    /// 1-based index of the step about to be committed.
    pub fn cur_time_step(&self) -> usize {
        self.num_time_step - self.time_steps_left + 1
    }

    pub fn is_game_over(&self) -> bool {
        self.time_steps_left == 0
    }

    pub fn defender_total_payoff(&self) -> f64 {
        self.defender_total_payoff
    }

    pub fn defender_marginal_payoff(&self) -> f64 {
        self.defender_marginal_payoff
    }

    pub fn attacker_total_payoff(&self) -> f64 {
        self.attacker_total_payoff
    }

    pub fn attacker_marginal_payoff(&self) -> f64 {
        self.attacker_marginal_payoff
    }

    pub fn and_node_ids(&self) -> &[NodeId] {
        &self.and_node_ids
    }

    pub fn edge_to_or_node_ids(&self) -> &[EdgeId] {
        &self.edge_to_or_node_ids
    }

    /// Latest defender observation (never empty after reset).
    pub fn defender_observation(&self) -> &DefenderObservation {
        self.def_observations.last().expect("reset seeds history")
    }

    /// Latest attacker observation (never empty after reset).
    pub fn attacker_observation(&self) -> &AttackerRawObservation {
        self.att_observations.last().expect("reset seeds history")
    }

    pub fn last_defender_action(&self) -> Option<&DefenderAction> {
        self.def_actions.last()
    }

    pub fn last_attacker_action(&self) -> Option<&AttackerAction> {
        self.att_actions.last()
    }

    /// All defender observations this episode, oldest first (the initial
    /// empty observation included).
    pub fn defender_observation_history(&self) -> &[DefenderObservation] {
        &self.def_observations
    }

    /// All attacker observations this episode, oldest first.
    pub fn attacker_observation_history(&self) -> &[AttackerRawObservation] {
        &self.att_observations
    }

    pub fn defender_action_history(&self) -> &[DefenderAction] {
        &self.def_actions
    }

    pub fn attacker_action_history(&self) -> &[AttackerAction] {
        &self.att_actions
    }

    /// Human-readable snapshot of the current state.
    pub fn render(&self) -> String {
        format!("{}, {} remaining", self.game_state, self.time_steps_left)
    }

    // ----- validity predicates --------------------------------------------

    pub fn is_valid_id(&self, node_id: NodeId) -> bool {
        self.graph.has_node(node_id)
    }

    pub fn is_valid_and_node_id(&self, node_id: NodeId) -> bool {
        self.graph.has_node(node_id)
            && self.graph.node(node_id).activation_type == ActivationType::And
    }

    pub fn is_valid_edge_to_or_node_id(&self, edge_id: EdgeId) -> bool {
        self.graph.has_edge(edge_id)
            && self.graph.node(self.graph.edge(edge_id).target).activation_type
                == ActivationType::Or
    }

    /// An AND node is attackable when it is INACTIVE and every parent is
    /// ACTIVE. Callers must pass a valid AND node id.
    pub fn is_attackable_and_node_id(&self, node_id: NodeId) -> bool {
        debug_assert!(self.is_valid_and_node_id(node_id));
        !self.game_state.is_active(node_id)
            && self
                .graph
                .incoming_edges_of(node_id)
                .iter()
                .all(|&eid| self.game_state.is_active(self.graph.edge(eid).source))
    }

    /// An edge to an OR node is attackable when its source is ACTIVE and
    /// its target INACTIVE. Callers must pass a valid edge-to-OR id.
    pub fn is_attackable_edge_to_or_node_id(&self, edge_id: EdgeId) -> bool {
        debug_assert!(self.is_valid_edge_to_or_node_id(edge_id));
        let edge = self.graph.edge(edge_id);
        self.game_state.is_active(edge.source) && !self.game_state.is_active(edge.target)
    }

    /// The defender move is legal when every id names a node in the graph.
    pub fn is_valid_defender_move(&self, ids_to_defend: &BTreeSet<NodeId>) -> bool {
        ids_to_defend.iter().all(|&id| self.is_valid_id(id))
    }

    /// The attacker move is legal when every node id names an attackable
    /// AND node and every edge id names an attackable edge to an OR node.
    pub fn is_valid_attacker_move(
        &self,
        node_ids_to_attack: &BTreeSet<NodeId>,
        edge_ids_to_attack: &BTreeSet<EdgeId>,
    ) -> bool {
        node_ids_to_attack
            .iter()
            .all(|&id| self.is_valid_and_node_id(id) && self.is_attackable_and_node_id(id))
            && edge_ids_to_attack.iter().all(|&id| {
                self.is_valid_edge_to_or_node_id(id) && self.is_attackable_edge_to_or_node_id(id)
            })
    }

    /// AND node ids currently attackable, ascending.
    pub fn legal_to_attack_node_ids(&self) -> Vec<NodeId> {
        self.and_node_ids
            .iter()
            .copied()
            .filter(|&id| self.is_attackable_and_node_id(id))
            .collect()
    }

    /// Edge-to-OR ids currently attackable, ascending.
    pub fn legal_to_attack_edge_ids(&self) -> Vec<EdgeId> {
        self.edge_to_or_node_ids
            .iter()
            .copied()
            .filter(|&id| self.is_attackable_edge_to_or_node_id(id))
            .collect()
    }

    // ----- worst-case bounds ----------------------------------------------

    /// Lowest discounted reward the defender can still accrue:
    /// `worst · Σ_{τ=t}^{T-1} γ^τ` with `t` the next step's exponent.
    pub fn worst_defender_remaining_reward(&self) -> f64 {
        self.worst_defender_reward * self.remaining_discount_sum()
    }

    /// Lowest discounted reward the attacker can still accrue.
    pub fn worst_attacker_remaining_reward(&self) -> f64 {
        self.worst_attacker_reward * self.remaining_discount_sum()
    }

    fn remaining_discount_sum(&self) -> f64 {
        let start = self.num_time_step - self.time_steps_left;
        (start..self.num_time_step)
            .map(|tau| self.disc_fact.powi(tau as i32))
            .sum()
    }

    // ----- stepping --------------------------------------------------------

    /// Build an attacker action from raw id sets, checking that the ids
    /// exist and have the right kind. Attackability is the caller's
    /// business; the oracle simply never fires non-attackable strikes.
    pub fn generate_attacker_action(
        &self,
        node_ids_to_attack: &BTreeSet<NodeId>,
        edge_ids_to_attack: &BTreeSet<EdgeId>,
    ) -> Result<AttackerAction> {
        let mut action = AttackerAction::new();
        for &node_id in node_ids_to_attack {
            if !self.is_valid_and_node_id(node_id) {
                return Err(Error::invalid_move(format!(
                    "{node_id} is not an AND node id"
                )));
            }
            action.add_and_node_attack(node_id);
        }
        for &edge_id in edge_ids_to_attack {
            if !self.is_valid_edge_to_or_node_id(edge_id) {
                return Err(Error::invalid_move(format!(
                    "{edge_id} is not an edge-to-OR id"
                )));
            }
            action.add_or_node_attack(self.graph.edge(edge_id).target, edge_id);
        }
        Ok(action)
    }

    /// Advance one time step from raw id sets.
    pub fn step(
        &mut self,
        ids_to_defend: &BTreeSet<NodeId>,
        node_ids_to_attack: &BTreeSet<NodeId>,
        edge_ids_to_attack: &BTreeSet<EdgeId>,
    ) -> Result<()> {
        if !self.is_valid_defender_move(ids_to_defend) {
            return Err(Error::invalid_move(format!(
                "illegal defender move: {ids_to_defend:?}"
            )));
        }
        let att_action = self.generate_attacker_action(node_ids_to_attack, edge_ids_to_attack)?;
        let def_action = DefenderAction::from_ids(ids_to_defend.iter().copied());
        self.step_actions(def_action, att_action)
    }

    /// Advance one time step with fully built actions.
    pub fn step_actions(
        &mut self,
        def_action: DefenderAction,
        att_action: AttackerAction,
    ) -> Result<()> {
        if self.is_game_over() {
            return Err(Error::invalid_state("episode is over; reset first"));
        }

        // Discount exponent of the step being committed.
        let time_step = self.num_time_step - self.time_steps_left;
        let disc_pow = self.disc_fact.powi(time_step as i32);

        self.game_state = oracle::sample_next_state(
            &self.graph,
            &self.game_state,
            &att_action,
            &def_action,
            &mut self.rng,
        );
        self.time_steps_left -= 1;

        // Payoffs read the post-transition state.
        let mut def_payoff = 0.0;
        let mut att_payoff = 0.0;
        for node_id in self.game_state.enabled_ids() {
            let node = self.graph.node(node_id);
            if node.is_target() {
                def_payoff += node.d_penalty;
                att_payoff += node.a_reward;
            }
        }
        for node_id in def_action.protected_ids() {
            def_payoff += self.graph.node(node_id).d_cost;
        }
        for node_id in att_action.attacked_and_node_ids() {
            att_payoff += self.graph.node(node_id).a_cost;
        }
        for edge_id in att_action.attacked_edge_to_or_node_ids() {
            att_payoff += self.graph.edge(edge_id).a_cost;
        }
        def_payoff *= disc_pow;
        att_payoff *= disc_pow;

        self.defender_marginal_payoff = def_payoff;
        self.defender_total_payoff += def_payoff;
        self.attacker_marginal_payoff = att_payoff;
        self.attacker_total_payoff += att_payoff;

        let def_obs = oracle::sample_defender_observation(
            &self.graph,
            &self.game_state,
            &mut self.rng,
            self.time_steps_left,
        );
        self.def_observations.push(def_obs);

        let att_obs = AttackerRawObservation::next(
            self.att_observations.last().expect("reset seeds history"),
            att_action.attacked_and_node_ids(),
            att_action.attacked_edge_to_or_node_ids(),
            self.legal_to_attack_node_ids(),
            self.legal_to_attack_edge_ids(),
            self.game_state.enabled_ids().collect(),
            self.time_steps_left,
        );
        self.att_observations.push(att_obs);

        self.def_actions.push(def_action);
        self.att_actions.push(att_action);
        Ok(())
    }

    /// Sample the attacker policy against the current state, consuming the
    /// engine's RNG.
    pub fn sample_attacker(&mut self, policy: &AttackerPolicy) -> AttackerAction {
        let cur = self.cur_time_step();
        policy.sample_action(
            &self.graph,
            &self.game_state,
            cur,
            self.num_time_step,
            &mut self.rng,
        )
    }

    /// Sample the defender policy, consuming the engine's RNG.
    pub fn sample_defender(&mut self, policy: &DefenderPolicy) -> DefenderAction {
        policy.sample_action(&self.graph, &mut self.rng)
    }

    /// Run one full episode with both policies and report the payoffs.
    pub fn run_episode(
        &mut self,
        attacker: &AttackerPolicy,
        defender: &DefenderPolicy,
    ) -> Result<EpisodeSummary> {
        self.reset();
        let mut steps = 0;
        while !self.is_game_over() {
            let att_action = self.sample_attacker(attacker);
            let def_action = self.sample_defender(defender);
            self.step_actions(def_action, att_action)?;
            steps += 1;
        }
        Ok(EpisodeSummary {
            attacker_payoff: self.attacker_total_payoff,
            defender_payoff: self.defender_total_payoff,
            steps,
        })
    }
}
