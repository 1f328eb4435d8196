// src/rl/env.rs
//
// Greedy micro-MDP environments.
//
// A macro-action (one committed move) is built across several RL steps:
// each step either adds one unit to the pending set or commits it. A
// Bernoulli draw with probability `prob_greedy_selection_cutoff` can force
// an early commit once the pending set is non-empty. Illegal selections
// end the episode at the worst remaining reward so a learner can be
// trained to avoid them.

use std::collections::BTreeSet;

use crate::agent::{AttackerPolicy, DefenderPolicy};
use crate::engine::GameSimulation;
use crate::error::{Error, Result};
use crate::rng::GameRng;
use crate::state::DefenderAction;
use crate::types::{EdgeId, NodeId};

use super::mixed::MixedStrategy;
use super::observation::{encode_attacker_observation, encode_defender_observation};

/// Result of one environment step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Vec<f64>,
    pub reward: f64,
    pub done: bool,
}

/// Knobs shared by both greedy environments.
#[derive(Debug, Clone, Copy)]
pub struct GreedyEnvConfig {
    /// Chance that a non-empty pending set is committed instead of grown.
    pub prob_greedy_selection_cutoff: f64,
    /// When true, re-selecting a pending unit loses the game; when false
    /// it counts as a pass.
    pub lose_if_repeat: bool,
}

impl Default for GreedyEnvConfig {
    fn default() -> Self {
        Self {
            prob_greedy_selection_cutoff: 0.1,
            lose_if_repeat: false,
        }
    }
}

impl GreedyEnvConfig {
    fn validate(&self) -> Result<()> {
        if self.prob_greedy_selection_cutoff < 0.0 || self.prob_greedy_selection_cutoff >= 1.0 {
            return Err(Error::invalid_config(
                "probGreedySelectionCutOff must be in [0, 1)",
            ));
        }
        Ok(())
    }
}

/// Defender-side environment. Actions `1..=N` add a node to the pending
/// protect set; `N + 1` is pass (commit). The attacker opponent is drawn
/// from a mixed strategy on every reset.
pub struct GreedyDefenderEnv {
    sim: GameSimulation,
    opponents: MixedStrategy<AttackerPolicy>,
    current_opponent: AttackerPolicy,
    nodes_to_defend: BTreeSet<NodeId>,
    config: GreedyEnvConfig,
    rng: GameRng,
    done: bool,
}

impl GreedyDefenderEnv {
    pub fn new(
        sim: GameSimulation,
        opponents: MixedStrategy<AttackerPolicy>,
        config: GreedyEnvConfig,
    ) -> Result<Self> {
        config.validate()?;
        let mut rng = GameRng::seed_from_u64(0);
        let current_opponent = opponents.draw(&mut rng).clone();
        Ok(Self {
            sim,
            opponents,
            current_opponent,
            nodes_to_defend: BTreeSet::new(),
            config,
            rng,
            done: false,
        })
    }

    /// The pass (commit) action id.
    pub fn pass_action(&self) -> usize {
        self.sim.node_count() + 1
    }

    /// Size of the discrete action space.
    pub fn num_actions(&self) -> usize {
        self.sim.node_count() + 1
    }

    pub fn observation_len(&self) -> usize {
        super::observation::defender_observation_len(self.sim.node_count())
    }

    pub fn sim(&self) -> &GameSimulation {
        &self.sim
    }

    /// The opponent drawn for the current episode.
    pub fn current_opponent(&self) -> &AttackerPolicy {
        &self.current_opponent
    }

    /// Start a fresh episode; returns the initial observation.
    pub fn reset(&mut self, seed: Option<u64>) -> Vec<f64> {
        let seed = seed.unwrap_or_else(|| self.rng.next_seed());
        self.rng = GameRng::seed_from_u64(seed);
        let engine_seed = self.rng.next_seed();
        self.sim.reseed(engine_seed);
        self.sim.reset();
        self.current_opponent = self.opponents.draw(&mut self.rng).clone();
        self.nodes_to_defend.clear();
        self.done = false;
        encode_defender_observation(&self.sim, &self.nodes_to_defend)
    }

    /// One micro-step: extend the pending set or commit it.
    pub fn step(&mut self, action: usize) -> StepResult {
        if self.done {
            return StepResult {
                observation: self.observe(),
                reward: 0.0,
                done: true,
            };
        }

        let repeat = self.nodes_to_defend.contains(&action);
        let commit = action == self.pass_action()
            || (!self.nodes_to_defend.is_empty()
                && self.rng.unit() < self.config.prob_greedy_selection_cutoff)
            || (repeat && !self.config.lose_if_repeat);

        if commit {
            if !self.sim.is_valid_defender_move(&self.nodes_to_defend) {
                return self.lose();
            }
            let att_action = self.sim.sample_attacker(&self.current_opponent);
            let def_action = DefenderAction::from_ids(self.nodes_to_defend.iter().copied());
            self.sim
                .step_actions(def_action, att_action)
                .expect("move was validated");
            self.nodes_to_defend.clear();
            self.done = self.sim.is_game_over();
            return StepResult {
                observation: self.observe(),
                reward: self.sim.defender_marginal_payoff(),
                done: self.done,
            };
        }

        if !self.sim.is_valid_id(action) || (repeat && self.config.lose_if_repeat) {
            return self.lose();
        }

        self.nodes_to_defend.insert(action);
        StepResult {
            observation: self.observe(),
            reward: 0.0,
            done: false,
        }
    }

    /// Human-readable snapshot.
    pub fn render(&self) -> String {
        format!(
            "{} | pending: {:?}",
            self.sim.defender_observation(),
            self.nodes_to_defend
        )
    }

    fn observe(&self) -> Vec<f64> {
        encode_defender_observation(&self.sim, &self.nodes_to_defend)
    }

    fn lose(&mut self) -> StepResult {
        self.done = true;
        StepResult {
            observation: self.observe(),
            reward: self.sim.worst_defender_remaining_reward(),
            done: true,
        }
    }
}

/// One unit of the attacker action space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttackUnit {
    Node(NodeId),
    Edge(EdgeId),
}

/// Attacker-side environment. Actions `1..=|AND|` map to AND node ids
/// ascending, the next `|E_OR|` to edge-to-OR ids ascending, and the last
/// action is pass. The defender opponent is drawn from a mixed strategy on
/// every reset.
pub struct GreedyAttackerEnv {
    sim: GameSimulation,
    opponents: MixedStrategy<DefenderPolicy>,
    current_opponent: DefenderPolicy,
    nodes_to_attack: BTreeSet<NodeId>,
    edges_to_attack: BTreeSet<EdgeId>,
    config: GreedyEnvConfig,
    rng: GameRng,
    done: bool,
}

impl GreedyAttackerEnv {
    pub fn new(
        sim: GameSimulation,
        opponents: MixedStrategy<DefenderPolicy>,
        config: GreedyEnvConfig,
    ) -> Result<Self> {
        config.validate()?;
        let mut rng = GameRng::seed_from_u64(0);
        let current_opponent = opponents.draw(&mut rng).clone();
        Ok(Self {
            sim,
            opponents,
            current_opponent,
            nodes_to_attack: BTreeSet::new(),
            edges_to_attack: BTreeSet::new(),
            config,
            rng,
            done: false,
        })
    }

    /// The pass (commit) action id.
    pub fn pass_action(&self) -> usize {
        self.sim.and_node_ids().len() + self.sim.edge_to_or_node_ids().len() + 1
    }

    /// Size of the discrete action space.
    pub fn num_actions(&self) -> usize {
        self.pass_action()
    }

    pub fn observation_len(&self) -> usize {
        super::observation::attacker_observation_len(
            self.sim.and_node_ids().len(),
            self.sim.edge_to_or_node_ids().len(),
            self.sim.node_count(),
        )
    }

    pub fn sim(&self) -> &GameSimulation {
        &self.sim
    }

    /// The opponent drawn for the current episode.
    pub fn current_opponent(&self) -> &DefenderPolicy {
        &self.current_opponent
    }

    /// Start a fresh episode; returns the initial observation.
    pub fn reset(&mut self, seed: Option<u64>) -> Vec<f64> {
        let seed = seed.unwrap_or_else(|| self.rng.next_seed());
        self.rng = GameRng::seed_from_u64(seed);
        let engine_seed = self.rng.next_seed();
        self.sim.reseed(engine_seed);
        self.sim.reset();
        self.current_opponent = self.opponents.draw(&mut self.rng).clone();
        self.nodes_to_attack.clear();
        self.edges_to_attack.clear();
        self.done = false;
        self.observe()
    }

    /// One micro-step: extend the pending strike sets or commit them.
    pub fn step(&mut self, action: usize) -> StepResult {
        if self.done {
            return StepResult {
                observation: self.observe(),
                reward: 0.0,
                done: true,
            };
        }

        let unit = self.map_action(action);
        let repeat = match unit {
            Some(AttackUnit::Node(id)) => self.nodes_to_attack.contains(&id),
            Some(AttackUnit::Edge(id)) => self.edges_to_attack.contains(&id),
            None => false,
        };
        let pending_non_empty = !self.nodes_to_attack.is_empty() || !self.edges_to_attack.is_empty();
        let commit = action == self.pass_action()
            || (pending_non_empty && self.rng.unit() < self.config.prob_greedy_selection_cutoff)
            || (repeat && !self.config.lose_if_repeat);

        if commit {
            if !self
                .sim
                .is_valid_attacker_move(&self.nodes_to_attack, &self.edges_to_attack)
            {
                return self.lose();
            }
            let def_action = self.sim.sample_defender(&self.current_opponent);
            let att_action = self
                .sim
                .generate_attacker_action(&self.nodes_to_attack, &self.edges_to_attack)
                .expect("move was validated");
            self.sim
                .step_actions(def_action, att_action)
                .expect("move was validated");
            self.nodes_to_attack.clear();
            self.edges_to_attack.clear();
            self.done = self.sim.is_game_over();
            return StepResult {
                observation: self.observe(),
                reward: self.sim.attacker_marginal_payoff(),
                done: self.done,
            };
        }

        match unit {
            None => self.lose(),
            Some(_) if repeat && self.config.lose_if_repeat => self.lose(),
            Some(AttackUnit::Node(id)) => {
                self.nodes_to_attack.insert(id);
                StepResult {
                    observation: self.observe(),
                    reward: 0.0,
                    done: false,
                }
            }
            Some(AttackUnit::Edge(id)) => {
                self.edges_to_attack.insert(id);
                StepResult {
                    observation: self.observe(),
                    reward: 0.0,
                    done: false,
                }
            }
        }
    }

    /// Human-readable snapshot.
    pub fn render(&self) -> String {
        format!(
            "{}\npending nodes: {:?}, pending edges: {:?}",
            self.sim.attacker_observation(),
            self.nodes_to_attack,
            self.edges_to_attack
        )
    }

    /// Map an action integer to its unit; `None` for out-of-range values
    /// and for the pass action (handled before mapping matters).
    fn map_action(&self, action: usize) -> Option<AttackUnit> {
        let and_count = self.sim.and_node_ids().len();
        let edge_count = self.sim.edge_to_or_node_ids().len();
        if action >= 1 && action <= and_count {
            Some(AttackUnit::Node(self.sim.and_node_ids()[action - 1]))
        } else if action > and_count && action <= and_count + edge_count {
            Some(AttackUnit::Edge(
                self.sim.edge_to_or_node_ids()[action - and_count - 1],
            ))
        } else {
            None
        }
    }

    fn observe(&self) -> Vec<f64> {
        encode_attacker_observation(&self.sim, &self.nodes_to_attack, &self.edges_to_attack)
    }

    fn lose(&mut self) -> StepResult {
        self.done = true;
        StepResult {
            observation: self.observe(),
            reward: self.sim.worst_attacker_remaining_reward(),
            done: true,
        }
    }
}
