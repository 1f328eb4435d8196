//! Dependency-graph security game.
//!
//! A two-player, turn-based stochastic game on a directed acyclic
//! dependency graph: an attacker works toward activating target nodes
//! while a defender protects nodes, both accruing discounted rewards.
//! The binary (`src/main.rs`) is a thin research harness around these
//! components.
//!
//! # Architecture
//!
//! - **Graph model** (`graph`): immutable, validated DAG with AND/OR
//!   activation semantics and a precomputed vertex min-cut.
//! - **State & records** (`state`): per-step value objects — game state
//!   with content-hash identity, player actions, observations.
//! - **Oracle** (`oracle`): pure stochastic state transition and noisy
//!   defender observation.
//! - **Policies** (`agent`): uniform baselines, the value-propagation
//!   attacker, the min-cut defender, and a descriptor factory.
//! - **Engine** (`engine`): episode loop, discounted payoff accounting,
//!   valid-move predicates, worst-case reward bounds.
//! - **RL environments** (`rl`): greedy micro-MDPs exposing `reset` /
//!   `step` / `render` with dense observation vectors and mixed-strategy
//!   opponents.
//! - **Loader** (`loader`): JSON graph/spec files, strategy descriptor
//!   strings, mixed-strategy files.

pub mod agent;
pub mod engine;
pub mod error;
pub mod graph;
pub mod loader;
pub mod logging;
pub mod mincut;
pub mod oracle;
pub mod rl;
pub mod rng;
pub mod state;
pub mod types;

// --- Re-exports for ergonomic external use ---------------------------------

pub use agent::{
    create_attacker, create_defender, select_candidate, AttackCandidate, AttackerPolicy,
    DefenderPolicy, MinCutDefender, UniformAttacker, UniformDefender, ValuePropagationAttacker,
};
pub use engine::{EpisodeSummary, GameSimulation};
pub use error::{Error, Result};
pub use graph::{DependencyGraph, Edge, Node};
pub use loader::{
    attacker_from_string, defender_from_string, graph_from_json, graph_to_json, load_graph,
    load_spec, parse_strategy_descriptor, save_graph, GameSimulationSpec, StrategyDescriptor,
};
pub use logging::{EventSink, FileSink, NoopSink};
pub use rl::{
    GreedyAttackerEnv, GreedyDefenderEnv, GreedyEnvConfig, MixedStrategy, StepResult,
};
pub use rng::GameRng;
pub use state::{
    AttackerAction, AttackerRawObservation, DefenderAction, DefenderObservation, GameState,
    ATTACKER_OBS_LENGTH,
};
pub use types::{ActivationType, EdgeId, NodeId, NodeState, NodeType};
