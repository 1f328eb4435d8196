// src/main.rs
//
// Research-harness CLI for the dependency-graph game.
//
// Loads a graph and a simulation spec, builds both players from the
// spec's strategy strings, and runs a batch of episodes, printing a
// concise run header and per-batch payoff summary.
//
// Exit codes: 0 clean run, 1 invalid arguments, 2 invalid spec or graph.

use clap::{ArgAction, Parser};

use depgraph::logging::{EventSink, FileSink, NoopSink};
use depgraph::{attacker_from_string, defender_from_string, load_graph, load_spec};
use depgraph::{Error, GameSimulation};

#[derive(Debug, Parser)]
#[command(
    name = "depgraph",
    about = "Dependency-graph security game simulator (research harness)",
    version
)]
struct Args {
    /// Path to the graph JSON file.
    #[arg(long)]
    graph: String,

    /// Path to the simulation spec JSON file.
    #[arg(long)]
    spec: String,

    /// Number of episodes to run.
    #[arg(long, default_value_t = 100)]
    episodes: usize,

    /// Deterministic base seed; episode i runs with seed + i.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Optional JSONL step log.
    #[arg(long)]
    log: Option<String>,

    /// Verbosity: -v prints per-episode payoffs.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    if args.episodes == 0 {
        eprintln!("depgraph: --episodes must be positive");
        std::process::exit(1);
    }
    if let Err(err) = run(&args) {
        eprintln!("depgraph: {err}");
        std::process::exit(2);
    }
}

fn run(args: &Args) -> depgraph::Result<()> {
    let spec = load_spec(&args.spec)?;
    let graph = load_graph(&args.graph)?;

    let attacker = attacker_from_string(&spec.attacker_string, spec.disc_fact)?;
    let defender = defender_from_string(&spec.defender_string, spec.disc_fact)?;

    println!(
        "depgraph | nodes={} edges={} targets={} | T={} gamma={} | attacker={} defender={} | episodes={} seed={}",
        graph.node_count(),
        graph.edge_count(),
        graph.target_set().len(),
        spec.num_time_step,
        spec.disc_fact,
        attacker.name(),
        defender.name(),
        args.episodes,
        args.seed,
    );

    let mut sink: Box<dyn EventSink> = match &args.log {
        Some(path) => Box::new(FileSink::create(path).map_err(|source| Error::Io {
            operation: format!("create log file {path}"),
            source,
        })?),
        None => Box::new(NoopSink),
    };

    let mut sim = GameSimulation::new(graph, spec.num_time_step, spec.disc_fact, args.seed)?;

    let mut attacker_sum = 0.0;
    let mut defender_sum = 0.0;
    for episode in 0..args.episodes {
        sim.reseed(args.seed.wrapping_add(episode as u64));
        sim.reset();
        while !sim.is_game_over() {
            let att_action = sim.sample_attacker(&attacker);
            let def_action = sim.sample_defender(&defender);
            sim.step_actions(def_action, att_action)?;
            sink.log_step(episode, &sim);
        }
        attacker_sum += sim.attacker_total_payoff();
        defender_sum += sim.defender_total_payoff();
        if args.verbose > 0 {
            println!(
                "episode {:>4} | attacker {:>10.4} | defender {:>10.4}",
                episode,
                sim.attacker_total_payoff(),
                sim.defender_total_payoff(),
            );
        }
    }

    let n = args.episodes as f64;
    println!(
        "mean payoffs over {} episodes | attacker {:.4} | defender {:.4}",
        args.episodes,
        attacker_sum / n,
        defender_sum / n,
    );
    Ok(())
}
