// src/logging.rs
//
// Telemetry sinks for episode runs.
// - EventSink: trait used by the runner
// - NoopSink:  discards all events
// - FileSink:  writes one JSON-like line per committed step

use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::engine::GameSimulation;

/// Abstract sink for per-step telemetry.
pub trait EventSink {
    fn log_step(&mut self, episode: usize, sim: &GameSimulation);
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn log_step(&mut self, _episode: usize, _sim: &GameSimulation) {
        // intentionally no-op
    }
}

/// JSONL file sink.
///
/// Each committed step is written as a single JSON object on its own line.
/// The payload is small and encoded manually to keep the sink dependency
/// free.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create a new sink writing to `path`.
    pub fn create(path: &str) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl EventSink for FileSink {
    fn log_step(&mut self, episode: usize, sim: &GameSimulation) {
        let line = format!(
            "{{\
                \"episode\":{},\
                \"timeStep\":{},\
                \"timeStepsLeft\":{},\
                \"enabledCount\":{},\
                \"stateId\":{},\
                \"defenderMarginal\":{},\
                \"defenderTotal\":{},\
                \"attackerMarginal\":{},\
                \"attackerTotal\":{}\
            }}\n",
            episode,
            sim.num_time_step() - sim.time_steps_left(),
            sim.time_steps_left(),
            sim.game_state().enabled_count(),
            sim.game_state().id(),
            sim.defender_marginal_payoff(),
            sim.defender_total_payoff(),
            sim.attacker_marginal_payoff(),
            sim.attacker_total_payoff(),
        );

        if let Err(err) = self.writer.write_all(line.as_bytes()) {
            eprintln!("FileSink write failed: {err}");
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
