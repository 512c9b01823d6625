//! Motion trace capture.
//!
//! Records what the virtual machine observed at each segment boundary so a
//! run can be inspected (or diffed in CI) after the fact.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use motion::MOTORS;
use serde::{Deserialize, Serialize};

/// One observed event in a simulation run. Ticks are pulse-clock ticks.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum TraceEvent {
    /// A segment was taken from the prep slot by the loader.
    Segment {
        tick: u64,
        /// Executor velocity at the time of the load, mm/min.
        velocity: f32,
        /// Signed step counts per motor after the load.
        steps: [i32; MOTORS],
    },
    /// The loader found no segment ready and stretched time.
    Starved { tick: u64 },
    /// The machine parked in a feedhold.
    Hold { tick: u64 },
    /// Emergency shutdown latched.
    Shutdown { tick: u64 },
}

/// Ordered record of a simulation run.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct MotionTrace {
    pub events: Vec<TraceEvent>,
}

impl MotionTrace {
    pub fn record(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    /// Number of segments loaded during the run.
    pub fn segment_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TraceEvent::Segment { .. }))
            .count()
    }

    /// Writes the trace as pretty JSON.
    pub fn dump_json(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        let json = serde_json::to_string_pretty(self)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
