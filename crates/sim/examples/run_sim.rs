//! Runs a small demonstration program against the virtual machine and
//! prints what the pulse counters saw.
//!
//! ```sh
//! cargo run -p sim --example run_sim -- --trace /tmp/trace.json
//! ```

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use motion::{MachineConfig, AXES, MOTORS};
use sim::VirtualMachine;

#[derive(Parser, Debug)]
#[command(about = "Exercise the motion core against the virtual machine")]
struct Args {
    /// Machine profile as JSON (MachineConfig). Defaults to the built-in
    /// profile.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Write the captured motion trace to this path as JSON.
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Feed duration per move, minutes.
    #[arg(long, default_value_t = 0.01)]
    minutes: f32,
}

fn target(x: f32, y: f32) -> [f32; AXES] {
    let mut t = [0.0; AXES];
    t[0] = x;
    t[1] = y;
    t
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config: MachineConfig = match &args.profile {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening profile {}", path.display()))?;
            serde_json::from_reader(file).context("parsing machine profile")?
        }
        None => MachineConfig::default(),
    };

    let mut machine = VirtualMachine::new(config);

    // A square with a corner dwell, then back to origin: enough to exercise
    // look-ahead, cornering, dwell timing, and bidirectional closure.
    info!("queueing demonstration program");
    machine.move_to(target(20.0, 0.0), args.minutes)?;
    machine.move_to(target(20.0, 20.0), args.minutes)?;
    machine.dwell(0.25)?;
    machine.move_to(target(0.0, 20.0), args.minutes)?;
    machine.move_to(target(0.0, 0.0), args.minutes)?;

    let ticks = machine.run_until_idle(100_000_000)?;
    info!(ticks, "program complete");

    println!("pulse-clock ticks: {ticks}");
    println!("segments loaded:   {}", machine.trace().segment_count());
    for motor in 0..MOTORS {
        let steps = machine.motor_steps(motor);
        let pulses = machine.pulses(motor);
        if pulses > 0 {
            println!("motor {motor}: {pulses} pulses, net {steps} steps");
        }
    }
    println!(
        "final position: ({:.4}, {:.4})",
        machine.runtime_position(0),
        machine.runtime_position(1)
    );

    if let Some(path) = &args.trace {
        machine.trace().dump_json(path)?;
        info!(path = %path.display(), "trace written");
    }
    Ok(())
}
