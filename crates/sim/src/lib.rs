//! # Virtual Machine Harness
//!
//! Wires the `motion` planner pipeline and the `stepper` DDA runtime into a
//! deterministic in-process machine for development and CI validation. The
//! harness plays all three priority levels itself: it polls the background
//! loop, pumps the segment executor whenever the prep slot frees up, and
//! ticks the pulse clock one DDA period at a time while counting every step
//! pulse per motor.
//!
//! A [`MotionTrace`] of segment loads and loader degradations can be
//! captured and dumped as JSON for offline analysis.

pub mod machine;
pub mod trace;

pub use machine::{CountingPins, SimError, VirtualMachine};
pub use trace::{MotionTrace, TraceEvent};
