#![deny(clippy::all)]
#![no_std]

//! # Hard Real-Time Step Generation
//!
//! This crate is the high-priority half of the r_tinyg motion pipeline. The
//! planner and segment executor (the `motion` crate) run at background and
//! low interrupt priority and produce short constant-time segments; this
//! crate consumes them from a single-slot handoff and turns them into step
//! pulses at a fixed pulse-clock rate.
//!
//! ## Architecture
//!
//! - [`PrepSlot`] is the producer/consumer slot between the segment preparer
//!   (LOW ISR) and the step loader (HIGH ISR). Ownership is a single atomic
//!   flag with acquire/release ordering; the payload is guarded by a
//!   `critical_section::Mutex` so the handoff is safe on single-core MCUs.
//! - [`DdaRuntime`] owns the per-motor substep accumulators and emits pulses
//!   through the [`MotorPins`] abstraction on every tick of the pulse clock.
//!   All arithmetic on the tick path is integer-only.
//! - [`SwitchSet`] debounces limit/homing switch edges with a lockout
//!   counter and latches the resulting action for the background loop.
//!
//! ## Safety
//!
//! - **No heap allocations**: the crate is fully `no_std`; all state lives
//!   in the owning singletons.
//! - **No floating point**: the DDA tick path uses only integer adds and
//!   compares, so it is safe to run from the highest-priority interrupt on
//!   FPU-less targets.
//! - **Single-writer discipline**: every field is mutated only by the
//!   priority level that owns it; the prep slot's owner flag is the only
//!   cross-level synchronisation point.

#[cfg(test)]
extern crate std;

pub mod dda;
pub mod power;
pub mod slot;
pub mod switches;

pub use dda::{DdaRuntime, DdaTick, LoaderDiagnostics, LoaderEvent, MotorPins};
pub use power::{MotorPowerSet, PowerMode};
pub use slot::{MotorSegment, PrepSegment, PrepSlot, SlotError, SlotOwner};
pub use switches::{SwitchAction, SwitchMode, SwitchSet, SWITCH_COUNT};

/// Number of physical motor channels the runtime drives.
pub const MOTORS: usize = 6;

/// Default pulse-clock rate in Hz. The DDA runs at this fixed rate no matter
/// how low the actual step rate is, which maximises aliasing quality at the
/// cost of ISR cycles.
pub const DDA_RATE_HZ: u32 = 50_000;

/// Substep units per whole step. Converts fractional-step arithmetic into
/// integer math; the accumulators carry sub-step phase across segments so
/// position cannot drift at segment boundaries.
pub const DDA_SUBSTEPS: i64 = 5_000_000;
