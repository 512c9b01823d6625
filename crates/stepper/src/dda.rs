//! Fixed-rate DDA step generation and segment loading.
//!
//! The runtime advances one [`tick`](DdaRuntime::tick) per pulse-clock
//! period. Within a segment, every tick adds each motor's substep increment
//! to its signed accumulator; a positive crossing emits one step pulse and
//! subtracts a whole step's worth of substeps. The accumulator is only
//! re-referenced on direction changes (by reflection), so fractional phase
//! carries across segment boundaries and position cannot drift.
//!
//! At a segment boundary the loader picks up the next segment from the
//! [`PrepSlot`] and asks for the executor to be re-invoked. If the preparer
//! has not caught up, the loader stretches time with a step-free null
//! segment; that is a reportable quality degradation, not an error.

use heapless::HistoryBuffer;

use crate::power::{MotorPowerSet, PowerMode};
use crate::slot::{PrepSegment, PrepSlot};
use crate::MOTORS;

/// Ticks of step-free stretching inserted when the preparer is late.
const NULL_SEGMENT_TICKS: u32 = 50;

/// Abstraction over the stepper driver pins. On hardware this maps to
/// direct GPIO register writes; the simulator counts pulses instead.
pub trait MotorPins {
    /// Latches the direction line for a motor. Called before any pulse of a
    /// segment that reverses the motor.
    fn set_direction(&mut self, motor: usize, forward: bool);
    /// Emits one step pulse (rising edge) for a motor.
    fn step(&mut self, motor: usize);
    /// Drives the enable line for a motor.
    fn set_enabled(&mut self, motor: usize, enabled: bool);
}

/// Outcome of one pulse-clock tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DdaTick {
    /// No segment loaded and none pending; motion is stopped.
    Idle,
    /// A tick of the current segment was executed.
    Active,
    /// A new segment was taken from the slot. The executor must be invoked
    /// (software interrupt on hardware) to prepare the next one.
    SegmentLoaded,
    /// The current segment ended with nothing ready; a null segment was
    /// inserted to stretch time until the preparer catches up.
    Starved,
}

/// One recorded loader degradation event.
#[derive(Debug, Copy, Clone)]
pub struct LoaderEvent {
    /// Pulse-clock tick at which the event occurred.
    pub at_tick: u64,
    /// Ticks of step-free stretching inserted.
    pub stretched_ticks: u32,
}

/// Rolling record of loader degradations, drained by the status reporter.
pub struct LoaderDiagnostics {
    /// Total segments stretched since reset.
    pub starved_segments: u32,
    history: HistoryBuffer<LoaderEvent, 16>,
}

impl Default for LoaderDiagnostics {
    fn default() -> Self {
        Self {
            starved_segments: 0,
            history: HistoryBuffer::new(),
        }
    }
}

impl LoaderDiagnostics {
    fn record(&mut self, event: LoaderEvent) {
        self.starved_segments = self.starved_segments.saturating_add(1);
        self.history.write(event);
    }

    /// Most recent events, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &LoaderEvent> {
        self.history.oldest_ordered()
    }

    pub fn clear(&mut self) {
        self.starved_segments = 0;
        self.history = HistoryBuffer::new();
    }
}

/// The DDA runtime singleton. Exclusively owned by the HIGH-priority ISR.
pub struct DdaRuntime {
    ticks_remaining: u32,
    substeps: i64,
    accumulators: [i64; MOTORS],
    increments: [i64; MOTORS],
    step_signs: [i8; MOTORS],
    directions: [bool; MOTORS],
    step_counts: [i32; MOTORS],
    active: bool,
    tick_count: u64,
    power: MotorPowerSet,
    diagnostics: LoaderDiagnostics,
}

impl DdaRuntime {
    pub fn new() -> Self {
        Self {
            ticks_remaining: 0,
            substeps: crate::DDA_SUBSTEPS,
            // Half-step bias makes isolated pulse counts round to nearest.
            accumulators: [-(crate::DDA_SUBSTEPS / 2); MOTORS],
            increments: [0; MOTORS],
            step_signs: [0; MOTORS],
            directions: [true; MOTORS],
            step_counts: [0; MOTORS],
            active: false,
            tick_count: 0,
            power: MotorPowerSet::new(),
            diagnostics: LoaderDiagnostics::default(),
        }
    }

    /// Configures one motor's power handling.
    pub fn configure_power(&mut self, motor: usize, mode: PowerMode, timeout_ticks: u32) {
        self.power.configure(motor, mode, timeout_ticks);
    }

    /// Signed step count of a motor since the last reset. This is the
    /// encoder-model position: logical steps, before polarity correction.
    pub fn motor_steps(&self, motor: usize) -> i32 {
        self.step_counts[motor]
    }

    /// Last direction latched onto a motor's direction pin.
    pub fn motor_direction(&self, motor: usize) -> bool {
        self.directions[motor]
    }

    /// True while a segment is loaded.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn diagnostics(&self) -> &LoaderDiagnostics {
        &self.diagnostics
    }

    /// Executes one tick of the pulse clock.
    ///
    /// `expecting` tells the loader whether the executor has more segments
    /// in flight; it selects between stretching (starved) and going idle
    /// when the slot is empty at a segment boundary.
    pub fn tick(
        &mut self,
        pins: &mut impl MotorPins,
        slot: &PrepSlot,
        expecting: bool,
    ) -> DdaTick {
        self.tick_count = self.tick_count.wrapping_add(1);

        if !self.active {
            if self.try_load(pins, slot) {
                return DdaTick::SegmentLoaded;
            }
            let drop_mask = self.power.idle_tick(1);
            Self::apply_disable(pins, drop_mask);
            return DdaTick::Idle;
        }

        self.run_tick(pins);

        if self.ticks_remaining > 0 {
            return DdaTick::Active;
        }

        // Segment boundary: pick up the next segment or stretch.
        self.active = false;
        if self.try_load(pins, slot) {
            return DdaTick::SegmentLoaded;
        }
        for motor in 0..MOTORS {
            self.increments[motor] = 0;
            self.power.rest(motor);
        }
        if expecting {
            self.ticks_remaining = NULL_SEGMENT_TICKS;
            self.active = true;
            self.diagnostics.record(LoaderEvent {
                at_tick: self.tick_count,
                stretched_ticks: NULL_SEGMENT_TICKS,
            });
            #[cfg(feature = "defmt-logging")]
            defmt::warn!("step loader starved, stretching {} ticks", NULL_SEGMENT_TICKS);
            return DdaTick::Starved;
        }
        DdaTick::Idle
    }

    /// Clears all motion state. Callable from any context after an abort;
    /// does not touch the step counts (position is preserved for recovery).
    pub fn reset(&mut self) {
        self.ticks_remaining = 0;
        self.active = false;
        self.increments = [0; MOTORS];
        self.step_signs = [0; MOTORS];
        self.accumulators = [-(self.substeps / 2); MOTORS];
        self.diagnostics.clear();
    }

    /// Emergency shutdown: stop pulsing and drop every enable line.
    pub fn shutdown(&mut self, pins: &mut impl MotorPins) {
        self.ticks_remaining = 0;
        self.active = false;
        self.increments = [0; MOTORS];
        let mask = self.power.all_off();
        Self::apply_disable(pins, mask);
    }

    /// Zeroes the signed step counters (homing / position set).
    pub fn zero_steps(&mut self) {
        self.step_counts = [0; MOTORS];
    }

    fn apply_disable(pins: &mut impl MotorPins, mask: u8) {
        for motor in 0..MOTORS {
            if (mask >> motor) & 1 != 0 {
                pins.set_enabled(motor, false);
            }
        }
    }

    fn try_load(&mut self, pins: &mut impl MotorPins, slot: &PrepSlot) -> bool {
        let Some(segment) = slot.try_take() else {
            return false;
        };
        self.load(&segment, pins);
        true
    }

    fn load(&mut self, segment: &PrepSegment, pins: &mut impl MotorPins) {
        self.substeps = segment.substeps;
        self.ticks_remaining = segment.dda_ticks;
        let any_motion = segment
            .motors
            .iter()
            .any(|m| m.substep_increment != 0);

        for motor in 0..MOTORS {
            let m = &segment.motors[motor];
            self.increments[motor] = m.substep_increment;
            self.step_signs[motor] = m.step_sign;

            if m.substep_increment != 0 {
                if m.direction_changed {
                    pins.set_direction(motor, m.forward);
                    self.directions[motor] = m.forward;
                    // Reflect the phase residual so the fractional position
                    // is preserved across the reversal.
                    self.accumulators[motor] = -(self.substeps + self.accumulators[motor]);
                }
                if self.power.wake(motor) {
                    pins.set_enabled(motor, true);
                }
            } else {
                self.power.rest(motor);
                if any_motion
                    && matches!(self.power.mode(motor), PowerMode::InCycle)
                    && self.power.wake(motor)
                {
                    pins.set_enabled(motor, true);
                }
            }
        }
        self.active = segment.dda_ticks > 0;
    }

    fn run_tick(&mut self, pins: &mut impl MotorPins) {
        for motor in 0..MOTORS {
            let increment = self.increments[motor];
            if increment == 0 {
                continue;
            }
            self.accumulators[motor] += increment;
            if self.accumulators[motor] > 0 {
                pins.step(motor);
                self.accumulators[motor] -= self.substeps;
                self.step_counts[motor] += i32::from(self.step_signs[motor]);
            }
        }
        self.ticks_remaining -= 1;
    }
}

impl Default for DdaRuntime {
    fn default() -> Self {
        Self::new()
    }
}
