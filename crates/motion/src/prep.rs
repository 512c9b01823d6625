//! Segment preparer: converts a segment's axis-space travel and duration
//! into motor-space DDA parameters and publishes them to the prep slot.
//!
//! This is the last floating-point stage of the pipeline. Everything the
//! HIGH-priority loader consumes downstream is integer.

use crate::config::{MachineConfig, MOTORS};
use crate::error::MotionError;
use crate::math;

use stepper::{MotorSegment, PrepSegment, PrepSlot};

/// Steps below this amount leave a motor idle for the segment.
const STEP_EPSILON: f32 = 1e-6;

/// Preparer state (`sp`): the per-motor direction cache that detects
/// direction changes across segments.
pub struct PrepState {
    prev_forward: [Option<bool>; MOTORS],
}

impl PrepState {
    pub fn new() -> Self {
        Self {
            prev_forward: [None; MOTORS],
        }
    }

    /// Forgets cached directions, forcing the next segment to re-latch
    /// every direction pin.
    pub fn reset(&mut self) {
        self.prev_forward = [None; MOTORS];
    }
}

impl Default for PrepState {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives DDA parameters for one motion segment and hands them to the
/// loader. `steps` carries fractional steps; the fraction survives in the
/// substep increments.
pub(crate) fn prep_segment(
    state: &mut PrepState,
    slot: &PrepSlot,
    steps: &[f32; MOTORS],
    microseconds: f32,
    config: &MachineConfig,
) -> Result<(), MotionError> {
    if microseconds.is_nan() {
        return Err(MotionError::MoveTimeNan);
    }
    if microseconds.is_infinite() {
        return Err(MotionError::MoveTimeInfinite);
    }

    let ticks_exact = microseconds as f64 * 1e-6 * config.dda_rate_hz as f64;
    let dda_ticks = (math::round64(ticks_exact) as u32).max(1);

    let mut segment = PrepSegment {
        dda_ticks,
        substeps: config.dda_substeps,
        ..PrepSegment::EMPTY
    };

    for (motor, &step_count) in steps.iter().enumerate() {
        if math::abs(step_count) < STEP_EPSILON {
            continue; // motor idles; direction cache is left alone
        }
        let forward_logical = step_count >= 0.0;
        let forward = forward_logical != config.motors[motor].polarity_inverted;
        let increment = math::round64(
            math::abs(step_count) as f64 * config.dda_substeps as f64 / dda_ticks as f64,
        ) as i64;

        segment.motors[motor] = MotorSegment {
            substep_increment: increment,
            forward,
            direction_changed: state.prev_forward[motor] != Some(forward),
            step_sign: if forward_logical { 1 } else { -1 },
        };
        state.prev_forward[motor] = Some(forward);
    }

    slot.publish(&segment)
        .map_err(|_| MotionError::StepperAssertion)
}

/// Publishes a step-free timed segment. Used for dwells; the loader simply
/// counts the ticks down with pulses off.
pub(crate) fn prep_dwell(
    slot: &PrepSlot,
    seconds: f32,
    config: &MachineConfig,
) -> Result<(), MotionError> {
    if seconds.is_nan() {
        return Err(MotionError::MoveTimeNan);
    }
    if seconds.is_infinite() {
        return Err(MotionError::MoveTimeInfinite);
    }
    let ticks = math::round64(seconds as f64 * config.dda_rate_hz as f64);
    let ticks = if ticks < 1.0 {
        1
    } else if ticks > u32::MAX as f64 {
        u32::MAX
    } else {
        ticks as u32
    };
    slot.publish(&PrepSegment::dwell(ticks))
        .map_err(|_| MotionError::StepperAssertion)
}
