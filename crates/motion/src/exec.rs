//! Segment executor: drains one planning block into constant-time segments
//! whose velocities trace the planned S-curve.
//!
//! Head and tail sections run as two halves around their velocity midpoint.
//! In the first half the velocity follows the pure jerk integral
//! `v = v0 +/- (jerk/2) * t^2`; in the second half the midpoint acceleration
//! contributes linearly and the jerk term reverses sign. `t` here is the
//! accel pseudo-time, stepped once per segment and sampled at segment
//! midpoints. The body is constant velocity.
//!
//! The executor runs at LOW interrupt priority, invoked by the step loader
//! whenever the prep slot frees up. Each invocation emits at most one
//! segment.

use crate::config::{MachineConfig, AXES, MICROSECONDS_PER_MINUTE, MOTORS};
use crate::error::MotionError;
use crate::kinematics::Kinematics;
use crate::math;
use crate::planner::PlanBlock;
use crate::prep::{self, PrepState};
use crate::trapezoid;
use crate::EPSILON;

use stepper::PrepSlot;

/// Active section of the running block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Section {
    Head,
    Body,
    Tail,
}

/// Progress within the active section. Head and tail use `New -> Run1 ->
/// Run2`; the body uses `New -> Run`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SectionState {
    New,
    Run1,
    Run2,
    Run,
}

/// What a single executor invocation produced.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum SegmentOutcome {
    /// One segment was handed to the preparer; the block continues.
    Emitted,
    /// The block is complete (its final segment, if any, was just emitted).
    Done,
}

/// The executor runtime singleton (`mr`). Owned by the LOW-priority level
/// once a block starts running; the hold planner reads `segment_velocity`
/// under the discipline that it only changes at executor ticks.
pub struct ExecRuntime {
    active: bool,
    section: Section,
    section_state: SectionState,

    position: [f32; AXES],
    target: [f32; AXES],
    unit: [f32; AXES],

    head_length: f32,
    body_length: f32,
    tail_length: f32,
    entry_velocity: f32,
    cruise_velocity: f32,
    exit_velocity: f32,

    jerk_div2: f32,
    midpoint_velocity: f32,
    midpoint_acceleration: f32,

    segments: u32,
    segment_count: u32,
    /// Wall time per segment, minutes.
    segment_time: f32,
    /// Accel pseudo-time per segment.
    segment_accel_time: f32,
    elapsed_accel_time: f32,
    segment_velocity: f32,
    microseconds: f32,

    /// Set while running a forced braking tail whose end is the feedhold
    /// point (the block must be re-queued, not freed).
    hold_braking: bool,
}

impl ExecRuntime {
    pub fn new() -> Self {
        Self {
            active: false,
            section: Section::Head,
            section_state: SectionState::New,
            position: [0.0; AXES],
            target: [0.0; AXES],
            unit: [0.0; AXES],
            head_length: 0.0,
            body_length: 0.0,
            tail_length: 0.0,
            entry_velocity: 0.0,
            cruise_velocity: 0.0,
            exit_velocity: 0.0,
            jerk_div2: 0.0,
            midpoint_velocity: 0.0,
            midpoint_acceleration: 0.0,
            segments: 0,
            segment_count: 0,
            segment_time: 0.0,
            segment_accel_time: 0.0,
            elapsed_accel_time: 0.0,
            segment_velocity: 0.0,
            microseconds: 0.0,
            hold_braking: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Velocity of the most recent segment, mm/min.
    pub fn segment_velocity(&self) -> f32 {
        if self.active {
            self.segment_velocity
        } else {
            0.0
        }
    }

    pub fn position(&self) -> [f32; AXES] {
        self.position
    }

    pub fn set_position(&mut self, position: [f32; AXES]) {
        self.position = position;
    }

    /// Distance left to the running block's endpoint.
    pub(crate) fn remaining_length(&self) -> f32 {
        let mut sum = 0.0;
        for axis in 0..AXES {
            sum += math::square(self.target[axis] - self.position[axis]);
        }
        math::sqrt(sum)
    }

    /// Clears all motion state. Position is preserved.
    pub fn reset(&mut self) {
        self.active = false;
        self.section = Section::Head;
        self.section_state = SectionState::New;
        self.segment_count = 0;
        self.segment_velocity = 0.0;
        self.hold_braking = false;
    }

    /// Latches a fresh block into the runtime.
    pub(crate) fn begin_block(&mut self, block: &PlanBlock) {
        self.target = block.target;
        self.unit = block.unit;
        self.head_length = block.head_length;
        self.body_length = block.body_length;
        self.tail_length = block.tail_length;
        self.entry_velocity = block.entry_velocity;
        self.cruise_velocity = block.cruise_velocity;
        self.exit_velocity = block.exit_velocity;
        self.jerk_div2 = block.jerk / 2.0;
        self.section = Section::Head;
        self.section_state = SectionState::New;
        self.segment_velocity = block.entry_velocity;
        self.active = true;
        self.hold_braking = false;
    }

    /// Replaces the remainder of the running block with a deceleration tail
    /// (feedhold). `final_hold` marks the tail's end as the hold point.
    pub(crate) fn force_braking_tail(
        &mut self,
        length: f32,
        from_velocity: f32,
        exit_velocity: f32,
        final_hold: bool,
    ) {
        for axis in 0..AXES {
            self.target[axis] = self.position[axis] + self.unit[axis] * length;
        }
        self.head_length = 0.0;
        self.body_length = 0.0;
        self.tail_length = length;
        self.entry_velocity = from_velocity;
        self.cruise_velocity = from_velocity;
        self.exit_velocity = exit_velocity;
        self.section = Section::Tail;
        self.section_state = SectionState::New;
        self.active = true;
        self.hold_braking = final_hold;
    }

    /// True exactly once after the forced braking tail completes.
    pub(crate) fn take_hold_braking(&mut self) -> bool {
        core::mem::take(&mut self.hold_braking)
    }

    /// Runs the section state machine until one segment is emitted or the
    /// block completes.
    pub(crate) fn segment_tick<K: Kinematics>(
        &mut self,
        kinematics: &K,
        prep: &mut PrepState,
        slot: &PrepSlot,
        config: &MachineConfig,
    ) -> Result<SegmentOutcome, MotionError> {
        loop {
            match (self.section, self.section_state) {
                (Section::Head, SectionState::New) => {
                    let delta = self.cruise_velocity - self.entry_velocity;
                    if self.head_length < EPSILON {
                        self.section = Section::Body;
                        continue;
                    }
                    if !trapezoid::veq(self.entry_velocity, self.cruise_velocity) {
                        self.init_ramp(self.entry_velocity, self.cruise_velocity, self.head_length, delta, config);
                        self.section_state = SectionState::Run1;
                        continue;
                    }
                    // No velocity change left; run the head as cruise.
                    self.body_length += self.head_length;
                    self.head_length = 0.0;
                    self.section = Section::Body;
                }
                (Section::Head, SectionState::Run1) => {
                    self.segment_velocity = self.entry_velocity
                        + math::square(self.elapsed_accel_time) * self.jerk_div2;
                    let done = self.emit(kinematics, prep, slot, config, false)?;
                    if done {
                        self.segment_count = self.segments;
                        self.elapsed_accel_time = self.segment_accel_time / 2.0;
                        self.section_state = SectionState::Run2;
                    } else {
                        self.elapsed_accel_time += self.segment_accel_time;
                    }
                    return Ok(SegmentOutcome::Emitted);
                }
                (Section::Head, SectionState::Run2) => {
                    self.segment_velocity = self.midpoint_velocity
                        + self.elapsed_accel_time * self.midpoint_acceleration
                        - math::square(self.elapsed_accel_time) * self.jerk_div2;
                    let last = self.segment_count == 1
                        && self.body_length < EPSILON
                        && self.tail_length < EPSILON;
                    let done = self.emit(kinematics, prep, slot, config, last)?;
                    if done {
                        self.section = Section::Body;
                        self.section_state = SectionState::New;
                    } else {
                        self.elapsed_accel_time += self.segment_accel_time;
                    }
                    return Ok(SegmentOutcome::Emitted);
                }
                (Section::Body, SectionState::New) => {
                    if self.body_length < EPSILON {
                        self.section = Section::Tail;
                        continue;
                    }
                    if self.cruise_velocity < EPSILON {
                        // A cruise section with no velocity cannot move.
                        self.active = false;
                        return Err(MotionError::PlannerAssertion);
                    }
                    let move_time = self.body_length / self.cruise_velocity;
                    let segments = math::ceil(
                        move_time * MICROSECONDS_PER_MINUTE / config.nom_segment_usec,
                    )
                    .max(1.0);
                    self.segments = segments as u32;
                    self.segment_count = self.segments;
                    self.segment_time = move_time / segments;
                    self.microseconds = self.segment_time * MICROSECONDS_PER_MINUTE;
                    self.segment_velocity = self.cruise_velocity;
                    self.section_state = SectionState::Run;
                }
                (Section::Body, SectionState::Run) => {
                    let last = self.segment_count == 1 && self.tail_length < EPSILON;
                    let done = self.emit(kinematics, prep, slot, config, last)?;
                    if done {
                        self.section = Section::Tail;
                        self.section_state = SectionState::New;
                    }
                    return Ok(SegmentOutcome::Emitted);
                }
                (Section::Tail, SectionState::New) => {
                    if self.tail_length < EPSILON {
                        self.active = false;
                        return Ok(SegmentOutcome::Done);
                    }
                    let delta = self.cruise_velocity - self.exit_velocity;
                    if !trapezoid::veq(self.exit_velocity, self.cruise_velocity) {
                        self.init_ramp(self.exit_velocity, self.cruise_velocity, self.tail_length, -delta, config);
                        self.section_state = SectionState::Run1;
                        continue;
                    }
                    // Constant-velocity tail: run it as a body extension.
                    self.body_length = self.tail_length;
                    self.tail_length = 0.0;
                    self.section = Section::Body;
                    self.section_state = SectionState::New;
                }
                (Section::Tail, SectionState::Run1) => {
                    self.segment_velocity = self.cruise_velocity
                        - math::square(self.elapsed_accel_time) * self.jerk_div2;
                    let done = self.emit(kinematics, prep, slot, config, false)?;
                    if done {
                        self.segment_count = self.segments;
                        self.elapsed_accel_time = self.segment_accel_time / 2.0;
                        self.section_state = SectionState::Run2;
                    } else {
                        self.elapsed_accel_time += self.segment_accel_time;
                    }
                    return Ok(SegmentOutcome::Emitted);
                }
                (Section::Tail, SectionState::Run2) => {
                    self.segment_velocity = self.midpoint_velocity
                        + self.elapsed_accel_time * self.midpoint_acceleration
                        + math::square(self.elapsed_accel_time) * self.jerk_div2;
                    let last = self.segment_count == 1;
                    let done = self.emit(kinematics, prep, slot, config, last)?;
                    if done {
                        self.active = false;
                        return Ok(SegmentOutcome::Done);
                    }
                    self.elapsed_accel_time += self.segment_accel_time;
                    return Ok(SegmentOutcome::Emitted);
                }
                // Run states never pair with the other section kinds.
                _ => {
                    self.active = false;
                    return Err(MotionError::PlannerAssertion);
                }
            }
        }
    }

    /// Sets up a two-half ramp section. `signed_delta` is positive for
    /// acceleration (head), negative for deceleration (tail).
    fn init_ramp(
        &mut self,
        slow_velocity: f32,
        fast_velocity: f32,
        length: f32,
        signed_delta: f32,
        config: &MachineConfig,
    ) {
        let (v_from, v_to) = if signed_delta >= 0.0 {
            (slow_velocity, fast_velocity)
        } else {
            (fast_velocity, slow_velocity)
        };
        self.midpoint_velocity = (v_from + v_to) / 2.0;
        let move_time = length / self.midpoint_velocity;
        // Pseudo-time of the jerk integral across the whole section.
        let accel_time = 2.0 * math::sqrt(math::abs(signed_delta) / (2.0 * self.jerk_div2));
        self.midpoint_acceleration = 2.0 * (v_to - v_from) / accel_time;

        // Segments per half.
        let segments = math::ceil(
            move_time * MICROSECONDS_PER_MINUTE / (2.0 * config.nom_segment_usec),
        )
        .max(1.0);
        self.segments = segments as u32;
        self.segment_count = self.segments;
        self.segment_time = move_time / (2.0 * segments);
        self.segment_accel_time = accel_time / (2.0 * segments);
        // Sample each segment at its midpoint.
        self.elapsed_accel_time = self.segment_accel_time / 2.0;
        self.microseconds = self.segment_time * MICROSECONDS_PER_MINUTE;
    }

    /// Emits one segment to the preparer. Returns `true` when it was the
    /// section's last. `snap_to_target` pins the block's exact endpoint so
    /// float residue cannot accumulate into position drift.
    fn emit<K: Kinematics>(
        &mut self,
        kinematics: &K,
        prep: &mut PrepState,
        slot: &PrepSlot,
        config: &MachineConfig,
        snap_to_target: bool,
    ) -> Result<bool, MotionError> {
        self.segment_count -= 1;

        let mut segment_target = [0.0; AXES];
        let distance = self.segment_velocity * self.segment_time;
        for axis in 0..AXES {
            segment_target[axis] = if snap_to_target && self.segment_count == 0 {
                self.target[axis]
            } else {
                self.position[axis] + self.unit[axis] * distance
            };
        }

        let mut travel = [0.0; AXES];
        for axis in 0..AXES {
            travel[axis] = segment_target[axis] - self.position[axis];
        }
        let mut steps = [0.0; MOTORS];
        kinematics.inverse(&travel, &mut steps);
        prep::prep_segment(prep, slot, &steps, self.microseconds, config)?;

        self.position = segment_target;
        Ok(self.segment_count == 0)
    }
}

impl Default for ExecRuntime {
    fn default() -> Self {
        Self::new()
    }
}
