//! # Motion Core
//!
//! The planning half of the r_tinyg motion controller: a jerk-limited
//! look-ahead trajectory planner, the segment executor/preparer pipeline
//! that feeds the step loader, and the feedhold machinery that preempts it.
//! Usable on both host and MCU (`no_std`-friendly; float math comes from
//! std or `libm` by feature).
//!
//! ## Pipeline
//!
//! ```text
//! plan_line()            [background]  planner ring + look-ahead
//!   -> exec_move()       [LOW ISR]     S-curve segments, ~5 ms each
//!     -> prep slot       [handoff]     DDA parameters, integer-only
//!       -> DDA loader    [HIGH ISR]    step pulses (the `stepper` crate)
//! ```
//!
//! Each singleton is owned by the level that mutates it; the prep slot's
//! atomic owner flag is the only cross-level synchronisation point.
//!
//! The [`MotionSystem`] context bundles the planner, executor, preparer,
//! kinematics, and signal latches, and exposes the boundary described in
//! the crate-level operations: `plan_*`, `exec_move`, `poll`, position and
//! velocity introspection, flush and abort.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod config;
pub mod error;
pub mod exec;
pub mod feedhold;
pub mod kinematics;
mod math;
pub mod planner;
pub mod prep;
mod trapezoid;

use core::sync::atomic::{AtomicBool, Ordering};

pub use config::{AxisConfig, AxisMode, MachineConfig, MotorConfig, AXES, MOTORS};
pub use error::{ExecStatus, MotionError};
pub use exec::ExecRuntime;
pub use feedhold::HoldState;
pub use kinematics::{Kinematics, MotorMap};
pub use planner::{BlockKind, BlockState, PlanBlock, Planner, PLANNER_POOL};
pub use prep::PrepState;

use exec::SegmentOutcome;
use stepper::PrepSlot;

/// Length / duration resolution of the planner. Anything smaller is a
/// zero-length move.
pub(crate) const EPSILON: f32 = 1e-4;

/// Path-control mode applied to incoming moves.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PathControl {
    /// Corner at the junction-deviation limit (look-ahead active).
    #[default]
    Continuous,
    /// Decelerate to a full stop after every move.
    ExactStop,
}

/// Top-level machine condition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum MachineState {
    /// Idle; ready to accept motion.
    #[default]
    Ready,
    /// A machining cycle is executing.
    Cycle,
    /// Latched emergency shutdown (limit switch outside homing). Requires
    /// reset.
    Shutdown,
}

/// Latched one-shot signals from ISRs and the serial layer. Single writer
/// per flag, read-cleared by the background loop.
#[derive(Debug, Default)]
pub struct Signals {
    feedhold: AtomicBool,
    cycle_start: AtomicBool,
    abort: AtomicBool,
    limit: AtomicBool,
}

impl Signals {
    pub const fn new() -> Self {
        Self {
            feedhold: AtomicBool::new(false),
            cycle_start: AtomicBool::new(false),
            abort: AtomicBool::new(false),
            limit: AtomicBool::new(false),
        }
    }

    pub fn request_feedhold(&self) {
        self.feedhold.store(true, Ordering::Release);
    }

    pub fn request_cycle_start(&self) {
        self.cycle_start.store(true, Ordering::Release);
    }

    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    /// Raised by the switch ISR when a limit trips outside homing.
    pub fn raise_limit(&self) {
        self.limit.store(true, Ordering::Release);
    }

    fn take(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::AcqRel)
    }
}

/// The root motion-core context. Interrupt handlers reach it through a
/// single static reference; write access follows the ownership discipline
/// described on each component.
pub struct MotionSystem {
    config: MachineConfig,
    planner: Planner,
    exec: ExecRuntime,
    prep: PrepState,
    kinematics: MotorMap,
    hold: HoldState,
    signals: Signals,
    state: MachineState,
    path_control: PathControl,
}

impl MotionSystem {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            kinematics: MotorMap::from_config(&config),
            config,
            planner: Planner::new(),
            exec: ExecRuntime::new(),
            prep: PrepState::new(),
            hold: HoldState::Off,
            signals: Signals::new(),
            state: MachineState::Ready,
            path_control: PathControl::Continuous,
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Replaces the machine profile and rebuilds the kinematic mapping.
    pub fn set_config(&mut self, config: MachineConfig) {
        self.kinematics = MotorMap::from_config(&config);
        self.config = config;
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    pub fn machine_state(&self) -> MachineState {
        self.state
    }

    pub fn hold_state(&self) -> HoldState {
        self.hold
    }

    pub fn set_path_control(&mut self, mode: PathControl) {
        self.path_control = mode;
    }

    /// Read access to the planner for status reporting and tests.
    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Queues a straight move to `target` (axis space, absolute) taking
    /// `minutes`. Triggers the look-ahead replan.
    pub fn plan_line(&mut self, target: [f32; AXES], minutes: f32) -> Result<(), MotionError> {
        if matches!(self.state, MachineState::Shutdown) {
            return Err(MotionError::PlannerAssertion);
        }
        let exact_stop = matches!(self.path_control, PathControl::ExactStop);
        self.planner
            .plan_line(target, minutes, exact_stop, &self.config)
    }

    /// Queues a timed pause. Preceding moves plan to a full stop first.
    pub fn plan_dwell(&mut self, seconds: f32) -> Result<(), MotionError> {
        if matches!(self.state, MachineState::Shutdown) {
            return Err(MotionError::PlannerAssertion);
        }
        if seconds < EPSILON {
            return Err(MotionError::ZeroLength);
        }
        self.planner.plan_command(BlockKind::Dwell, seconds)
    }

    /// Queues a program-stop marker.
    pub fn plan_stop(&mut self) -> Result<(), MotionError> {
        self.planner.plan_command(BlockKind::Stop, 0.0)
    }

    /// Queues a program-end marker.
    pub fn plan_end(&mut self) -> Result<(), MotionError> {
        self.planner.plan_command(BlockKind::End, 0.0)
    }

    /// Forces both the planning and runtime positions (homing, G92).
    pub fn set_axis_position(&mut self, position: [f32; AXES]) {
        self.planner.set_position(position);
        self.exec.set_position(position);
    }

    /// Drops all queued moves and stops segment execution.
    pub fn flush_planner(&mut self) {
        self.planner.flush();
        self.exec.reset();
    }

    /// Full reset: queue, executor, preparer, hold machine and the prep
    /// slot. Callable from any context; position is preserved.
    pub fn abort(&mut self, slot: &PrepSlot) {
        self.flush_planner();
        self.prep.reset();
        slot.reset();
        self.hold = HoldState::Off;
        self.state = MachineState::Ready;
    }

    pub fn is_busy(&self) -> bool {
        self.exec.is_active()
            || !self.planner.is_empty()
            || !matches!(self.hold, HoldState::Off)
    }

    /// Whether the loader should expect further segments (selects stretch
    /// versus idle at a starved segment boundary).
    pub fn expecting_segments(&self) -> bool {
        self.is_busy()
            && !matches!(self.hold, HoldState::Hold)
            && !matches!(self.state, MachineState::Shutdown)
    }

    pub fn runtime_position(&self, axis: usize) -> f32 {
        self.exec.position()[axis]
    }

    pub fn runtime_velocity(&self) -> f32 {
        self.exec.segment_velocity()
    }

    /// Where the next queued move will start from.
    pub fn plan_position(&self) -> [f32; AXES] {
        self.planner.position()
    }

    /// Background housekeeping: drains signal latches and runs the hold
    /// replan when one is pending. Call once per main-loop pass.
    pub fn poll(&mut self, slot: &PrepSlot) {
        if Signals::take(&self.signals.abort) {
            // An abort supersedes anything else that was latched.
            Signals::take(&self.signals.feedhold);
            Signals::take(&self.signals.cycle_start);
            Signals::take(&self.signals.limit);
            self.abort(slot);
            return;
        }
        if Signals::take(&self.signals.limit) {
            // Limit thrown outside homing: latched emergency shutdown.
            self.flush_planner();
            self.prep.reset();
            slot.reset();
            self.hold = HoldState::Off;
            self.state = MachineState::Shutdown;
            return;
        }
        if Signals::take(&self.signals.feedhold)
            && matches!(self.hold, HoldState::Off)
            && !matches!(self.state, MachineState::Shutdown)
        {
            self.hold = HoldState::Sync;
        }
        if Signals::take(&self.signals.cycle_start)
            && matches!(self.hold, HoldState::Hold)
        {
            self.hold = HoldState::EndHold;
        }
        if matches!(self.hold, HoldState::Plan) {
            self.hold = feedhold::plan_hold(&mut self.planner, &mut self.exec);
        }
        if matches!(self.hold, HoldState::EndHold) {
            feedhold::release_hold(&mut self.planner);
            self.hold = HoldState::Off;
        }
    }

    /// Latches invariant violations: pulses stop and the core refuses all
    /// further motion until an external reset. Shape errors pass through.
    fn latch_fault(&mut self, error: MotionError) -> MotionError {
        if matches!(
            error,
            MotionError::PlannerAssertion | MotionError::StepperAssertion
        ) {
            self.state = MachineState::Shutdown;
        }
        error
    }

    /// The executor pump: emits at most one segment into the prep slot.
    ///
    /// Invoked from the LOW-priority software interrupt on hardware (the
    /// loader raises it when the slot frees up); the simulator calls it
    /// directly.
    pub fn exec_move(&mut self, slot: &PrepSlot) -> Result<ExecStatus, MotionError> {
        if matches!(self.state, MachineState::Shutdown) {
            return Ok(ExecStatus::Noop);
        }
        match self.hold {
            HoldState::Sync => {
                // The previous segment has finished cleanly; hand over to
                // the background hold replan.
                self.hold = HoldState::Plan;
                return Ok(if self.exec.is_active() {
                    ExecStatus::Again
                } else {
                    ExecStatus::Noop
                });
            }
            HoldState::Plan | HoldState::Hold => return Ok(ExecStatus::Noop),
            _ => {}
        }

        if !self.exec.is_active() {
            let Some(index) = self.planner.peek_run() else {
                if matches!(self.state, MachineState::Cycle) {
                    self.state = MachineState::Ready;
                }
                return Ok(ExecStatus::Noop);
            };
            if matches!(self.hold, HoldState::Decel) && self.planner.block(index).hold_point {
                self.hold = HoldState::Hold;
                return Ok(ExecStatus::Noop);
            }

            let index = self
                .planner
                .get_run()
                .ok_or(MotionError::PlannerAssertion)?;
            match self.planner.block(index).kind {
                BlockKind::Line => {
                    let block = *self.planner.block(index);
                    self.exec.begin_block(&block);
                    self.state = MachineState::Cycle;
                }
                BlockKind::Dwell => {
                    let seconds = self.planner.block(index).dwell_seconds;
                    if let Err(error) = prep::prep_dwell(slot, seconds, &self.config) {
                        return Err(self.latch_fault(error));
                    }
                    self.planner.free_run();
                    return Ok(ExecStatus::Done);
                }
                BlockKind::Stop | BlockKind::Start => {
                    self.planner.free_run();
                    return Ok(ExecStatus::Done);
                }
                BlockKind::End => {
                    self.planner.free_run();
                    self.state = MachineState::Ready;
                    return Ok(ExecStatus::Done);
                }
            }
        }

        let outcome = self
            .exec
            .segment_tick(&self.kinematics, &mut self.prep, slot, &self.config)
            .map_err(|error| self.latch_fault(error))?;
        match outcome {
            SegmentOutcome::Emitted => Ok(ExecStatus::Again),
            SegmentOutcome::Done => {
                if self.exec.take_hold_braking() {
                    // Braking tail complete: the cut-down block re-enters
                    // the queue as the gated hold point.
                    self.planner.requeue_run();
                    self.hold = HoldState::Hold;
                    return Ok(ExecStatus::Again);
                }
                self.planner.free_run();
                if matches!(self.hold, HoldState::Decel) {
                    match self.planner.peek_run() {
                        None => self.hold = HoldState::Hold,
                        Some(next) if self.planner.block(next).hold_point => {
                            self.hold = HoldState::Hold;
                        }
                        _ => {}
                    }
                }
                Ok(ExecStatus::Done)
            }
        }
    }
}
