//! The virtual machine: motion core + DDA runtime + counted pins.

use motion::{
    ExecStatus, HoldState, MachineConfig, MachineState, MotionError, MotionSystem, AXES, MOTORS,
};
use stepper::{
    DdaRuntime, DdaTick, MotorPins, PrepSlot, SlotOwner, SwitchAction, SwitchSet,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::trace::{MotionTrace, TraceEvent};

/// Pulse-clock ticks between 10 ms housekeeping passes (switch debounce).
const HOUSEKEEPING_PERIOD: u64 = 500;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SimError {
    #[error("motion core error: {0}")]
    Motion(MotionError),
    #[error("machine did not settle within {ticks} pulse ticks")]
    Stalled { ticks: u64 },
}

/// Pin double that counts pulses and latches direction/enable state.
#[derive(Debug, Default)]
pub struct CountingPins {
    pub pulses: [u64; MOTORS],
    pub directions: [bool; MOTORS],
    pub enabled: [bool; MOTORS],
}

impl MotorPins for CountingPins {
    fn set_direction(&mut self, motor: usize, forward: bool) {
        self.directions[motor] = forward;
    }

    fn step(&mut self, motor: usize) {
        self.pulses[motor] += 1;
    }

    fn set_enabled(&mut self, motor: usize, enabled: bool) {
        self.enabled[motor] = enabled;
    }
}

/// A complete controller in software: background loop, executor, and pulse
/// generation advance together, one pulse-clock tick at a time.
pub struct VirtualMachine {
    system: MotionSystem,
    dda: DdaRuntime,
    slot: PrepSlot,
    pins: CountingPins,
    switches: SwitchSet,
    trace: MotionTrace,
    tick: u64,
    shutdown_applied: bool,
}

impl VirtualMachine {
    pub fn new(config: MachineConfig) -> Self {
        let mut dda = DdaRuntime::new();
        let idle_ticks = config.idle_timeout_ticks();
        for (m, motor) in config.motors.iter().enumerate() {
            dda.configure_power(m, motor.power_mode, idle_ticks);
        }
        let mut switches = SwitchSet::new();
        for (a, axis) in config.axes.iter().enumerate() {
            switches.set_mode(SwitchSet::index(a, false), axis.switch_min);
            switches.set_mode(SwitchSet::index(a, true), axis.switch_max);
        }
        Self {
            system: MotionSystem::new(config),
            dda,
            slot: PrepSlot::new(),
            pins: CountingPins::default(),
            switches,
            trace: MotionTrace::default(),
            tick: 0,
            shutdown_applied: false,
        }
    }

    pub fn system(&self) -> &MotionSystem {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut MotionSystem {
        &mut self.system
    }

    pub fn trace(&self) -> &MotionTrace {
        &self.trace
    }

    pub fn ticks_elapsed(&self) -> u64 {
        self.tick
    }

    /// Signed logical steps a motor has accumulated (the encoder view).
    pub fn motor_steps(&self, motor: usize) -> i32 {
        self.dda.motor_steps(motor)
    }

    /// Raw pulse count on a motor's step pin.
    pub fn pulses(&self, motor: usize) -> u64 {
        self.pins.pulses[motor]
    }

    pub fn motor_enabled(&self, motor: usize) -> bool {
        self.pins.enabled[motor]
    }

    pub fn direction_pin(&self, motor: usize) -> bool {
        self.pins.directions[motor]
    }

    pub fn runtime_position(&self, axis: usize) -> f32 {
        self.system.runtime_position(axis)
    }

    // -- Front-end conveniences ------------------------------------------

    pub fn move_to(&mut self, target: [f32; AXES], minutes: f32) -> Result<(), MotionError> {
        self.system.plan_line(target, minutes)
    }

    pub fn dwell(&mut self, seconds: f32) -> Result<(), MotionError> {
        self.system.plan_dwell(seconds)
    }

    pub fn feedhold(&self) {
        self.system.signals().request_feedhold();
    }

    pub fn cycle_start(&self) {
        self.system.signals().request_cycle_start();
    }

    /// Requests an abort and clears the DDA runtime, as the reset handler
    /// on hardware would. Step counts are preserved for recovery.
    pub fn abort(&mut self) {
        self.system.signals().request_abort();
        self.dda.reset();
    }

    /// Arms or disarms the homing interpretation of the switches.
    pub fn set_homing_cycle(&mut self, homing: bool) {
        self.switches.set_homing_cycle(homing);
    }

    /// Injects a switch edge as the pin-change ISR would.
    pub fn trip_switch(&mut self, axis: usize, max: bool) {
        match self.switches.on_edge(SwitchSet::index(axis, max)) {
            SwitchAction::Feedhold => {
                debug!(axis, "homing switch hit, requesting feedhold");
                self.system.signals().request_feedhold();
            }
            SwitchAction::LimitThrown => {
                warn!(axis, "limit switch thrown, raising emergency stop");
                self.system.signals().raise_limit();
            }
            SwitchAction::Ignored => {}
        }
    }

    // -- Simulation core --------------------------------------------------

    /// Advances the machine by one pulse-clock tick.
    pub fn step(&mut self) -> Result<(), SimError> {
        self.service_background()?;

        if matches!(self.system.machine_state(), MachineState::Shutdown) {
            if !self.shutdown_applied {
                self.dda.shutdown(&mut self.pins);
                self.trace.record(TraceEvent::Shutdown { tick: self.tick });
                self.shutdown_applied = true;
            }
            self.tick += 1;
            return Ok(());
        }

        let expecting = self.system.expecting_segments();
        match self.dda.tick(&mut self.pins, &self.slot, expecting) {
            DdaTick::SegmentLoaded => {
                let mut steps = [0; MOTORS];
                for (m, s) in steps.iter_mut().enumerate() {
                    *s = self.dda.motor_steps(m);
                }
                self.trace.record(TraceEvent::Segment {
                    tick: self.tick,
                    velocity: self.system.runtime_velocity(),
                    steps,
                });
            }
            DdaTick::Starved => {
                self.trace.record(TraceEvent::Starved { tick: self.tick });
            }
            DdaTick::Idle | DdaTick::Active => {}
        }

        self.tick += 1;
        if self.tick % HOUSEKEEPING_PERIOD == 0 {
            self.switches.tick();
        }
        Ok(())
    }

    /// Runs until all motion has drained (or shutdown latched). Returns the
    /// ticks consumed.
    pub fn run_until_idle(&mut self, max_ticks: u64) -> Result<u64, SimError> {
        let start = self.tick;
        for _ in 0..max_ticks {
            self.step()?;
            if self.is_at_rest() {
                return Ok(self.tick - start);
            }
        }
        Err(SimError::Stalled { ticks: max_ticks })
    }

    /// Runs until the machine parks in a feedhold.
    pub fn run_until_hold(&mut self, max_ticks: u64) -> Result<u64, SimError> {
        let start = self.tick;
        for _ in 0..max_ticks {
            self.step()?;
            if matches!(self.system.hold_state(), HoldState::Hold) && !self.dda.is_active() {
                self.trace.record(TraceEvent::Hold { tick: self.tick });
                info!(
                    position = self.system.runtime_position(0),
                    "feedhold complete"
                );
                return Ok(self.tick - start);
            }
        }
        Err(SimError::Stalled { ticks: max_ticks })
    }

    /// Runs a fixed number of ticks regardless of machine state.
    pub fn run_ticks(&mut self, ticks: u64) -> Result<(), SimError> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    fn is_at_rest(&self) -> bool {
        let halted = matches!(self.system.machine_state(), MachineState::Shutdown);
        let drained = !self.system.is_busy()
            && !self.dda.is_active()
            && self.slot.owner() == SlotOwner::Exec;
        halted || drained
    }

    /// The background loop plus the LOW-ISR pump: poll signals, then feed
    /// the preparer until the slot is full or there is nothing to do.
    fn service_background(&mut self) -> Result<(), SimError> {
        loop {
            self.system.poll(&self.slot);
            if self.slot.owner() != SlotOwner::Exec {
                return Ok(());
            }
            match self.system.exec_move(&self.slot).map_err(SimError::Motion)? {
                ExecStatus::Noop => return Ok(()),
                ExecStatus::Again | ExecStatus::Done => {}
            }
        }
    }
}
