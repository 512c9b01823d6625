//! Axis, motor, and machine-wide configuration.
//!
//! These are plain-old-data structs filled in by an external configuration
//! layer (text/JSON parsing and persistence live elsewhere). Derived values
//! such as steps-per-unit are computed on demand so a profile can be edited
//! field by field.

use stepper::{PowerMode, SwitchMode};

/// Number of logical axes: X, Y, Z, A, B, C.
pub const AXES: usize = 6;

pub use stepper::MOTORS;

/// Microseconds per minute; the planner computes in minutes, segment times
/// cross into microseconds at the prep boundary.
pub(crate) const MICROSECONDS_PER_MINUTE: f32 = 60_000_000.0;

/// How a logical axis participates in motion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum AxisMode {
    /// Axis does not exist on this machine.
    Disabled,
    /// Normal linear or rotary axis.
    #[default]
    Standard,
    /// Axis is computed but produces no motor motion.
    Inhibited,
    /// Rotary axis with radius-based feed compensation.
    Radius,
    /// Rotary axis slaved to the motion of a plane.
    Slaved,
}

/// Per-axis kinematic limits and switch assignments.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisConfig {
    pub mode: AxisMode,
    /// Maximum traverse velocity, mm/min.
    pub velocity_max: f32,
    /// Maximum feed velocity, mm/min.
    pub feedrate_max: f32,
    /// Maximum jerk, mm/min^3.
    pub jerk_max: f32,
    /// Jerk used during homing, mm/min^3.
    pub jerk_homing: f32,
    /// Cornering allowance, mm. Larger values corner faster.
    pub junction_deviation: f32,
    /// Soft travel limits, mm.
    pub travel_min: f32,
    pub travel_max: f32,
    /// Switch interpretation at each end of travel.
    pub switch_min: SwitchMode,
    pub switch_max: SwitchMode,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            mode: AxisMode::Standard,
            velocity_max: 16_000.0,
            feedrate_max: 16_000.0,
            jerk_max: 5.0e9,
            jerk_homing: 1.0e10,
            junction_deviation: 0.05,
            travel_min: 0.0,
            travel_max: 420.0,
            switch_min: SwitchMode::Disabled,
            switch_max: SwitchMode::Disabled,
        }
    }
}

/// Per-motor electrical and mechanical configuration.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorConfig {
    /// Logical axis this motor drives.
    pub axis: usize,
    /// Degrees per full step (1.8 for a 200-step motor).
    pub step_angle: f32,
    /// Axis travel per motor revolution, mm.
    pub travel_per_rev: f32,
    /// Microstep divisor set on the driver.
    pub microsteps: u16,
    /// Inverts the direction signal for this motor.
    pub polarity_inverted: bool,
    pub power_mode: PowerMode,
}

impl MotorConfig {
    /// Steps per unit of axis travel:
    /// `(360 / step_angle) * microsteps / travel_per_rev`.
    pub fn steps_per_unit(&self) -> f32 {
        (360.0 / self.step_angle) * self.microsteps as f32 / self.travel_per_rev
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            axis: 0,
            step_angle: 1.8,
            travel_per_rev: 40.0,
            microsteps: 8,
            polarity_inverted: false,
            power_mode: PowerMode::WhenMoving,
        }
    }
}

/// The whole machine profile consumed by the motion core.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct MachineConfig {
    pub axes: [AxisConfig; AXES],
    pub motors: [MotorConfig; MOTORS],
    /// Centripetal acceleration budget used for corner velocities, mm/min^2.
    pub junction_acceleration: f32,
    /// Nominal segment duration, microseconds.
    pub nom_segment_usec: f32,
    /// Shortest segment worth emitting, microseconds.
    pub min_segment_usec: f32,
    /// Pulse clock rate, Hz.
    pub dda_rate_hz: u32,
    /// Substep units per whole step.
    pub dda_substeps: i64,
    /// Motor idle timeout, seconds.
    pub idle_timeout_secs: f32,
}

impl MachineConfig {
    /// Nominal segment duration in minutes (planner time base).
    pub(crate) fn nom_segment_minutes(&self) -> f32 {
        self.nom_segment_usec / MICROSECONDS_PER_MINUTE
    }

    /// Motor idle timeout converted to DDA ticks.
    pub fn idle_timeout_ticks(&self) -> u32 {
        (self.idle_timeout_secs * self.dda_rate_hz as f32) as u32
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        let mut motors = [MotorConfig::default(); MOTORS];
        for (i, motor) in motors.iter_mut().enumerate() {
            motor.axis = i;
        }
        Self {
            axes: [AxisConfig::default(); AXES],
            motors,
            junction_acceleration: 200_000.0,
            nom_segment_usec: 5_000.0,
            min_segment_usec: 2_500.0,
            dda_rate_hz: stepper::DDA_RATE_HZ,
            dda_substeps: stepper::DDA_SUBSTEPS,
            idle_timeout_secs: 2.0,
        }
    }
}
