//! Inverse kinematics: axis-space travel to motor-space steps.
//!
//! The planner and executor work entirely in axis space; only the segment
//! preparer crosses into motor space, through this hook. Step values stay
//! floating point here. Fractional steps are preserved and accumulated by
//! the DDA, so nothing is lost to rounding at this boundary.

use crate::config::{AxisMode, MachineConfig, AXES, MOTORS};

/// A kinematic model that maps axis-space travel onto motor steps.
pub trait Kinematics {
    /// Converts a travel vector (axis units) into per-motor step counts.
    fn inverse(&self, travel: &[f32; AXES], steps: &mut [f32; MOTORS]);
}

/// The standard mapping: each motor drives one logical axis through its
/// steps-per-unit ratio. Inhibited axes compute but do not move.
#[derive(Debug, Copy, Clone)]
pub struct MotorMap {
    axis_of: [usize; MOTORS],
    steps_per_unit: [f32; MOTORS],
    inhibited: [bool; AXES],
}

impl MotorMap {
    pub fn from_config(config: &MachineConfig) -> Self {
        let mut axis_of = [0; MOTORS];
        let mut steps_per_unit = [0.0; MOTORS];
        let mut inhibited = [false; AXES];
        for (m, motor) in config.motors.iter().enumerate() {
            axis_of[m] = motor.axis.min(AXES - 1);
            steps_per_unit[m] = motor.steps_per_unit();
        }
        for (a, axis) in config.axes.iter().enumerate() {
            inhibited[a] = matches!(axis.mode, AxisMode::Inhibited | AxisMode::Disabled);
        }
        Self {
            axis_of,
            steps_per_unit,
            inhibited,
        }
    }

    /// Steps-per-unit ratio of one motor.
    pub fn steps_per_unit(&self, motor: usize) -> f32 {
        self.steps_per_unit[motor]
    }

    /// The logical axis a motor drives.
    pub fn axis_of(&self, motor: usize) -> usize {
        self.axis_of[motor]
    }
}

impl Kinematics for MotorMap {
    fn inverse(&self, travel: &[f32; AXES], steps: &mut [f32; MOTORS]) {
        for m in 0..MOTORS {
            let axis = self.axis_of[m];
            let t = if self.inhibited[axis] { 0.0 } else { travel[axis] };
            steps[m] = t * self.steps_per_unit[m];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;

    #[test]
    fn maps_travel_through_steps_per_unit() {
        let mut config = MachineConfig::default();
        config.motors[0].travel_per_rev = 20.0; // 80 steps/mm
        let map = MotorMap::from_config(&config);

        let mut travel = [0.0; AXES];
        travel[0] = 2.5;
        let mut steps = [0.0; MOTORS];
        map.inverse(&travel, &mut steps);
        assert!((steps[0] - 200.0).abs() < 1e-3);
    }

    #[test]
    fn inhibited_axis_produces_no_steps() {
        let mut config = MachineConfig::default();
        config.axes[1].mode = AxisMode::Inhibited;
        let map = MotorMap::from_config(&config);

        let mut travel = [0.0; AXES];
        travel[1] = 10.0;
        let mut steps = [0.0; MOTORS];
        map.inverse(&travel, &mut steps);
        assert_eq!(steps[1], 0.0);
    }

    #[test]
    fn shared_axis_drives_both_motors() {
        let mut config = MachineConfig::default();
        config.motors[3].axis = 0; // gantry pair: motors 0 and 3 on X
        let map = MotorMap::from_config(&config);

        let mut travel = [0.0; AXES];
        travel[0] = 1.0;
        let mut steps = [0.0; MOTORS];
        map.inverse(&travel, &mut steps);
        assert!(steps[0] > 0.0);
        assert!((steps[0] - steps[3]).abs() < 1e-6);
    }
}
