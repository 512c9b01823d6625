//! Per-motor power management.
//!
//! Tracks the enable-line state machine for each motor channel: a motor is
//! woken when a segment moves it and, depending on its power mode, rests
//! again after an idle timeout. The caller owns the actual enable pins; this
//! module only decides when they change.

use crate::MOTORS;

/// When a motor's enable line is asserted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerMode {
    /// The motor is never energised.
    Disabled,
    /// Energised from the first wake onward; never times out.
    AlwaysOn,
    /// Energised while a machining cycle runs; rests after the idle timeout
    /// once motion stops.
    InCycle,
    /// Energised only while this motor is actually moving.
    #[default]
    WhenMoving,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PowerState {
    Off,
    On,
    /// Counting down to power-off; the payload is ticks remaining.
    Countdown(u32),
}

#[derive(Debug, Copy, Clone)]
struct MotorPower {
    mode: PowerMode,
    state: PowerState,
    timeout_ticks: u32,
}

impl MotorPower {
    const fn new() -> Self {
        Self {
            mode: PowerMode::WhenMoving,
            state: PowerState::Off,
            timeout_ticks: crate::DDA_RATE_HZ * 2, // 2 s default idle timeout
        }
    }
}

/// The power state machines for all motor channels.
pub struct MotorPowerSet {
    motors: [MotorPower; MOTORS],
}

impl MotorPowerSet {
    pub const fn new() -> Self {
        Self {
            motors: [MotorPower::new(); MOTORS],
        }
    }

    /// Sets a motor's power mode and idle timeout (in DDA ticks).
    pub fn configure(&mut self, motor: usize, mode: PowerMode, timeout_ticks: u32) {
        let m = &mut self.motors[motor];
        m.mode = mode;
        m.timeout_ticks = timeout_ticks;
        if matches!(mode, PowerMode::Disabled) {
            m.state = PowerState::Off;
        }
    }

    pub fn mode(&self, motor: usize) -> PowerMode {
        self.motors[motor].mode
    }

    /// The motor is about to move. Returns `true` when the enable line must
    /// be asserted now (it was not already on).
    pub fn wake(&mut self, motor: usize) -> bool {
        let m = &mut self.motors[motor];
        if matches!(m.mode, PowerMode::Disabled) {
            return false;
        }
        let was_off = !matches!(m.state, PowerState::On);
        m.state = PowerState::On;
        was_off
    }

    /// The motor is idle for the current segment. Starts the idle countdown
    /// for modes that time out.
    pub fn rest(&mut self, motor: usize) {
        let m = &mut self.motors[motor];
        match (m.mode, m.state) {
            (PowerMode::WhenMoving | PowerMode::InCycle, PowerState::On) => {
                m.state = PowerState::Countdown(m.timeout_ticks);
            }
            _ => {}
        }
    }

    /// Elapses idle time. Returns a bitmask of motors whose enable line must
    /// be dropped now.
    pub fn idle_tick(&mut self, ticks: u32) -> u8 {
        let mut drop_mask = 0u8;
        for (i, m) in self.motors.iter_mut().enumerate() {
            if let PowerState::Countdown(remaining) = m.state {
                if remaining <= ticks {
                    m.state = PowerState::Off;
                    drop_mask |= 1 << i;
                } else {
                    m.state = PowerState::Countdown(remaining - ticks);
                }
            }
        }
        drop_mask
    }

    /// Drops every enable line immediately (abort/shutdown path). Returns
    /// the bitmask of motors that were energised.
    pub fn all_off(&mut self) -> u8 {
        let mut mask = 0u8;
        for (i, m) in self.motors.iter_mut().enumerate() {
            if !matches!(m.state, PowerState::Off) {
                mask |= 1 << i;
            }
            m.state = PowerState::Off;
        }
        mask
    }
}

impl Default for MotorPowerSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_moving_times_out_after_rest() {
        let mut power = MotorPowerSet::new();
        power.configure(0, PowerMode::WhenMoving, 100);

        assert!(power.wake(0));
        assert!(!power.wake(0)); // already on
        power.rest(0);

        assert_eq!(power.idle_tick(99), 0);
        assert_eq!(power.idle_tick(1), 0b0000_0001);
        // Once off, further idle time changes nothing.
        assert_eq!(power.idle_tick(1000), 0);
    }

    #[test]
    fn always_on_never_rests() {
        let mut power = MotorPowerSet::new();
        power.configure(1, PowerMode::AlwaysOn, 10);
        assert!(power.wake(1));
        power.rest(1);
        assert_eq!(power.idle_tick(1000), 0);
    }

    #[test]
    fn disabled_never_wakes() {
        let mut power = MotorPowerSet::new();
        power.configure(2, PowerMode::Disabled, 10);
        assert!(!power.wake(2));
    }

    #[test]
    fn all_off_reports_energised_motors() {
        let mut power = MotorPowerSet::new();
        power.wake(0);
        power.wake(3);
        assert_eq!(power.all_off(), 0b0000_1001);
        assert_eq!(power.all_off(), 0);
    }
}
