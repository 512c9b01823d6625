//! Limit / homing switch debounce and dispatch.
//!
//! A switch edge is handled immediately and then locked out for a fixed
//! number of 10 ms ticks, rather than integrated over time: stop latency
//! matters more than a clean contact reading. The same physical input is a
//! homing target during a homing cycle and an emergency-stop trigger at all
//! other times; [`SwitchSet::on_edge`] returns which of the two the caller
//! must act on.

/// Two switches (min, max) per axis, six axes.
pub const SWITCH_COUNT: usize = 12;

/// Ticks of the 10 ms housekeeping clock an edge stays locked out (~250 ms).
const LOCKOUT_TICKS: u8 = 25;

/// How a switch input is interpreted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum SwitchMode {
    /// Input is ignored entirely.
    #[default]
    Disabled,
    /// Used as a homing target only.
    Homing,
    /// Used as a travel limit only.
    Limit,
    /// Homing target during homing, travel limit otherwise.
    HomingLimit,
}

/// What the background loop must do about an accepted switch edge.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SwitchAction {
    /// Edge was debounced away or the switch is not armed for this role.
    Ignored,
    /// Homing cycle is active: raise a feedhold.
    Feedhold,
    /// Limit hit outside homing: emergency shutdown.
    LimitThrown,
}

/// Debounce and latch state for all switch inputs. Written from the pin
/// ISR and the 10 ms tick, read (with read-clear) from the background loop.
pub struct SwitchSet {
    modes: [SwitchMode; SWITCH_COUNT],
    lockout: u8,
    thrown: [bool; SWITCH_COUNT],
    limit_latch: bool,
    homing_cycle: bool,
}

impl SwitchSet {
    pub const fn new() -> Self {
        Self {
            modes: [SwitchMode::Disabled; SWITCH_COUNT],
            lockout: 0,
            thrown: [false; SWITCH_COUNT],
            limit_latch: false,
            homing_cycle: false,
        }
    }

    /// Switch index for an axis endpoint. `max` selects the max-travel
    /// switch, otherwise the min-travel switch.
    pub const fn index(axis: usize, max: bool) -> usize {
        axis * 2 + if max { 1 } else { 0 }
    }

    pub fn set_mode(&mut self, switch: usize, mode: SwitchMode) {
        self.modes[switch] = mode;
    }

    /// Arms or disarms homing interpretation for all switches.
    pub fn set_homing_cycle(&mut self, homing: bool) {
        self.homing_cycle = homing;
    }

    /// Handles a switch edge from the pin-change ISR.
    pub fn on_edge(&mut self, switch: usize) -> SwitchAction {
        if self.lockout > 0 {
            return SwitchAction::Ignored;
        }
        let mode = self.modes[switch];
        if matches!(mode, SwitchMode::Disabled) {
            return SwitchAction::Ignored;
        }

        self.lockout = LOCKOUT_TICKS;
        self.thrown[switch] = true;

        if self.homing_cycle {
            if matches!(mode, SwitchMode::Homing | SwitchMode::HomingLimit) {
                return SwitchAction::Feedhold;
            }
        } else if matches!(mode, SwitchMode::Limit | SwitchMode::HomingLimit) {
            self.limit_latch = true;
            #[cfg(feature = "defmt-logging")]
            defmt::error!("limit switch {} thrown", switch);
            return SwitchAction::LimitThrown;
        }
        SwitchAction::Ignored
    }

    /// 10 ms housekeeping tick: winds down the debounce lockout.
    pub fn tick(&mut self) {
        self.lockout = self.lockout.saturating_sub(1);
    }

    pub fn lockout_active(&self) -> bool {
        self.lockout > 0
    }

    /// Read-clear accessor for the limit latch.
    pub fn take_limit_thrown(&mut self) -> bool {
        core::mem::take(&mut self.limit_latch)
    }

    /// Read-clear accessor for a single switch's thrown flag.
    pub fn take_thrown(&mut self, switch: usize) -> bool {
        core::mem::take(&mut self.thrown[switch])
    }

    /// Clears every latch and the lockout (reset path).
    pub fn reset(&mut self) {
        self.lockout = 0;
        self.thrown = [false; SWITCH_COUNT];
        self.limit_latch = false;
    }
}

impl Default for SwitchSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed() -> SwitchSet {
        let mut s = SwitchSet::new();
        s.set_mode(SwitchSet::index(0, false), SwitchMode::HomingLimit);
        s
    }

    #[test]
    fn limit_edge_latches_outside_homing() {
        let mut s = armed();
        let idx = SwitchSet::index(0, false);
        assert_eq!(s.on_edge(idx), SwitchAction::LimitThrown);
        assert!(s.take_limit_thrown());
        assert!(!s.take_limit_thrown()); // read-clear
        assert!(s.take_thrown(idx));
    }

    #[test]
    fn homing_edge_requests_feedhold() {
        let mut s = armed();
        s.set_homing_cycle(true);
        let idx = SwitchSet::index(0, false);
        assert_eq!(s.on_edge(idx), SwitchAction::Feedhold);
        assert!(!s.take_limit_thrown());
    }

    #[test]
    fn lockout_swallows_bounce() {
        let mut s = armed();
        let idx = SwitchSet::index(0, false);
        assert_eq!(s.on_edge(idx), SwitchAction::LimitThrown);
        // Contact bounce within the lockout window is dropped.
        assert_eq!(s.on_edge(idx), SwitchAction::Ignored);

        for _ in 0..25 {
            s.tick();
        }
        assert!(!s.lockout_active());
        assert_eq!(s.on_edge(idx), SwitchAction::LimitThrown);
    }

    #[test]
    fn disabled_switch_is_ignored() {
        let mut s = SwitchSet::new();
        assert_eq!(s.on_edge(3), SwitchAction::Ignored);
        assert!(!s.lockout_active()); // no lockout burned on ignored edges
    }
}
