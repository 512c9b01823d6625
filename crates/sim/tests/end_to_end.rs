//! Pulse-accurate end-to-end scenarios for the whole motion stack:
//! planner -> executor -> preparer -> DDA -> counted step pulses.

use motion::{HoldState, MachineConfig, MachineState, AXES};
use sim::VirtualMachine;
use stepper::SwitchMode;

const MAX_TICKS: u64 = 10_000_000;

fn x_target(x: f32) -> [f32; AXES] {
    let mut t = [0.0; AXES];
    t[0] = x;
    t
}

/// 80 steps/mm on every motor.
fn config_80() -> MachineConfig {
    let mut config = MachineConfig::default();
    for motor in config.motors.iter_mut() {
        motor.travel_per_rev = 20.0;
    }
    config
}

#[test]
fn single_short_acceleration_delivers_exact_pulses() {
    let mut machine = VirtualMachine::new(config_80());
    machine.move_to(x_target(10.0), 0.05).unwrap();
    machine.run_until_idle(MAX_TICKS).unwrap();

    // 10 mm at 80 steps/mm, within one step of closure.
    let steps = machine.motor_steps(0);
    assert!((steps - 800).abs() <= 1, "got {steps} steps");
    assert_eq!(machine.pulses(0), steps as u64);
    assert!((machine.runtime_position(0) - 10.0).abs() < 1e-3);
    assert!(machine.trace().segment_count() > 0);
}

#[test]
fn collinear_pair_keeps_velocity_and_closure() {
    let mut machine = VirtualMachine::new(config_80());
    machine.move_to(x_target(10.0), 0.05).unwrap();
    machine.move_to(x_target(20.0), 0.05).unwrap();

    {
        let blocks: Vec<_> = machine.system().planner().queued_blocks().collect();
        assert!((blocks[0].exit_velocity - blocks[1].entry_velocity).abs() < 1e-3);
        assert!((blocks[0].exit_velocity - 200.0).abs() < 2.0);
    }

    machine.run_until_idle(MAX_TICKS).unwrap();
    let steps = machine.motor_steps(0);
    assert!((steps - 1600).abs() <= 1, "got {steps} steps");
}

#[test]
fn right_angle_corner_is_centripetally_limited() {
    let mut machine = VirtualMachine::new(config_80());
    machine.move_to(x_target(10.0), 0.05).unwrap();
    let mut corner = x_target(10.0);
    corner[1] = 10.0;
    machine.move_to(corner, 0.05).unwrap();

    {
        let config = machine.system().config();
        let sin_half = (0.5_f32).sqrt();
        let delta = config.axes[0].junction_deviation;
        let radius = delta * sin_half / (1.0 - sin_half);
        let expected = (radius * config.junction_acceleration).sqrt();
        assert!(expected < 200.0);

        let blocks: Vec<_> = machine.system().planner().queued_blocks().collect();
        assert!(
            (blocks[0].exit_velocity - expected).abs() < 2.0,
            "corner velocity {} vs expected {}",
            blocks[0].exit_velocity,
            expected
        );
    }

    machine.run_until_idle(MAX_TICKS).unwrap();
    assert!((machine.motor_steps(0) - 800).abs() <= 1);
    assert!((machine.motor_steps(1) - 800).abs() <= 1);
}

#[test]
fn out_and_back_lands_on_the_same_step() {
    let mut machine = VirtualMachine::new(config_80());
    machine.move_to(x_target(10.0), 0.05).unwrap();
    machine.move_to(x_target(0.0), 0.05).unwrap();
    machine.run_until_idle(MAX_TICKS).unwrap();

    assert!(machine.motor_steps(0).abs() <= 1);
    // Both directions actually pulsed.
    assert!(machine.pulses(0) >= 1598);
    assert!(machine.runtime_position(0).abs() < 1e-3);
}

#[test]
fn feedhold_halts_mid_move_and_resumes_to_target() {
    let mut machine = VirtualMachine::new(config_80());
    machine.move_to(x_target(100.0), 100.0 / 16_000.0).unwrap();

    while machine.runtime_position(0) < 50.0 {
        machine.step().unwrap();
    }
    machine.feedhold();
    machine.run_until_hold(MAX_TICKS).unwrap();

    assert_eq!(machine.system().hold_state(), HoldState::Hold);
    let hold_position = machine.runtime_position(0);
    assert!(hold_position > 50.0 && hold_position < 100.0);

    // Pulses delivered match the position where the hold completed.
    let hold_steps = machine.motor_steps(0);
    assert!(
        (f64::from(hold_steps) - f64::from(hold_position) * 80.0).abs() <= 1.0,
        "{hold_steps} steps at {hold_position} mm"
    );

    // No pulses while parked.
    machine.run_ticks(20_000).unwrap();
    assert_eq!(machine.motor_steps(0), hold_steps);

    machine.cycle_start();
    machine.run_until_idle(MAX_TICKS).unwrap();
    assert!((machine.motor_steps(0) - 8000).abs() <= 1);
    assert!((machine.runtime_position(0) - 100.0).abs() < 1e-2);
}

#[test]
fn limit_switch_outside_homing_is_an_emergency_stop() {
    let mut config = config_80();
    config.axes[0].switch_min = SwitchMode::Limit;
    let mut machine = VirtualMachine::new(config);

    machine.move_to(x_target(100.0), 0.05).unwrap();
    machine.run_ticks(2_000).unwrap();
    assert!(machine.motor_steps(0) > 0);

    machine.trip_switch(0, false);
    machine.run_ticks(100).unwrap();

    assert_eq!(machine.system().machine_state(), MachineState::Shutdown);
    let frozen = machine.motor_steps(0);
    machine.run_ticks(20_000).unwrap();
    assert_eq!(machine.motor_steps(0), frozen, "pulses after shutdown");
    assert!(!machine.motor_enabled(0), "drivers stay de-energised");
}

#[test]
fn homing_switch_during_homing_is_a_feedhold() {
    let mut config = config_80();
    config.axes[0].switch_min = SwitchMode::HomingLimit;
    let mut machine = VirtualMachine::new(config);
    machine.set_homing_cycle(true);

    machine.move_to(x_target(100.0), 100.0 / 16_000.0).unwrap();
    while machine.runtime_position(0) < 30.0 {
        machine.step().unwrap();
    }
    machine.trip_switch(0, false);
    machine.run_until_hold(MAX_TICKS).unwrap();

    assert_eq!(machine.system().hold_state(), HoldState::Hold);
    assert_ne!(machine.system().machine_state(), MachineState::Shutdown);
    assert!(machine.runtime_position(0) < 100.0);
}

#[test]
fn dwell_passes_time_without_pulses() {
    let mut machine = VirtualMachine::new(config_80());
    machine.move_to(x_target(1.0), 0.005).unwrap();
    machine.run_until_idle(MAX_TICKS).unwrap();
    let steps_before = machine.motor_steps(0);

    machine.dwell(0.1).unwrap();
    let ticks = machine.run_until_idle(MAX_TICKS).unwrap();

    // 0.1 s at the 50 kHz pulse clock.
    assert!(ticks >= 5_000, "dwell consumed only {ticks} ticks");
    assert_eq!(machine.motor_steps(0), steps_before);
}

#[test]
fn polarity_inversion_flips_the_direction_pin_only() {
    let mut config = config_80();
    config.motors[0].polarity_inverted = true;
    let mut machine = VirtualMachine::new(config);

    machine.move_to(x_target(2.0), 0.01).unwrap();
    machine.run_until_idle(MAX_TICKS).unwrap();

    // Electrical direction is reversed; the logical step count is not.
    assert!(!machine.direction_pin(0));
    assert!((machine.motor_steps(0) - 160).abs() <= 1);
}

#[test]
fn abort_stops_everything_and_allows_replanning() {
    let mut machine = VirtualMachine::new(config_80());
    machine.move_to(x_target(100.0), 0.05).unwrap();
    machine.run_ticks(5_000).unwrap();

    machine.abort();
    machine.run_ticks(1_000).unwrap();
    assert!(!machine.system().is_busy());

    let resume_from = machine.runtime_position(0);
    machine
        .system_mut()
        .set_axis_position([resume_from, 0.0, 0.0, 0.0, 0.0, 0.0]);
    machine.move_to(x_target(resume_from + 5.0), 0.01).unwrap();
    machine.run_until_idle(MAX_TICKS).unwrap();
    assert!((machine.runtime_position(0) - (resume_from + 5.0)).abs() < 1e-2);
}

#[test]
fn trace_dump_round_trips_through_json() {
    let mut machine = VirtualMachine::new(config_80());
    machine.move_to(x_target(2.0), 0.005).unwrap();
    machine.run_until_idle(MAX_TICKS).unwrap();

    let path = std::env::temp_dir().join("r_tinyg_trace_test.json");
    machine.trace().dump_json(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let parsed: sim::MotionTrace = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed.segment_count(), machine.trace().segment_count());
    let _ = std::fs::remove_file(&path);
}
