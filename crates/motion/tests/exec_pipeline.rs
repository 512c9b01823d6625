//! End-to-end tests of the planner -> executor -> preparer pipeline.
//!
//! These tests stand in for the step loader: they drain the prep slot
//! whenever the preparer publishes a segment and integrate the substep
//! increments back into step counts, which checks positional closure
//! without needing the pulse-level runtime.

use motion::{ExecStatus, HoldState, MachineConfig, MachineState, MotionError, MotionSystem, AXES};
use stepper::{PrepSlot, SlotOwner};

fn x_target(x: f32) -> [f32; AXES] {
    let mut t = [0.0; AXES];
    t[0] = x;
    t
}

/// A machine profile with 80 steps/mm on every motor.
fn config_80() -> MachineConfig {
    let mut config = MachineConfig::default();
    for motor in config.motors.iter_mut() {
        motor.travel_per_rev = 20.0; // (360/1.8)*8/20 = 80 steps/mm
    }
    config
}

/// Drains one published segment, returning the signed X steps it carries.
fn drain_segment(slot: &PrepSlot) -> f64 {
    let seg = slot.try_take().expect("loader expected a segment");
    let m = &seg.motors[0];
    m.step_sign as f64 * m.substep_increment as f64 * seg.dda_ticks as f64
        / seg.substeps as f64
}

/// Pumps the system until it goes idle or parks in a feedhold. Returns the
/// accumulated signed X steps.
fn run_to_rest(system: &mut MotionSystem, slot: &PrepSlot) -> f64 {
    let mut x_steps = 0.0;
    for _ in 0..100_000 {
        system.poll(slot);
        if slot.owner() == SlotOwner::Loader {
            x_steps += drain_segment(slot);
            continue;
        }
        match system.exec_move(slot).unwrap() {
            ExecStatus::Noop => {
                if slot.owner() == SlotOwner::Loader {
                    x_steps += drain_segment(slot);
                }
                return x_steps;
            }
            ExecStatus::Again | ExecStatus::Done => {}
        }
    }
    panic!("pipeline did not come to rest");
}

#[test]
fn single_move_reaches_target_with_exact_steps() {
    let slot = PrepSlot::new();
    let mut system = MotionSystem::new(config_80());

    system.plan_line(x_target(10.0), 0.05).unwrap();
    assert!(system.is_busy());

    let steps = run_to_rest(&mut system, &slot);
    assert!((steps - 800.0).abs() < 1.0, "expected ~800 steps, got {steps}");
    assert!((system.runtime_position(0) - 10.0).abs() < 1e-3);
    assert!(!system.is_busy());
    assert_eq!(system.machine_state(), MachineState::Ready);
}

#[test]
fn out_and_back_returns_to_origin() {
    let slot = PrepSlot::new();
    let mut system = MotionSystem::new(config_80());

    system.plan_line(x_target(10.0), 0.05).unwrap();
    system.plan_line(x_target(0.0), 0.05).unwrap();

    let steps = run_to_rest(&mut system, &slot);
    assert!(steps.abs() < 1.0, "net steps should cancel, got {steps}");
    assert!(system.runtime_position(0).abs() < 1e-3);
}

#[test]
fn dwell_and_markers_pass_through() {
    let slot = PrepSlot::new();
    let mut system = MotionSystem::new(config_80());

    system.plan_line(x_target(5.0), 0.05).unwrap();
    system.plan_dwell(0.25).unwrap();
    system.plan_stop().unwrap();
    system.plan_line(x_target(10.0), 0.05).unwrap();
    system.plan_end().unwrap();

    let steps = run_to_rest(&mut system, &slot);
    assert!((steps - 800.0).abs() < 1.0);
    assert!(!system.is_busy());
}

#[test]
fn dwell_rejects_degenerate_durations() {
    let mut system = MotionSystem::new(config_80());
    assert_eq!(system.plan_dwell(0.0), Err(MotionError::ZeroLength));
    assert_eq!(system.plan_dwell(f32::NAN), Err(MotionError::MoveTimeNan));
}

#[test]
fn feedhold_brakes_to_zero_and_resumes_to_target() {
    let slot = PrepSlot::new();
    let mut system = MotionSystem::new(config_80());

    // 100 mm at 16000 mm/min.
    system.plan_line(x_target(100.0), 100.0 / 16_000.0).unwrap();

    // Run until roughly halfway, then request the hold.
    let mut x_steps = 0.0;
    while system.runtime_position(0) < 50.0 {
        system.poll(&slot);
        if slot.owner() == SlotOwner::Loader {
            x_steps += drain_segment(&slot);
        } else {
            system.exec_move(&slot).unwrap();
        }
    }
    system.signals().request_feedhold();

    x_steps += run_to_rest(&mut system, &slot);
    assert_eq!(system.hold_state(), HoldState::Hold);
    assert_eq!(system.runtime_velocity(), 0.0);

    let hold_position = system.runtime_position(0);
    assert!(hold_position > 50.0, "hold at {hold_position}");
    assert!(hold_position < 100.0, "hold overran the move: {hold_position}");
    // Steps delivered so far match the hold position.
    assert!((x_steps - f64::from(hold_position) * 80.0).abs() < 1.0);

    // Cycle start finishes the remainder of the move.
    system.signals().request_cycle_start();
    x_steps += run_to_rest(&mut system, &slot);
    assert_eq!(system.hold_state(), HoldState::Off);
    assert!((system.runtime_position(0) - 100.0).abs() < 1e-2);
    assert!((x_steps - 8000.0).abs() < 1.0, "total steps {x_steps}");
}

#[test]
fn feedhold_between_blocks_parks_and_resumes() {
    let slot = PrepSlot::new();
    let mut system = MotionSystem::new(config_80());

    system.plan_line(x_target(10.0), 0.05).unwrap();
    let steps = run_to_rest(&mut system, &slot);

    // Nothing is moving; the hold parks immediately.
    system.plan_line(x_target(20.0), 0.05).unwrap();
    system.signals().request_feedhold();
    system.poll(&slot);
    system.exec_move(&slot).unwrap(); // Sync -> Plan
    system.poll(&slot); // Plan -> Hold (nothing active yet)
    assert_eq!(system.hold_state(), HoldState::Hold);

    system.signals().request_cycle_start();
    let steps = steps + run_to_rest(&mut system, &slot);
    assert!((steps - 1600.0).abs() < 1.0);
}

#[test]
fn limit_signal_latches_emergency_shutdown() {
    let slot = PrepSlot::new();
    let mut system = MotionSystem::new(config_80());

    system.plan_line(x_target(100.0), 0.05).unwrap();
    // Execute a little motion first.
    for _ in 0..10 {
        system.poll(&slot);
        if slot.owner() == SlotOwner::Loader {
            drain_segment(&slot);
        } else {
            system.exec_move(&slot).unwrap();
        }
    }

    system.signals().raise_limit();
    system.poll(&slot);

    assert_eq!(system.machine_state(), MachineState::Shutdown);
    assert!(!system.is_busy());
    assert_eq!(system.exec_move(&slot).unwrap(), ExecStatus::Noop);
    // The core refuses new motion until reset.
    assert_eq!(
        system.plan_line(x_target(1.0), 0.05),
        Err(MotionError::PlannerAssertion)
    );
}

#[test]
fn abort_resets_queue_and_hold_state() {
    let slot = PrepSlot::new();
    let mut system = MotionSystem::new(config_80());

    system.plan_line(x_target(100.0), 0.05).unwrap();
    for _ in 0..10 {
        system.poll(&slot);
        if slot.owner() == SlotOwner::Loader {
            drain_segment(&slot);
        } else {
            system.exec_move(&slot).unwrap();
        }
    }
    system.signals().request_feedhold();
    system.signals().request_abort();
    system.poll(&slot);

    assert!(!system.is_busy());
    assert_eq!(system.hold_state(), HoldState::Off);
    assert_eq!(slot.owner(), SlotOwner::Exec);

    // Planning works again immediately from the preserved position.
    system.plan_line(x_target(50.0), 0.05).unwrap();
    assert!(system.is_busy());
}

#[test]
fn set_axis_position_moves_both_reference_frames() {
    let slot = PrepSlot::new();
    let mut system = MotionSystem::new(config_80());

    system.set_axis_position(x_target(25.0));
    assert_eq!(system.plan_position()[0], 25.0);
    assert_eq!(system.runtime_position(0), 25.0);

    system.plan_line(x_target(30.0), 0.05).unwrap();
    let steps = run_to_rest(&mut system, &slot);
    assert!((steps - 400.0).abs() < 1.0);
    assert!((system.runtime_position(0) - 30.0).abs() < 1e-3);
}
