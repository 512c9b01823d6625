//! Feedhold / cycle-start state machine and the hold replan.
//!
//! A feedhold request latches `Off -> Sync`. The executor observes `Sync`
//! at its next tick, finishes the in-flight segment, and hands over at
//! `Plan`. The background loop then replans the queue so motion brakes to
//! zero at a well-defined hold point, runs the deceleration (`Decel`), and
//! parks at `Hold`. Cycle start releases the hold point and resumes the
//! remaining motion. A hold cannot be cancelled between `Sync` and `Hold`;
//! the replan is committed.

use crate::exec::ExecRuntime;
use crate::planner::{BlockKind, Planner};
use crate::trapezoid;
use crate::EPSILON;

/// Feedhold lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum HoldState {
    #[default]
    Off,
    /// Hold requested; executor will yield at the next segment boundary.
    Sync,
    /// Waiting for the background hold replan.
    Plan,
    /// Braking toward the hold point.
    Decel,
    /// Stopped; waiting for cycle start.
    Hold,
    /// Cycle start accepted; hold point being released.
    EndHold,
}

/// The background half of a feedhold: reshapes the running block and the
/// queue so motion brakes to zero, and marks where execution resumes.
///
/// Returns the next hold state (always `Decel` or `Hold`).
pub(crate) fn plan_hold(planner: &mut Planner, exec: &mut ExecRuntime) -> HoldState {
    let Some(run_index) = planner.peek_run() else {
        return HoldState::Hold; // nothing queued; already stopped
    };
    if !exec.is_active() {
        // Between blocks: nothing is moving, hold right here. The queue
        // resumes untouched on cycle start.
        return HoldState::Hold;
    }

    let velocity = exec.segment_velocity();
    if velocity < EPSILON {
        return HoldState::Hold;
    }

    let available = exec.remaining_length();
    let (recip_jerk, cbrt_jerk, cruise_vmax) = {
        let block = planner.block(run_index);
        (block.recip_jerk, block.cbrt_jerk, block.cruise_vmax)
    };
    let braking_length = trapezoid::target_length(velocity, 0.0, recip_jerk);

    if braking_length <= available {
        // The stop fits inside the running block. The executor brakes over
        // `braking_length`; the block itself is cut down to the remainder
        // and becomes the gated hold point the cycle resumes from.
        exec.force_braking_tail(braking_length, velocity, 0.0, true);

        let remainder = available - braking_length;
        let block = planner.block_mut(run_index);
        block.length = remainder;
        block.delta_vmax = trapezoid::velocity_delta(remainder, cbrt_jerk);
        block.entry_vmax = 0.0;
        block.entry_velocity = 0.0;
        block.exit_vmax = block.delta_vmax.min(cruise_vmax);
        block.exit_velocity = 0.0;
        block.braking_velocity = block.delta_vmax;
        block.hold_point = true;
        block.replannable = true;

        planner.reset_replannable();
        planner.replan_all();
        return HoldState::Decel;
    }

    // The stop does not fit: brake as hard as the running block allows,
    // then keep shedding velocity through the queued blocks until a stop
    // fits. The block after the one that reaches zero is the hold point.
    let shed = trapezoid::velocity_delta(available, cbrt_jerk);
    let exit_velocity = (velocity - shed).max(0.0);
    exec.force_braking_tail(available, velocity, exit_velocity, false);
    planner.block_mut(run_index).exit_velocity = exit_velocity;

    let mut braking = exit_velocity;
    let mut index = planner.block(run_index).nx;
    for _ in 0..crate::planner::PLANNER_POOL {
        let block = planner.block(index);
        if !matches!(
            block.state,
            crate::planner::BlockState::Queued | crate::planner::BlockState::Pending
        ) {
            break; // queue exhausted before reaching zero; best effort
        }
        if braking < EPSILON || !matches!(block.kind, BlockKind::Line) {
            // Already stopped, or a command block stops motion anyway:
            // gate execution here.
            let block = planner.block_mut(index);
            block.hold_point = true;
            block.entry_vmax = 0.0;
            break;
        }

        let nx = block.nx;
        let fits = trapezoid::target_length(braking, 0.0, block.recip_jerk) <= block.length;
        let block = planner.block_mut(index);
        block.entry_vmax = braking;
        if fits {
            block.exit_vmax = 0.0;
            braking = 0.0;
        } else {
            let delta = trapezoid::velocity_delta(block.length, block.cbrt_jerk);
            block.exit_vmax = (braking - delta).max(0.0);
            braking = block.exit_vmax;
        }
        index = nx;
    }

    planner.reset_replannable();
    planner.replan_all();
    HoldState::Decel
}

/// Releases the hold point so execution resumes (cycle start).
pub(crate) fn release_hold(planner: &mut Planner) {
    if let Some(run_index) = planner.peek_run() {
        let block = planner.block_mut(run_index);
        block.hold_point = false;
    }
}
