//! Trapezoid solver: turns an (entry, cruise, exit, length) request into
//! head/body/tail section lengths for a jerk-limited S-curve.
//!
//! The jerk relations used throughout:
//!
//! - `target_length`: distance needed to change velocity by `dV` at the
//!   block's jerk, `L = dV * sqrt(dV / jerk)`.
//! - `velocity_delta`: its inverse, `dV = L^(2/3) * cbrt(jerk)`.
//!
//! Both directions go through this one pair of functions, so the planner
//! entry caps, the look-ahead, and the solver cannot disagree numerically.

use crate::math;
use crate::planner::PlanBlock;
use crate::EPSILON;

/// Iteration budget for the asymmetric head/tail solution.
const ITERATION_MAX: usize = 20;

/// Convergence bound on the relative cruise-velocity change per iteration.
const ITERATION_TOLERANCE: f32 = 0.001;

/// Lengths close enough to the minimum get the one-ramp-plus-body shape
/// instead of the iterative solution.
const LENGTH_FIT_FACTOR: f32 = 1.1;

/// Sections shorter than this are absorbed into a neighbour, so no sliver
/// sections survive planning. Millimetres.
pub(crate) const MIN_SECTION_LENGTH: f32 = 0.08;

/// Velocity equality tolerance: absolute floor of 2 mm/min, widening to 1%
/// at speed.
pub(crate) fn veq(a: f32, b: f32) -> bool {
    let tolerance = 2.0_f32.max(0.01 * a.max(b));
    math::abs(a - b) < tolerance
}

/// Distance required to change velocity between `v0` and `v1` at the jerk
/// whose reciprocal is `recip_jerk`.
pub(crate) fn target_length(v0: f32, v1: f32, recip_jerk: f32) -> f32 {
    let dv = math::abs(v1 - v0);
    dv * math::sqrt(dv * recip_jerk)
}

/// Velocity change achievable over `length` at the jerk whose cube root is
/// `cbrt_jerk`.
pub(crate) fn velocity_delta(length: f32, cbrt_jerk: f32) -> f32 {
    math::cbrt(length * length) * cbrt_jerk
}

/// `v0` plus the velocity change achievable over `length`.
pub(crate) fn target_velocity(v0: f32, length: f32, cbrt_jerk: f32) -> f32 {
    v0 + velocity_delta(length, cbrt_jerk)
}

/// Solves a block's head/body/tail lengths in place.
///
/// Expects `entry_velocity`, `cruise_velocity`, `exit_velocity`, `length`
/// and the cached jerk terms to be set. May lower `cruise_velocity` (short
/// blocks) or move an endpoint (degraded blocks that cannot honour the
/// requested velocity change over their length).
pub(crate) fn solve(bf: &mut PlanBlock) {
    bf.head_length = 0.0;
    bf.body_length = 0.0;
    bf.tail_length = 0.0;

    if bf.length < EPSILON {
        return;
    }

    // The solver needs Ve <= Vc >= Vx for every shape it produces.
    if bf.cruise_velocity < bf.entry_velocity {
        bf.cruise_velocity = bf.entry_velocity;
    }
    if bf.cruise_velocity < bf.exit_velocity {
        bf.cruise_velocity = bf.exit_velocity;
    }
    let cruise_requested = bf.cruise_velocity;

    // B: no velocity change anywhere.
    if veq(bf.entry_velocity, bf.cruise_velocity) && veq(bf.cruise_velocity, bf.exit_velocity) {
        bf.body_length = bf.length;
        return;
    }

    let head = target_length(bf.entry_velocity, bf.cruise_velocity, bf.recip_jerk);
    let tail = target_length(bf.exit_velocity, bf.cruise_velocity, bf.recip_jerk);

    // HBT: both ramps fit with body to spare.
    if bf.length > head + tail {
        bf.head_length = head;
        bf.tail_length = tail;
        bf.body_length = bf.length - head - tail;
        absorb_slivers(bf);
        return;
    }

    // HT symmetric: split the length and find the reachable peak.
    if veq(bf.entry_velocity, bf.exit_velocity) {
        bf.head_length = bf.length / 2.0;
        bf.tail_length = bf.head_length;
        bf.cruise_velocity = target_velocity(bf.entry_velocity, bf.head_length, bf.cbrt_jerk)
            .min(cruise_requested);
        absorb_slivers(bf);
        return;
    }

    let minimum_length = target_length(bf.entry_velocity, bf.exit_velocity, bf.recip_jerk);

    // H'/T' degraded: the block is too short for the requested velocity
    // change. One full-length ramp; the unreachable endpoint moves.
    if bf.length < minimum_length {
        if bf.entry_velocity > bf.exit_velocity {
            bf.tail_length = bf.length;
            bf.cruise_velocity = bf.entry_velocity;
            bf.exit_velocity =
                (bf.entry_velocity - velocity_delta(bf.length, bf.cbrt_jerk)).max(0.0);
        } else {
            bf.head_length = bf.length;
            bf.cruise_velocity = target_velocity(bf.entry_velocity, bf.length, bf.cbrt_jerk);
            bf.exit_velocity = bf.cruise_velocity;
        }
        return;
    }

    // HB/BT: barely longer than the minimum. One ramp plus a body at the
    // faster endpoint.
    if bf.length < minimum_length * LENGTH_FIT_FACTOR {
        if bf.entry_velocity > bf.exit_velocity {
            bf.cruise_velocity = bf.entry_velocity;
            bf.tail_length = minimum_length;
            bf.body_length = bf.length - minimum_length;
        } else {
            bf.cruise_velocity = bf.exit_velocity;
            bf.head_length = minimum_length;
            bf.body_length = bf.length - minimum_length;
        }
        absorb_slivers(bf);
        return;
    }

    // Asymmetric HT: iterate on the peak velocity until both ramps fit the
    // length. Recompute from the longer ramp each round; it carries the
    // better velocity information.
    let mut cruise = bf.cruise_velocity;
    for _ in 0..ITERATION_MAX {
        let head = target_length(bf.entry_velocity, cruise, bf.recip_jerk);
        let tail = target_length(bf.exit_velocity, cruise, bf.recip_jerk);
        let scale = bf.length / (head + tail);
        let next = if head > tail {
            target_velocity(bf.entry_velocity, head * scale, bf.cbrt_jerk)
        } else {
            target_velocity(bf.exit_velocity, tail * scale, bf.cbrt_jerk)
        };
        let converged = math::abs(next - cruise) / next < ITERATION_TOLERANCE;
        cruise = next;
        if converged {
            break;
        }
    }
    bf.cruise_velocity = cruise.min(cruise_requested);
    bf.head_length = target_length(bf.entry_velocity, bf.cruise_velocity, bf.recip_jerk)
        .min(bf.length);
    bf.tail_length = bf.length - bf.head_length;
    absorb_slivers(bf);
}

/// Folds sub-minimum sections into a neighbour.
fn absorb_slivers(bf: &mut PlanBlock) {
    if bf.head_length > 0.0 && bf.head_length < MIN_SECTION_LENGTH {
        bf.body_length += bf.head_length;
        bf.head_length = 0.0;
    }
    if bf.tail_length > 0.0 && bf.tail_length < MIN_SECTION_LENGTH {
        bf.body_length += bf.tail_length;
        bf.tail_length = 0.0;
    }
    if bf.body_length > 0.0 && bf.body_length < MIN_SECTION_LENGTH {
        if bf.head_length >= bf.tail_length && bf.head_length > 0.0 {
            bf.head_length += bf.body_length;
            bf.body_length = 0.0;
        } else if bf.tail_length > 0.0 {
            bf.tail_length += bf.body_length;
            bf.body_length = 0.0;
        }
        // A block that is nothing but a short body stays a body.
    }
}
