//! Planner queue and look-ahead replanning.
//!
//! Moves arrive one at a time from the G-code front-end and land in a ring
//! of planning blocks. Every commit triggers a two-pass replan over the
//! replannable tail of the ring:
//!
//! 1. A backward pass propagates a cumulative braking velocity, so each
//!    block knows the fastest entry from which the chain can still brake to
//!    zero by its end.
//! 2. A forward pass chains exit velocities into entry velocities, caps
//!    each exit against the successor's limits, and runs the trapezoid
//!    solver. Blocks that come out optimal are frozen, which prunes future
//!    passes.
//!
//! The ring is a fixed array with explicit next/previous indices inside
//! each block and three cursors (`w` write reservation, `q` commit, `r`
//! run). One writer advances `q`, one reader advances `r`; the replan only
//! touches replannable blocks, which by construction excludes the running
//! one.

use crate::config::{MachineConfig, AXES};
use crate::error::MotionError;
use crate::math;
use crate::trapezoid;
use crate::EPSILON;

/// Number of blocks in the planner ring.
pub const PLANNER_POOL: usize = 32;

/// Stand-in junction velocity for an effectively straight join.
const JUNCTION_VELOCITY_MAX: f32 = 10_000_000.0;

/// Lifecycle state of a planning block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BlockState {
    #[default]
    Empty,
    /// Reserved by the writer, being filled in.
    Loading,
    /// Committed; may still be replanned.
    Queued,
    /// Committed and positioned to run next.
    Pending,
    /// Being drained by the segment executor.
    Running,
}

/// What a block asks the executor to do.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BlockKind {
    /// A jerk-limited straight move.
    #[default]
    Line,
    /// Timed pause with motors holding.
    Dwell,
    /// Program stop marker.
    Stop,
    /// Cycle start marker.
    Start,
    /// Program end marker.
    End,
}

/// One entry of the planner ring.
#[derive(Debug, Copy, Clone)]
pub struct PlanBlock {
    pub state: BlockState,
    pub kind: BlockKind,
    /// Entry/exit velocities may still change as later moves arrive.
    pub replannable: bool,
    /// Execution is gated here after a feedhold until cycle start.
    pub hold_point: bool,

    /// Absolute axis-space endpoint of the move.
    pub target: [f32; AXES],
    /// Unit vector of the move direction.
    pub unit: [f32; AXES],
    /// Euclidean length in axis space, mm.
    pub length: f32,
    pub dwell_seconds: f32,

    pub entry_velocity: f32,
    pub cruise_velocity: f32,
    pub exit_velocity: f32,

    pub entry_vmax: f32,
    pub cruise_vmax: f32,
    pub exit_vmax: f32,
    /// Largest velocity change achievable over this block's length.
    pub delta_vmax: f32,
    /// Fastest entry from which the chain from here can still stop.
    pub braking_velocity: f32,

    pub head_length: f32,
    pub body_length: f32,
    pub tail_length: f32,

    /// Composite jerk for the move direction, mm/min^3.
    pub jerk: f32,
    pub recip_jerk: f32,
    pub cbrt_jerk: f32,

    /// Ring links.
    pub nx: usize,
    pub pv: usize,
}

impl PlanBlock {
    const EMPTY: Self = Self {
        state: BlockState::Empty,
        kind: BlockKind::Line,
        replannable: false,
        hold_point: false,
        target: [0.0; AXES],
        unit: [0.0; AXES],
        length: 0.0,
        dwell_seconds: 0.0,
        entry_velocity: 0.0,
        cruise_velocity: 0.0,
        exit_velocity: 0.0,
        entry_vmax: 0.0,
        cruise_vmax: 0.0,
        exit_vmax: 0.0,
        delta_vmax: 0.0,
        braking_velocity: 0.0,
        head_length: 0.0,
        body_length: 0.0,
        tail_length: 0.0,
        jerk: 0.0,
        recip_jerk: 0.0,
        cbrt_jerk: 0.0,
        nx: 0,
        pv: 0,
    };

    /// Caches the jerk and its derived terms for this block.
    pub(crate) fn set_jerk(&mut self, jerk: f32) {
        self.jerk = jerk;
        self.recip_jerk = 1.0 / jerk;
        self.cbrt_jerk = math::cbrt(jerk);
    }

    fn clear(&mut self) {
        let (nx, pv) = (self.nx, self.pv);
        *self = Self::EMPTY;
        self.nx = nx;
        self.pv = pv;
    }

    fn is_queued(&self) -> bool {
        matches!(
            self.state,
            BlockState::Queued | BlockState::Pending | BlockState::Running
        )
    }
}

impl Default for PlanBlock {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// The planner singleton: block ring plus planning position.
pub struct Planner {
    blocks: [PlanBlock; PLANNER_POOL],
    /// Reservation cursor: next block handed to the writer.
    w: usize,
    /// Commit cursor: one past the newest committed block.
    q: usize,
    /// Run cursor: the block being (or next to be) executed.
    r: usize,
    available: usize,
    queued: usize,
    /// Where the next move starts: the target of the last committed move.
    position: [f32; AXES],
    /// Outgoing unit vector of the last committed move.
    prev_unit: [f32; AXES],
}

impl Planner {
    pub fn new() -> Self {
        let mut blocks = [PlanBlock::EMPTY; PLANNER_POOL];
        for (i, block) in blocks.iter_mut().enumerate() {
            block.nx = (i + 1) % PLANNER_POOL;
            block.pv = (i + PLANNER_POOL - 1) % PLANNER_POOL;
        }
        Self {
            blocks,
            w: 0,
            q: 0,
            r: 0,
            available: PLANNER_POOL,
            queued: 0,
            position: [0.0; AXES],
            prev_unit: [0.0; AXES],
        }
    }

    pub fn position(&self) -> [f32; AXES] {
        self.position
    }

    /// Forces the planning position (homing, G92). Also forgets the
    /// previous move direction so the next junction is planned from rest.
    pub fn set_position(&mut self, position: [f32; AXES]) {
        self.position = position;
        self.prev_unit = [0.0; AXES];
    }

    pub fn available(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.queued == 0
    }

    pub fn block(&self, index: usize) -> &PlanBlock {
        &self.blocks[index]
    }

    pub(crate) fn block_mut(&mut self, index: usize) -> &mut PlanBlock {
        &mut self.blocks[index]
    }

    /// Committed blocks in execution order, oldest (running) first.
    pub fn queued_blocks(&self) -> impl Iterator<Item = &PlanBlock> {
        let mut index = self.r;
        (0..self.queued).map(move |_| {
            let block = &self.blocks[index];
            index = block.nx;
            block
        })
    }

    /// Newest committed block, if any.
    pub(crate) fn newest(&self) -> Option<usize> {
        if self.queued == 0 {
            None
        } else {
            Some(self.blocks[self.q].pv)
        }
    }

    /// The run-cursor block, if one is committed. Does not change state.
    pub(crate) fn peek_run(&self) -> Option<usize> {
        if self.blocks[self.r].is_queued() {
            Some(self.r)
        } else {
            None
        }
    }

    /// Claims the run-cursor block for execution. Running blocks are never
    /// replanned.
    pub(crate) fn get_run(&mut self) -> Option<usize> {
        let block = &mut self.blocks[self.r];
        match block.state {
            BlockState::Running => Some(self.r),
            BlockState::Queued | BlockState::Pending => {
                block.state = BlockState::Running;
                block.replannable = false;
                Some(self.r)
            }
            _ => None,
        }
    }

    /// Releases the finished run block and advances the run cursor.
    pub(crate) fn free_run(&mut self) {
        let nx = self.blocks[self.r].nx;
        self.blocks[self.r].clear();
        self.available += 1;
        self.queued -= 1;
        self.r = nx;
    }

    /// Puts the run block back to pending so it re-enters execution from
    /// scratch (feedhold split path).
    pub(crate) fn requeue_run(&mut self) {
        self.blocks[self.r].state = BlockState::Pending;
    }

    /// Drops every queued move. The planning position is preserved.
    pub fn flush(&mut self) {
        for block in self.blocks.iter_mut() {
            block.clear();
        }
        self.w = 0;
        self.q = 0;
        self.r = 0;
        self.available = PLANNER_POOL;
        self.queued = 0;
        self.prev_unit = [0.0; AXES];
    }

    fn reserve(&mut self) -> Result<usize, MotionError> {
        if self.available == 0 {
            return Err(MotionError::QueueFull);
        }
        let index = self.w;
        if !matches!(self.blocks[index].state, BlockState::Empty) {
            return Err(MotionError::PlannerAssertion);
        }
        self.blocks[index].state = BlockState::Loading;
        self.available -= 1;
        self.w = self.blocks[index].nx;
        Ok(index)
    }

    fn commit(&mut self, index: usize) {
        self.blocks[index].state = BlockState::Queued;
        self.queued += 1;
        self.q = self.blocks[index].nx;
    }

    /// Queues a straight move to `target` taking `minutes`. Runs the
    /// look-ahead replan before returning.
    pub fn plan_line(
        &mut self,
        target: [f32; AXES],
        minutes: f32,
        exact_stop: bool,
        config: &MachineConfig,
    ) -> Result<(), MotionError> {
        if minutes.is_nan() {
            return Err(MotionError::MoveTimeNan);
        }
        if minutes.is_infinite() {
            return Err(MotionError::MoveTimeInfinite);
        }
        if minutes < EPSILON {
            return Err(MotionError::ZeroLength);
        }

        let mut travel = [0.0; AXES];
        let mut length_squared = 0.0;
        for axis in 0..AXES {
            travel[axis] = target[axis] - self.position[axis];
            length_squared += math::square(travel[axis]);
        }
        let length = math::sqrt(length_squared);
        if length < EPSILON {
            return Err(MotionError::ZeroLength);
        }

        let index = self.reserve()?;

        let mut unit = [0.0; AXES];
        for axis in 0..AXES {
            unit[axis] = travel[axis] / length;
        }

        // Composite jerk: vector-combine the per-axis limits weighted by the
        // squared direction components, so slow axes dominate diagonal moves.
        let mut jerk_squared = 0.0;
        for axis in 0..AXES {
            jerk_squared += math::square(unit[axis] * config.axes[axis].jerk_max);
        }
        let jerk = math::sqrt(jerk_squared);

        let cruise_vmax = length / minutes;
        let junction_vmax = junction_velocity(&self.prev_unit, &unit, config);

        let block = &mut self.blocks[index];
        block.kind = BlockKind::Line;
        block.target = target;
        block.unit = unit;
        block.length = length;
        block.set_jerk(jerk);
        block.cruise_vmax = cruise_vmax;
        block.delta_vmax = trapezoid::velocity_delta(length, block.cbrt_jerk);
        if exact_stop {
            block.entry_vmax = 0.0;
            block.exit_vmax = 0.0;
            block.replannable = false;
        } else {
            block.entry_vmax = cruise_vmax.min(junction_vmax);
            block.exit_vmax = cruise_vmax.min(block.entry_vmax + block.delta_vmax);
            block.replannable = true;
        }
        block.braking_velocity = block.delta_vmax;

        self.commit(index);
        self.plan_block_list(index);
        self.position = target;
        self.prev_unit = unit;
        Ok(())
    }

    /// Queues a command block (dwell, stop, start, end). Command blocks are
    /// hard stops: the look-ahead plans preceding moves to exit at zero.
    pub fn plan_command(
        &mut self,
        kind: BlockKind,
        dwell_seconds: f32,
    ) -> Result<(), MotionError> {
        if dwell_seconds.is_nan() {
            return Err(MotionError::MoveTimeNan);
        }
        if dwell_seconds.is_infinite() {
            return Err(MotionError::MoveTimeInfinite);
        }
        let index = self.reserve()?;
        let block = &mut self.blocks[index];
        block.kind = kind;
        block.dwell_seconds = dwell_seconds;
        block.target = self.position;
        block.replannable = false;
        self.commit(index);
        self.plan_block_list(index);
        Ok(())
    }

    /// Makes every committed (non-running) move block replannable again.
    /// Used before a full replan after a feedhold reshapes the queue.
    pub(crate) fn reset_replannable(&mut self) {
        let mut index = self.r;
        for _ in 0..self.queued {
            let block = &mut self.blocks[index];
            if matches!(block.state, BlockState::Queued | BlockState::Pending)
                && matches!(block.kind, BlockKind::Line)
            {
                block.replannable = true;
            }
            index = block.nx;
        }
    }

    /// Replans the whole committed tail (newest block last).
    pub(crate) fn replan_all(&mut self) {
        if let Some(newest) = self.newest() {
            self.plan_block_list(newest);
        }
    }

    /// The two-pass look-ahead replan described in the module docs.
    fn plan_block_list(&mut self, newest: usize) {
        // Backward pass: walk the replannable chain, accumulating the
        // braking velocity toward the chain head.
        let mut index = newest;
        for _ in 0..PLANNER_POOL {
            let pv = self.blocks[index].pv;
            if pv == newest {
                break; // full ring; do not wrap the chain
            }
            if !self.blocks[pv].is_queued() || !self.blocks[pv].replannable {
                break;
            }
            let cap = self.blocks[index]
                .entry_vmax
                .min(self.blocks[index].braking_velocity);
            let prev = &mut self.blocks[pv];
            prev.braking_velocity = cap + prev.delta_vmax;
            index = pv;
        }

        // Forward pass from the chain head to the newest block.
        loop {
            let pv = self.blocks[index].pv;
            let nx = self.blocks[index].nx;
            let is_last = index == newest;

            let entry_from_prev = if self.blocks[pv].is_queued() {
                self.blocks[pv].exit_velocity
            } else {
                0.0
            };
            let pv_replannable = self.blocks[pv].is_queued() && self.blocks[pv].replannable;
            let (nx_braking, nx_entry_vmax) = if is_last {
                (0.0, 0.0)
            } else {
                (self.blocks[nx].braking_velocity, self.blocks[nx].entry_vmax)
            };

            let block = &mut self.blocks[index];
            if matches!(block.kind, BlockKind::Line) {
                block.entry_velocity = entry_from_prev.min(block.entry_vmax);
                block.cruise_velocity = block.cruise_vmax;
                block.exit_velocity = if is_last {
                    // Nothing follows yet; the newest block must brake out.
                    0.0
                } else {
                    block
                        .exit_vmax
                        .min(nx_braking)
                        .min(nx_entry_vmax)
                        .min(block.entry_velocity + block.delta_vmax)
                };
                trapezoid::solve(block);

                // An exit pinned against a hard limit cannot improve with
                // more look-ahead; freeze the block.
                if !is_last
                    && (trapezoid::veq(block.exit_velocity, block.exit_vmax)
                        || trapezoid::veq(block.exit_velocity, nx_entry_vmax)
                        || (!pv_replannable
                            && trapezoid::veq(
                                block.exit_velocity,
                                block.entry_velocity + block.delta_vmax,
                            )))
                {
                    block.replannable = false;
                }
            }

            if is_last {
                break;
            }
            index = nx;
        }
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

/// Centripetal-limited corner velocity between two unit vectors.
///
/// The effective corner radius comes from the per-axis junction deviation,
/// averaged over both moves with the squared unit components as weights, so
/// axes with slow dynamics dominate the corner limit.
fn junction_velocity(prev_unit: &[f32; AXES], unit: &[f32; AXES], config: &MachineConfig) -> f32 {
    let mut dot = 0.0;
    for axis in 0..AXES {
        dot += prev_unit[axis] * unit[axis];
    }
    let costheta = -dot;

    if costheta < -0.99 {
        return JUNCTION_VELOCITY_MAX; // straight through
    }
    if costheta > 0.99 {
        return 0.0; // full reversal
    }

    let mut delta_prev = 0.0;
    let mut delta_next = 0.0;
    for axis in 0..AXES {
        delta_prev += math::square(prev_unit[axis]) * config.axes[axis].junction_deviation;
        delta_next += math::square(unit[axis]) * config.axes[axis].junction_deviation;
    }
    let delta = 0.5 * (delta_prev + delta_next);

    let sintheta_over2 = math::sqrt((1.0 - costheta) / 2.0);
    let radius = delta * sintheta_over2 / (1.0 - sintheta_over2);
    math::sqrt(radius * config.junction_acceleration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;

    fn x_target(x: f32) -> [f32; AXES] {
        let mut t = [0.0; AXES];
        t[0] = x;
        t
    }

    /// A profile with moderate jerk so ramp sections are long enough to
    /// survive sliver absorption and show up in assertions.
    fn test_config() -> MachineConfig {
        let mut config = MachineConfig::default();
        for axis in config.axes.iter_mut() {
            axis.jerk_max = 5.0e6;
        }
        config
    }

    #[test]
    fn ring_reserves_all_pool_entries() {
        let config = test_config();
        let mut planner = Planner::new();
        for i in 1..=PLANNER_POOL {
            planner
                .plan_line(x_target(10.0 * i as f32), 0.05, false, &config)
                .unwrap();
        }
        assert_eq!(
            planner.plan_line(x_target(9999.0), 0.05, false, &config),
            Err(MotionError::QueueFull)
        );

        // Freeing one block admits exactly one more move.
        planner.get_run().unwrap();
        planner.free_run();
        planner
            .plan_line(x_target(9999.0), 0.05, false, &config)
            .unwrap();
    }

    #[test]
    fn zero_length_leaves_ring_untouched() {
        let config = test_config();
        let mut planner = Planner::new();
        let available = planner.available();
        assert_eq!(
            planner.plan_line([0.0; AXES], 0.05, false, &config),
            Err(MotionError::ZeroLength)
        );
        assert_eq!(
            planner.plan_line(x_target(10.0), 0.0, false, &config),
            Err(MotionError::ZeroLength)
        );
        assert_eq!(
            planner.plan_line(x_target(10.0), f32::NAN, false, &config),
            Err(MotionError::MoveTimeNan)
        );
        assert_eq!(
            planner.plan_line(x_target(10.0), f32::INFINITY, false, &config),
            Err(MotionError::MoveTimeInfinite)
        );
        assert_eq!(planner.available(), available);
        assert!(planner.is_empty());
    }

    #[test]
    fn single_move_plans_to_full_stop() {
        let config = test_config();
        let mut planner = Planner::new();
        planner.plan_line(x_target(10.0), 0.05, false, &config).unwrap();

        let block = planner.queued_blocks().next().unwrap();
        assert_eq!(block.entry_velocity, 0.0);
        assert_eq!(block.exit_velocity, 0.0);
        assert!((block.cruise_vmax - 200.0).abs() < 1e-2);
        let sum = block.head_length + block.body_length + block.tail_length;
        assert!((sum - block.length).abs() < 1e-3);
    }

    #[test]
    fn collinear_moves_join_at_speed() {
        let config = test_config();
        let mut planner = Planner::new();
        planner.plan_line(x_target(10.0), 0.05, false, &config).unwrap();
        let first_tail = planner.queued_blocks().next().unwrap().tail_length;

        planner.plan_line(x_target(20.0), 0.05, false, &config).unwrap();

        let blocks: std::vec::Vec<_> = planner.queued_blocks().collect();
        assert_eq!(blocks.len(), 2);
        // Junction continuity.
        assert!((blocks[0].exit_velocity - blocks[1].entry_velocity).abs() < 1e-3);
        // The join runs at (nearly) the requested cruise velocity.
        assert!((blocks[0].exit_velocity - 200.0).abs() < 2.0);
        // The first block no longer brakes to zero.
        assert!(blocks[0].tail_length < first_tail || first_tail == 0.0);
    }

    #[test]
    fn right_angle_corner_is_junction_limited() {
        let config = test_config();
        let mut planner = Planner::new();
        planner.plan_line(x_target(10.0), 0.05, false, &config).unwrap();
        let mut corner = x_target(10.0);
        corner[1] = 10.0;
        planner.plan_line(corner, 0.05, false, &config).unwrap();

        // sin(45 deg) corner radius from the configured deviation.
        let sin_half = (0.5_f32).sqrt();
        let delta = config.axes[0].junction_deviation;
        let radius = delta * sin_half / (1.0 - sin_half);
        let expected = (radius * config.junction_acceleration).sqrt();

        let blocks: std::vec::Vec<_> = planner.queued_blocks().collect();
        assert!(expected < 200.0, "corner must bind before cruise");
        assert!((blocks[0].exit_velocity - expected).abs() < 2.0);
        assert!((blocks[1].entry_velocity - expected).abs() < 2.0);
    }

    #[test]
    fn reversal_plans_to_zero_junction() {
        let config = test_config();
        let mut planner = Planner::new();
        planner.plan_line(x_target(10.0), 0.05, false, &config).unwrap();
        planner.plan_line(x_target(0.0), 0.05, false, &config).unwrap();

        let blocks: std::vec::Vec<_> = planner.queued_blocks().collect();
        assert_eq!(blocks[0].exit_velocity, 0.0);
        assert_eq!(blocks[1].entry_velocity, 0.0);
    }

    #[test]
    fn exact_stop_blocks_are_frozen() {
        let config = test_config();
        let mut planner = Planner::new();
        planner.plan_line(x_target(10.0), 0.05, true, &config).unwrap();
        planner.plan_line(x_target(20.0), 0.05, false, &config).unwrap();

        let blocks: std::vec::Vec<_> = planner.queued_blocks().collect();
        assert!(!blocks[0].replannable);
        assert_eq!(blocks[0].exit_velocity, 0.0);
        assert_eq!(blocks[1].entry_velocity, 0.0);
    }

    #[test]
    fn collinear_chain_cruises_through_middles() {
        let config = test_config();
        let mut planner = Planner::new();
        for i in 1..=6 {
            planner
                .plan_line(x_target(10.0 * i as f32), 0.05, false, &config)
                .unwrap();
        }
        let blocks: std::vec::Vec<_> = planner.queued_blocks().collect();
        for pair in blocks.windows(2) {
            assert!((pair[0].exit_velocity - pair[1].entry_velocity).abs() < 1e-3);
        }
        // Middles are pure body: no ramps survive between collinear moves
        // at constant feed.
        for block in &blocks[1..5] {
            assert_eq!(block.head_length, 0.0, "middle block grew a head");
            assert_eq!(block.tail_length, 0.0, "middle block grew a tail");
        }
        // Only the last block brakes.
        assert_eq!(blocks[5].exit_velocity, 0.0);
    }

    #[test]
    fn dwell_forces_preceding_stop() {
        let config = test_config();
        let mut planner = Planner::new();
        planner.plan_line(x_target(10.0), 0.05, false, &config).unwrap();
        planner.plan_command(BlockKind::Dwell, 1.5).unwrap();
        planner.plan_line(x_target(20.0), 0.05, false, &config).unwrap();

        let blocks: std::vec::Vec<_> = planner.queued_blocks().collect();
        assert_eq!(blocks[0].exit_velocity, 0.0);
        assert_eq!(blocks[1].kind, BlockKind::Dwell);
        assert_eq!(blocks[2].entry_velocity, 0.0);
    }

    #[test]
    fn planned_queue_satisfies_block_invariants() {
        let config = test_config();
        let mut planner = Planner::new();
        // Mixed path: long runs, a corner, and short chords.
        let targets: [[f32; 2]; 6] = [
            [10.0, 0.0],
            [20.0, 0.0],
            [20.0, 10.0],
            [20.5, 10.5],
            [21.0, 11.0],
            [40.0, 11.0],
        ];
        for [x, y] in targets {
            let mut t = [0.0; AXES];
            t[0] = x;
            t[1] = y;
            planner.plan_line(t, 0.01, false, &config).unwrap();
        }

        let blocks: std::vec::Vec<_> = planner.queued_blocks().collect();
        assert_eq!(blocks.len(), 6);
        for block in &blocks {
            let sum = block.head_length + block.body_length + block.tail_length;
            assert!(
                (sum - block.length).abs() < 1e-3,
                "sections do not sum to length"
            );
            assert!(block.entry_velocity <= block.cruise_velocity + 2.0);
            assert!(block.exit_velocity <= block.cruise_velocity + 2.0);
            let dv = (block.exit_velocity - block.entry_velocity).abs();
            assert!(
                dv <= block.delta_vmax + 2.0,
                "velocity change {dv} exceeds jerk limit {}",
                block.delta_vmax
            );
        }
        for pair in blocks.windows(2) {
            assert!(
                (pair[0].exit_velocity - pair[1].entry_velocity).abs() < 2.0,
                "junction discontinuity"
            );
        }
    }

    #[test]
    fn flush_then_plan_matches_fresh_planner() {
        let config = test_config();
        let mut planner = Planner::new();
        for i in 1..=5 {
            planner
                .plan_line(x_target(7.0 * i as f32), 0.05, false, &config)
                .unwrap();
        }
        planner.set_position([0.0; AXES]);
        planner.flush();

        let mut fresh = Planner::new();
        planner.plan_line(x_target(10.0), 0.05, false, &config).unwrap();
        fresh.plan_line(x_target(10.0), 0.05, false, &config).unwrap();

        let a = planner.queued_blocks().next().unwrap();
        let b = fresh.queued_blocks().next().unwrap();
        assert_eq!(planner.available(), fresh.available());
        assert_eq!(a.entry_velocity, b.entry_velocity);
        assert_eq!(a.exit_velocity, b.exit_velocity);
        assert_eq!(a.length, b.length);
    }
}
