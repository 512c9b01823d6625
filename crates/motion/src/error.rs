//! Status codes for the motion core boundary.
//!
//! Errors flow upward via return values; nothing is raised out-of-band.
//! Assertion variants latch the core until an external reset.

/// Represents errors that can occur in the planner and segment pipeline.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MotionError {
    /// The planner queue has no free block for the requested move.
    QueueFull,
    /// The requested move is shorter (or briefer) than the planning
    /// resolution. No queue state was changed.
    ZeroLength,
    /// A move or segment duration computed to infinity.
    MoveTimeInfinite,
    /// A move or segment duration computed to NaN.
    MoveTimeNan,
    /// A planner invariant was violated. Not recoverable; requires reset.
    PlannerAssertion,
    /// The prep-slot ownership contract was violated. Not recoverable.
    StepperAssertion,
}

impl core::fmt::Display for MotionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            MotionError::QueueFull => "planner queue full",
            MotionError::ZeroLength => "zero length move",
            MotionError::MoveTimeInfinite => "move time is infinite",
            MotionError::MoveTimeNan => "move time is NaN",
            MotionError::PlannerAssertion => "planner assertion failed",
            MotionError::StepperAssertion => "stepper prep assertion failed",
        };
        f.write_str(text)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MotionError {}

/// Result of one pump of the segment executor.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExecStatus {
    /// Nothing to do.
    Noop,
    /// A segment was produced; call again for the next one.
    Again,
    /// The current block completed and was freed.
    Done,
}
