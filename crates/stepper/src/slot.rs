//! Single-slot segment handoff between the preparer and the step loader.
//!
//! The preparer (LOW ISR) writes a fully-derived [`PrepSegment`] into the
//! slot and flips ownership to the loader. The loader (HIGH ISR) takes the
//! segment at the next segment boundary and flips ownership back. The owner
//! flag is written last by the producer and read first by the consumer, with
//! release/acquire ordering, so the payload is always fully published before
//! it becomes visible.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU8, Ordering};

use critical_section::Mutex;

use crate::MOTORS;

const OWNER_EXEC: u8 = 0;
const OWNER_LOADER: u8 = 1;

/// Which priority level currently owns the prep slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlotOwner {
    /// The segment executor/preparer may write the slot.
    Exec,
    /// The step loader may consume the slot.
    Loader,
}

/// Error returned when a slot operation is attempted by the wrong owner.
///
/// This is an invariant violation, not a recoverable condition: the caller
/// is expected to latch a panic state and stop issuing pulses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SlotError;

/// Per-motor share of a prepared segment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MotorSegment {
    /// Substep units added to the motor's accumulator on every DDA tick.
    /// Zero means the motor is idle for this segment.
    pub substep_increment: i64,
    /// Travel direction, already corrected for motor polarity.
    pub forward: bool,
    /// True when `forward` differs from the previous segment; tells the
    /// loader to update the direction pin and reflect the accumulator.
    pub direction_changed: bool,
    /// Logical step sign (+1/-1, 0 when idle) used for signed step counting.
    pub step_sign: i8,
}

impl MotorSegment {
    const IDLE: Self = Self {
        substep_increment: 0,
        forward: true,
        direction_changed: false,
        step_sign: 0,
    };
}

/// A segment in DDA parameter form, ready for the loader.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrepSegment {
    /// Duration of the segment in DDA ticks.
    pub dda_ticks: u32,
    /// Substep units per whole step for this segment.
    pub substeps: i64,
    /// Per-motor increments and direction bits.
    pub motors: [MotorSegment; MOTORS],
}

impl PrepSegment {
    /// An empty segment: zero duration, all motors idle.
    pub const EMPTY: Self = Self {
        dda_ticks: 0,
        substeps: crate::DDA_SUBSTEPS,
        motors: [MotorSegment::IDLE; MOTORS],
    };

    /// A step-free segment that only consumes time (dwells and loader
    /// stretching both use this shape).
    pub const fn dwell(dda_ticks: u32) -> Self {
        Self {
            dda_ticks,
            substeps: crate::DDA_SUBSTEPS,
            motors: [MotorSegment::IDLE; MOTORS],
        }
    }
}

/// The single-slot producer/consumer handoff between EXEC and the HI ISR.
pub struct PrepSlot {
    owner: AtomicU8,
    segment: Mutex<RefCell<PrepSegment>>,
}

impl PrepSlot {
    /// Creates an empty slot owned by the executor.
    pub const fn new() -> Self {
        Self {
            owner: AtomicU8::new(OWNER_EXEC),
            segment: Mutex::new(RefCell::new(PrepSegment::EMPTY)),
        }
    }

    /// Current owner of the slot.
    pub fn owner(&self) -> SlotOwner {
        match self.owner.load(Ordering::Acquire) {
            OWNER_EXEC => SlotOwner::Exec,
            _ => SlotOwner::Loader,
        }
    }

    /// Publishes a segment and hands the slot to the loader.
    ///
    /// Must only be called while the executor owns the slot; calling it
    /// while the loader holds the slot returns [`SlotError`].
    pub fn publish(&self, segment: &PrepSegment) -> Result<(), SlotError> {
        if self.owner.load(Ordering::Acquire) != OWNER_EXEC {
            return Err(SlotError);
        }
        critical_section::with(|cs| {
            *self.segment.borrow_ref_mut(cs) = *segment;
        });
        self.owner.store(OWNER_LOADER, Ordering::Release);
        Ok(())
    }

    /// Takes the published segment, handing the slot back to the executor.
    /// Returns `None` when no segment is ready.
    pub fn try_take(&self) -> Option<PrepSegment> {
        if self.owner.load(Ordering::Acquire) != OWNER_LOADER {
            return None;
        }
        let segment = critical_section::with(|cs| *self.segment.borrow_ref(cs));
        self.owner.store(OWNER_EXEC, Ordering::Release);
        Some(segment)
    }

    /// Forces the slot back to executor ownership, discarding any pending
    /// segment. Used by abort/reset paths.
    pub fn reset(&self) {
        critical_section::with(|cs| {
            *self.segment.borrow_ref_mut(cs) = PrepSegment::EMPTY;
        });
        self.owner.store(OWNER_EXEC, Ordering::Release);
    }
}

impl Default for PrepSlot {
    fn default() -> Self {
        Self::new()
    }
}
