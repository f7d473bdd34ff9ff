//! Per-motor move state.
//!
//! A move of `n` steps is `n` step intervals back to back, starting at move
//! tick 0; the pulse that ends interval `i` is step `i + 1`. Interval `i`
//! lasts
//!
//! ```text
//! base_delay + spread(i) + envelope(i, n).total()
//! ```
//!
//! where `spread` hands out the cruise remainder one tick at a time. Summed
//! over the move this is `cruise_ticks + 2 * total_ramp_delay`, the same for
//! every axis of a synchronized plan.

use mmvector_common::consts::NMOTORS;

use crate::bus::{BusMultiplexer, LineDriver, phase_pattern};
use crate::command::{AxisPlan, Direction};
use crate::ramp::{RampIncrement, RampSegment, RampTable};

/// Runtime state of one motor.
#[derive(Debug, Clone)]
pub struct MotorAxis {
    index: usize,
    direction: Direction,
    total_steps: u32,
    remaining_steps: u32,
    base_delay: u64,
    cruise_remainder: u32,
    /// Wide enough for `cruise_remainder + total_steps` at `u32::MAX` steps.
    cruise_error: u64,
    /// Ramp contribution of the interval in progress.
    pending: RampIncrement,
    ramp_index: u32,
    interval_start: u64,
    next_due: u64,
    /// Position in the full-step sequence (0..4).
    coil_phase: u8,
    position: i64,
    ramp_in_ticks: u64,
    ramp_out_ticks: u64,
    finish_tick: Option<u64>,
}

impl MotorAxis {
    /// # Panics
    /// If `index >= NMOTORS`.
    pub fn new(index: usize) -> Self {
        assert!(index < NMOTORS, "motor index {index} out of range [0, {NMOTORS})");
        Self {
            index,
            direction: Direction::Forward,
            total_steps: 0,
            remaining_steps: 0,
            base_delay: 0,
            cruise_remainder: 0,
            cruise_error: 0,
            pending: RampIncrement {
                rise: 0,
                fall: 0,
                index: 0,
                segment: RampSegment::Cruise,
            },
            ramp_index: 0,
            interval_start: 0,
            next_due: 0,
            coil_phase: 0,
            position: 0,
            ramp_in_ticks: 0,
            ramp_out_ticks: 0,
            finish_tick: None,
        }
    }

    /// Load a plan and schedule the first interval from tick 0.
    pub fn begin_move(&mut self, plan: &AxisPlan, ramp: &RampTable) {
        self.direction = plan.direction;
        self.total_steps = plan.steps;
        self.remaining_steps = plan.steps;
        self.base_delay = plan.base_delay;
        self.cruise_remainder = plan.cruise_remainder;
        self.cruise_error = 0;
        self.ramp_index = 0;
        self.ramp_in_ticks = 0;
        self.ramp_out_ticks = 0;
        self.finish_tick = None;
        if plan.is_moving() {
            self.schedule(0, 0, ramp);
        } else {
            self.next_due = 0;
        }
    }

    /// Fire if due at `tick`. Returns whether a pulse was emitted.
    pub fn step_if_due<L: LineDriver>(
        &mut self,
        tick: u64,
        bus: &mut BusMultiplexer<L>,
        ramp: &RampTable,
    ) -> bool {
        if self.remaining_steps == 0 || tick < self.next_due {
            return false;
        }

        self.coil_phase = match self.direction {
            Direction::Forward => (self.coil_phase + 1) % 4,
            Direction::Backward => (self.coil_phase + 3) % 4,
        };
        bus.emit_pulse(self.index, phase_pattern(self.coil_phase));

        self.remaining_steps -= 1;
        self.position += self.direction.sign();
        self.ramp_in_ticks += u64::from(self.pending.rise);
        self.ramp_out_ticks += u64::from(self.pending.fall);

        if self.remaining_steps == 0 {
            self.ramp_index = 0;
            self.finish_tick = Some(tick);
        } else {
            self.schedule(self.total_steps - self.remaining_steps, tick, ramp);
        }
        true
    }

    /// Drop the rest of the move without pulsing.
    pub fn halt(&mut self) {
        self.remaining_steps = 0;
        self.ramp_index = 0;
    }

    fn schedule(&mut self, interval: u32, start: u64, ramp: &RampTable) {
        let mut delay = self.base_delay;
        self.cruise_error += u64::from(self.cruise_remainder);
        if self.cruise_error >= u64::from(self.total_steps) {
            self.cruise_error -= u64::from(self.total_steps);
            delay += 1;
        }
        self.pending = ramp.envelope(interval, self.total_steps);
        self.ramp_index = self.pending.index;
        self.interval_start = start;
        self.next_due = start + delay + u64::from(self.pending.total());
    }

    /// Ramp segment at `tick`, or `None` once the axis has nothing left to do.
    ///
    /// An interval that folds ramp-in and ramp-out entries together counts as
    /// ramp-in until its ramp-in ticks have elapsed.
    pub fn segment_at(&self, tick: u64) -> Option<RampSegment> {
        if self.remaining_steps == 0 {
            return None;
        }
        let pending = &self.pending;
        if pending.rise > 0 && pending.fall > 0 {
            return Some(if tick < self.interval_start + u64::from(pending.rise) {
                RampSegment::RampIn
            } else {
                RampSegment::RampOut
            });
        }
        Some(pending.segment)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    #[inline]
    pub fn remaining_steps(&self) -> u32 {
        self.remaining_steps
    }

    #[inline]
    pub fn steps_taken(&self) -> u32 {
        self.total_steps - self.remaining_steps
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.remaining_steps == 0
    }

    /// Current ramp table index (0 at move start and after the last step).
    #[inline]
    pub fn ramp_index(&self) -> u32 {
        self.ramp_index
    }

    #[inline]
    pub fn next_due(&self) -> u64 {
        self.next_due
    }

    #[inline]
    pub fn coil_phase(&self) -> u8 {
        self.coil_phase
    }

    /// Absolute step count since power-up.
    #[inline]
    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    /// Ramp-in ticks applied by completed intervals.
    #[inline]
    pub fn ramp_in_ticks(&self) -> u64 {
        self.ramp_in_ticks
    }

    #[inline]
    pub fn ramp_out_ticks(&self) -> u64 {
        self.ramp_out_ticks
    }

    /// Tick of the last pulse of a completed move.
    #[inline]
    pub fn finish_tick(&self) -> Option<u64> {
        self.finish_tick
    }
}
