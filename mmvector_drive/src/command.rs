//! Move commands and move plans.
//!
//! A [`MoveCommand`] says how far each motor travels. [`plan_move`] turns it
//! into a [`MovePlan`] by stretching every moving axis to the cruise duration
//! of the slowest one:
//!
//! ```text
//! max_time      = max(steps[m] * min_step_delay[m])
//! base_delay[m] = max_time / steps[m]
//! remainder[m]  = max_time % steps[m]   (spread one tick at a time)
//! ```
//!
//! so `steps * base_delay + remainder == max_time` for every moving axis.

use std::fmt;
use std::str::FromStr;

use mmvector_common::arm::MotorConfig;
use mmvector_common::consts::NMOTORS;
use serde::Serialize;

use crate::error::DriveError;
use crate::ramp::RampTable;

// ─── Direction ──────────────────────────────────────────────────────

/// Sense of travel along an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    /// Position change per step.
    #[inline]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
        }
    }

    /// Direction of a signed step delta (zero counts as forward).
    #[inline]
    pub const fn of_delta(delta: i64) -> Self {
        if delta < 0 {
            Self::Backward
        } else {
            Self::Forward
        }
    }
}

// ─── Move Command ───────────────────────────────────────────────────

/// Requested travel of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisTarget {
    pub direction: Direction,
    pub steps: u32,
}

/// Requested travel of every axis, indexed by motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveCommand {
    axes: [AxisTarget; NMOTORS],
}

impl MoveCommand {
    /// Command that moves nothing.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Build from signed step deltas.
    pub fn from_deltas(deltas: [i64; NMOTORS]) -> Result<Self, DriveError> {
        let mut command = Self::idle();
        for (index, delta) in deltas.into_iter().enumerate() {
            let steps = u32::try_from(delta.unsigned_abs()).map_err(|_| {
                DriveError::InvalidCommand(format!(
                    "axis {index}: {delta} steps exceeds the per-move limit"
                ))
            })?;
            command.axes[index] = AxisTarget {
                direction: Direction::of_delta(delta),
                steps,
            };
        }
        Ok(command)
    }

    /// Build the move taking every axis from `current` to `target`.
    pub fn to_position(
        current: &[i64; NMOTORS],
        target: &[i64; NMOTORS],
    ) -> Result<Self, DriveError> {
        let mut deltas = [0i64; NMOTORS];
        for (index, delta) in deltas.iter_mut().enumerate() {
            *delta = target[index].checked_sub(current[index]).ok_or_else(|| {
                DriveError::InvalidCommand(format!("axis {index}: position delta overflows"))
            })?;
        }
        Self::from_deltas(deltas)
    }

    /// Set one axis.
    ///
    /// # Panics
    /// If `index >= NMOTORS`.
    pub fn with_axis(mut self, index: usize, direction: Direction, steps: u32) -> Self {
        assert!(index < NMOTORS, "motor index {index} out of range [0, {NMOTORS})");
        self.axes[index] = AxisTarget { direction, steps };
        self
    }

    #[inline]
    pub fn axis(&self, index: usize) -> &AxisTarget {
        &self.axes[index]
    }

    #[inline]
    pub fn axes(&self) -> &[AxisTarget; NMOTORS] {
        &self.axes
    }

    /// True if no axis moves.
    pub fn is_idle(&self) -> bool {
        self.axes.iter().all(|a| a.steps == 0)
    }
}

/// Parses `"<axis>:<signed steps>"` pairs separated by commas, e.g.
/// `"0:+100,1:-50,5:1"`. Omitted axes stay put.
impl FromStr for MoveCommand {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut deltas = [0i64; NMOTORS];
        let mut seen = [false; NMOTORS];

        for item in s.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            let (axis, steps) = item.split_once(':').ok_or_else(|| {
                DriveError::InvalidCommand(format!("'{item}': expected <axis>:<steps>"))
            })?;
            let index: usize = axis.trim().parse().map_err(|_| {
                DriveError::InvalidCommand(format!("'{item}': bad axis index '{axis}'"))
            })?;
            if index >= NMOTORS {
                return Err(DriveError::InvalidCommand(format!(
                    "'{item}': axis {index} out of range [0, {NMOTORS})"
                )));
            }
            if std::mem::replace(&mut seen[index], true) {
                return Err(DriveError::InvalidCommand(format!(
                    "axis {index} given more than once"
                )));
            }
            deltas[index] = steps.trim().parse().map_err(|_| {
                DriveError::InvalidCommand(format!("'{item}': bad step count '{steps}'"))
            })?;
        }

        Self::from_deltas(deltas)
    }
}

impl fmt::Display for MoveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (index, axis) in self.axes.iter().enumerate().filter(|(_, a)| a.steps > 0) {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            let sign = match axis.direction {
                Direction::Forward => '+',
                Direction::Backward => '-',
            };
            write!(f, "{index}:{sign}{}", axis.steps)?;
        }
        Ok(())
    }
}

// ─── Move Plan ──────────────────────────────────────────────────────

/// Timing of one axis for a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisPlan {
    pub direction: Direction,
    pub steps: u32,
    /// Cruise interval [ticks/step].
    pub base_delay: u64,
    /// Extra ticks spread over the move; always `< steps`.
    pub cruise_remainder: u32,
}

impl AxisPlan {
    /// Axis moving `steps` steps at a fixed cruise interval.
    pub const fn new(direction: Direction, steps: u32, base_delay: u64) -> Self {
        Self {
            direction,
            steps,
            base_delay,
            cruise_remainder: 0,
        }
    }

    #[inline]
    pub const fn is_moving(&self) -> bool {
        self.steps > 0
    }

    /// Cruise-phase duration [ticks].
    #[inline]
    pub const fn cruise_ticks(&self) -> u64 {
        self.steps as u64 * self.base_delay + self.cruise_remainder as u64
    }
}

/// Timing of every axis for one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MovePlan {
    axes: [AxisPlan; NMOTORS],
}

impl MovePlan {
    /// Plan with caller-chosen cruise intervals.
    pub const fn explicit(axes: [AxisPlan; NMOTORS]) -> Self {
        Self { axes }
    }

    #[inline]
    pub fn axis(&self, index: usize) -> &AxisPlan {
        &self.axes[index]
    }

    #[inline]
    pub fn axes(&self) -> &[AxisPlan; NMOTORS] {
        &self.axes
    }

    pub fn is_idle(&self) -> bool {
        !self.axes.iter().any(AxisPlan::is_moving)
    }

    /// Longest cruise duration of any moving axis.
    pub fn max_cruise_ticks(&self) -> u64 {
        self.axes
            .iter()
            .filter(|a| a.is_moving())
            .map(AxisPlan::cruise_ticks)
            .max()
            .unwrap_or(0)
    }

    /// True when every moving axis cruises for the same number of ticks.
    pub fn is_synchronized(&self) -> bool {
        let max = self.max_cruise_ticks();
        self.axes
            .iter()
            .filter(|a| a.is_moving())
            .all(|a| a.cruise_ticks() == max)
    }

    /// Tick of the last pulse: `max_time + 2 * total_ramp_delay`, or 0 for
    /// an idle plan.
    pub fn predicted_end_tick(&self, ramp: &RampTable) -> u64 {
        if self.is_idle() {
            return 0;
        }
        self.max_cruise_ticks() + 2 * u64::from(ramp.total_ramp_delay())
    }

    /// Reject plans the scheduler cannot execute.
    pub fn validate(&self) -> Result<(), DriveError> {
        for (index, axis) in self.axes.iter().enumerate() {
            if !axis.is_moving() {
                continue;
            }
            if axis.base_delay == 0 {
                return Err(DriveError::InvalidPlan(format!(
                    "axis {index}: base delay must be at least one tick"
                )));
            }
            if axis.cruise_remainder >= axis.steps {
                return Err(DriveError::InvalidPlan(format!(
                    "axis {index}: cruise remainder {} not below step count {}",
                    axis.cruise_remainder, axis.steps
                )));
            }
        }
        Ok(())
    }
}

/// Stretch every moving axis to the slowest axis' cruise duration.
pub fn plan_move(command: &MoveCommand, motors: &[MotorConfig; NMOTORS]) -> MovePlan {
    let max_time = command
        .axes()
        .iter()
        .zip(motors)
        .map(|(target, motor)| u64::from(target.steps) * u64::from(motor.min_step_delay))
        .max()
        .unwrap_or(0);

    let mut axes = [AxisPlan::default(); NMOTORS];
    for (plan, target) in axes.iter_mut().zip(command.axes()) {
        plan.direction = target.direction;
        plan.steps = target.steps;
        if target.steps > 0 {
            let steps = u64::from(target.steps);
            plan.base_delay = max_time / steps;
            // Remainder of a division by a u32 fits in u32.
            plan.cruise_remainder = (max_time % steps) as u32;
        }
    }
    MovePlan::explicit(axes)
}
