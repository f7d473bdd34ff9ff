//! Linear ramp table and per-interval ramp envelope.
//!
//! `delay_for(i) = max_delay - i * rate` for `i` in `0..=steps`; index 0 is
//! the bottom of the ramp (slowest), index `steps` is cruise (zero extra
//! delay). The same table is shared by every motor, so the extra ticks a ramp
//! adds are identical for all of them regardless of their step rate.
//!
//! ## Envelope
//!
//! A move of `n` steps has `n` step intervals. The envelope is the ordered
//! list of `2 * steps` ramp entries: `table[0], table[1], …, table[steps-1]`
//! (ramp-in) followed by the mirror image (ramp-out). Moves with at least
//! `2 * steps` steps spend one interval per entry at each end and cruise in
//! between. Shorter moves fold the envelope proportionally onto their
//! intervals so that every moving motor always accumulates exactly
//! `total_ramp_delay()` ticks of ramp-in and the same of ramp-out.

use mmvector_common::arm::RampConfig;
use mmvector_common::config::ConfigError;
use mmvector_common::consts::{MAX_RAMP_DELAY, NUM_RAMP_STEPS, RAMP_RATE};
use serde::Serialize;

/// Which part of the ramp envelope an interval belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RampSegment {
    RampIn,
    Cruise,
    RampOut,
}

/// Extra delay for one step interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampIncrement {
    /// Ticks contributed by ramp-in entries.
    pub rise: u32,
    /// Ticks contributed by ramp-out entries.
    pub fall: u32,
    /// Lowest table index applied (`steps` during cruise).
    pub index: u32,
    pub segment: RampSegment,
}

impl RampIncrement {
    /// Total extra ticks for the interval.
    #[inline]
    pub const fn total(&self) -> u32 {
        self.rise + self.fall
    }
}

/// Immutable linear ramp table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampTable {
    max_delay: u32,
    steps: u32,
    rate: u32,
}

impl Default for RampTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RampTable {
    /// The reference ramp: 200 → 0 in 20 steps of 10.
    pub const fn standard() -> Self {
        Self {
            max_delay: MAX_RAMP_DELAY,
            steps: NUM_RAMP_STEPS,
            rate: RAMP_RATE,
        }
    }

    /// Build from a `[ramp]` config section.
    pub fn from_config(config: &RampConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            max_delay: config.max_ramp_delay,
            steps: config.ramp_steps,
            rate: config.rate(),
        })
    }

    /// Number of ramp steps (last valid index).
    #[inline]
    pub const fn steps(&self) -> u32 {
        self.steps
    }

    /// Number of table entries (`steps + 1`).
    #[inline]
    pub const fn len(&self) -> usize {
        self.steps as usize + 1
    }

    #[inline]
    pub const fn max_delay(&self) -> u32 {
        self.max_delay
    }

    #[inline]
    pub const fn rate(&self) -> u32 {
        self.rate
    }

    /// Extra delay at `index`.
    ///
    /// # Panics
    /// If `index > steps()`. An out-of-range index is a logic error.
    #[inline]
    pub fn delay_for(&self, index: u32) -> u32 {
        assert!(
            index <= self.steps,
            "ramp index {index} out of range [0, {}]",
            self.steps
        );
        self.max_delay - index * self.rate
    }

    /// Table entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..=self.steps).map(|i| self.delay_for(i))
    }

    /// Sum of the table: the ticks one ramp (in or out) adds to every motor.
    ///
    /// 2100 for the standard table (21 entries averaging 100), so a move ends
    /// `max_time + 4200` ticks after it starts.
    pub fn total_ramp_delay(&self) -> u32 {
        self.iter().sum()
    }

    /// Ramp increment for step interval `interval` (0-based) of a move of
    /// `total_steps` steps.
    ///
    /// # Panics
    /// If `interval >= total_steps`.
    pub fn envelope(&self, interval: u32, total_steps: u32) -> RampIncrement {
        assert!(
            interval < total_steps,
            "interval {interval} outside move of {total_steps} steps"
        );
        let r = self.steps;
        let full = 2 * r;

        if total_steps >= full {
            if interval < r {
                return RampIncrement {
                    rise: self.delay_for(interval),
                    fall: 0,
                    index: interval,
                    segment: RampSegment::RampIn,
                };
            }
            if interval >= total_steps - r {
                let index = total_steps - 1 - interval;
                return RampIncrement {
                    rise: 0,
                    fall: self.delay_for(index),
                    index,
                    segment: RampSegment::RampOut,
                };
            }
            return RampIncrement {
                rise: 0,
                fall: self.delay_for(r),
                index: r,
                segment: RampSegment::Cruise,
            };
        }

        // Envelope entry e lands on interval floor(e * total / full).
        let n = u64::from(total_steps);
        let f = u64::from(full);
        let i = u64::from(interval);
        let start = (i * f).div_ceil(n) as u32;
        let end = ((i + 1) * f).div_ceil(n) as u32;

        let mut inc = RampIncrement {
            rise: 0,
            fall: 0,
            index: r,
            segment: RampSegment::RampIn,
        };
        for e in start..end {
            if e < r {
                inc.rise += self.delay_for(e);
                inc.index = inc.index.min(e);
            } else {
                let index = full - 1 - e;
                inc.fall += self.delay_for(index);
                inc.index = inc.index.min(index);
                inc.segment = RampSegment::RampOut;
            }
        }
        inc
    }
}
