//! Hardware contract constants for the MMvector arm.
//!
//! Single source of truth for motor count, bus widths and the default ramp.
//! Imported by all crates — no duplication permitted.

use static_assertions::const_assert;

/// Number of motors on the bus.
pub const NMOTORS: usize = 6;

/// Index of the gripper motor (also the last motor).
pub const GRIPPER: usize = 5;

/// Number of pattern lines carrying the coil waveform.
pub const PATTERN_LINES: usize = 4;

/// Number of address lines selecting the latched motor.
pub const ADDRESS_LINES: usize = 3;

/// Highest digital pin number accepted in configuration (exclusive).
pub const MAX_PIN: u8 = 64;

/// Ramp delay added at the bottom of the ramp [ticks].
pub const MAX_RAMP_DELAY: u32 = 200;

/// Number of steps taken to climb from the bottom of the ramp to cruise.
pub const NUM_RAMP_STEPS: u32 = 20;

/// Ramp delay decrement per ramp step [ticks].
pub const RAMP_RATE: u32 = MAX_RAMP_DELAY / NUM_RAMP_STEPS;

/// Upper bound on configurable ramp length.
pub const MAX_RAMP_STEPS: u32 = 64;

/// Upper bound on configurable bottom-of-ramp delay [ticks].
///
/// A one-step move carries the whole ramp-in and ramp-out in one interval,
/// `(MAX_RAMP_STEPS + 1) * MAX_RAMP_DELAY_LIMIT` at most; that must stay a `u32`.
pub const MAX_RAMP_DELAY_LIMIT: u32 = 1_000_000;

/// Default tick period in microseconds (10 kHz).
pub const DEFAULT_TICK_PERIOD_US: u32 = 100;

/// Tick period bounds [µs].
pub const TICK_PERIOD_US_MIN: u32 = 10;
pub const TICK_PERIOD_US_MAX: u32 = 100_000;

/// Default fastest cruise interval per motor [ticks/step].
///
/// At the default tick period this is ~345 steps/s at cruise and ~44 steps/s
/// at the bottom of the ramp.
pub const DEFAULT_MIN_STEP_DELAY: u32 = 29;

/// Upper bound on a motor's fastest cruise interval [ticks/step].
pub const MAX_MIN_STEP_DELAY: u32 = 1_000_000;

/// Default pattern line pins.
pub const DEFAULT_PATTERN_PINS: [u8; PATTERN_LINES] = [4, 5, 6, 7];

/// Default address line pins (LSB first).
pub const DEFAULT_ADDRESS_PINS: [u8; ADDRESS_LINES] = [8, 9, 10];

/// Default strobe pin.
pub const DEFAULT_STROBE_PIN: u8 = 11;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mmvector/arm.toml";

const_assert!(NMOTORS <= 1 << ADDRESS_LINES);
const_assert!(GRIPPER == NMOTORS - 1);
const_assert!(MAX_RAMP_DELAY % NUM_RAMP_STEPS == 0);
const_assert!(NUM_RAMP_STEPS <= MAX_RAMP_STEPS);
const_assert!(MAX_RAMP_DELAY <= MAX_RAMP_DELAY_LIMIT);
const_assert!((MAX_RAMP_STEPS as u64 + 1) * MAX_RAMP_DELAY_LIMIT as u64 <= u32::MAX as u64);
