//! Common re-exports: `use mmvector_common::prelude::*;`

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::arm::{ArmConfig, BusPins, DriveConfig, MotorConfig, RampConfig};
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Hardware Contract ──────────────────────────────────────────────
pub use crate::consts::{
    ADDRESS_LINES, GRIPPER, MAX_RAMP_DELAY, NMOTORS, NUM_RAMP_STEPS, PATTERN_LINES, RAMP_RATE,
};
